use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column as TableColumn, TableBuilder};

use crate::state::{AppState, OperationKind, Status};

// ---------------------------------------------------------------------------
// Left side panel
// ---------------------------------------------------------------------------

/// Render the left panel: column listing, curve builder, derived columns, units.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            egui::CollapsingHeader::new(RichText::new("Columns").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| column_table(ui, state));

            egui::CollapsingHeader::new(RichText::new("Curves").strong())
                .default_open(true)
                .show(ui, |ui: &mut Ui| curve_builder(ui, state));

            egui::CollapsingHeader::new(RichText::new("Derived columns").strong())
                .default_open(false)
                .show(ui, |ui: &mut Ui| operation_form(ui, state));

            egui::CollapsingHeader::new(RichText::new("Units").strong())
                .default_open(false)
                .show(ui, |ui: &mut Ui| unit_pickers(ui, state));
        });
}

/// Registered columns, grouped by source. Clicking a key fills the next empty
/// curve field.
fn column_table(ui: &mut Ui, state: &mut AppState) {
    if state.registry.is_empty() {
        ui.label("No columns loaded.");
        return;
    }

    let mut picked: Option<String> = None;
    let groups = state.registry.groups();

    TableBuilder::new(ui)
        .striped(true)
        .vscroll(false)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(TableColumn::auto())
        .column(TableColumn::remainder())
        .column(TableColumn::auto())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Key");
            });
            header.col(|ui| {
                ui.strong("Name");
            });
            header.col(|ui| {
                ui.strong("Rows");
            });
        })
        .body(|mut body| {
            for (label, columns) in &groups {
                body.row(18.0, |mut row| {
                    row.col(|_| {});
                    row.col(|ui| {
                        ui.label(RichText::new(*label).italics().weak());
                    });
                    row.col(|_| {});
                });
                for column in columns {
                    body.row(18.0, |mut row| {
                        row.col(|ui| {
                            if ui.small_button(RichText::new(&column.key).monospace()).clicked() {
                                picked = Some(column.key.clone());
                            }
                        });
                        row.col(|ui| {
                            ui.label(&column.name);
                        });
                        row.col(|ui| {
                            ui.label(column.len().to_string());
                        });
                    });
                }
            }
        });

    if let Some(key) = picked {
        let draft = &mut state.draft;
        if draft.x.trim().is_empty() {
            draft.x = key;
        } else if draft.y.trim().is_empty() {
            draft.y = key;
        } else {
            draft.y.push(' ');
            draft.y.push_str(&key);
        }
    }
}

fn labelled_field(ui: &mut Ui, label: &str, value: &mut String, hint: &str) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        ui.add(egui::TextEdit::singleline(value).hint_text(hint));
    });
}

fn curve_builder(ui: &mut Ui, state: &mut AppState) {
    labelled_field(ui, "x", &mut state.draft.x, "key or RPN, e.g. 1a");
    labelled_field(ui, "y", &mut state.draft.y, "e.g. 2a 3a +");
    labelled_field(ui, "label", &mut state.draft.label, "optional");

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Add curve").clicked() {
            state.add_curve();
        }
        if ui.button("Clear all").clicked() {
            state.clear_curves();
        }
    });
    ui.separator();

    let mut removed = None;
    for (i, spec) in state.curve_specs.iter().enumerate() {
        let color = state.colors.get(i).copied().unwrap_or(Color32::GRAY);
        ui.horizontal(|ui: &mut Ui| {
            if ui.small_button("✖").clicked() {
                removed = Some(i);
            }
            ui.label(RichText::new(&spec.label).color(color));
            ui.label(RichText::new(format!("{} : {}", spec.x, spec.y)).weak().monospace());
        });
    }
    if let Some(i) = removed {
        state.remove_curve(i);
    }
}

fn operation_form(ui: &mut Ui, state: &mut AppState) {
    let form = &mut state.operation;
    egui::ComboBox::from_id_salt("operation_kind")
        .selected_text(form.kind.label())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in OperationKind::ALL {
                ui.selectable_value(&mut form.kind, kind, kind.label());
            }
        });

    match form.kind {
        OperationKind::Expression => {
            labelled_field(ui, "RPN", &mut form.text, "e.g. 2a 1a / 0.5 ^");
        }
        OperationKind::LinearSpace => {
            labelled_field(ui, "count", &mut form.count, "");
            labelled_field(ui, "start", &mut form.start, "");
            labelled_field(ui, "end", &mut form.end, "");
        }
        OperationKind::Integrate => {
            labelled_field(ui, "x", &mut form.x, "key");
            labelled_field(ui, "y", &mut form.y, "key");
            labelled_field(ui, "constant", &mut form.constant, "");
        }
        OperationKind::Differentiate => {
            labelled_field(ui, "x", &mut form.x, "key");
            labelled_field(ui, "y", &mut form.y, "key");
            labelled_field(ui, "radius", &mut form.radius, "rows each side");
        }
        OperationKind::PolynomialFit => {
            labelled_field(ui, "x", &mut form.x, "key");
            labelled_field(ui, "y", &mut form.y, "key");
            labelled_field(ui, "order", &mut form.order, "");
        }
    }
    labelled_field(ui, "name", &mut form.name, "optional");

    if ui.button("Create column").clicked() {
        state.run_operation();
    }
}

fn unit_pickers(ui: &mut Ui, state: &mut AppState) {
    let mut x_unit = state.x_unit;
    let mut y_unit = state.y_unit;

    let pickers = [
        ("x_unit", "x axis", &mut x_unit),
        ("y_unit", "y axis", &mut y_unit),
    ];
    for (id, axis, selected) in pickers {
        let current = state
            .catalog
            .get(*selected)
            .map(|u| u.to_string())
            .unwrap_or_default();
        ui.horizontal(|ui: &mut Ui| {
            ui.label(axis);
            egui::ComboBox::from_id_salt(id)
                .selected_text(current)
                .width(200.0)
                .show_ui(ui, |ui: &mut Ui| {
                    for (i, unit) in state.catalog.iter() {
                        ui.selectable_value(&mut *selected, i, unit.to_string());
                    }
                });
        });
    }
    state.set_units(x_unit, y_unit);

    ui.separator();
    ui.label("Custom units (factor 1)");
    for (slot, axis, unit) in state.custom_labels.iter_mut() {
        ui.horizontal(|ui: &mut Ui| {
            ui.label(format!("#{slot}"));
            ui.add(egui::TextEdit::singleline(axis).desired_width(110.0).hint_text("axis"));
            ui.add(egui::TextEdit::singleline(unit).desired_width(90.0).hint_text("unit"));
        });
    }
    if ui.button("Apply labels").clicked() {
        state.apply_custom_labels();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui.button("Export curves…").clicked() {
                export_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        ui.label(format!(
            "{} columns, {} curves",
            state.registry.len(),
            state.curves.len()
        ));

        ui.separator();

        match &state.status {
            Some(Status::Info(msg)) => {
                ui.label(RichText::new(msg).color(Color32::LIGHT_GREEN));
            }
            Some(Status::Error(msg)) => {
                ui.label(RichText::new(msg).color(Color32::RED));
            }
            None => {}
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let files = rfd::FileDialog::new()
        .set_title("Open Phantom .ev files")
        .add_filter("Phantom diagnostics", &["ev"])
        .add_filter("All files", &["*"])
        .pick_files();

    if let Some(paths) = files {
        state.load_paths(&paths);
    }
}

pub fn export_file_dialog(state: &mut AppState) {
    if state.curves.is_empty() {
        state.status = Some(Status::Error("Nothing to export".to_string()));
        return;
    }
    let file = rfd::FileDialog::new()
        .set_title("Export curves")
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .set_file_name("curves.csv")
        .save_file();

    if let Some(path) = file {
        state.export(&path);
    }
}
