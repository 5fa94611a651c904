use eframe::egui::{self, Color32, RichText, Ui};
use egui_plot::{GridMark, Line, Plot, PlotPoints};

use evplot::RenderState;
use evplot::render_state::{axis_label, exponent_of, tick_label};

use crate::state::AppState;

const LEGEND_ROW_HEIGHT: f32 = 18.0;

// ---------------------------------------------------------------------------
// Curve plot (central panel)
// ---------------------------------------------------------------------------

/// Render the control strip, the plot and its legend.
pub fn curve_plot(ui: &mut Ui, state: &mut AppState) {
    control_strip(ui, state);
    ui.separator();

    if state.curves.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Nothing to render  (File → Open…, then add a curve)");
        });
        return;
    }

    let (x_unit, y_unit) = match state.units() {
        Ok(units) => units,
        Err(e) => {
            ui.label(RichText::new(e.to_string()).color(Color32::RED));
            return;
        }
    };
    let render = state.render;

    let (x_min, x_max) = extent(state.curves.iter().flat_map(|c| c.points().map(|[x, _]| x)));
    let (y_min, y_max) = extent(state.curves.iter().flat_map(|c| c.points().map(|[_, y]| y)));
    let x_exp = exponent_of(x_min, x_max);
    let y_exp = exponent_of(y_min, y_max);

    let legend_height = if render.legend_split {
        0.0
    } else {
        let rows = state.curves.len().div_ceil(render.legend_columns.max(1));
        rows as f32 * LEGEND_ROW_HEIGHT + 8.0
    };

    Plot::new("curve_plot")
        .height((ui.available_height() - legend_height).max(100.0))
        .x_axis_label(axis_label(x_unit, render.x_scientific, x_exp))
        .y_axis_label(axis_label(y_unit, render.y_scientific, y_exp))
        .x_axis_formatter(move |mark: GridMark, _range| {
            tick_label(mark.value, render.x_scientific, x_exp)
        })
        .y_axis_formatter(move |mark: GridMark, _range| {
            tick_label(mark.value, render.y_scientific, y_exp)
        })
        .show_axes([render.x_axis_visible, render.y_axis_visible])
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for (curve, &color) in state.curves.iter().zip(&state.colors) {
                let points: PlotPoints = curve.points().collect();
                let line = Line::new(points)
                    .name(&curve.label)
                    .color(color)
                    .width(1.5);
                plot_ui.line(line);
            }
        });

    let entries: Vec<(&str, Color32)> = state
        .curves
        .iter()
        .zip(&state.colors)
        .map(|(c, &color)| (c.label.as_str(), color))
        .collect();
    if render.legend_split {
        split_legend(ui.ctx(), &entries);
    } else {
        combined_legend(ui, &entries, render.legend_columns);
    }
}

/// Finite min/max of the values; `(0, 0)` when there are none.
fn extent(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0))
}

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

fn control_strip(ui: &mut Ui, state: &mut AppState) {
    let render = state.render;
    let curve_count = state.curves.len();
    let mut next: Option<RenderState> = None;

    ui.horizontal_wrapped(|ui: &mut Ui| {
        if ui.selectable_label(render.legend_split, "Split legend").clicked() {
            next = Some(render.toggle_legend_split());
        }
        ui.add_enabled_ui(!render.legend_split, |ui: &mut Ui| {
            if ui.button("−").on_hover_text("Fewer legend columns").clicked() {
                next = Some(render.fewer_legend_columns());
            }
            ui.label(format!("{} col", render.legend_columns));
            if ui.button("+").on_hover_text("More legend columns").clicked() {
                next = Some(render.more_legend_columns(curve_count));
            }
        });
        ui.separator();
        if ui.selectable_label(render.x_scientific, "x ×10ⁿ").clicked() {
            next = Some(render.toggle_x_scientific());
        }
        if ui.selectable_label(render.y_scientific, "y ×10ⁿ").clicked() {
            next = Some(render.toggle_y_scientific());
        }
        ui.separator();
        if ui.selectable_label(render.x_axis_visible, "x axis").clicked() {
            next = Some(render.toggle_x_axis());
        }
        if ui.selectable_label(render.y_axis_visible, "y axis").clicked() {
            next = Some(render.toggle_y_axis());
        }
    });

    if let Some(next) = next {
        state.update_render(|_| next);
    }
}

// ---------------------------------------------------------------------------
// Legends
// ---------------------------------------------------------------------------

fn legend_entry(ui: &mut Ui, label: &str, color: Color32) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(RichText::new("━━").color(color).strong());
        ui.label(label);
    });
}

/// One legend laid out in `columns` columns, filled row by row.
fn combined_legend(ui: &mut Ui, entries: &[(&str, Color32)], columns: usize) {
    let columns = columns.clamp(1, entries.len().max(1));
    ui.columns(columns, |cols| {
        for (i, (label, color)) in entries.iter().enumerate() {
            legend_entry(&mut cols[i % columns], label, *color);
        }
    });
}

/// One draggable legend box per curve, floating over the plot.
fn split_legend(ctx: &egui::Context, entries: &[(&str, Color32)]) {
    let origin = ctx.screen_rect().center();
    for (i, (label, color)) in entries.iter().enumerate() {
        egui::Area::new(egui::Id::new(("split_legend", i)))
            .movable(true)
            .default_pos(origin + egui::vec2(0.0, i as f32 * (LEGEND_ROW_HEIGHT + 12.0)))
            .show(ctx, |ui: &mut Ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui: &mut Ui| {
                    legend_entry(ui, label, *color);
                });
            });
    }
}
