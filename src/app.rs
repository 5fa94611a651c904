use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct EvPlotApp {
    pub state: AppState,
}

impl EvPlotApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for EvPlotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: columns, curves, derived columns, units ----
        egui::SidePanel::left("column_panel")
            .default_width(320.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::curve_plot(ui, &mut self.state);
        });
    }
}
