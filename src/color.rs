use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Curve colours
// ---------------------------------------------------------------------------

/// Hue of the first curve, so a lone curve is drawn blue rather than red.
const BASE_HUE: f32 = 210.0;

/// Past this many curves neighbouring hues get hard to tell apart, so the
/// lightness alternates as well.
const HUE_ONLY_LIMIT: usize = 8;

/// `n` distinct curve colours, evenly spaced around the hue circle.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    (0..n)
        .map(|i| {
            let hue = (BASE_HUE + (i as f32 / n as f32) * 360.0) % 360.0;
            let lightness = if n > HUE_ONLY_LIMIT && i % 2 == 1 {
                0.40
            } else {
                0.55
            };
            let rgb: Srgb = Hsl::new(hue, 0.75, lightness).into_color();
            Color32::from_rgb(
                (rgb.red.clamp(0.0, 1.0) * 255.0) as u8,
                (rgb.green.clamp(0.0, 1.0) * 255.0) as u8,
                (rgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
            )
        })
        .collect()
}
