use crate::data::units::Unit;

// ---------------------------------------------------------------------------
// Plot control state
// ---------------------------------------------------------------------------

/// Presentation toggles for one plot. Updates return a new value; the
/// renderer applies the state to its widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderState {
    /// Columns in the combined legend (>= 1).
    pub legend_columns: usize,
    /// One movable legend entry per curve instead of a combined legend.
    pub legend_split: bool,
    pub x_scientific: bool,
    pub y_scientific: bool,
    pub x_axis_visible: bool,
    pub y_axis_visible: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            legend_columns: 1,
            legend_split: false,
            x_scientific: false,
            y_scientific: false,
            x_axis_visible: true,
            y_axis_visible: true,
        }
    }
}

impl RenderState {
    pub fn toggle_legend_split(self) -> Self {
        Self {
            legend_split: !self.legend_split,
            ..self
        }
    }

    /// One more legend column, capped at the number of curves. Ignored while
    /// the legend is split.
    pub fn more_legend_columns(self, curve_count: usize) -> Self {
        if self.legend_split {
            return self;
        }
        Self {
            legend_columns: (self.legend_columns + 1).min(curve_count.max(1)),
            ..self
        }
    }

    /// One fewer legend column, never below 1. Ignored while split.
    pub fn fewer_legend_columns(self) -> Self {
        if self.legend_split {
            return self;
        }
        Self {
            legend_columns: self.legend_columns.saturating_sub(1).max(1),
            ..self
        }
    }

    pub fn toggle_x_scientific(self) -> Self {
        Self {
            x_scientific: !self.x_scientific,
            ..self
        }
    }

    pub fn toggle_y_scientific(self) -> Self {
        Self {
            y_scientific: !self.y_scientific,
            ..self
        }
    }

    pub fn toggle_x_axis(self) -> Self {
        Self {
            x_axis_visible: !self.x_axis_visible,
            ..self
        }
    }

    pub fn toggle_y_axis(self) -> Self {
        Self {
            y_axis_visible: !self.y_axis_visible,
            ..self
        }
    }
}

// ---------------------------------------------------------------------------
// Axis labelling
// ---------------------------------------------------------------------------

/// Power of ten shared by the ticks of a range: that of its largest magnitude.
pub fn exponent_of(min: f64, max: f64) -> i32 {
    let magnitude = min.abs().max(max.abs());
    if magnitude == 0.0 || !magnitude.is_finite() {
        return 0;
    }
    magnitude.log10().floor() as i32
}

/// `"<axis> (<unit>)"`, or with the multiplier folded in when ticks are shown
/// in scientific notation: `"<axis> (×10^<e> <unit>)"`.
pub fn axis_label(unit: &Unit, scientific: bool, exponent: i32) -> String {
    if !scientific || exponent == 0 {
        return unit.to_string();
    }
    if unit.unit_label.is_empty() {
        format!("{} (×10^{exponent})", unit.axis_name)
    } else {
        format!("{} (×10^{exponent} {})", unit.axis_name, unit.unit_label)
    }
}

/// Tick text for a value once the shared exponent has been moved to the label.
pub fn tick_label(value: f64, scientific: bool, exponent: i32) -> String {
    if scientific {
        format!("{:.2}", value / 10f64.powi(exponent))
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = RenderState::default();
        assert_eq!(s.legend_columns, 1);
        assert!(!s.legend_split);
        assert!(s.x_axis_visible && s.y_axis_visible);
    }

    #[test]
    fn legend_columns_are_bounded() {
        let s = RenderState::default();
        let s = s.more_legend_columns(2).more_legend_columns(2).more_legend_columns(2);
        assert_eq!(s.legend_columns, 2);
        let s = s.fewer_legend_columns().fewer_legend_columns();
        assert_eq!(s.legend_columns, 1);
        assert_eq!(
            RenderState::default().more_legend_columns(0).legend_columns,
            1
        );
    }

    #[test]
    fn split_legend_freezes_column_count() {
        let s = RenderState::default().toggle_legend_split();
        assert!(s.legend_split);
        assert_eq!(s.more_legend_columns(5), s);
        assert_eq!(s.fewer_legend_columns(), s);
        assert!(!s.toggle_legend_split().legend_split);
    }

    #[test]
    fn toggles_leave_other_fields_alone() {
        let s = RenderState::default().toggle_x_scientific().toggle_y_axis();
        assert!(s.x_scientific && !s.y_scientific);
        assert!(s.x_axis_visible && !s.y_axis_visible);
        let back = s.toggle_x_scientific().toggle_y_axis();
        assert_eq!(back, RenderState::default());
        assert!(RenderState::default().toggle_y_scientific().y_scientific);
        assert!(!RenderState::default().toggle_x_axis().x_axis_visible);
    }

    #[test]
    fn exponent_from_range() {
        assert_eq!(exponent_of(0.0, 1593.6), 3);
        assert_eq!(exponent_of(-2.5e-4, 1e-5), -4);
        assert_eq!(exponent_of(0.0, 0.0), 0);
    }

    #[test]
    fn labels() {
        let unit = Unit::new("energy", "erg", 1.0);
        assert_eq!(axis_label(&unit, false, 5), "energy (erg)");
        assert_eq!(axis_label(&unit, true, 5), "energy (×10^5 erg)");
        assert_eq!(axis_label(&unit, true, 0), "energy (erg)");
        assert_eq!(tick_label(25000.0, true, 4), "2.50");
        assert_eq!(tick_label(0.5, false, 4), "0.5");
    }
}
