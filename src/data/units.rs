use std::fmt;

use serde::Serialize;

use crate::error::{EvError, Result};

// Simulation code units expressed in physical units.
const MASS_KG: f64 = 1.99e30;
const MASS_G: f64 = 1.99e33;
const DIST_M: f64 = 696.0e6;
const DIST_CM: f64 = 696.0e8;
const DIST_RSUN: f64 = 1.0;
const TIME_S: f64 = 1593.6;
const SECONDS_PER_YEAR: f64 = 86400.0 * 365.25;

/// Number of trailing user-labelled slots in the default catalog.
pub const CUSTOM_SLOTS: usize = 2;

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

/// A display unit: axis name, unit label, and the factor converting code
/// units into it. Factors are applied blindly, without dimensional checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub axis_name: String,
    pub unit_label: String,
    pub scale_factor: f64,
}

impl Unit {
    pub fn new(axis_name: &str, unit_label: &str, scale_factor: f64) -> Self {
        Unit {
            axis_name: axis_name.to_string(),
            unit_label: unit_label.to_string(),
            scale_factor,
        }
    }

    pub fn scale(&self, raw: f64) -> f64 {
        raw * self.scale_factor
    }

    /// Element-wise [`Unit::scale`] into a fresh vector.
    pub fn scale_all(&self, raw: &[f64]) -> Vec<f64> {
        raw.iter().map(|&v| self.scale(v)).collect()
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit_label.is_empty() {
            write!(f, "{}", self.axis_name)
        } else {
            write!(f, "{} ({})", self.axis_name, self.unit_label)
        }
    }
}

// ---------------------------------------------------------------------------
// UnitCatalog
// ---------------------------------------------------------------------------

/// Ordered, index-addressed table of units. The last [`CUSTOM_SLOTS`] entries
/// keep a factor of 1.0 and take their labels from the user.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCatalog {
    units: Vec<Unit>,
}

impl Default for UnitCatalog {
    fn default() -> Self {
        Self::default_catalog()
    }
}

impl UnitCatalog {
    pub fn default_catalog() -> Self {
        let energy_cgs = (MASS_G * DIST_CM * DIST_CM) / (TIME_S * TIME_S);
        let energy_si = (MASS_KG * DIST_M * DIST_M) / (TIME_S * TIME_S);

        let units = vec![
            Unit::new("time", "s", TIME_S),
            Unit::new("time", "years", TIME_S / SECONDS_PER_YEAR),
            Unit::new("distance", "cm", DIST_CM),
            Unit::new("distance", "m", DIST_M),
            Unit::new("distance", "solar radii", DIST_RSUN),
            Unit::new("mass", "g", MASS_G),
            Unit::new("mass", "kg", MASS_KG),
            Unit::new("velocity", "cm/s", DIST_CM / TIME_S),
            Unit::new("velocity", "m/s", DIST_M / TIME_S),
            Unit::new("velocity", "km/s", (DIST_M / 1000.0) / TIME_S),
            Unit::new("force", "dyn", (MASS_G * DIST_CM) / (TIME_S * TIME_S)),
            Unit::new("force", "N", (MASS_KG * DIST_M) / (TIME_S * TIME_S)),
            Unit::new("angular momentum", "g cm^2/s", (MASS_G * DIST_CM * DIST_CM) / TIME_S),
            Unit::new("angular momentum", "kg m^2/s", (MASS_KG * DIST_M * DIST_M) / TIME_S),
            Unit::new("torque", "dyn cm", energy_cgs),
            Unit::new("torque", "Nm", energy_si),
            Unit::new("density", "g/cm^3", MASS_G / (DIST_CM * DIST_CM * DIST_CM)),
            Unit::new("density", "kg/m^3", MASS_KG / (DIST_M * DIST_M * DIST_M)),
            Unit::new("energy", "erg", energy_cgs),
            Unit::new("energy", "J", energy_si),
            Unit::new("custom unit 1", "code units", 1.0),
            Unit::new("custom unit 2", "code units", 1.0),
        ];
        UnitCatalog { units }
    }

    pub fn get(&self, index: usize) -> Result<&Unit> {
        self.units.get(index).ok_or(EvError::UnknownUnit(index))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Unit)> {
        self.units.iter().enumerate()
    }

    pub fn is_custom(&self, index: usize) -> bool {
        index < self.units.len() && index >= self.units.len().saturating_sub(CUSTOM_SLOTS)
    }

    /// Relabel a custom slot. Its factor stays 1.0.
    pub fn set_custom_label(
        &mut self,
        index: usize,
        axis_name: &str,
        unit_label: &str,
    ) -> Result<()> {
        if index >= self.units.len() {
            return Err(EvError::UnknownUnit(index));
        }
        if !self.is_custom(index) {
            return Err(EvError::NotCustomUnit(index));
        }
        self.units[index] = Unit::new(axis_name, unit_label, 1.0);
        Ok(())
    }
}
