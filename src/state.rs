use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use eframe::egui::Color32;

use evplot::data::loader::{Source, SuffixPolicy, SuffixScheme, load_file, load_sources};
use evplot::data::units::Unit;
use evplot::export::export_curves;
use evplot::{
    ColumnRegistry, Curve, CurveSpec, OperationRequest, Ref, RenderState, UnitCatalog, apply,
    assemble,
};

use crate::color::generate_palette;

// ---------------------------------------------------------------------------
// Form state
// ---------------------------------------------------------------------------

/// Text fields of the curve builder.
#[derive(Debug, Clone, Default)]
pub struct CurveDraft {
    pub x: String,
    pub y: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    LinearSpace,
    Expression,
    Integrate,
    Differentiate,
    PolynomialFit,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Expression,
        OperationKind::Integrate,
        OperationKind::Differentiate,
        OperationKind::PolynomialFit,
        OperationKind::LinearSpace,
    ];

    pub fn label(self) -> &'static str {
        match self {
            OperationKind::LinearSpace => "Linear space",
            OperationKind::Expression => "Expression",
            OperationKind::Integrate => "Integrate",
            OperationKind::Differentiate => "Differentiate",
            OperationKind::PolynomialFit => "Polynomial fit",
        }
    }
}

/// Text fields of the derived-column form; only those relevant to `kind`
/// are read.
#[derive(Debug, Clone)]
pub struct OperationForm {
    pub kind: OperationKind,
    /// Optional display name; a name is generated when blank.
    pub name: String,
    pub text: String,
    pub x: String,
    pub y: String,
    pub constant: String,
    pub radius: String,
    pub order: String,
    pub count: String,
    pub start: String,
    pub end: String,
}

impl Default for OperationForm {
    fn default() -> Self {
        Self {
            kind: OperationKind::Expression,
            name: String::new(),
            text: String::new(),
            x: String::new(),
            y: String::new(),
            constant: "0".to_string(),
            radius: "1".to_string(),
            order: "2".to_string(),
            count: "100".to_string(),
            start: "0".to_string(),
            end: "1".to_string(),
        }
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, field: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("{field}: '{}' is not valid", value.trim()))
}

impl OperationForm {
    pub fn to_request(&self) -> Result<OperationRequest> {
        let key = |s: &str| s.trim().to_string();
        Ok(match self.kind {
            OperationKind::LinearSpace => OperationRequest::LinearSpace {
                count: parse_field(&self.count, "element count")?,
                start: parse_field(&self.start, "start")?,
                end: parse_field(&self.end, "end")?,
            },
            OperationKind::Expression => OperationRequest::Expression {
                text: self.text.clone(),
            },
            OperationKind::Integrate => OperationRequest::Integrate {
                x: key(&self.x),
                y: key(&self.y),
                constant: parse_field(&self.constant, "constant of integration")?,
            },
            OperationKind::Differentiate => OperationRequest::Differentiate {
                x: key(&self.x),
                y: key(&self.y),
                radius: parse_field(&self.radius, "radius")?,
            },
            OperationKind::PolynomialFit => OperationRequest::PolynomialFit {
                x: key(&self.x),
                y: key(&self.y),
                order: parse_field(&self.order, "order")?,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Info(String),
    Error(String),
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub registry: ColumnRegistry,
    pub catalog: UnitCatalog,
    pub scheme: SuffixScheme,
    pub policy: SuffixPolicy,

    /// What the user asked to plot.
    pub curve_specs: Vec<CurveSpec>,
    /// `curve_specs` resolved and scaled (cached).
    pub curves: Vec<Curve>,
    pub colors: Vec<Color32>,

    pub x_unit: usize,
    pub y_unit: usize,
    pub render: RenderState,

    pub draft: CurveDraft,
    pub operation: OperationForm,
    /// Axis name / unit label edits for the custom catalog slots.
    pub custom_labels: Vec<(usize, String, String)>,

    /// Status / error message shown in the UI.
    pub status: Option<Status>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SuffixScheme::default(), SuffixPolicy::Always)
    }
}

impl AppState {
    pub fn new(scheme: SuffixScheme, policy: SuffixPolicy) -> Self {
        let catalog = UnitCatalog::default_catalog();
        let custom_labels = catalog
            .iter()
            .filter(|(i, _)| catalog.is_custom(*i))
            .map(|(i, u)| (i, u.axis_name.clone(), u.unit_label.clone()))
            .collect();
        Self {
            registry: ColumnRegistry::new(),
            catalog,
            scheme,
            policy,
            curve_specs: Vec::new(),
            curves: Vec::new(),
            colors: Vec::new(),
            x_unit: 0,
            y_unit: 0,
            render: RenderState::default(),
            draft: CurveDraft::default(),
            operation: OperationForm::default(),
            custom_labels,
            status: None,
        }
    }

    /// Replace the session with the given files. On any failure the current
    /// session is kept.
    pub fn load_paths(&mut self, paths: &[PathBuf]) {
        match self.try_load_paths(paths) {
            Ok(n) => {
                self.status = Some(Status::Info(format!(
                    "{n} columns loaded from {} file(s)",
                    paths.len()
                )));
            }
            Err(e) => {
                log::error!("Failed to load files: {e:#}");
                self.status = Some(Status::Error(format!("Error: {e:#}")));
            }
        }
    }

    fn try_load_paths(&mut self, paths: &[PathBuf]) -> Result<usize> {
        let sources = paths
            .iter()
            .map(|p| load_file(p))
            .collect::<Result<Vec<Source>>>()?;

        let mut registry = ColumnRegistry::new();
        let keys = load_sources(&mut registry, &sources, &self.scheme, self.policy)?;

        self.registry = registry;
        self.curve_specs.clear();
        self.reassemble();
        Ok(keys.len())
    }

    /// The selected x and y units.
    pub fn units(&self) -> evplot::Result<(&Unit, &Unit)> {
        Ok((self.catalog.get(self.x_unit)?, self.catalog.get(self.y_unit)?))
    }

    /// Turn the curve draft into a spec and replot.
    pub fn add_curve(&mut self) {
        let result = Ref::parse(&self.draft.x, &self.registry).and_then(|x| {
            Ref::parse(&self.draft.y, &self.registry).map(|y| (x, y))
        });
        match result {
            Ok((x, y)) => {
                let label = if self.draft.label.trim().is_empty() {
                    self.default_label(&x, &y)
                } else {
                    self.draft.label.trim().to_string()
                };
                self.curve_specs.push(CurveSpec { x, y, label });
                self.draft = CurveDraft::default();
                self.reassemble();
            }
            Err(e) => self.status = Some(Status::Error(format!("Curve rejected: {e}"))),
        }
    }

    /// The y column's name, tagged with its file when several files are
    /// loaded. Expressions fall back to `"<y> vs <x>"`.
    fn default_label(&self, x: &Ref, y: &Ref) -> String {
        let column = match y {
            Ref::Column(key) => self.registry.get(key).ok(),
            Ref::Expression(_) => None,
        };
        let Some(column) = column else {
            return format!("{y} vs {x}");
        };
        if column.is_derived() || self.source_count() < 2 {
            return column.name.clone();
        }
        let file = Path::new(&column.source_label)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| column.source_label.clone());
        format!("{} - {file}", column.name)
    }

    fn source_count(&self) -> usize {
        let mut labels: Vec<&str> = self
            .registry
            .iter()
            .filter(|c| !c.is_derived())
            .map(|c| c.source_label.as_str())
            .collect();
        labels.dedup();
        labels.len()
    }

    pub fn remove_curve(&mut self, index: usize) {
        if index < self.curve_specs.len() {
            self.curve_specs.remove(index);
            self.reassemble();
        }
    }

    pub fn clear_curves(&mut self) {
        self.curve_specs.clear();
        self.reassemble();
    }

    /// Build and apply the derived-column request described by the form.
    pub fn run_operation(&mut self) {
        let request = match self.operation.to_request() {
            Ok(r) => r,
            Err(e) => {
                self.status = Some(Status::Error(format!("{e:#}")));
                return;
            }
        };
        let name = if self.operation.name.trim().is_empty() {
            request.default_name(&self.registry)
        } else {
            self.operation.name.trim().to_string()
        };

        match apply(&mut self.registry, &name, &request) {
            Ok(outcome) => {
                let mut msg = format!(
                    "Created {} \"{}\" ({} rows)",
                    outcome.key, outcome.name, outcome.rows
                );
                if let Some(coefficients) = &outcome.coefficients {
                    let terms: Vec<String> =
                        coefficients.iter().map(|c| format!("{c:.6e}")).collect();
                    msg.push_str(&format!(
                        ", coefficients (lowest order first): [{}]",
                        terms.join(", ")
                    ));
                }
                self.status = Some(Status::Info(msg));
                self.operation.name.clear();
            }
            Err(e) => {
                log::warn!("operation failed: {e}");
                self.status = Some(Status::Error(format!("Operation failed: {e}")));
            }
        }
    }

    pub fn set_units(&mut self, x_unit: usize, y_unit: usize) {
        if let Err(e) = self.catalog.get(x_unit).and(self.catalog.get(y_unit)) {
            self.status = Some(Status::Error(e.to_string()));
            return;
        }
        if (x_unit, y_unit) != (self.x_unit, self.y_unit) {
            self.x_unit = x_unit;
            self.y_unit = y_unit;
            self.reassemble();
        }
    }

    /// Push the edited custom-slot labels into the catalog.
    pub fn apply_custom_labels(&mut self) {
        for (slot, axis, unit) in &self.custom_labels {
            if let Err(e) = self.catalog.set_custom_label(*slot, axis, unit) {
                self.status = Some(Status::Error(e.to_string()));
            }
        }
        self.reassemble();
    }

    pub fn update_render(&mut self, f: impl FnOnce(RenderState) -> RenderState) {
        self.render = f(self.render);
    }

    /// Re-resolve every curve spec against the registry and units.
    pub fn reassemble(&mut self) {
        let assembled = self
            .units()
            .and_then(|(x_unit, y_unit)| {
                assemble(&self.curve_specs, &self.registry, x_unit, y_unit)
            });
        match assembled {
            Ok(curves) => {
                self.colors = generate_palette(curves.len());
                self.curves = curves;
            }
            Err(e) => {
                log::error!("Failed to assemble curves: {e}");
                self.status = Some(Status::Error(format!("Error: {e}")));
                self.curves.clear();
                self.colors.clear();
            }
        }
    }

    pub fn export(&mut self, path: &Path) {
        let result = self
            .units()
            .map_err(anyhow::Error::from)
            .and_then(|(x_unit, y_unit)| export_curves(path, &self.curves, x_unit, y_unit));
        self.status = Some(match result {
            Ok(()) => Status::Info(format!(
                "Exported {} curves to {}",
                self.curves.len(),
                path.display()
            )),
            Err(e) => {
                log::error!("Export failed: {e:#}");
                Status::Error(format!("Export failed: {e:#}"))
            }
        });
    }
}
