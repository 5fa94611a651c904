use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

use crate::error::Result;

use super::expression::CompiledExpression;
use super::model::ColumnRegistry;
use super::units::Unit;

// ---------------------------------------------------------------------------
// Curve references
// ---------------------------------------------------------------------------

/// One axis of a curve: a registered column or an expression over columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Ref {
    Column(String),
    Expression(CompiledExpression),
}

impl Ref {
    /// A lone registered key is a column reference; anything else is
    /// compiled as an RPN expression.
    pub fn parse(text: &str, registry: &ColumnRegistry) -> Result<Ref> {
        let trimmed = text.trim();
        if registry.contains(trimmed) {
            return Ok(Ref::Column(trimmed.to_string()));
        }
        CompiledExpression::compile(trimmed, registry).map(Ref::Expression)
    }

    /// The values this reference stands for. Column data is borrowed.
    pub fn resolve<'r>(&self, registry: &'r ColumnRegistry) -> Result<Cow<'r, [f64]>> {
        match self {
            Ref::Column(key) => Ok(Cow::Borrowed(registry.get(key)?.values.as_slice())),
            Ref::Expression(expr) => Ok(Cow::Owned(expr.evaluate_over_columns(registry)?)),
        }
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Column(key) => write!(f, "{key}"),
            Ref::Expression(expr) => write!(f, "{expr}"),
        }
    }
}

/// What the user asked to plot: an x reference, a y reference, a legend label.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSpec {
    pub x: Ref,
    pub y: Ref,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Assembled curves
// ---------------------------------------------------------------------------

/// Unit-scaled samples ready for a renderer. `x` and `y` are not trimmed to
/// a common length; renderers pair them up to the shorter one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Curve {
    /// `(x, y)` pairs up to the shorter axis.
    pub fn points(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.x.iter().zip(&self.y).map(|(&x, &y)| [x, y])
    }
}

/// Resolve every spec against `registry` and scale both axes.
///
/// An empty `specs` gives an empty result, which callers treat as nothing to
/// render. The registry is only read.
pub fn assemble(
    specs: &[CurveSpec],
    registry: &ColumnRegistry,
    x_unit: &Unit,
    y_unit: &Unit,
) -> Result<Vec<Curve>> {
    let curves = specs
        .iter()
        .map(|spec| {
            let x = spec.x.resolve(registry)?;
            let y = spec.y.resolve(registry)?;
            Ok(Curve {
                label: spec.label.clone(),
                x: x_unit.scale_all(&x),
                y: y_unit.scale_all(&y),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if !curves.is_empty() {
        log::info!("assembled {} curves: {x_unit} vs {y_unit}", curves.len());
    }
    Ok(curves)
}
