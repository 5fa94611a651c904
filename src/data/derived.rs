use nalgebra::{DMatrix, DVector};

use crate::error::{EvError, Result};

use super::expression::CompiledExpression;
use super::model::ColumnRegistry;

/// Singular values below this are treated as zero when solving a fit.
const FIT_SINGULAR_EPS: f64 = 1e-12;

fn check_lengths(x: &[f64], y: &[f64]) -> Result<()> {
    if x.len() != y.len() {
        return Err(EvError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Numerical transforms
// ---------------------------------------------------------------------------

/// Cumulative trapezoidal integral of `y` over `x`, starting at `constant`.
///
/// The output has one value per input row; the first equals `constant`.
pub fn integrate(x: &[f64], y: &[f64], constant: f64) -> Result<Vec<f64>> {
    check_lengths(x, y)?;
    let mut out = Vec::with_capacity(x.len());
    let mut sum = constant;
    for i in 0..x.len() {
        if i > 0 {
            sum += 0.5 * (x[i] - x[i - 1]) * (y[i] + y[i - 1]);
        }
        out.push(sum);
    }
    Ok(out)
}

/// Finite-difference derivative of `y` with respect to `x`.
///
/// Row `i` uses the window `[i - radius, i + radius]` clamped to the data, so
/// the edges fall back to one-sided differences. A window that collapses to a
/// single row (`radius == 0`) divides by zero and yields NaN.
pub fn differentiate(x: &[f64], y: &[f64], radius: usize) -> Result<Vec<f64>> {
    check_lengths(x, y)?;
    let n = x.len();
    Ok((0..n)
        .map(|i| {
            let left = i.saturating_sub(radius);
            let right = i.saturating_add(radius).min(n - 1);
            (y[right] - y[left]) / (x[right] - x[left])
        })
        .collect())
}

/// Result of a least-squares polynomial fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialFit {
    /// Coefficients from the constant term upwards.
    pub coefficients: Vec<f64>,
    /// The polynomial evaluated at every input `x`.
    pub fitted: Vec<f64>,
}

/// Least-squares fit of a polynomial of degree `order` through `(x, y)`.
pub fn polynomial_fit(x: &[f64], y: &[f64], order: usize) -> Result<PolynomialFit> {
    check_lengths(x, y)?;
    let terms = order
        .checked_add(1)
        .ok_or_else(|| EvError::FitFailed(format!("order {order} is too large")))?;
    if x.len() < terms {
        return Err(EvError::FitFailed(format!(
            "order {order} needs at least {terms} samples, got {}",
            x.len()
        )));
    }
    if let Some(bad) = x.iter().find(|v| !v.is_finite()) {
        return Err(EvError::FitFailed(format!("x contains the non-finite value {bad}")));
    }

    let vandermonde = DMatrix::from_fn(x.len(), terms, |i, j| x[i].powi(j as i32));
    let rhs = DVector::from_column_slice(y);
    let solution = vandermonde
        .svd(true, true)
        .solve(&rhs, FIT_SINGULAR_EPS)
        .map_err(|e| EvError::FitFailed(e.to_string()))?;

    let coefficients: Vec<f64> = solution.iter().copied().collect();
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(EvError::FitFailed("non-finite coefficients".to_string()));
    }
    let fitted = x.iter().map(|&xi| eval_polynomial(&coefficients, xi)).collect();
    log::debug!("order {order} fit coefficients: {coefficients:?}");

    Ok(PolynomialFit {
        coefficients,
        fitted,
    })
}

/// Horner evaluation, coefficients lowest order first.
pub fn eval_polynomial(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// `count` evenly spaced values from `start` to `end` inclusive.
pub fn linear_space(count: usize, start: f64, end: f64) -> Result<Vec<f64>> {
    if count < 2 {
        return Err(EvError::InvalidRange(format!(
            "a linear space needs at least 2 elements, got {count}"
        )));
    }
    let step = (end - start) / (count - 1) as f64;
    let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
    values[count - 1] = end;
    Ok(values)
}

/// Whether `values` never decreases. Integration and differentiation assume
/// this of their `x` column but do not enforce it.
pub fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

// ---------------------------------------------------------------------------
// Operation requests
// ---------------------------------------------------------------------------

/// A request to synthesize a new column. Column operands are registry keys.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    LinearSpace { count: usize, start: f64, end: f64 },
    Expression { text: String },
    Integrate { x: String, y: String, constant: f64 },
    Differentiate { x: String, y: String, radius: usize },
    PolynomialFit { x: String, y: String, order: usize },
}

/// What a successful request produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    pub key: String,
    pub name: String,
    pub rows: usize,
    /// Fit coefficients (lowest order first), only for polynomial fits.
    pub coefficients: Option<Vec<f64>>,
}

impl OperationRequest {
    /// A display name for the derived column built from operand column names.
    pub fn default_name(&self, registry: &ColumnRegistry) -> String {
        let name_of = |key: &str| {
            registry
                .get(key)
                .map(|c| c.name.clone())
                .unwrap_or_else(|_| key.to_string())
        };
        match self {
            OperationRequest::LinearSpace { count, start, end } => {
                format!("linspace({start}, {end}, {count})")
            }
            OperationRequest::Expression { text } => text.trim().to_string(),
            OperationRequest::Integrate { x, y, .. } => {
                format!("integral of {} d{}", name_of(y), name_of(x))
            }
            OperationRequest::Differentiate { x, y, .. } => {
                format!("d{}/d{}", name_of(y), name_of(x))
            }
            OperationRequest::PolynomialFit { y, order, .. } => {
                format!("{} (order {order} fit)", name_of(y))
            }
        }
    }
}

/// Evaluate `request` and register its result under `name`. Nothing is
/// registered when the request fails.
pub fn apply(
    registry: &mut ColumnRegistry,
    name: &str,
    request: &OperationRequest,
) -> Result<OperationOutcome> {
    let mut coefficients = None;
    let values = match request {
        OperationRequest::LinearSpace { count, start, end } => {
            linear_space(*count, *start, *end)?
        }
        OperationRequest::Expression { text } => {
            CompiledExpression::compile(text, registry)?.evaluate_over_columns(registry)?
        }
        OperationRequest::Integrate { x, y, constant } => {
            let (x, y) = operands(registry, x, y)?;
            integrate(x, y, *constant)?
        }
        OperationRequest::Differentiate { x, y, radius } => {
            let (x, y) = operands(registry, x, y)?;
            differentiate(x, y, *radius)?
        }
        OperationRequest::PolynomialFit { x, y, order } => {
            let (x, y) = operands(registry, x, y)?;
            let fit = polynomial_fit(x, y, *order)?;
            coefficients = Some(fit.coefficients);
            fit.fitted
        }
    };

    let rows = values.len();
    let key = registry.register_derived(name, values);
    log::info!("created column {key} ({name}, {rows} rows)");
    Ok(OperationOutcome {
        key,
        name: name.to_string(),
        rows,
        coefficients,
    })
}

fn operands<'r>(
    registry: &'r ColumnRegistry,
    x: &str,
    y: &str,
) -> Result<(&'r [f64], &'r [f64])> {
    let x = registry.get(x)?;
    let y = registry.get(y)?;
    if !is_non_decreasing(&x.values) {
        log::warn!("column {} ({}) is not monotonically increasing", x.key, x.name);
    }
    Ok((&x.values, &y.values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len(), "length differs: {a:?} vs {b:?}");
        for (i, (p, q)) in a.iter().zip(b).enumerate() {
            assert!((p - q).abs() <= tol, "index {i}: {p} vs {q}");
        }
    }

    #[test]
    fn integrating_a_constant_gives_a_ramp() {
        assert_eq!(
            integrate(&[0.0, 1.0, 2.0], &[1.0, 1.0, 1.0], 0.0).unwrap(),
            vec![0.0, 1.0, 2.0]
        );
    }

    #[test]
    fn integration_starts_at_the_constant() {
        let out = integrate(&[0.0, 2.0, 3.0], &[0.0, 2.0, 4.0], 5.0).unwrap();
        // trapezoids: 0.5*2*(0+2)=2, 0.5*1*(2+4)=3
        assert_eq!(out, vec![5.0, 7.0, 10.0]);
    }

    #[test]
    fn integration_is_deterministic() {
        let x: Vec<f64> = (0..500).map(|i| i as f64 * 0.013).collect();
        let y: Vec<f64> = x.iter().map(|v| v.sin()).collect();
        let a = integrate(&x, &y, 0.1).unwrap();
        let b = integrate(&x, &y, 0.1).unwrap();
        assert!(a.iter().zip(&b).all(|(p, q)| p.to_bits() == q.to_bits()));
    }

    #[test]
    fn integration_of_empty_input_is_empty() {
        assert!(integrate(&[], &[], 1.0).unwrap().is_empty());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = integrate(&[0.0, 1.0], &[1.0], 0.0).unwrap_err();
        assert_eq!(err, EvError::LengthMismatch { x_len: 2, y_len: 1 });
        assert!(differentiate(&[0.0], &[], 1).is_err());
        assert!(polynomial_fit(&[0.0, 1.0, 2.0], &[0.0, 1.0], 1).is_err());
    }

    #[test]
    fn derivative_of_a_line_is_exact() {
        assert_eq!(
            differentiate(&[0.0, 1.0, 2.0, 3.0], &[0.0, 2.0, 4.0, 6.0], 1).unwrap(),
            vec![2.0, 2.0, 2.0, 2.0]
        );
    }

    #[test]
    fn derivative_uses_clamped_window() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 1.0, 4.0, 9.0, 16.0];
        let d = differentiate(&x, &y, 2).unwrap();
        // i=0: (4-0)/2, i=1: (9-0)/3, i=2: (16-0)/4, i=3: (16-1)/3, i=4: (16-4)/2
        assert_eq!(d, vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn collapsed_window_divides_by_zero() {
        let d = differentiate(&[0.0, 1.0], &[1.0, 2.0], 0).unwrap();
        assert!(d.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn quadratic_fit_recovers_coefficients() {
        let x: Vec<f64> = vec![-2.0, -1.0, 0.0, 0.5, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v * v + 2.0 * v + 1.0).collect();

        let fit = polynomial_fit(&x, &y, 2).unwrap();
        assert_close(&fit.coefficients, &[1.0, 2.0, 3.0], 1e-9);
        assert_close(&fit.fitted, &y, 1e-9);
    }

    #[test]
    fn linear_fit_of_noisy_points_is_least_squares() {
        // Sxy = 4, Sxx = 5 about the means (1.5, 1.5)
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.5, 0.5, 2.5, 2.5];
        let fit = polynomial_fit(&x, &y, 1).unwrap();
        assert_close(&fit.coefficients, &[0.3, 0.8], 1e-9);
    }

    #[test]
    fn fit_needs_enough_samples() {
        let err = polynomial_fit(&[0.0, 1.0], &[0.0, 1.0], 3).unwrap_err();
        assert!(matches!(err, EvError::FitFailed(_)));
    }

    #[test]
    fn fit_rejects_non_finite_x() {
        let y = [0.0, 1.0, 2.0, 3.0];
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = polynomial_fit(&[bad, 1.0, 2.0, 3.0], &y, 1).unwrap_err();
            assert!(matches!(err, EvError::FitFailed(_)), "{bad}: {err:?}");
        }
    }

    #[test]
    fn fit_of_nan_derivative_column_fails_cleanly() {
        let mut reg = ColumnRegistry::new();
        reg.ingest("s", "[1 t] [2 e]", ["0 1", "1 2", "2 3"], Some("a"))
            .unwrap();
        let flat = apply(
            &mut reg,
            "d",
            &OperationRequest::Differentiate {
                x: "1a".into(),
                y: "2a".into(),
                radius: 0,
            },
        )
        .unwrap();
        let err = apply(
            &mut reg,
            "fit",
            &OperationRequest::PolynomialFit {
                x: flat.key,
                y: "2a".into(),
                order: 1,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EvError::FitFailed(_)));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn huge_radius_and_order_do_not_overflow() {
        assert_eq!(
            differentiate(&[0.0, 1.0, 2.0], &[0.0, 2.0, 4.0], usize::MAX).unwrap(),
            vec![2.0, 2.0, 2.0]
        );
        let err = polynomial_fit(&[0.0, 1.0], &[0.0, 1.0], usize::MAX).unwrap_err();
        assert!(matches!(err, EvError::FitFailed(_)));
    }

    #[test]
    fn horner_evaluation() {
        assert_eq!(eval_polynomial(&[1.0, 2.0, 3.0], 2.0), 17.0);
        assert_eq!(eval_polynomial(&[], 2.0), 0.0);
    }

    #[test]
    fn linear_space_is_inclusive() {
        assert_eq!(
            linear_space(5, 0.0, 1.0).unwrap(),
            vec![0.0, 0.25, 0.5, 0.75, 1.0]
        );
        assert_eq!(linear_space(2, 3.0, -3.0).unwrap(), vec![3.0, -3.0]);
    }

    #[test]
    fn degenerate_linear_space_fails() {
        assert!(matches!(
            linear_space(1, 0.0, 1.0),
            Err(EvError::InvalidRange(_))
        ));
        assert!(linear_space(0, 0.0, 1.0).is_err());
    }

    fn registry() -> ColumnRegistry {
        let mut reg = ColumnRegistry::new();
        reg.ingest(
            "run.ev",
            "[1 time] [2 power]",
            ["0 1", "1 1", "2 1", "3 1"],
            Some("a"),
        )
        .unwrap();
        reg
    }

    #[test]
    fn apply_registers_derived_column() {
        let mut reg = registry();
        let request = OperationRequest::Integrate {
            x: "1a".into(),
            y: "2a".into(),
            constant: 0.0,
        };
        let name = request.default_name(&reg);
        assert_eq!(name, "integral of power dtime");

        let outcome = apply(&mut reg, &name, &request).unwrap();
        assert_eq!(outcome.key, "1_");
        assert_eq!(outcome.rows, 4);
        assert_eq!(reg.get("1_").unwrap().values, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn apply_fit_reports_coefficients() {
        let mut reg = registry();
        let request = OperationRequest::PolynomialFit {
            x: "1a".into(),
            y: "2a".into(),
            order: 1,
        };
        let outcome = apply(&mut reg, "flat", &request).unwrap();
        let coefficients = outcome.coefficients.unwrap();
        assert_close(&coefficients, &[1.0, 0.0], 1e-9);
        assert_close(&reg.get(&outcome.key).unwrap().values, &[1.0; 4], 1e-9);
    }

    #[test]
    fn apply_expression_and_linear_space() {
        let mut reg = registry();
        let expr = OperationRequest::Expression {
            text: "1a 2 *".into(),
        };
        let a = apply(&mut reg, "double time", &expr).unwrap();
        assert_eq!(reg.get(&a.key).unwrap().values, vec![0.0, 2.0, 4.0, 6.0]);

        let lin = OperationRequest::LinearSpace {
            count: 3,
            start: 0.0,
            end: 1.0,
        };
        let b = apply(&mut reg, "grid", &lin).unwrap();
        assert_eq!(b.key, "2_");
    }

    #[test]
    fn failed_request_registers_nothing() {
        let mut reg = registry();
        let before = reg.len();
        let request = OperationRequest::Differentiate {
            x: "1a".into(),
            y: "7a".into(),
            radius: 1,
        };
        assert_eq!(
            apply(&mut reg, "nope", &request).unwrap_err(),
            EvError::UnknownColumn("7a".into())
        );
        assert_eq!(reg.len(), before);

        let short = OperationRequest::LinearSpace {
            count: 1,
            start: 0.0,
            end: 0.0,
        };
        assert!(apply(&mut reg, "nope", &short).is_err());
        assert_eq!(reg.len(), before);
        // the failed attempts did not consume a derived key
        let grid = OperationRequest::LinearSpace {
            count: 2,
            start: 0.0,
            end: 1.0,
        };
        let ok = apply(&mut reg, "ok", &grid).unwrap();
        assert_eq!(ok.key, "1_");
    }

    #[test]
    fn monotonic_check() {
        assert!(is_non_decreasing(&[0.0, 0.0, 1.0]));
        assert!(!is_non_decreasing(&[0.0, 2.0, 1.0]));
        assert!(is_non_decreasing(&[]));
    }
}
