use std::fmt;

use crate::error::{EvError, Result};

use super::model::ColumnRegistry;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Heaviside step: 0 below zero, 1 otherwise.
    Heaviside,
    Abs,
}

impl UnaryOp {
    fn apply(self, v: f64) -> f64 {
        match self {
            UnaryOp::Heaviside => {
                if v < 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
            UnaryOp::Abs => v.abs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    /// IEEE semantics throughout: `x / 0` and `(-8) ^ 0.5` come back as
    /// infinities and NaN.
    fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
            BinaryOp::Pow => left.powf(right),
        }
    }
}

/// A classified RPN token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Literal(f64),
    /// Anything else: must name a registered column.
    Variable(String),
}

impl Token {
    /// Classify in priority order: unary operator, binary operator, numeric
    /// literal, variable.
    pub fn classify(text: &str) -> Token {
        match text {
            "h" => Token::Unary(UnaryOp::Heaviside),
            "abs" => Token::Unary(UnaryOp::Abs),
            "+" => Token::Binary(BinaryOp::Add),
            "-" => Token::Binary(BinaryOp::Sub),
            "*" => Token::Binary(BinaryOp::Mul),
            "/" => Token::Binary(BinaryOp::Div),
            "^" => Token::Binary(BinaryOp::Pow),
            other => match other.parse::<f64>() {
                Ok(v) => Token::Literal(v),
                Err(_) => Token::Variable(other.to_string()),
            },
        }
    }

    /// Net change this token makes to the evaluation stack depth.
    fn stack_effect(&self) -> isize {
        match self {
            Token::Binary(_) => -1,
            Token::Unary(_) => 0,
            Token::Literal(_) | Token::Variable(_) => 1,
        }
    }
}

/// Split expression text on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check the stack discipline of a token sequence: the running depth must
/// stay at or above 1 after every token and end at exactly 1.
pub fn validate<S: AsRef<str>>(tokens: &[S]) -> Result<()> {
    let classified: Vec<Token> = tokens.iter().map(|t| Token::classify(t.as_ref())).collect();
    validate_tokens(&classified)
}

pub fn is_valid_expression<S: AsRef<str>>(tokens: &[S]) -> bool {
    validate(tokens).is_ok()
}

fn validate_tokens(tokens: &[Token]) -> Result<()> {
    if tokens.is_empty() {
        return Err(EvError::MalformedExpression("empty expression".to_string()));
    }
    let mut depth: isize = 0;
    for (i, token) in tokens.iter().enumerate() {
        depth += token.stack_effect();
        if depth < 1 {
            return Err(EvError::MalformedExpression(format!(
                "token {} leaves too few operands on the stack",
                i + 1
            )));
        }
    }
    if depth != 1 {
        return Err(EvError::MalformedExpression(format!(
            "{depth} values left on the stack, expected 1"
        )));
    }
    Ok(())
}

/// A token position that receives a column value on every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub column_key: String,
    pub token_index: usize,
}

/// Locate every variable token. Any variable rejected by `is_allowed` fails
/// the whole expression.
pub fn bind_variables<S, F>(tokens: &[S], is_allowed: F) -> Result<Vec<Binding>>
where
    S: AsRef<str>,
    F: Fn(&str) -> bool,
{
    let mut bindings = Vec::new();
    for (i, text) in tokens.iter().enumerate() {
        if let Token::Variable(key) = Token::classify(text.as_ref()) {
            if !is_allowed(&key) {
                return Err(EvError::UnknownVariable(key));
            }
            bindings.push(Binding {
                column_key: key,
                token_index: i,
            });
        }
    }
    Ok(bindings)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate a token sequence with no unresolved variables.
pub fn evaluate<S: AsRef<str>>(tokens: &[S]) -> Result<f64> {
    let classified: Vec<Token> = tokens.iter().map(|t| Token::classify(t.as_ref())).collect();
    run(&classified)
}

fn run(tokens: &[Token]) -> Result<f64> {
    let underflow = || EvError::MalformedExpression("stack underflow".to_string());
    let mut stack: Vec<f64> = Vec::with_capacity(tokens.len());

    for token in tokens {
        match token {
            Token::Literal(v) => stack.push(*v),
            Token::Unary(op) => {
                let v = stack.pop().ok_or_else(underflow)?;
                stack.push(op.apply(v));
            }
            Token::Binary(op) => {
                let right = stack.pop().ok_or_else(underflow)?;
                let left = stack.pop().ok_or_else(underflow)?;
                stack.push(op.apply(left, right));
            }
            Token::Variable(key) => return Err(EvError::UnknownVariable(key.clone())),
        }
    }

    match stack.as_slice() {
        [result] => Ok(*result),
        _ => Err(EvError::MalformedExpression(format!(
            "{} values left on the stack, expected 1",
            stack.len()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Compiled expressions
// ---------------------------------------------------------------------------

/// A validated RPN expression over registry columns.
///
/// The token list is never modified; each row is evaluated on a fresh copy
/// with the bound positions replaced by that row's values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpression {
    text: String,
    tokens: Vec<Token>,
    bindings: Vec<Binding>,
}

impl CompiledExpression {
    /// Tokenize, bind and validate `text` against the columns in `registry`.
    pub fn compile(text: &str, registry: &ColumnRegistry) -> Result<Self> {
        let words = tokenize(text);
        let bindings = bind_variables(&words, |key| registry.contains(key))?;
        if bindings.is_empty() {
            return Err(EvError::NoVariables(text.trim().to_string()));
        }
        let tokens: Vec<Token> = words.iter().map(|w| Token::classify(w)).collect();
        validate_tokens(&tokens)?;

        Ok(CompiledExpression {
            text: words.join(" "),
            tokens,
            bindings,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Evaluate the expression row by row over its bound columns. The
    /// shortest bound column sets the number of rows produced.
    pub fn evaluate_over_columns(&self, registry: &ColumnRegistry) -> Result<Vec<f64>> {
        let columns = self
            .bindings
            .iter()
            .map(|b| registry.get(&b.column_key).map(|c| (b.token_index, c.values.as_slice())))
            .collect::<Result<Vec<_>>>()?;

        let rows = columns.iter().map(|(_, v)| v.len()).min().unwrap_or(0);
        let mut out = Vec::with_capacity(rows);
        for r in 0..rows {
            let mut buffer = self.tokens.clone();
            for &(idx, values) in &columns {
                buffer[idx] = Token::Literal(values[r]);
            }
            out.push(run(&buffer)?);
        }
        Ok(out)
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ColumnRegistry {
        let mut reg = ColumnRegistry::new();
        reg.ingest(
            "run.ev",
            "[1 time] [2 mass]",
            ["0 2", "1 4", "2 6", "3 8", "4 10"],
            Some("a"),
        )
        .unwrap();
        reg.register_derived("short", vec![10.0, 20.0, 30.0]);
        reg
    }

    #[test]
    fn classify_priority() {
        assert_eq!(Token::classify("h"), Token::Unary(UnaryOp::Heaviside));
        assert_eq!(Token::classify("abs"), Token::Unary(UnaryOp::Abs));
        assert_eq!(Token::classify("-"), Token::Binary(BinaryOp::Sub));
        assert_eq!(Token::classify("-5"), Token::Literal(-5.0));
        assert_eq!(Token::classify("1e3"), Token::Literal(1000.0));
        assert_eq!(Token::classify("2b"), Token::Variable("2b".into()));
        assert_eq!(Token::classify("1_"), Token::Variable("1_".into()));
        // bare numeric keys read as literals
        assert_eq!(Token::classify("2"), Token::Literal(2.0));
    }

    #[test]
    fn validity() {
        assert!(is_valid_expression(&["3", "4", "+"]));
        assert!(!is_valid_expression(&["3", "+"]));
        assert!(!is_valid_expression::<&str>(&[]));
        assert!(!is_valid_expression(&["3", "4"]));
        assert!(is_valid_expression(&["3", "abs"]));
        assert!(!is_valid_expression(&["abs"]));
        // depth drops to zero midway even though it ends at one
        assert!(!is_valid_expression(&["1", "+", "2"]));
    }

    #[test]
    fn evaluation() {
        assert_eq!(evaluate(&["3", "4", "+"]).unwrap(), 7.0);
        assert_eq!(evaluate(&["2", "3", "^"]).unwrap(), 8.0);
        assert_eq!(evaluate(&["-5", "abs"]).unwrap(), 5.0);
        assert_eq!(evaluate(&["-1", "h"]).unwrap(), 0.0);
        assert_eq!(evaluate(&["1", "h"]).unwrap(), 1.0);
        assert_eq!(evaluate(&["0", "h"]).unwrap(), 1.0);
        assert_eq!(evaluate(&["10", "4", "-"]).unwrap(), 6.0);
        assert_eq!(evaluate(&["1", "2", "3", "*", "+"]).unwrap(), 7.0);
    }

    #[test]
    fn numeric_specials_propagate() {
        assert_eq!(evaluate(&["1", "0", "/"]).unwrap(), f64::INFINITY);
        assert!(evaluate(&["-8", "0.5", "^"]).unwrap().is_nan());
    }

    #[test]
    fn evaluating_unresolved_variable_fails() {
        assert_eq!(
            evaluate(&["x", "1", "+"]).unwrap_err(),
            EvError::UnknownVariable("x".into())
        );
    }

    #[test]
    fn unknown_variable_rejects_whole_expression() {
        let err = CompiledExpression::compile("1 9z +", &registry()).unwrap_err();
        assert_eq!(err, EvError::UnknownVariable("9z".into()));
    }

    #[test]
    fn expression_without_columns_is_rejected() {
        let err = CompiledExpression::compile("3 4 +", &registry()).unwrap_err();
        assert!(matches!(err, EvError::NoVariables(_)));
    }

    #[test]
    fn malformed_expression_is_rejected() {
        let err = CompiledExpression::compile("1 2 + +", &registry()).unwrap_err();
        assert!(matches!(err, EvError::MalformedExpression(_)));
    }

    #[test]
    fn bindings_record_token_positions() {
        let expr = CompiledExpression::compile("  2a 2a   *  1 + ", &registry()).unwrap();
        assert_eq!(expr.text(), "2a 2a * 1 +");
        assert_eq!(
            expr.bindings(),
            &[
                Binding { column_key: "2a".into(), token_index: 0 },
                Binding { column_key: "2a".into(), token_index: 1 },
            ]
        );
    }

    #[test]
    fn row_wise_evaluation() {
        let reg = registry();
        let expr = CompiledExpression::compile("2a 1a /", &reg).unwrap();
        // mass / time: first row divides by zero
        let out = expr.evaluate_over_columns(&reg).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], f64::INFINITY);
        assert_eq!(&out[1..], &[4.0, 3.0, 8.0 / 3.0, 2.5]);
    }

    #[test]
    fn shortest_column_limits_rows() {
        let reg = registry();
        let expr = CompiledExpression::compile("1_ 2a +", &reg).unwrap();
        let out = expr.evaluate_over_columns(&reg).unwrap();
        assert_eq!(out, vec![12.0, 24.0, 36.0]);
    }

    #[test]
    fn compiled_expression_is_reusable() {
        let reg = registry();
        let expr = CompiledExpression::compile("1a 1 - h 2 *", &reg).unwrap();
        let first = expr.evaluate_over_columns(&reg).unwrap();
        let second = expr.evaluate_over_columns(&reg).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![0.0, 2.0, 2.0, 2.0, 2.0]);
    }
}
