use thiserror::Error;

// ---------------------------------------------------------------------------
// Core error taxonomy
// ---------------------------------------------------------------------------

/// Errors raised by the column model, the expression engine and the
/// derived-column transforms. None of them leave the registry half-written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvError {
    /// The header line of a source carried no usable `[<index> <name>]` descriptor.
    #[error("{source_label}: header parse error: {reason}")]
    HeaderParse { source_label: String, reason: String },

    /// A data row was malformed (wrong width or a non-numeric cell).
    /// `line` is the 1-based line number in the source, the header being line 1.
    #[error("{source_label}: line {line}: {reason}")]
    RowParse {
        source_label: String,
        line: usize,
        reason: String,
    },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// Ingestion would have produced a key that is already registered.
    #[error("column key '{0}' is already registered")]
    DuplicateColumn(String),

    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    #[error("expression references unknown column '{0}'")]
    UnknownVariable(String),

    /// A curve expression must reference at least one column, otherwise it
    /// has no row count.
    #[error("expression '{0}' does not reference any column")]
    NoVariables(String),

    #[error("length mismatch: x has {x_len} values but y has {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("polynomial fit failed: {0}")]
    FitFailed(String),

    #[error("unknown unit index {0}")]
    UnknownUnit(usize),

    #[error("unit {0} is not a custom slot")]
    NotCustomUnit(usize),
}

pub type Result<T> = std::result::Result<T, EvError>;
