//! Column algebra for simulation diagnostic files.
//!
//! Sources with a bracketed `[<index> <name>]` header are ingested into a
//! [`ColumnRegistry`]; new columns are derived from RPN expressions or from
//! numerical transforms; curves are resolved and unit-scaled for a renderer.

pub mod data;
pub mod error;
pub mod export;
pub mod render_state;

pub use data::curves::{Curve, CurveSpec, Ref, assemble};
pub use data::derived::{OperationOutcome, OperationRequest, apply};
pub use data::expression::CompiledExpression;
pub use data::loader::{
    DisambiguationScheme, Source, SuffixPolicy, SuffixScheme, load_file, load_sources,
};
pub use data::model::{Column, ColumnRegistry};
pub use data::units::{Unit, UnitCatalog};
pub use error::{EvError, Result};
pub use render_state::RenderState;
