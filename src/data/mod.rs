/// Data layer: column registry, loading, expressions, transforms and curves.
///
/// Architecture:
/// ```text
///  .ev text (header + rows)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  header descriptors + float rows → ingest
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐      ┌────────────┐
///   │ ColumnRegistry │ ◄──► │ expression │  RPN over columns
///   └────────────────┘      │  derived   │  integrate / differentiate / fit
///        │                  └────────────┘
///        ▼
///   ┌──────────┐
///   │  curves   │  resolve refs, apply units → scaled (x, y, label)
///   └──────────┘
/// ```

pub mod curves;
pub mod derived;
pub mod expression;
pub mod loader;
pub mod model;
pub mod units;
