use std::collections::HashMap;

use crate::error::{EvError, Result};

use super::loader::{parse_header, parse_rows};

/// Source label given to every column produced by a transform or expression.
pub const DERIVED_SOURCE: &str = "derived";

/// Suffix reserved for derived-column keys. Ingestion keys never end with it.
pub const DERIVED_KEY_SUFFIX: char = '_';

// ---------------------------------------------------------------------------
// Column – one named series of samples
// ---------------------------------------------------------------------------

/// A single named column of numeric samples.
///
/// Columns are only ever handed out by shared reference once registered, so
/// `values` cannot change after ingestion or derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Unique registry key (`"3"`, `"3b"`, `"2_"`, ...).
    pub key: String,
    /// Where the column came from: a file label or [`DERIVED_SOURCE`].
    pub source_label: String,
    /// Display name taken from the header descriptor or supplied by the user.
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether this column was created by a transform rather than ingested.
    pub fn is_derived(&self) -> bool {
        self.key.ends_with(DERIVED_KEY_SUFFIX)
    }
}

// ---------------------------------------------------------------------------
// ColumnRegistry – insertion-ordered key → column store
// ---------------------------------------------------------------------------

/// Insertion-ordered store of every column known to the session.
///
/// Order groups columns by their originating source; derived columns are
/// appended at the end. Nothing is ever removed or rewritten in place.
#[derive(Debug, Clone, Default)]
pub struct ColumnRegistry {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    derived_count: usize,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one tabular source and register a column per header descriptor.
    ///
    /// `data_rows` are the lines below the header. The key of each column is
    /// its 1-based header index followed by `suffix` (when given). The whole
    /// source is parsed before anything is inserted, so a failure leaves the
    /// registry exactly as it was.
    pub fn ingest<'a, I>(
        &mut self,
        source_label: &str,
        header_line: &str,
        data_rows: I,
        suffix: Option<&str>,
    ) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let descriptors = parse_header(source_label, header_line)?;
        let table = parse_rows(source_label, data_rows)?;

        let mut staged = Vec::with_capacity(descriptors.len());
        for desc in descriptors {
            let key = format!("{}{}", desc.index, suffix.unwrap_or(""));
            if self.index.contains_key(&key) || staged.iter().any(|c: &Column| c.key == key) {
                return Err(EvError::DuplicateColumn(key));
            }
            let values = table.column(desc.index - 1).ok_or_else(|| EvError::HeaderParse {
                source_label: source_label.to_string(),
                reason: format!(
                    "descriptor [{} {}] points past the {} data columns",
                    desc.index,
                    desc.name,
                    table.width()
                ),
            })?;
            staged.push(Column {
                key,
                source_label: source_label.to_string(),
                name: desc.name,
                values,
            });
        }

        log::debug!(
            "{source_label}: {} columns x {} rows",
            staged.len(),
            table.height()
        );

        let keys = staged.iter().map(|c| c.key.clone()).collect();
        for column in staged {
            self.insert(column);
        }
        Ok(keys)
    }

    /// Register a derived column and return its freshly assigned key (`"<n>_"`).
    pub fn register_derived(&mut self, name: &str, values: Vec<f64>) -> String {
        self.derived_count += 1;
        let key = format!("{}{}", self.derived_count, DERIVED_KEY_SUFFIX);
        log::debug!("registered derived column {key} ({name}, {} rows)", values.len());
        self.insert(Column {
            key: key.clone(),
            source_label: DERIVED_SOURCE.to_string(),
            name: name.to_string(),
            values,
        });
        key
    }

    pub fn get(&self, key: &str) -> Result<&Column> {
        self.index
            .get(key)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| EvError::UnknownColumn(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// All keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.key.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Consecutive runs of columns sharing a source label, in insertion order.
    pub fn groups(&self) -> Vec<(&str, Vec<&Column>)> {
        let mut groups: Vec<(&str, Vec<&Column>)> = Vec::new();
        for column in &self.columns {
            let label = column.source_label.as_str();
            if let Some((_, members)) = groups.last_mut().filter(|(l, _)| *l == label) {
                members.push(column);
            } else {
                groups.push((label, vec![column]));
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn insert(&mut self, column: Column) {
        self.index.insert(column.key.clone(), self.columns.len());
        self.columns.push(column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "# [01        time] [02      energy]";

    fn registry_with_one_source() -> ColumnRegistry {
        let mut reg = ColumnRegistry::new();
        reg.ingest("run.ev", HEADER, ["0.0 1.5", "1.0 1.25", "2.0 1.0"], None)
            .expect("ingest");
        reg
    }

    #[test]
    fn ingest_creates_one_column_per_descriptor() {
        let reg = registry_with_one_source();
        assert_eq!(reg.keys(), vec!["1", "2"]);

        let energy = reg.get("2").unwrap();
        assert_eq!(energy.name, "energy");
        assert_eq!(energy.source_label, "run.ev");
        assert_eq!(energy.values, vec![1.5, 1.25, 1.0]);
        assert!(!energy.is_derived());
    }

    #[test]
    fn ingest_with_suffix_keeps_keys_unique_across_sources() {
        let mut reg = ColumnRegistry::new();
        reg.ingest("a.ev", "[1 t] [2 e]", ["0 1", "1 2"], Some("a")).unwrap();
        reg.ingest("b.ev", "[1 t] [2 e]", ["0 3", "1 4", "2 5"], Some("b"))
            .unwrap();

        assert_eq!(reg.keys(), vec!["1a", "2a", "1b", "2b"]);
        assert_eq!(reg.get("2b").unwrap().len(), 3);
    }

    #[test]
    fn duplicate_key_is_rejected_without_partial_insert() {
        let mut reg = registry_with_one_source();
        let err = reg.ingest("again.ev", HEADER, ["5 6"], None).unwrap_err();
        assert_eq!(err, EvError::DuplicateColumn("1".into()));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn repeated_header_index_is_a_header_error() {
        let mut reg = ColumnRegistry::new();
        let err = reg.ingest("dup.ev", "[1 a] [1 b]", ["0 1"], None).unwrap_err();
        assert!(matches!(err, EvError::HeaderParse { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn malformed_source_does_not_touch_existing_columns() {
        let mut reg = registry_with_one_source();
        let err = reg
            .ingest("bad.ev", "[1 x]", ["1.0", "oops"], Some("z"))
            .unwrap_err();
        assert!(matches!(err, EvError::RowParse { line: 3, .. }));
        assert_eq!(reg.keys(), vec!["1", "2"]);
    }

    #[test]
    fn descriptor_beyond_row_width_fails() {
        let mut reg = ColumnRegistry::new();
        let err = reg.ingest("s.ev", "[1 a] [3 c]", ["1 2"], None).unwrap_err();
        assert!(matches!(err, EvError::HeaderParse { .. }));
        assert!(reg.is_empty());
    }

    #[test]
    fn derived_keys_count_up_and_append_last() {
        let mut reg = registry_with_one_source();
        let k1 = reg.register_derived("ramp", vec![0.0, 1.0]);
        let k2 = reg.register_derived("slope", vec![2.0]);

        assert_eq!(k1, "1_");
        assert_eq!(k2, "2_");
        assert_eq!(reg.keys(), vec!["1", "2", "1_", "2_"]);

        let ramp = reg.get("1_").unwrap();
        assert!(ramp.is_derived());
        assert_eq!(ramp.source_label, DERIVED_SOURCE);
    }

    #[test]
    fn unknown_key_is_reported() {
        let reg = registry_with_one_source();
        assert_eq!(
            reg.get("9").unwrap_err(),
            EvError::UnknownColumn("9".into())
        );
    }

    #[test]
    fn groups_follow_insertion_order() {
        let mut reg = ColumnRegistry::new();
        reg.ingest("a.ev", "[1 t]", ["0"], Some("a")).unwrap();
        reg.ingest("b.ev", "[1 t] [2 u]", ["0 0"], Some("b")).unwrap();
        reg.register_derived("sum", vec![0.0]);

        let groups = reg.groups();
        let summary: Vec<(&str, usize)> = groups.iter().map(|(l, c)| (*l, c.len())).collect();
        assert_eq!(summary, vec![("a.ev", 1), ("b.ev", 2), (DERIVED_SOURCE, 1)]);
    }
}
