use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, bail};
use regex::Regex;

use crate::error::{EvError, Result};

use super::model::ColumnRegistry;

// ---------------------------------------------------------------------------
// Header descriptors
// ---------------------------------------------------------------------------

/// `[<index> <name>]`, index possibly zero-padded, name running to the bracket.
static DESCRIPTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*(\d+)\s*([^\[\]]*)\]").expect("descriptor regex"));

/// One bracketed column descriptor found in a header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// 1-based column position in the data rows.
    pub index: usize,
    pub name: String,
}

/// Scan a header line for `[<index> <name>]` descriptors.
///
/// Text outside the brackets (a leading `#`, padding) is ignored. Names are
/// trimmed; an empty name falls back to `column <index>`.
pub fn parse_header(source_label: &str, header_line: &str) -> Result<Vec<Descriptor>> {
    let header_err = |reason: String| EvError::HeaderParse {
        source_label: source_label.to_string(),
        reason,
    };

    let mut descriptors = Vec::new();
    for caps in DESCRIPTOR_RE.captures_iter(header_line) {
        let digits = &caps[1];
        let index: usize = digits
            .parse()
            .map_err(|_| header_err(format!("column index '{digits}' is out of range")))?;
        if index == 0 {
            return Err(header_err("column indices start at 1".to_string()));
        }
        if descriptors.iter().any(|d: &Descriptor| d.index == index) {
            return Err(header_err(format!("column index {index} appears twice")));
        }
        let name = caps[2].trim();
        let name = if name.is_empty() {
            format!("column {index}")
        } else {
            name.to_string()
        };
        descriptors.push(Descriptor { index, name });
    }

    if descriptors.is_empty() {
        return Err(header_err("no [<index> <name>] descriptors found".to_string()));
    }
    Ok(descriptors)
}

// ---------------------------------------------------------------------------
// Data rows
// ---------------------------------------------------------------------------

/// Column-major numeric block parsed from the rows below a header.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Vec<f64>>,
    height: usize,
}

impl Table {
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Copy of the 0-based column `i`, if the rows are that wide.
    pub fn column(&self, i: usize) -> Option<Vec<f64>> {
        self.columns.get(i).cloned()
    }
}

/// Parse whitespace-separated float rows. Blank lines are skipped; every
/// remaining row must have the width of the first one.
pub fn parse_rows<'a, I>(source_label: &str, rows: I) -> Result<Table>
where
    I: IntoIterator<Item = &'a str>,
{
    let row_err = |line: usize, reason: String| EvError::RowParse {
        source_label: source_label.to_string(),
        line,
        reason,
    };

    let mut table = Table::default();
    // Line 1 is the header.
    for (line, row) in (2..).zip(rows) {
        if row.trim().is_empty() {
            continue;
        }

        let cells: Vec<&str> = row.split_whitespace().collect();
        if table.height == 0 {
            table.columns = vec![Vec::new(); cells.len()];
        } else if cells.len() != table.width() {
            return Err(row_err(
                line,
                format!("expected {} fields, found {}", table.width(), cells.len()),
            ));
        }

        for (j, cell) in cells.iter().enumerate() {
            let value = cell.parse::<f64>().map_err(|_| {
                row_err(line, format!("field {}: '{cell}' is not a number", j + 1))
            })?;
            table.columns[j].push(value);
        }
        table.height += 1;
    }

    if table.height == 0 {
        return Err(row_err(2, "no data rows below the header".to_string()));
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The raw text of one tabular source split into header and data lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub label: String,
    pub header: String,
    pub rows: Vec<String>,
}

impl Source {
    /// Split text into the first line (header) and the remaining lines.
    pub fn from_text(label: &str, text: &str) -> Self {
        let mut lines = text.lines();
        let header = lines.next().unwrap_or("").to_string();
        Source {
            label: label.to_string(),
            header,
            rows: lines.map(str::to_string).collect(),
        }
    }
}

/// Read a diagnostic file from disk.
pub fn load_file(path: &Path) -> anyhow::Result<Source> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    if text.trim().is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(Source::from_text(&path.display().to_string(), &text))
}

// ---------------------------------------------------------------------------
// Key disambiguation
// ---------------------------------------------------------------------------

/// Generates the key suffix for the source at a given position when several
/// sources are merged into one registry.
///
/// Tokens must never parse as a number, contain whitespace or end in the
/// derived-key suffix, so keys stay valid expression variables.
pub trait DisambiguationScheme {
    fn token(&self, position: usize) -> String;
}

/// Built-in suffix generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuffixScheme {
    /// `a, b, ..., z, aa, ab, ...`
    #[default]
    Letters,
    /// `#1, #2, ...`
    Numbers,
}

impl DisambiguationScheme for SuffixScheme {
    fn token(&self, position: usize) -> String {
        match self {
            SuffixScheme::Letters => {
                // Bijective base 26.
                let mut n = position + 1;
                let mut letters = Vec::new();
                while n > 0 {
                    n -= 1;
                    letters.push(b'a' + (n % 26) as u8);
                    n /= 26;
                }
                letters.iter().rev().map(|&b| b as char).collect()
            }
            SuffixScheme::Numbers => format!("#{}", position + 1),
        }
    }
}

/// When ingestion keys get a disambiguation suffix.
///
/// Bare keys (`"3"`) read as numeric literals inside expressions, so a
/// session that wants to reference columns in formulas uses [`Always`].
///
/// [`Always`]: SuffixPolicy::Always
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuffixPolicy {
    /// Only when more than one source is merged.
    #[default]
    WhenMerging,
    Always,
}

/// Ingest every source in order, suffixing keys per `policy`. Stops at the
/// first failing source; sources before it stay registered.
pub fn load_sources(
    registry: &mut ColumnRegistry,
    sources: &[Source],
    scheme: &dyn DisambiguationScheme,
    policy: SuffixPolicy,
) -> Result<Vec<String>> {
    let suffixed = match policy {
        SuffixPolicy::WhenMerging => sources.len() > 1,
        SuffixPolicy::Always => true,
    };
    let mut keys = Vec::new();
    for (i, source) in sources.iter().enumerate() {
        let suffix = suffixed.then(|| scheme.token(i));
        let added = registry.ingest(
            &source.label,
            &source.header,
            source.rows.iter().map(String::as_str),
            suffix.as_deref(),
        )?;
        log::info!("{}: {} columns loaded", source.label, added.len());
        keys.extend(added);
    }
    Ok(keys)
}
