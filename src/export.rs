use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::data::curves::Curve;
use crate::data::units::Unit;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write assembled curves to a file. Dispatch by extension.
///
/// Supported formats:
/// * `.csv`  – long format, one `label,x,y` row per sample
/// * `.json` – `{ "x_axis": {...}, "y_axis": {...}, "curves": [{label, x, y}, ...] }`
pub fn export_curves(path: &Path, curves: &[Curve], x_unit: &Unit, y_unit: &Unit) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => export_csv(path, curves, x_unit, y_unit),
        "json" => export_json(path, curves, x_unit, y_unit),
        other => bail!("Unsupported export extension: .{other}"),
    }?;
    log::info!("exported {} curves to {}", curves.len(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV writer
// ---------------------------------------------------------------------------

fn export_csv(path: &Path, curves: &[Curve], x_unit: &Unit, y_unit: &Unit) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let header = ["label".to_string(), x_unit.to_string(), y_unit.to_string()];
    writer.write_record(&header).context("writing CSV header")?;

    for curve in curves {
        for [x, y] in curve.points() {
            let record = [curve.label.clone(), x.to_string(), y.to_string()];
            writer
                .write_record(&record)
                .with_context(|| format!("writing curve '{}'", curve.label))?;
        }
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// JSON writer
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ExportDocument<'a> {
    x_axis: &'a Unit,
    y_axis: &'a Unit,
    curves: &'a [Curve],
}

fn export_json(path: &Path, curves: &[Curve], x_unit: &Unit, y_unit: &Unit) -> Result<()> {
    let file = std::fs::File::create(path).context("creating JSON file")?;
    let doc = ExportDocument {
        x_axis: x_unit,
        y_axis: y_unit,
        curves,
    };
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &doc).context("writing JSON")?;
    out.flush().context("flushing JSON")?;
    Ok(())
}
