// Panel CSV and coverage report output. Both are written to a sibling temp
// file and renamed into place.

use std::path::Path;

use kaitz_recon::engine::PanelResult;
use kaitz_recon::model::PanelMeta;
use kaitz_recon::{CoverageReport, Panel};
use serde::Serialize;

use crate::error::LoadError;
use crate::sources::{InputFingerprint, SourceSummary};

/// The JSON report: run metadata, join coverage, and what was read.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub meta: &'a PanelMeta,
    pub coverage: &'a CoverageReport,
    pub sources: &'a [SourceSummary],
    pub inputs: &'a [InputFingerprint],
}

impl<'a> RunReport<'a> {
    pub fn new(result: &'a PanelResult, sources: &'a [SourceSummary], inputs: &'a [InputFingerprint]) -> Self {
        Self {
            meta: &result.meta,
            coverage: &result.coverage,
            sources,
            inputs,
        }
    }
}

fn write_atomic(path: &Path, write: impl FnOnce(&Path) -> Result<(), LoadError>) -> Result<(), LoadError> {
    let tmp_path = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.tmp", ext.to_string_lossy())),
        None => path.with_extension("tmp"),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| LoadError::io(parent, e))?;
    }
    if let Err(e) = write(&tmp_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, path).map_err(|e| LoadError::io(path, e))
}

/// Header row of column names, then one line per panel row. Missing values
/// are empty fields and NaN is written as `NaN`.
pub fn write_panel_csv(panel: &Panel, path: &Path) -> Result<(), LoadError> {
    write_atomic(path, |tmp| {
        let csv_error = |error| LoadError::Csv {
            path: tmp.to_path_buf(),
            error,
        };
        let mut writer = csv::Writer::from_path(tmp).map_err(csv_error)?;
        writer.write_record(panel.columns()).map_err(csv_error)?;
        for row in panel.rows() {
            writer
                .write_record(row.values.iter().map(|v| v.to_string()))
                .map_err(csv_error)?;
        }
        writer.flush().map_err(|e| LoadError::io(tmp, e))
    })?;
    log::info!("wrote {} rows to {}", panel.len(), path.display());
    Ok(())
}

pub fn report_json(report: &RunReport<'_>) -> Result<String, LoadError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_report(report: &RunReport<'_>, path: &Path) -> Result<(), LoadError> {
    let json = report_json(report)?;
    write_atomic(path, |tmp| std::fs::write(tmp, json).map_err(|e| LoadError::io(tmp, e)))?;
    log::info!("wrote coverage report to {}", path.display());
    Ok(())
}
