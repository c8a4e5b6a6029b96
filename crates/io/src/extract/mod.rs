//! Per-source extractors: decoded tables in, typed engine records out.
//!
//! Extractors validate keys as they go. A malformed geographic, industry or
//! time code fails the whole source with the file and line; rows that are
//! well-formed but out of scope (other grains, annual averages, aggregate
//! industry codes) are skipped.

pub mod arcos;
pub mod cbp;
pub mod jolts;
pub mod laus;
pub mod oes;
pub mod policy;
pub mod seer;

use std::path::PathBuf;

use kaitz_recon::PanelError;

use crate::error::LoadError;
use crate::table::{year_from_file_name, RawTable};

/// One resolved input file and the tables decoded from it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub tables: Vec<RawTable>,
}

impl SourceFile {
    pub fn rows(&self) -> usize {
        self.tables.iter().map(RawTable::len).sum()
    }

    /// Data year from the file name.
    pub fn year(&self) -> Result<i32, LoadError> {
        year_from_file_name(&self.path).ok_or_else(|| {
            PanelError::malformed(self.path.display().to_string(), "file name carries no year").into()
        })
    }
}

pub(crate) fn parse_year(table: &RawTable, row: usize, column: usize) -> Result<i32, LoadError> {
    let raw = table.cell(row, column);
    let year = match raw.parse::<i32>() {
        Ok(year) => Some(year),
        // Spreadsheet exports write whole years as "2010.0"
        Err(_) => raw
            .parse::<f64>()
            .ok()
            .filter(|y| y.fract() == 0.0 && y.abs() < 1e5)
            .map(|y| y as i32),
    };
    year.ok_or_else(|| table.field_error(row, format!("invalid year '{raw}'")))
}

/// Numeric cell with thousands separators; blank reads as zero.
pub(crate) fn parse_amount(table: &RawTable, row: usize, column: usize) -> Result<f64, LoadError> {
    let raw = table.cell(row, column).replace(',', "");
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>()
        .map_err(|_| table.field_error(row, format!("invalid number '{raw}'")))
}

/// Attach file position to key validation failures.
pub(crate) fn at_row<T>(table: &RawTable, row: usize, result: Result<T, PanelError>) -> Result<T, LoadError> {
    result.map_err(|e| table.field_error(row, e.to_string()))
}
