//! Occupational employment and wage statistics (OES): hourly wage
//! percentiles for the all-occupations row of each industry or area.

use kaitz_recon::percentile::{AreaWage, IndustryWage, Percentiles, WAGE_PERCENTILES};
use kaitz_recon::{GeoKey, IndustryCode, Taxonomy};

use super::cbp::is_aggregate_code;
use super::{at_row, SourceFile};
use crate::error::LoadError;
use crate::fips::FipsDirectory;
use crate::table::RawTable;

/// Occupation code of the all-occupations total.
pub const ALL_OCCUPATIONS: &str = "00-0000";

/// Header label used to find the header row in workbooks with title rows.
pub const HEADER_HINT: &str = "occ_code";

/// Hourly wage cell. `*` (suppressed) and `#` (top-coded) read as missing.
pub fn wage_cell(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() || cleaned == "*" || cleaned == "#" || cleaned == "**" {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Column index per published percentile; the median is `h_median` in every
/// vintage. Older vintages publish only the median.
fn percentile_columns(table: &RawTable) -> [Option<usize>; WAGE_PERCENTILES.len()] {
    let mut columns = [None; WAGE_PERCENTILES.len()];
    for (slot, p) in WAGE_PERCENTILES.iter().enumerate() {
        columns[slot] = if *p == 50 {
            table.column("h_median").or_else(|| table.column("h_pct50"))
        } else {
            table.column(&format!("h_pct{p}"))
        };
    }
    columns
}

fn read_percentiles(table: &RawTable, row: usize, columns: &[Option<usize>; WAGE_PERCENTILES.len()]) -> Percentiles {
    let mut out: Percentiles = [None; WAGE_PERCENTILES.len()];
    for (slot, column) in columns.iter().enumerate() {
        out[slot] = column.and_then(|c| wage_cell(table.cell(row, c)));
    }
    out
}

fn total_rows(table: &RawTable) -> Result<impl Iterator<Item = usize> + '_, LoadError> {
    let occ = table.require(HEADER_HINT)?;
    Ok((0..table.len()).filter(move |row| table.cell(*row, occ) == ALL_OCCUPATIONS))
}

/// National industry percentiles (`naics`, or `sic` for 1997-2001 files).
pub fn extract_industry_wages(files: &[SourceFile]) -> Result<Vec<IndustryWage>, LoadError> {
    let mut out = Vec::new();
    for file in files {
        let year = file.year()?;
        for table in &file.tables {
            let (code, column) = table.require_any(&["naics", "sic"])?;
            let taxonomy = if column == "sic" { Taxonomy::Sic } else { Taxonomy::Naics };
            let columns = percentile_columns(table);
            let median = WAGE_PERCENTILES.iter().position(|p| *p == 50).unwrap_or_default();
            if columns[median].is_none() {
                return Err(LoadError::MissingHeader {
                    path: table.origin.clone(),
                    column: "h_median".into(),
                });
            }

            for row in total_rows(table)? {
                let raw = table.cell(row, code);
                if is_aggregate_code(raw) {
                    continue;
                }
                out.push(IndustryWage {
                    year,
                    industry: at_row(table, row, IndustryCode::tagged(raw, taxonomy))?,
                    percentiles: read_percentiles(table, row, &columns),
                });
            }
        }
        log::debug!("{}: {} industry wage rows so far", file.path.display(), out.len());
    }
    Ok(out)
}

/// Area percentiles keyed by the `area` state code, or by `area_title`
/// through the FIPS directory when the file has no code column.
pub fn extract_area_wages(files: &[SourceFile], directory: Option<&FipsDirectory>) -> Result<Vec<AreaWage>, LoadError> {
    let mut out = Vec::new();
    for file in files {
        let year = file.year()?;
        for table in &file.tables {
            let title = table.require("area_title")?;
            let area = table.column("area");
            let columns = percentile_columns(table);
            let mut unknown = 0usize;

            for row in total_rows(table)? {
                let area_title = table.cell(row, title).to_string();
                let geo = match (area, directory) {
                    (Some(c), _) => at_row(table, row, GeoKey::state(table.cell(row, c)))?,
                    (None, Some(dir)) => match dir.state_fip_by_name(&area_title) {
                        Some(fip) => at_row(table, row, GeoKey::state(fip))?,
                        None => {
                            unknown += 1;
                            continue;
                        }
                    },
                    (None, None) => {
                        return Err(LoadError::MissingHeader {
                            path: table.origin.clone(),
                            column: "area".into(),
                        })
                    }
                };
                out.push(AreaWage {
                    geo,
                    year,
                    area_title,
                    percentiles: read_percentiles(table, row, &columns),
                });
            }
            if unknown > 0 {
                log::warn!("{}: {unknown} areas not in the FIPS directory dropped", table.origin.display());
            }
        }
    }
    Ok(out)
}
