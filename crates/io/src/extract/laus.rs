//! Local-area unemployment statistics (LAUS) series.
//!
//! Series ids are positional: `LAUCN010010000000003` is county 01001,
//! measure 03. Area type `CN` is a county, `ST` a state.

use std::collections::BTreeMap;

use kaitz_recon::{GeoKey, Grain, MeasureRecord, SourceTable, TimeKey, Value};

use super::{at_row, parse_year, SourceFile};
use crate::error::LoadError;
use crate::fips::FipsDirectory;

const SERIES_ID_LEN: usize = 20;

/// Variable name for a LAUS measure code.
pub fn measure_name(code: &str) -> Option<&'static str> {
    match code {
        "03" => Some("unemployment_rate"),
        "04" => Some("unemployment"),
        "05" => Some("employment"),
        "06" => Some("labor_force"),
        _ => None,
    }
}

fn series_geo(id: &str) -> Result<Option<GeoKey>, kaitz_recon::PanelError> {
    let state = &id[5..7];
    match &id[3..5] {
        "CN" => GeoKey::county_parts(state, &id[7..10]).map(Some),
        "ST" => GeoKey::state(state).map(Some),
        _ => Ok(None),
    }
}

/// One table per file. The first four columns are series id, year, period and
/// value whatever their headers say; trailing footnote columns are ignored.
/// Geographies absent from the FIPS directory are dropped with a warning.
pub fn extract_labor_market(
    files: &[SourceFile],
    directory: &FipsDirectory,
    grain: Grain,
) -> Result<Vec<SourceTable>, LoadError> {
    let mut out = Vec::new();
    for file in files {
        for table in &file.tables {
            if table.headers.len() < 4 {
                return Err(LoadError::MissingHeader {
                    path: table.origin.clone(),
                    column: "series_id,year,period,value".into(),
                });
            }

            let mut records = Vec::new();
            let mut descriptors = BTreeMap::new();
            let mut unknown = 0usize;

            for row in 0..table.len() {
                let id = table.cell(row, 0);
                if id.len() != SERIES_ID_LEN || !id.is_ascii() {
                    return Err(table.field_error(row, format!("malformed series id '{id}'")));
                }
                let Some(variable) = measure_name(&id[18..20]) else {
                    continue;
                };
                let Some(geo) = at_row(table, row, series_geo(id))? else {
                    continue;
                };
                if geo.grain() != grain {
                    continue;
                }
                let year = parse_year(table, row, 1)?;
                let Some(time) = at_row(table, row, TimeKey::from_bls_period(year, table.cell(row, 2)))? else {
                    continue;
                };

                match directory.descriptors(&geo) {
                    Some(fields) => {
                        descriptors.entry(geo.clone()).or_insert(fields);
                    }
                    None => {
                        unknown += 1;
                        continue;
                    }
                }

                records.push(MeasureRecord {
                    geo,
                    time,
                    variable: variable.to_string(),
                    value: Value::parse(table.cell(row, 3)),
                });
            }

            if unknown > 0 {
                log::warn!(
                    "{}: {unknown} rows with FIPS codes missing from the directory dropped",
                    table.origin.display()
                );
            }
            log::debug!("{}: {} measure records", table.origin.display(), records.len());
            out.push(SourceTable::new("labor_market", records, descriptors)?);
        }
    }
    Ok(out)
}
