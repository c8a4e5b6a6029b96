//! Job openings and labor turnover (JOLTS) state series.

use kaitz_recon::{GeoKey, MeasureRecord, SourceTable, TimeKey, Value};

use super::{at_row, parse_year, SourceFile};
use crate::error::LoadError;

const SERIES_ID_LEN: usize = 21;
const NON_STATE_CODES: [&str; 5] = ["00", "MW", "NE", "SO", "WE"];

pub fn element_name(code: &str) -> Option<&'static str> {
    match code {
        "HI" => Some("hires"),
        "JO" => Some("job_openings"),
        "LD" => Some("layoffs"),
        "OS" => Some("other_separations"),
        "QU" => Some("quits"),
        "TS" => Some("total_separations"),
        "UO" => Some("unemployed_per_job_opening_ratio"),
        _ => None,
    }
}

/// Variable for a series id, or `None` when the series is out of scope
/// (not seasonally adjusted, an industry or size-class breakdown, national or
/// regional).
fn series_variable(id: &str) -> Option<(String, &str)> {
    if &id[2..3] != "S" || &id[3..9] != "000000" || &id[16..18] != "00" {
        return None;
    }
    let state = &id[9..11];
    if NON_STATE_CODES.contains(&state) {
        return None;
    }
    let element = element_name(&id[18..20])?;
    let variable = match &id[20..21] {
        "L" => element.to_string(),
        "R" => format!("{element}_rate"),
        _ => return None,
    };
    Some((variable, state))
}

pub fn extract_job_openings(files: &[SourceFile]) -> Result<Vec<SourceTable>, LoadError> {
    let mut out = Vec::new();
    for file in files {
        for table in &file.tables {
            let series = table.require("series_id")?;
            let year = table.require("year")?;
            let period = table.require("period")?;
            let value = table.require("value")?;

            let mut records = Vec::new();
            for row in 0..table.len() {
                let id = table.cell(row, series);
                if id.len() != SERIES_ID_LEN || !id.is_ascii() {
                    return Err(table.field_error(row, format!("malformed series id '{id}'")));
                }
                let Some((variable, state)) = series_variable(id) else {
                    continue;
                };
                let y = parse_year(table, row, year)?;
                let Some(time) = at_row(table, row, TimeKey::from_bls_period(y, table.cell(row, period)))? else {
                    continue;
                };
                records.push(MeasureRecord {
                    geo: at_row(table, row, GeoKey::state(state))?,
                    time,
                    variable,
                    value: Value::parse(table.cell(row, value)),
                });
            }
            log::debug!("{}: {} measure records", table.origin.display(), records.len());
            out.push(SourceTable::new("job_openings", records, Default::default())?);
        }
    }
    Ok(out)
}
