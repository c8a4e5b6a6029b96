//! SEER county population estimates: one fixed-width record per `value` cell.

use std::collections::BTreeMap;

use kaitz_recon::shares::PopulationCell;
use kaitz_recon::GeoKey;

use super::{at_row, SourceFile};
use crate::error::LoadError;
use crate::table::RawTable;

const RECORD_LEN: usize = 26;

struct Fields<'a> {
    year: &'a str,
    state_fip: &'a str,
    county_fip: &'a str,
    race: &'a str,
    origin: &'a str,
    sex: &'a str,
    age: &'a str,
    population: &'a str,
}

fn split(record: &str) -> Option<Fields<'_>> {
    if record.len() < RECORD_LEN || !record.is_ascii() {
        return None;
    }
    Some(Fields {
        year: &record[0..4],
        state_fip: &record[6..8],
        county_fip: &record[8..11],
        race: &record[13..14],
        origin: &record[14..15],
        sex: &record[15..16],
        age: &record[16..18],
        population: &record[18..26],
    })
}

fn digits<T: std::str::FromStr>(table: &RawTable, row: usize, field: &str, raw: &str) -> Result<T, LoadError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| table.field_error(row, format!("invalid {field} '{raw}'")))
}

/// Population cells summed over registries, per county and category.
pub fn extract_demographics(files: &[SourceFile]) -> Result<Vec<PopulationCell>, LoadError> {
    let mut totals: BTreeMap<(GeoKey, i32, u8, u8, u8, u8), f64> = BTreeMap::new();
    for file in files {
        for table in &file.tables {
            let value = table.require("value")?;
            for row in 0..table.len() {
                let raw = table.cell(row, value);
                let fields = split(raw)
                    .ok_or_else(|| table.field_error(row, format!("record '{raw}' shorter than {RECORD_LEN}")))?;
                let geo = at_row(table, row, GeoKey::county_parts(fields.state_fip, fields.county_fip))?;
                let key = (
                    geo,
                    digits::<i32>(table, row, "year", fields.year)?,
                    digits::<u8>(table, row, "race", fields.race)?,
                    digits::<u8>(table, row, "origin", fields.origin)?,
                    digits::<u8>(table, row, "sex", fields.sex)?,
                    digits::<u8>(table, row, "age", fields.age)?,
                );
                let population: f64 = digits::<u64>(table, row, "population", fields.population)? as f64;
                *totals.entry(key).or_default() += population;
            }
            log::debug!("{}: {} records", table.origin.display(), table.len());
        }
    }

    Ok(totals
        .into_iter()
        .map(|((geo, year, race, origin, sex, age), population)| PopulationCell {
            geo,
            year,
            race,
            origin,
            sex,
            age,
            population,
        })
        .collect())
}
