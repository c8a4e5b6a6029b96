//! State policy and mortality tables: minimum wage, prescriber must-query
//! adoption, NCHS drug-poisoning mortality.

use kaitz_recon::policy::{parse_adoption, MinimumWageRecord, OverdoseRecord, PolicyAdoption};
use kaitz_recon::{GeoKey, Value};

use super::{at_row, parse_year, SourceFile};
use crate::error::LoadError;

pub fn extract_minimum_wage(files: &[SourceFile]) -> Result<Vec<MinimumWageRecord>, LoadError> {
    let mut out = Vec::new();
    for table in files.iter().flat_map(|f| &f.tables) {
        let jurisdiction = table.require("State or otherjurisdiction")?;
        let year = table.require("Year")?;
        let value = table.require("Value")?;
        for row in 0..table.len() {
            out.push(MinimumWageRecord {
                jurisdiction: table.cell(row, jurisdiction).to_string(),
                year: parse_year(table, row, year)?,
                value: Value::parse(table.cell(row, value)),
            });
        }
    }
    Ok(out)
}

/// Adoption dates are checked here so a bad date points at its line.
pub fn extract_pdmp(files: &[SourceFile]) -> Result<Vec<PolicyAdoption>, LoadError> {
    let mut out = Vec::new();
    for table in files.iter().flat_map(|f| &f.tables) {
        let state = table.require("state")?;
        let must_query = table.require("Prescriber must-query")?;
        for row in 0..table.len() {
            let raw = table.cell(row, must_query);
            at_row(table, row, parse_adoption(raw))?;
            out.push(PolicyAdoption {
                state_name: table.cell(row, state).to_string(),
                must_query: (!raw.is_empty()).then(|| raw.to_string()),
            });
        }
    }
    Ok(out)
}

pub fn extract_overdose(files: &[SourceFile]) -> Result<Vec<OverdoseRecord>, LoadError> {
    let mut out = Vec::new();
    for table in files.iter().flat_map(|f| &f.tables) {
        let fips = table.require("FIPS")?;
        let year = table.require("Year")?;
        let rate = table.require("Model-based Death Rate")?;
        let lower = table.require("Lower Confidence Limit")?;
        let upper = table.require("Upper Confidence Limit")?;
        let urban = table.require("Urban/Rural Category")?;
        for row in 0..table.len() {
            out.push(OverdoseRecord {
                geo: at_row(table, row, GeoKey::county(table.cell(row, fips)))?,
                year: parse_year(table, row, year)?,
                model_death_rate: Value::parse(table.cell(row, rate)),
                lbound_death_rate: Value::parse(table.cell(row, lower)),
                ubound_death_rate: Value::parse(table.cell(row, upper)),
                urban_rural: Value::parse(table.cell(row, urban)),
            });
        }
    }
    Ok(out)
}
