//! State policy and outcome tables: minimum wage, prescriber must-query
//! adoption, overdose mortality, opioid shipments.

use std::collections::BTreeMap;

use crate::error::PanelError;
use crate::keys::{GeoKey, Grain, TimeKey};
use crate::model::{Frame, Value};

/// Month index origin of `first_treatment_pmq`.
pub const TREATMENT_EPOCH_YEAR: i32 = 1960;

#[derive(Debug, Clone, PartialEq)]
pub struct MinimumWageRecord {
    pub jurisdiction: String,
    pub year: i32,
    pub value: Value,
}

/// Columns: `state_name`, `year`, `min_wage`.
pub fn minimum_wage_frame(
    records: &[MinimumWageRecord],
    excluded_jurisdictions: &[String],
    first_year: i32,
    last_year: i32,
) -> Result<Frame, PanelError> {
    let rows = records
        .iter()
        .filter(|r| !excluded_jurisdictions.contains(&r.jurisdiction))
        .filter(|r| (first_year..=last_year).contains(&r.year))
        .map(|r| {
            vec![
                Value::text(r.jurisdiction.as_str()),
                Value::Int(r.year as i64),
                r.value.coerce_numeric(),
            ]
        })
        .collect();
    Frame::new(
        "minimum_wage",
        vec!["state_name".into(), "year".into(), "min_wage".into()],
        rows,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyAdoption {
    pub state_name: String,
    /// Raw `M-YYYY` adoption date; `None` or blank when never adopted.
    pub must_query: Option<String>,
}

/// Parse an `M-YYYY` adoption date into `(month, year)`.
pub fn parse_adoption(raw: &str) -> Result<Option<(u8, i32)>, PanelError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("na") || trimmed.eq_ignore_ascii_case("n/a") {
        return Ok(None);
    }
    let (month, year) = trimmed
        .split_once('-')
        .ok_or_else(|| PanelError::malformed(raw, "expected M-YYYY"))?;
    let month: u8 = month
        .trim()
        .parse()
        .map_err(|_| PanelError::malformed(raw, "adoption month is not a number"))?;
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| PanelError::malformed(raw, "adoption year is not a number"))?;
    let time = TimeKey::monthly(year, month)?;
    Ok(time.month.map(|m| (m, time.year)))
}

/// Months since January 1960 of the first treated month.
pub fn treatment_index(month: u8, year: i32) -> i64 {
    (year - TREATMENT_EPOCH_YEAR) as i64 * 12 + month as i64
}

/// Columns: `state_name`, `pmq_month`, `pmq_year`, `first_treatment_pmq`.
/// Non-adopters keep a row with missing dates.
pub fn pdmp_frame(records: &[PolicyAdoption]) -> Result<Frame, PanelError> {
    let rows = records
        .iter()
        .map(|r| {
            let adoption = match &r.must_query {
                Some(raw) => parse_adoption(raw)?,
                None => None,
            };
            let mut row = vec![Value::text(r.state_name.as_str())];
            match adoption {
                Some((month, year)) => row.extend([
                    Value::Int(month as i64),
                    Value::Int(year as i64),
                    Value::Int(treatment_index(month, year)),
                ]),
                None => row.extend([Value::Missing, Value::Missing, Value::Missing]),
            }
            Ok(row)
        })
        .collect::<Result<Vec<_>, PanelError>>()?;
    Frame::new(
        "pdmp",
        vec![
            "state_name".into(),
            "pmq_month".into(),
            "pmq_year".into(),
            "first_treatment_pmq".into(),
        ],
        rows,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverdoseRecord {
    pub geo: GeoKey,
    pub year: i32,
    pub model_death_rate: Value,
    pub lbound_death_rate: Value,
    pub ubound_death_rate: Value,
    pub urban_rural: Value,
}

/// Columns: `fips`, `year`, `model_death_rate`, `lbound_death_rate`,
/// `ubound_death_rate`, `urban_rural`.
pub fn overdose_frame(records: &[OverdoseRecord]) -> Result<Frame, PanelError> {
    let rows = records
        .iter()
        .map(|r| {
            Ok(vec![
                Value::text(r.geo.at_grain(Grain::County)?.code()),
                Value::Int(r.year as i64),
                r.model_death_rate.coerce_numeric(),
                r.lbound_death_rate.coerce_numeric(),
                r.ubound_death_rate.coerce_numeric(),
                r.urban_rural.clone(),
            ])
        })
        .collect::<Result<Vec<_>, PanelError>>()?;
    Frame::new(
        "overdose",
        [
            "fips",
            "year",
            "model_death_rate",
            "lbound_death_rate",
            "ubound_death_rate",
            "urban_rural",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        rows,
    )
}

/// One monthly opioid shipment total for a buyer county.
#[derive(Debug, Clone, PartialEq)]
pub struct PrescriptionRecord {
    pub geo: GeoKey,
    pub time: TimeKey,
    pub dosage_unit: f64,
    pub mme_conversion_factor: f64,
    pub base_weight: f64,
}

/// Shipments summed per (geo at `grain`, year, month) within
/// `[first_year, last_year]`.
///
/// Columns: geo, `year`, `month`, `dosage_unit`, `mme_conversion_factor`,
/// `base_weight`.
pub fn prescriptions_frame(
    records: &[PrescriptionRecord],
    grain: Grain,
    first_year: i32,
    last_year: i32,
) -> Result<Frame, PanelError> {
    let mut sums: BTreeMap<(GeoKey, TimeKey), [f64; 3]> = BTreeMap::new();
    for r in records {
        if !(first_year..=last_year).contains(&r.time.year) {
            continue;
        }
        let cell = sums.entry((r.geo.at_grain(grain)?, r.time)).or_default();
        cell[0] += r.dosage_unit;
        cell[1] += r.mme_conversion_factor;
        cell[2] += r.base_weight;
    }

    let rows = sums
        .into_iter()
        .map(|((geo, time), [dosage, mme, weight])| {
            vec![
                Value::text(geo.code()),
                Value::Int(time.year as i64),
                time.month.map_or(Value::Missing, |m| Value::Int(m as i64)),
                Value::Float(dosage),
                Value::Float(mme),
                Value::Float(weight),
            ]
        })
        .collect();
    Frame::new(
        "prescriptions",
        vec![
            grain.geo_column().to_string(),
            "year".into(),
            "month".into(),
            "dosage_unit".into(),
            "mme_conversion_factor".into(),
            "base_weight".into(),
        ],
        rows,
    )
}
