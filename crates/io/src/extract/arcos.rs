//! ARCOS opioid shipments, keyed by buyer county name and state abbreviation.

use std::collections::BTreeMap;

use kaitz_recon::policy::PrescriptionRecord;
use kaitz_recon::{GeoKey, TimeKey};

use super::{at_row, parse_amount, parse_year, SourceFile};
use crate::error::LoadError;
use crate::table::RawTable;

/// `(BUYER_COUNTY, BUYER_STATE)` → county FIPS.
#[derive(Debug, Clone, Default)]
pub struct ArcosCrosswalk {
    counties: BTreeMap<(String, String), GeoKey>,
}

fn buyer_key(county: &str, state: &str) -> (String, String) {
    (county.trim().to_ascii_uppercase(), state.trim().to_ascii_uppercase())
}

impl ArcosCrosswalk {
    pub fn from_table(table: &RawTable) -> Result<Self, LoadError> {
        let county = table.require("BUYER_COUNTY")?;
        let state = table.require("BUYER_STATE")?;
        let fips = table.require("countyfips")?;
        let mut counties = BTreeMap::new();
        for row in 0..table.len() {
            let geo = at_row(table, row, GeoKey::county(table.cell(row, fips)))?;
            counties.insert(buyer_key(table.cell(row, county), table.cell(row, state)), geo);
        }
        Ok(Self { counties })
    }

    pub fn len(&self) -> usize {
        self.counties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counties.is_empty()
    }

    pub fn lookup(&self, county: &str, state: &str) -> Option<&GeoKey> {
        self.counties.get(&buyer_key(county, state))
    }
}

/// One record per shipment row whose buyer is in the crosswalk; the rest are
/// dropped with a warning.
pub fn extract_prescriptions(
    files: &[SourceFile],
    crosswalk: &ArcosCrosswalk,
) -> Result<Vec<PrescriptionRecord>, LoadError> {
    let mut out = Vec::new();
    for table in files.iter().flat_map(|f| &f.tables) {
        let county = table.require("BUYER_COUNTY")?;
        let state = table.require("BUYER_STATE")?;
        let year = table.require("year")?;
        let month = table.require("month")?;
        let dosage = table.require("DOSAGE_UNIT")?;
        let mme = table.require("MME_CONVERSION_FACTOR")?;
        let weight = table.require("CALC_BASE_WT_IN_GM")?;

        let mut unmatched = 0usize;
        for row in 0..table.len() {
            let Some(geo) = crosswalk.lookup(table.cell(row, county), table.cell(row, state)) else {
                unmatched += 1;
                continue;
            };
            let m: u8 = table
                .cell(row, month)
                .parse()
                .map_err(|_| table.field_error(row, format!("invalid month '{}'", table.cell(row, month))))?;
            out.push(PrescriptionRecord {
                geo: geo.clone(),
                time: at_row(table, row, TimeKey::monthly(parse_year(table, row, year)?, m))?,
                dosage_unit: parse_amount(table, row, dosage)?,
                mme_conversion_factor: parse_amount(table, row, mme)?,
                base_weight: parse_amount(table, row, weight)?,
            });
        }
        if unmatched > 0 {
            log::warn!(
                "{}: {unmatched} shipment rows without a crosswalk county dropped",
                table.origin.display()
            );
        }
    }
    Ok(out)
}
