//! Sector composition: 2-digit NAICS employment shares and the 3-digit
//! employment weights used to pool wage percentiles.

use std::collections::BTreeMap;

use crate::coverage::TaxonomyMismatch;
use crate::error::PanelError;
use crate::keys::{GeoKey, Grain, IndustryCode, Taxonomy};
use crate::shares::{compute_shares, Dimension, Observation, ShareSpec, ShareTable};

pub const SECTOR_PRECISION: u32 = 4;

/// County employment in one detailed industry for one year.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorEmployment {
    pub geo: GeoKey,
    pub year: i32,
    pub industry: IndustryCode,
    pub emp: f64,
}

/// Employment per 3-digit NAICS industry, per (geo, year) cell.
pub type IndustryWeights = BTreeMap<(GeoKey, i32), BTreeMap<IndustryCode, f64>>;

pub fn sector_spec() -> ShareSpec {
    ShareSpec {
        table: "sector_composition".into(),
        dimensions: vec![Dimension::observed("naics2", "emp_")],
        precision: SECTOR_PRECISION,
        column_suffix: "_ratio".into(),
        total_column: None,
    }
}

/// Split records into NAICS records and one mismatch entry per SIC year.
fn naics_only<'a>(
    records: &'a [SectorEmployment],
    mismatches: &mut Vec<TaxonomyMismatch>,
) -> Vec<&'a SectorEmployment> {
    let mut sic_years: BTreeMap<i32, usize> = BTreeMap::new();
    let kept = records
        .iter()
        .filter(|r| {
            if r.industry.taxonomy == Taxonomy::Naics {
                true
            } else {
                *sic_years.entry(r.year).or_insert(0) += 1;
                false
            }
        })
        .collect();
    for (year, records) in sic_years {
        log::warn!("sector composition {year}: {records} SIC records excluded, no NAICS bridge");
        let mismatch = TaxonomyMismatch {
            table: "sector_composition".into(),
            year,
            expected: Taxonomy::Naics,
            found: Taxonomy::Sic,
            records,
        };
        if !mismatches.contains(&mismatch) {
            mismatches.push(mismatch);
        }
    }
    kept
}

/// `emp_{nn}_ratio` shares of each 2-digit sector in total cell employment.
pub fn sector_shares(
    records: &[SectorEmployment],
    grain: Grain,
    mismatches: &mut Vec<TaxonomyMismatch>,
) -> Result<ShareTable, PanelError> {
    let observations = naics_only(records, mismatches)
        .into_iter()
        .filter_map(|r| {
            r.industry.naics_prefix(2).map(|prefix| {
                prefix.map(|code| Observation {
                    geo: r.geo.clone(),
                    year: r.year,
                    categories: vec![code.code],
                    value: r.emp,
                })
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    compute_shares(&sector_spec(), &observations, grain)
}

/// Employment per 3-digit NAICS industry per cell, rolled up to `grain`.
pub fn industry_weights(
    records: &[SectorEmployment],
    grain: Grain,
    mismatches: &mut Vec<TaxonomyMismatch>,
) -> Result<IndustryWeights, PanelError> {
    let mut weights = IndustryWeights::new();
    for r in naics_only(records, mismatches) {
        let Some(industry) = r.industry.naics_prefix(3).transpose()? else {
            continue;
        };
        *weights
            .entry((r.geo.at_grain(grain)?, r.year))
            .or_default()
            .entry(industry)
            .or_insert(0.0) += r.emp;
    }
    Ok(weights)
}
