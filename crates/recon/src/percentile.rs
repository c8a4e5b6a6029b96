//! Employment-weighted wage percentiles.
//!
//! Pooled mode treats each 3-digit industry's published percentile as a point
//! mass weighted by the cell's employment in that industry, then takes the
//! inverted-CDF weighted quantile over those points. This is a percentile of
//! percentiles, an approximation of the true cell distribution.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::Serialize;

use crate::coverage::{InsufficientWeight, TaxonomyMismatch};
use crate::error::PanelError;
use crate::keys::{GeoKey, Grain, IndustryCode, Taxonomy};
use crate::model::{Frame, Value};
use crate::sector::IndustryWeights;

pub const WAGE_PERCENTILES: [u8; 5] = [10, 25, 50, 75, 90];

pub type Percentiles = [Option<f64>; WAGE_PERCENTILES.len()];

pub fn percentile_column(p: u8) -> String {
    format!("h_pct{p}")
}

/// Published hourly-wage percentiles for one industry and year (all occupations).
#[derive(Debug, Clone, PartialEq)]
pub struct IndustryWage {
    pub year: i32,
    pub industry: IndustryCode,
    pub percentiles: Percentiles,
}

/// Published hourly-wage percentiles for one area (state) and year.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaWage {
    pub geo: GeoKey,
    pub year: i32,
    pub area_title: String,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WageEstimate {
    pub geo: GeoKey,
    pub year: i32,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone, Default)]
pub struct PooledWages {
    pub estimates: Vec<WageEstimate>,
    pub insufficient_weight: Vec<InsufficientWeight>,
    pub taxonomy_mismatches: Vec<TaxonomyMismatch>,
}

/// Inverted-CDF weighted percentile: the smallest value whose cumulative weight
/// fraction reaches `p / 100`.
///
/// Samples with a non-finite value or a non-positive weight are ignored;
/// `None` when nothing remains.
pub fn weighted_percentile(samples: &[(f64, f64)], p: f64) -> Option<f64> {
    let mut kept: Vec<(OrderedFloat<f64>, f64)> = samples
        .iter()
        .filter(|(v, w)| v.is_finite() && w.is_finite() && *w > 0.0)
        .map(|&(v, w)| (OrderedFloat(v), w))
        .collect();
    if kept.is_empty() {
        return None;
    }
    kept.sort_by_key(|(v, _)| *v);

    let total: f64 = kept.iter().map(|(_, w)| w).sum();
    let target = (p / 100.0).clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    for (v, w) in &kept {
        cumulative += w;
        if cumulative >= target {
            return Some(v.into_inner());
        }
    }
    kept.last().map(|(v, _)| v.into_inner())
}

fn wage_index(
    wages: &[IndustryWage],
) -> Result<BTreeMap<(i32, IndustryCode), Percentiles>, PanelError> {
    let mut index: BTreeMap<(i32, IndustryCode), Percentiles> = BTreeMap::new();
    for wage in wages {
        // Only 3-digit level rows take part in pooling.
        let industry = match wage.industry.naics_prefix(3) {
            Some(Ok(three)) if three.code == wage.industry.code => three,
            Some(_) => continue,
            None => wage.industry.clone(),
        };
        let key = (wage.year, industry);
        match index.get(&key) {
            Some(existing) if *existing == wage.percentiles => {}
            Some(_) => {
                return Err(PanelError::ConflictingMeasure {
                    table: "wage_distribution".into(),
                    variable: "h_pct".into(),
                    key: format!("{}|{}", key.1, key.0),
                });
            }
            None => {
                index.insert(key, wage.percentiles);
            }
        }
    }
    Ok(index)
}

/// Years whose wage rows carry no NAICS code while weights are NAICS.
fn wage_taxonomy_mismatches(
    weights: &IndustryWeights,
    wages: &[IndustryWage],
) -> Vec<TaxonomyMismatch> {
    let weight_years: BTreeSet<i32> = weights.keys().map(|(_, y)| *y).collect();
    let mut by_year: BTreeMap<i32, (usize, usize)> = BTreeMap::new();
    for wage in wages {
        let entry = by_year.entry(wage.year).or_default();
        match wage.industry.taxonomy {
            Taxonomy::Naics => entry.0 += 1,
            Taxonomy::Sic => entry.1 += 1,
        }
    }
    by_year
        .into_iter()
        .filter(|(year, (naics, sic))| weight_years.contains(year) && *naics == 0 && *sic > 0)
        .map(|(year, (_, sic))| {
            log::warn!("wage distribution {year}: {sic} SIC rows against NAICS employment, no bridge");
            TaxonomyMismatch {
                table: "wage_distribution".into(),
                year,
                expected: Taxonomy::Naics,
                found: Taxonomy::Sic,
                records: sic,
            }
        })
        .collect()
}

/// Pool industry percentiles into (geo, year) percentiles, weighting each
/// 3-digit industry by the cell's employment in it.
///
/// Cells where no percentile could be estimated are omitted and reported as
/// [`InsufficientWeight`].
pub fn pool_wage_percentiles(
    weights: &IndustryWeights,
    wages: &[IndustryWage],
) -> Result<PooledWages, PanelError> {
    let index = wage_index(wages)?;
    let taxonomy_mismatches = wage_taxonomy_mismatches(weights, wages);

    let cells: Vec<(&(GeoKey, i32), &BTreeMap<IndustryCode, f64>)> = weights.iter().collect();
    let results: Vec<Result<WageEstimate, InsufficientWeight>> = cells
        .par_iter()
        .map(|((geo, year), industries)| {
            let sub_cells: Vec<(f64, &Percentiles)> = industries
                .iter()
                .filter(|(_, emp)| emp.is_finite() && **emp > 0.0)
                .filter_map(|(industry, emp)| {
                    index.get(&(*year, industry.clone())).map(|pcts| (*emp, pcts))
                })
                .collect();

            let mut percentiles: Percentiles = [None; WAGE_PERCENTILES.len()];
            for (i, p) in WAGE_PERCENTILES.iter().enumerate() {
                let samples: Vec<(f64, f64)> = sub_cells
                    .iter()
                    .filter_map(|(emp, pcts)| pcts[i].map(|v| (v, *emp)))
                    .collect();
                percentiles[i] = weighted_percentile(&samples, f64::from(*p));
            }

            if percentiles.iter().all(Option::is_none) {
                Err(InsufficientWeight {
                    geo: geo.clone(),
                    year: *year,
                    weighted_sub_cells: industries.values().filter(|e| **e > 0.0).count(),
                })
            } else {
                Ok(WageEstimate {
                    geo: geo.clone(),
                    year: *year,
                    percentiles,
                })
            }
        })
        .collect();

    let mut pooled = PooledWages {
        taxonomy_mismatches,
        ..Default::default()
    };
    for result in results {
        match result {
            Ok(estimate) => pooled.estimates.push(estimate),
            Err(gap) => pooled.insufficient_weight.push(gap),
        }
    }
    if !pooled.insufficient_weight.is_empty() {
        log::warn!(
            "wage percentiles: {} cells without usable sub-cells",
            pooled.insufficient_weight.len()
        );
    }
    Ok(pooled)
}

/// Area percentiles used as-is, minus the excluded area titles.
pub fn direct_wage_percentiles(
    rows: &[AreaWage],
    excluded_areas: &[String],
) -> Result<Vec<WageEstimate>, PanelError> {
    let mut by_cell: BTreeMap<(GeoKey, i32), Percentiles> = BTreeMap::new();
    for row in rows {
        if excluded_areas.iter().any(|a| a == &row.area_title) {
            continue;
        }
        let key = (row.geo.clone(), row.year);
        match by_cell.get(&key) {
            Some(existing) if *existing == row.percentiles => {}
            Some(_) => {
                return Err(PanelError::ConflictingMeasure {
                    table: "wage_distribution".into(),
                    variable: "h_pct".into(),
                    key: format!("{}|{}", row.geo, row.year),
                });
            }
            None => {
                by_cell.insert(key, row.percentiles);
            }
        }
    }
    Ok(by_cell
        .into_iter()
        .map(|((geo, year), percentiles)| WageEstimate {
            geo,
            year,
            percentiles,
        })
        .collect())
}

/// Columns: geo, `year`, `h_pct10` .. `h_pct90`.
pub fn wage_frame(estimates: &[WageEstimate], grain: Grain) -> Result<Frame, PanelError> {
    let mut columns = vec![grain.geo_column().to_string(), "year".to_string()];
    columns.extend(WAGE_PERCENTILES.iter().map(|p| percentile_column(*p)));

    let rows = estimates
        .iter()
        .map(|e| {
            let mut row = vec![Value::text(e.geo.at_grain(grain)?.code()), Value::Int(e.year as i64)];
            row.extend(e.percentiles.iter().map(|p| Value::from_option(*p)));
            Ok(row)
        })
        .collect::<Result<Vec<_>, PanelError>>()?;
    Frame::new("wage_distribution", columns, rows)
}
