//! Ratio/share aggregation: per (geo, year) cell, each subgroup's sum divided
//! by the cell total.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::PanelError;
use crate::keys::{GeoKey, Grain};
use crate::model::{round_to, Frame, Value};

pub const DEMOGRAPHIC_PRECISION: u32 = 5;

/// One subgroup share.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Share {
    /// Rounded ratio. NaN when the cell total is zero.
    Present(f64),
    /// Observed with a zero sum.
    MeasuredZero,
    /// No observation of this subgroup in the cell.
    Absent,
}

impl Share {
    fn from_sum(sum: Option<f64>, total: f64, precision: u32) -> Self {
        match sum {
            None => Self::Absent,
            Some(_) if total == 0.0 => Self::Present(f64::NAN),
            Some(s) if s == 0.0 => Self::MeasuredZero,
            Some(s) => Self::Present(round_to(s / total, precision)),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Present(x) => Some(*x),
            Self::MeasuredZero => Some(0.0),
            Self::Absent => None,
        }
    }

    pub fn to_value(self) -> Value {
        Value::from_option(self.as_f64())
    }
}

/// How a dimension's categories become columns.
#[derive(Debug, Clone)]
pub enum Categories {
    /// Fixed `(code, label)` pairs in output order; other codes are ignored.
    Declared(Vec<(String, String)>),
    /// Every observed code, labelled `{prefix}{code}`, in ascending order
    /// (numeric codes compare numerically).
    Observed { label_prefix: String },
}

#[derive(Debug, Clone)]
pub struct Dimension {
    pub name: String,
    pub categories: Categories,
}

impl Dimension {
    pub fn declared(name: &str, pairs: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            categories: Categories::Declared(
                pairs
                    .iter()
                    .map(|(c, l)| (c.to_string(), l.to_string()))
                    .collect(),
            ),
        }
    }

    pub fn observed(name: &str, label_prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            categories: Categories::Observed {
                label_prefix: label_prefix.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShareSpec {
    pub table: String,
    pub dimensions: Vec<Dimension>,
    pub precision: u32,
    pub column_suffix: String,
    /// Output column carrying the raw cell total, if any.
    pub total_column: Option<String>,
}

/// One observation: a value tagged with one category code per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub geo: GeoKey,
    pub year: i32,
    pub categories: Vec<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellShares {
    pub total: f64,
    pub shares: Vec<Share>,
}

#[derive(Debug, Clone)]
pub struct ShareTable {
    pub name: String,
    pub grain: Grain,
    pub total_column: Option<String>,
    pub columns: Vec<String>,
    pub cells: BTreeMap<(GeoKey, i32), CellShares>,
}

impl ShareTable {
    pub fn share(&self, geo: &GeoKey, year: i32, column: &str) -> Option<Share> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.cells
            .get(&(geo.clone(), year))
            .map(|cell| cell.shares[idx])
    }

    /// Columns: geo, `year`, the total column (if configured), then one column
    /// per share.
    pub fn to_frame(&self) -> Result<Frame, PanelError> {
        let mut columns = vec![self.grain.geo_column().to_string(), "year".to_string()];
        columns.extend(self.total_column.iter().cloned());
        columns.extend(self.columns.iter().cloned());

        let rows = self
            .cells
            .iter()
            .map(|((geo, year), cell)| {
                let mut row = vec![Value::text(geo.code()), Value::Int(*year as i64)];
                if self.total_column.is_some() {
                    row.push(Value::Float(cell.total));
                }
                row.extend(cell.shares.iter().map(|s| s.to_value()));
                row
            })
            .collect();
        Frame::new(self.name.clone(), columns, rows)
    }
}

fn category_order(a: &String, b: &String) -> std::cmp::Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Compute shares for every (geo, year) cell with at least one observation.
///
/// Observations are first rolled up to `grain`.
pub fn compute_shares(
    spec: &ShareSpec,
    observations: &[Observation],
    grain: Grain,
) -> Result<ShareTable, PanelError> {
    let dims = spec.dimensions.len();

    struct Cell {
        total: f64,
        sums: Vec<BTreeMap<String, f64>>,
    }

    let mut cells: BTreeMap<(GeoKey, i32), Cell> = BTreeMap::new();
    let mut observed: Vec<BTreeSet<String>> = vec![BTreeSet::new(); dims];

    for (i, obs) in observations.iter().enumerate() {
        if obs.categories.len() != dims {
            return Err(PanelError::RowWidth {
                table: spec.table.clone(),
                row: i,
                found: obs.categories.len(),
                expected: dims,
            });
        }
        let geo = obs.geo.at_grain(grain)?;
        let cell = cells.entry((geo, obs.year)).or_insert_with(|| Cell {
            total: 0.0,
            sums: vec![BTreeMap::new(); dims],
        });
        cell.total += obs.value;
        for (d, code) in obs.categories.iter().enumerate() {
            *cell.sums[d].entry(code.clone()).or_insert(0.0) += obs.value;
            observed[d].insert(code.clone());
        }
    }

    // (dimension, code) for every output column, in output order.
    let mut layout: Vec<(usize, String)> = Vec::new();
    let mut columns = Vec::new();
    for (d, dim) in spec.dimensions.iter().enumerate() {
        match &dim.categories {
            Categories::Declared(pairs) => {
                for (code, label) in pairs {
                    layout.push((d, code.clone()));
                    columns.push(format!("{label}{}", spec.column_suffix));
                }
            }
            Categories::Observed { label_prefix } => {
                let mut codes: Vec<String> = observed[d].iter().cloned().collect();
                codes.sort_by(category_order);
                for code in codes {
                    columns.push(format!("{label_prefix}{code}{}", spec.column_suffix));
                    layout.push((d, code));
                }
            }
        }
    }

    let cells = cells
        .into_iter()
        .map(|(key, cell)| {
            let shares = layout
                .iter()
                .map(|(d, code)| {
                    Share::from_sum(cell.sums[*d].get(code).copied(), cell.total, spec.precision)
                })
                .collect();
            (
                key,
                CellShares {
                    total: cell.total,
                    shares,
                },
            )
        })
        .collect::<BTreeMap<_, _>>();

    log::debug!(
        "shares '{}': {} cells x {} columns",
        spec.table,
        cells.len(),
        columns.len()
    );

    Ok(ShareTable {
        name: spec.table.clone(),
        grain,
        total_column: spec.total_column.clone(),
        columns,
        cells,
    })
}

// ---------------------------------------------------------------------------
// Demographics
// ---------------------------------------------------------------------------

/// One decoded population count: a county × year × race × origin × sex × age cell.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationCell {
    pub geo: GeoKey,
    pub year: i32,
    pub race: u8,
    pub origin: u8,
    pub sex: u8,
    pub age: u8,
    pub population: f64,
}

pub fn demographics_spec() -> ShareSpec {
    ShareSpec {
        table: "demographics".into(),
        dimensions: vec![
            Dimension::declared("race", &[("1", "w"), ("2", "b"), ("3", "na"), ("4", "a")]),
            Dimension::declared("origin", &[("0", "nh"), ("1", "hi")]),
            Dimension::declared("sex", &[("1", "male"), ("2", "female")]),
            Dimension::observed("age", "age"),
        ],
        precision: DEMOGRAPHIC_PRECISION,
        column_suffix: "_population_ratio".into(),
        total_column: Some("population".into()),
    }
}

pub fn population_observations(cells: &[PopulationCell]) -> Vec<Observation> {
    cells
        .iter()
        .map(|c| Observation {
            geo: c.geo.clone(),
            year: c.year,
            categories: vec![
                c.race.to_string(),
                c.origin.to_string(),
                c.sex.to_string(),
                c.age.to_string(),
            ],
            value: c.population,
        })
        .collect()
}

/// Population shares by race, origin, sex and age, plus the raw `population` total.
pub fn demographic_shares(cells: &[PopulationCell], grain: Grain) -> Result<ShareTable, PanelError> {
    compute_shares(&demographics_spec(), &population_observations(cells), grain)
}
