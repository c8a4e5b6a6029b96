//! Typed records handed to the engine by the extractors.

use crate::model::SourceTable;
use crate::percentile::{AreaWage, IndustryWage};
use crate::policy::{MinimumWageRecord, OverdoseRecord, PolicyAdoption, PrescriptionRecord};
use crate::sector::SectorEmployment;
use crate::shares::PopulationCell;

/// Wage distribution rows, by publication level.
#[derive(Debug, Clone)]
pub enum WageInput {
    /// National percentiles per industry, pooled with employment weights.
    Industry(Vec<IndustryWage>),
    /// Percentiles per area, used directly.
    Area(Vec<AreaWage>),
}

impl WageInput {
    pub fn len(&self) -> usize {
        match self {
            Self::Industry(rows) => rows.len(),
            Self::Area(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WageInput {
    fn default() -> Self {
        Self::Industry(Vec::new())
    }
}

/// Everything one panel build consumes, already decoded and key-normalized.
#[derive(Debug, Clone, Default)]
pub struct PanelInputs {
    pub labor_market: Vec<SourceTable>,
    pub demographics: Vec<PopulationCell>,
    pub minimum_wage: Vec<MinimumWageRecord>,
    pub pdmp: Vec<PolicyAdoption>,
    pub sector: Vec<SectorEmployment>,
    pub wages: WageInput,
    pub overdose: Option<Vec<OverdoseRecord>>,
    pub job_openings: Option<Vec<SourceTable>>,
    pub prescriptions: Option<Vec<PrescriptionRecord>>,
}
