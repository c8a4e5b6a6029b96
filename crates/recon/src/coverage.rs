use serde::Serialize;

use crate::join::{JoinDiagnostic, JoinKind};
use crate::keys::{GeoKey, Taxonomy};

/// A (geo, year) cell whose wage percentiles could not be estimated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsufficientWeight {
    pub geo: GeoKey,
    pub year: i32,
    /// Sub-cells with positive weight before percentile values were checked.
    pub weighted_sub_cells: usize,
}

/// A year in which two sources use different industry taxonomies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonomyMismatch {
    pub table: String,
    pub year: i32,
    pub expected: Taxonomy,
    pub found: Taxonomy,
    pub records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub join_steps: usize,
    pub inner_steps: usize,
    pub steps_with_attrition: usize,
    pub rows_dropped: usize,
    pub insufficient_weight_cells: usize,
    pub taxonomy_mismatches: usize,
    pub panel_rows: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageReport {
    pub summary: CoverageSummary,
    pub steps: Vec<JoinDiagnostic>,
    pub insufficient_weight: Vec<InsufficientWeight>,
    pub taxonomy_mismatches: Vec<TaxonomyMismatch>,
}

impl CoverageReport {
    /// Total rows removed by inner joins.
    pub fn attrition(&self) -> usize {
        self.summary.rows_dropped
    }
}

/// Compute summary counts from the recorded diagnostics.
pub fn compute_summary(
    steps: &[JoinDiagnostic],
    insufficient_weight: &[InsufficientWeight],
    taxonomy_mismatches: &[TaxonomyMismatch],
    panel_rows: usize,
) -> CoverageSummary {
    let mut summary = CoverageSummary {
        join_steps: steps.len(),
        insufficient_weight_cells: insufficient_weight.len(),
        taxonomy_mismatches: taxonomy_mismatches.len(),
        panel_rows,
        ..Default::default()
    };

    for step in steps {
        if step.kind == JoinKind::Inner {
            summary.inner_steps += 1;
        }
        if step.has_attrition() {
            summary.steps_with_attrition += 1;
            summary.rows_dropped += step.rows_dropped;
        }
    }

    summary
}
