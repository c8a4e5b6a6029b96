use serde::Serialize;

use crate::config::{PanelConfig, WageMode};
use crate::coverage::{compute_summary, CoverageReport, TaxonomyMismatch};
use crate::derived::{add_kaitz, add_lab_force_rate, add_working_age};
use crate::error::PanelError;
use crate::join::{join, JoinDiagnostic, JoinKind};
use crate::keys::Grain;
use crate::labor::combine_measures;
use crate::model::{Frame, Panel, PanelMeta};
use crate::percentile::{direct_wage_percentiles, pool_wage_percentiles, wage_frame};
use crate::policy::{minimum_wage_frame, overdose_frame, pdmp_frame, prescriptions_frame};
use crate::sector::{industry_weights, sector_shares};
use crate::shares::demographic_shares;
use crate::sources::{PanelInputs, WageInput};

#[derive(Debug, Clone, Serialize)]
pub struct PanelResult {
    pub meta: PanelMeta,
    #[serde(skip)]
    pub panel: Panel,
    pub coverage: CoverageReport,
}

/// The running join: the accumulated frame plus one diagnostic per step.
struct Merge {
    frame: Frame,
    steps: Vec<JoinDiagnostic>,
}

impl Merge {
    fn join(&mut self, right: &Frame, on: &[&str], kind: JoinKind, step: &str) -> Result<(), PanelError> {
        let outcome = join(&self.frame, right, on, kind, step).map_err(|e| e.in_stage(step))?;
        if outcome.diagnostic.has_attrition() {
            log::warn!(
                "{step}: {} of {} rows dropped ({} distinct keys)",
                outcome.diagnostic.rows_dropped,
                outcome.diagnostic.rows_in,
                outcome.diagnostic.dropped_keys.len()
            );
        } else {
            log::info!("{step}: {} rows", outcome.diagnostic.rows_out);
        }
        self.frame = outcome.frame;
        self.steps.push(outcome.diagnostic);
        Ok(())
    }

    fn derive<F>(&mut self, stage: &str, f: F) -> Result<(), PanelError>
    where
        F: FnOnce(Frame) -> Result<Frame, PanelError>,
    {
        let frame = std::mem::replace(&mut self.frame, Frame::empty("panel", Vec::new()));
        self.frame = f(frame).map_err(|e| e.in_stage(stage))?;
        Ok(())
    }
}

fn required<'a, T>(value: Option<&'a T>, name: &str, grain: Grain) -> Result<&'a T, PanelError> {
    value.ok_or_else(|| PanelError::SourceFailed {
        name: name.to_string(),
        message: format!("required at {grain} grain"),
    })
}

/// Build the panel per config from pre-loaded inputs. Returns the panel and
/// its coverage report.
pub fn run(config: &PanelConfig, inputs: &PanelInputs) -> Result<PanelResult, PanelError> {
    let grain = config.grain;
    let geo = grain.geo_column();
    let (first, last) = (config.initial_year, config.last_year);
    let in_range = |year: i32| (first..=last).contains(&year);
    let mut mismatches: Vec<TaxonomyMismatch> = Vec::new();

    // 1. Labor-market outcomes
    let labor = combine_measures("labor_market", &inputs.labor_market, grain, first, last)
        .map_err(|e| e.in_stage("labor_market"))?;
    let mut merge = Merge {
        frame: labor.frame,
        steps: labor.steps,
    };

    // 2-3. Demographics + working-age population
    let demo_cells: Vec<_> = inputs
        .demographics
        .iter()
        .filter(|c| in_range(c.year))
        .cloned()
        .collect();
    let demographics = demographic_shares(&demo_cells, grain)
        .and_then(|t| t.to_frame())
        .and_then(|f| add_working_age(f, config.working_age.first_bin, config.working_age.last_bin))
        .map_err(|e| e.in_stage("demographics"))?;
    log::info!("demographics: {} cells", demographics.len());
    merge.join(&demographics, &[geo, "year"], JoinKind::Inner, "demographics")?;
    merge.derive("lab_force_rate", add_lab_force_rate)?;

    // 4. Minimum wage
    let minimum_wage = minimum_wage_frame(
        &inputs.minimum_wage,
        &config.minimum_wage.excluded_jurisdictions,
        first,
        last,
    )
    .map_err(|e| e.in_stage("minimum_wage"))?;
    merge.join(&minimum_wage, &["state_name", "year"], JoinKind::Inner, "minimum_wage")?;

    // 5. Prescriber must-query adoption
    let pdmp = pdmp_frame(&inputs.pdmp).map_err(|e| e.in_stage("pdmp"))?;
    merge.join(&pdmp, &["state_name"], JoinKind::Inner, "pdmp")?;

    // State panel: job openings
    if grain == Grain::State {
        let tables = required(inputs.job_openings.as_ref(), "job_openings", grain)?;
        let jobs = combine_measures("job_openings", tables, grain, first, last)
            .map_err(|e| e.in_stage("job_openings"))?;
        merge.steps.extend(jobs.steps);
        merge.join(&jobs.frame, &[geo, "year", "month"], JoinKind::Inner, "job_openings")?;
    }

    // 6. Sector composition
    let sector: Vec<_> = inputs.sector.iter().filter(|r| in_range(r.year)).cloned().collect();
    let shares = sector_shares(&sector, grain, &mut mismatches)
        .and_then(|t| t.to_frame())
        .map_err(|e| e.in_stage("sector_composition"))?;
    merge.join(&shares, &[geo, "year"], JoinKind::Inner, "sector_composition")?;

    // 7. Wage percentiles
    let mut insufficient_weight = Vec::new();
    let estimates = match (&inputs.wages, config.wages.mode) {
        (WageInput::Industry(rows), WageMode::Pooled) => {
            let weights = industry_weights(&sector, grain, &mut mismatches)
                .map_err(|e| e.in_stage("wage_distribution"))?;
            let pooled = pool_wage_percentiles(&weights, rows)
                .map_err(|e| e.in_stage("wage_distribution"))?;
            insufficient_weight = pooled.insufficient_weight;
            mismatches.extend(pooled.taxonomy_mismatches);
            pooled.estimates
        }
        (WageInput::Area(rows), WageMode::Direct) => {
            direct_wage_percentiles(rows, &config.wages.excluded_areas)
                .map_err(|e| e.in_stage("wage_distribution"))?
        }
        (_, mode) => {
            return Err(PanelError::SourceFailed {
                name: "wage_distribution".into(),
                message: format!("wage rows do not match wages.mode = \"{mode}\""),
            }
            .in_stage("wage_distribution"));
        }
    };
    let estimates: Vec<_> = estimates.into_iter().filter(|e| in_range(e.year)).collect();
    let wages = wage_frame(&estimates, grain).map_err(|e| e.in_stage("wage_distribution"))?;
    merge.join(&wages, &[geo, "year"], JoinKind::Inner, "wage_distribution")?;

    // 8. Overdose mortality (county) / opioid shipments (state)
    match grain {
        Grain::County => {
            let records = required(inputs.overdose.as_ref(), "overdose", grain)?;
            let overdose = overdose_frame(records).map_err(|e| e.in_stage("overdose"))?;
            merge.join(&overdose, &[geo, "year"], JoinKind::Inner, "overdose")?;
        }
        Grain::State => {
            if let Some(records) = &inputs.prescriptions {
                let prescriptions =
                    prescriptions_frame(records, grain, config.prescriptions_first_year(), last)
                        .map_err(|e| e.in_stage("prescriptions"))?;
                merge.join(&prescriptions, &[geo, "year", "month"], JoinKind::Left, "prescriptions")?;
            }
        }
    }

    // 9. Log wages + Kaitz indices
    merge.derive("kaitz", add_kaitz)?;

    let panel = Panel::from_frame(&merge.frame, grain).map_err(|e| e.in_stage("panel"))?;
    log::info!("panel '{}': {} rows x {} columns", config.name, panel.len(), panel.columns().len());

    let summary = compute_summary(&merge.steps, &insufficient_weight, &mismatches, panel.len());
    Ok(PanelResult {
        meta: PanelMeta {
            config_name: config.name.clone(),
            grain,
            initial_year: first,
            last_year: last,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            rows: panel.len(),
            columns: panel.columns().len(),
        },
        coverage: CoverageReport {
            summary,
            steps: merge.steps,
            insufficient_weight,
            taxonomy_mismatches: mismatches,
        },
        panel,
    })
}
