//! Derived panel columns: working-age population, labor-force participation,
//! log wages and Kaitz indices.

use crate::error::PanelError;
use crate::model::{round_to, Frame, Value};
use crate::percentile::{percentile_column, WAGE_PERCENTILES};

pub const LAB_FORCE_RATE_PRECISION: u32 = 4;

pub fn age_ratio_column(bin: u8) -> String {
    format!("age{bin}_population_ratio")
}

fn numeric(frame: &Frame, row: &[Value], column: &str) -> Option<f64> {
    frame.column_index(column).and_then(|i| row[i].as_f64())
}

/// Add `working_age_pop_weight` (sum of the age-bin ratios `first_bin..=last_bin`)
/// and `working_age_pop` (weight × `population`).
///
/// Absent bins are skipped and a row with no observed bin gets a missing
/// weight rather than zero. A NaN bin (zero population total) makes the
/// weight NaN.
pub fn add_working_age(frame: Frame, first_bin: u8, last_bin: u8) -> Result<Frame, PanelError> {
    frame.require_column("population")?;
    let bins: Vec<String> = (first_bin..=last_bin).map(age_ratio_column).collect();

    frame
        .with_column("working_age_pop_weight", |f, row| {
            let present: Vec<f64> = bins.iter().filter_map(|b| numeric(f, row, b)).collect();
            if present.is_empty() {
                Value::Missing
            } else {
                Value::Float(present.iter().sum())
            }
        })?
        .with_column("working_age_pop", |f, row| {
            match (
                numeric(f, row, "working_age_pop_weight"),
                numeric(f, row, "population"),
            ) {
                (Some(w), Some(p)) => Value::Float(w * p),
                _ => Value::Missing,
            }
        })
}

/// `lab_force_rate = round(labor_force / working_age_pop × 100, 4)`.
/// A zero denominator yields NaN.
pub fn add_lab_force_rate(frame: Frame) -> Result<Frame, PanelError> {
    frame.require_column("labor_force")?;
    frame.require_column("working_age_pop")?;
    frame.with_column("lab_force_rate", |f, row| {
        match (numeric(f, row, "labor_force"), numeric(f, row, "working_age_pop")) {
            (Some(_), Some(wap)) if wap == 0.0 => Value::Float(f64::NAN),
            (Some(lf), Some(wap)) => Value::Float(round_to(lf / wap * 100.0, LAB_FORCE_RATE_PRECISION)),
            _ => Value::Missing,
        }
    })
}

/// Add `log_minw`, `log_h_pct{p}` and `kaitz_pct{p} = log_minw − log_h_pct{p}`.
pub fn add_kaitz(frame: Frame) -> Result<Frame, PanelError> {
    frame.require_column("min_wage")?;
    let mut frame = frame.with_column("log_minw", |f, row| {
        Value::from_option(numeric(f, row, "min_wage").map(f64::ln))
    })?;

    for p in WAGE_PERCENTILES {
        let wage = percentile_column(p);
        frame.require_column(&wage)?;
        frame = frame.with_column(&format!("log_{wage}"), |f, row| {
            Value::from_option(numeric(f, row, &wage).map(f64::ln))
        })?;
    }
    for p in WAGE_PERCENTILES {
        let log_wage = format!("log_{}", percentile_column(p));
        frame = frame.with_column(&format!("kaitz_pct{p}"), |f, row| {
            match (numeric(f, row, "log_minw"), numeric(f, row, &log_wage)) {
                (Some(m), Some(w)) => Value::Float(m - w),
                _ => Value::Missing,
            }
        })?;
    }
    Ok(frame)
}
