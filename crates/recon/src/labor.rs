//! Measure tables (labor-market outcomes, job openings): one column per
//! variable, outer-joined on the shared key columns.

use crate::error::PanelError;
use crate::join::{join, JoinDiagnostic, JoinKind};
use crate::keys::Grain;
use crate::model::{Frame, SourceTable, Value};

#[derive(Debug, Clone)]
pub struct MeasureFrame {
    pub frame: Frame,
    pub variables: Vec<String>,
    pub steps: Vec<JoinDiagnostic>,
}

/// Combine all tables of one source into a wide frame.
///
/// Each variable becomes its own table; those are outer-joined pairwise on
/// (geo, year[, month]), numeric-coerced and restricted to
/// `[first_year, last_year]`. Descriptor columns are then left-joined on geo.
pub fn combine_measures(
    name: &str,
    tables: &[SourceTable],
    grain: Grain,
    first_year: i32,
    last_year: i32,
) -> Result<MeasureFrame, PanelError> {
    let merged = SourceTable::merge(name, tables)?;
    let monthly = merged.is_monthly();
    let geo = grain.geo_column();
    let on: Vec<&str> = if monthly {
        vec![geo, "year", "month"]
    } else {
        vec![geo, "year"]
    };

    let mut steps = Vec::new();
    let mut variables = Vec::new();
    let mut acc: Option<Frame> = None;
    for table in merged.split_by_variable() {
        variables.push(table.name().to_string());
        let frame = table.pivot(grain, monthly)?;
        acc = Some(match acc {
            None => frame,
            Some(left) => {
                let outcome = join(
                    &left,
                    &frame,
                    &on,
                    JoinKind::Outer,
                    &format!("{name}:{}", table.name()),
                )?;
                steps.push(outcome.diagnostic);
                outcome.frame
            }
        });
    }

    let Some(frame) = acc else {
        return Err(PanelError::SourceFailed {
            name: name.to_string(),
            message: "no records".into(),
        });
    };

    let mut frame = frame
        .map_columns(&variables, Value::coerce_numeric)?
        .filter_years(first_year, last_year)?
        .renamed(name);

    if let Some(descriptors) = merged.descriptor_frame(grain)? {
        let outcome = join(
            &frame,
            &descriptors,
            &[geo],
            JoinKind::Left,
            &format!("{name}:descriptors"),
        )?;
        steps.push(outcome.diagnostic);
        frame = outcome.frame;
    }

    log::info!(
        "{name}: {} rows, {} variables from {} tables",
        frame.len(),
        variables.len(),
        tables.len()
    );

    Ok(MeasureFrame {
        frame,
        variables,
        steps,
    })
}
