//! Keyed joins between frames, each returning a coverage diagnostic.
//!
//! The right side of every join must be unique on the join keys (both sides for
//! outer joins), so an inner join never multiplies rows and
//! `rows_out + rows_dropped == rows_in` holds.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::error::PanelError;
use crate::model::{Frame, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    Outer,
    Left,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "inner"),
            Self::Outer => write!(f, "outer"),
            Self::Left => write!(f, "left"),
        }
    }
}

/// Coverage record for one join step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinDiagnostic {
    pub step: String,
    pub right_table: String,
    pub kind: JoinKind,
    pub on: Vec<String>,
    pub rows_in: usize,
    pub rows_out: usize,
    /// Left rows with no partner (inner joins only; zero otherwise).
    pub rows_dropped: usize,
    /// Sorted distinct keys of dropped rows, rendered `a|b|c`.
    pub dropped_keys: Vec<String>,
    /// Right rows that matched nothing on the left.
    pub right_unmatched: usize,
}

impl JoinDiagnostic {
    pub fn has_attrition(&self) -> bool {
        self.rows_dropped > 0
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub frame: Frame,
    pub diagnostic: JoinDiagnostic,
}

type Key = Vec<String>;

/// Join key of a row; `None` when any key cell is missing (such rows never match).
fn row_key(row: &[Value], idxs: &[usize]) -> Option<Key> {
    idxs.iter().map(|&i| row[i].key_repr()).collect()
}

fn render_key(row: &[Value], idxs: &[usize]) -> String {
    idxs.iter()
        .map(|&i| row[i].key_repr().unwrap_or_default())
        .collect::<Vec<_>>()
        .join("|")
}

fn key_indices(frame: &Frame, on: &[&str]) -> Result<Vec<usize>, PanelError> {
    on.iter()
        .map(|k| {
            frame.column_index(k).ok_or_else(|| PanelError::MissingJoinKey {
                table: frame.name().to_string(),
                key: k.to_string(),
            })
        })
        .collect()
}

/// Index rows by key, failing on duplicates.
fn unique_index(frame: &Frame, idxs: &[usize]) -> Result<HashMap<Key, usize>, PanelError> {
    let mut index = HashMap::with_capacity(frame.len());
    for (i, row) in frame.rows().iter().enumerate() {
        if let Some(key) = row_key(row, idxs) {
            if index.insert(key, i).is_some() {
                return Err(PanelError::DuplicateKey {
                    table: frame.name().to_string(),
                    key: render_key(row, idxs),
                });
            }
        }
    }
    Ok(index)
}

/// Join `right` onto `left` on the columns in `on`.
///
/// Output columns are the left columns followed by the right non-key columns.
/// Rows keep left order; an outer join appends right-only rows afterwards in
/// right order.
pub fn join(
    left: &Frame,
    right: &Frame,
    on: &[&str],
    kind: JoinKind,
    step: &str,
) -> Result<JoinOutcome, PanelError> {
    let left_keys = key_indices(left, on)?;
    let right_keys = key_indices(right, on)?;

    let right_payload: Vec<usize> = (0..right.columns().len())
        .filter(|i| !right_keys.contains(i))
        .collect();
    for &i in &right_payload {
        let column = &right.columns()[i];
        if left.has_column(column) {
            return Err(PanelError::ColumnCollision {
                left: left.name().to_string(),
                table: right.name().to_string(),
                column: column.clone(),
            });
        }
    }

    let right_index = unique_index(right, &right_keys)?;
    if kind == JoinKind::Outer {
        unique_index(left, &left_keys)?;
    }

    let mut columns = left.columns().to_vec();
    columns.extend(right_payload.iter().map(|&i| right.columns()[i].clone()));

    let mut rows = Vec::with_capacity(left.len());
    let mut matched_right = vec![false; right.len()];
    let mut dropped: BTreeSet<String> = BTreeSet::new();
    let mut rows_dropped = 0;

    for row in left.rows() {
        let partner = row_key(row, &left_keys).and_then(|k| right_index.get(&k).copied());
        match partner {
            Some(r) => {
                matched_right[r] = true;
                let mut out = row.clone();
                out.extend(right_payload.iter().map(|&i| right.rows()[r][i].clone()));
                rows.push(out);
            }
            None if kind == JoinKind::Inner => {
                rows_dropped += 1;
                dropped.insert(render_key(row, &left_keys));
            }
            None => {
                let mut out = row.clone();
                out.extend(std::iter::repeat(Value::Missing).take(right_payload.len()));
                rows.push(out);
            }
        }
    }

    let right_unmatched = matched_right.iter().filter(|m| !**m).count();

    if kind == JoinKind::Outer {
        for (r, row) in right.rows().iter().enumerate() {
            if matched_right[r] {
                continue;
            }
            let mut out = vec![Value::Missing; left.columns().len()];
            for (&l, &ri) in left_keys.iter().zip(&right_keys) {
                out[l] = row[ri].clone();
            }
            out.extend(right_payload.iter().map(|&i| row[i].clone()));
            rows.push(out);
        }
    }

    let diagnostic = JoinDiagnostic {
        step: step.to_string(),
        right_table: right.name().to_string(),
        kind,
        on: on.iter().map(|s| s.to_string()).collect(),
        rows_in: left.len(),
        rows_out: rows.len(),
        rows_dropped,
        dropped_keys: dropped.into_iter().collect(),
        right_unmatched,
    };
    log::debug!(
        "join '{step}' ({kind} on {}): {} -> {} rows, {} dropped",
        on.join(","),
        diagnostic.rows_in,
        diagnostic.rows_out,
        diagnostic.rows_dropped
    );

    Ok(JoinOutcome {
        frame: Frame::new(left.name(), columns, rows)?,
        diagnostic,
    })
}
