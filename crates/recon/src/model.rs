use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::error::PanelError;
use crate::keys::{GeoKey, Grain, TimeKey};

// ---------------------------------------------------------------------------
// Cell values
// ---------------------------------------------------------------------------

/// One table cell.
///
/// `Missing` means "never measured". A measured zero is `Float(0.0)` or
/// `Int(0)`; NaN stays `Float(NaN)` and propagates through arithmetic.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Missing,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn from_option(v: Option<f64>) -> Self {
        v.map_or(Self::Missing, Self::Float)
    }

    /// Parse a raw field: empty → `Missing`, integers → `Int`, decimals →
    /// `Float`, anything else stays `Text` (coerced later by the consumer).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Self::Float(f);
        }
        Self::Text(trimmed.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Missing | Self::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Numeric coercion: numbers become `Float`, numeric text is parsed,
    /// anything else becomes `Missing`.
    pub fn coerce_numeric(&self) -> Value {
        match self {
            Self::Int(i) => Self::Float(*i as f64),
            Self::Float(f) => Self::Float(*f),
            Self::Text(s) => s
                .trim()
                .replace(',', "")
                .parse::<f64>()
                .map_or(Self::Missing, Self::Float),
            Self::Missing => Self::Missing,
        }
    }

    /// Rendering used to compare join keys. Integral floats render as integers
    /// so `2010` and `2010.0` join.
    pub fn key_repr(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(format!("{}", *f as i64)),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_nan() => write!(f, "NaN"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Round half away from zero to `digits` decimals. NaN and infinities pass through.
pub fn round_to(x: f64, digits: u32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let scale = 10f64.powi(digits as i32);
    (x * scale).round() / scale
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// An immutable, named table. Every transformation returns a new frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, PanelError> {
        let name = name.into();
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(PanelError::RowWidth {
                    table: name,
                    row: i,
                    found: row.len(),
                    expected: columns.len(),
                });
            }
        }
        Ok(Self { name, columns, rows })
    }

    pub fn empty(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn require_column(&self, column: &str) -> Result<usize, PanelError> {
        self.column_index(column).ok_or_else(|| PanelError::MissingColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }

    /// Cell at `(row, column)`; `None` when the column does not exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    /// Keep only the rows for which `keep` returns true.
    pub fn filter<F>(&self, mut keep: F) -> Frame
    where
        F: FnMut(&[Value]) -> bool,
    {
        Frame {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Keep rows whose `year` column lies within `[first, last]`.
    pub fn filter_years(&self, first: i32, last: i32) -> Result<Frame, PanelError> {
        let idx = self.require_column("year")?;
        Ok(self.filter(|row| {
            row[idx]
                .as_i64()
                .is_some_and(|y| y >= first as i64 && y <= last as i64)
        }))
    }

    /// Append a column computed from each row.
    pub fn with_column<F>(self, column: &str, mut compute: F) -> Result<Frame, PanelError>
    where
        F: FnMut(&Frame, &[Value]) -> Value,
    {
        if self.has_column(column) {
            return Err(PanelError::ColumnCollision {
                left: self.name.clone(),
                table: self.name.clone(),
                column: column.to_string(),
            });
        }
        let values: Vec<Value> = self.rows.iter().map(|r| compute(&self, r)).collect();
        let Frame {
            name,
            mut columns,
            mut rows,
        } = self;
        columns.push(column.to_string());
        for (row, v) in rows.iter_mut().zip(values) {
            row.push(v);
        }
        Ok(Frame { name, columns, rows })
    }

    /// Replace every cell of `columns` with `f(cell)`.
    pub fn map_columns<F>(self, columns: &[String], f: F) -> Result<Frame, PanelError>
    where
        F: Fn(&Value) -> Value,
    {
        let idxs = columns
            .iter()
            .map(|c| self.require_column(c))
            .collect::<Result<Vec<_>, _>>()?;
        let Frame { name, columns, mut rows } = self;
        for row in &mut rows {
            for &i in &idxs {
                row[i] = f(&row[i]);
            }
        }
        Ok(Frame { name, columns, rows })
    }
}

// ---------------------------------------------------------------------------
// Measure records
// ---------------------------------------------------------------------------

/// The atomic unit every extractor produces.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureRecord {
    pub geo: GeoKey,
    pub time: TimeKey,
    pub variable: String,
    pub value: Value,
}

/// An immutable table of measure records from one source, plus descriptive
/// columns (names, abbreviations) carried per geography.
#[derive(Debug, Clone)]
pub struct SourceTable {
    name: String,
    records: Vec<MeasureRecord>,
    descriptors: BTreeMap<GeoKey, BTreeMap<String, String>>,
}

impl SourceTable {
    /// Build a table, collapsing exact duplicates of `(geo, time, variable)`.
    /// Conflicting duplicates are rejected.
    pub fn new(
        name: impl Into<String>,
        records: Vec<MeasureRecord>,
        descriptors: BTreeMap<GeoKey, BTreeMap<String, String>>,
    ) -> Result<Self, PanelError> {
        let name = name.into();
        let mut seen: BTreeMap<(GeoKey, TimeKey, String), usize> = BTreeMap::new();
        let mut unique: Vec<MeasureRecord> = Vec::with_capacity(records.len());

        for record in records {
            let key = (record.geo.clone(), record.time, record.variable.clone());
            match seen.get(&key) {
                Some(&i) if unique[i].value == record.value => continue,
                Some(_) => {
                    return Err(PanelError::ConflictingMeasure {
                        table: name,
                        variable: record.variable,
                        key: format!("{}|{}", record.geo, record.time),
                    });
                }
                None => {
                    seen.insert(key, unique.len());
                    unique.push(record);
                }
            }
        }

        Ok(Self {
            name,
            records: unique,
            descriptors,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[MeasureRecord] {
        &self.records
    }

    pub fn descriptors(&self) -> &BTreeMap<GeoKey, BTreeMap<String, String>> {
        &self.descriptors
    }

    pub fn variables(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.variable.as_str()).collect()
    }

    /// Concatenate tables of the same source (e.g. one file per year) into one.
    pub fn merge(name: impl Into<String>, tables: &[SourceTable]) -> Result<Self, PanelError> {
        let records = tables.iter().flat_map(|t| t.records.iter().cloned()).collect();
        let mut descriptors: BTreeMap<GeoKey, BTreeMap<String, String>> = BTreeMap::new();
        for table in tables {
            for (geo, fields) in &table.descriptors {
                descriptors
                    .entry(geo.clone())
                    .or_default()
                    .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Self::new(name, records, descriptors)
    }

    /// One table per variable, without descriptors.
    pub fn split_by_variable(&self) -> Vec<SourceTable> {
        let mut by_variable: BTreeMap<&str, Vec<MeasureRecord>> = BTreeMap::new();
        for record in &self.records {
            by_variable
                .entry(record.variable.as_str())
                .or_default()
                .push(record.clone());
        }
        by_variable
            .into_iter()
            .map(|(variable, records)| SourceTable {
                name: variable.to_string(),
                records,
                descriptors: BTreeMap::new(),
            })
            .collect()
    }

    pub fn is_monthly(&self) -> bool {
        self.records.iter().any(|r| r.time.month.is_some())
    }

    /// Descriptor columns keyed by geography; `None` when the table carries none.
    pub fn descriptor_frame(&self, grain: Grain) -> Result<Option<Frame>, PanelError> {
        let names: BTreeSet<&str> = self
            .descriptors
            .values()
            .flat_map(|d| d.keys().map(String::as_str))
            .collect();
        if names.is_empty() {
            return Ok(None);
        }
        let mut columns = vec![grain.geo_column().to_string()];
        columns.extend(names.iter().map(|s| s.to_string()));
        let rows = self
            .descriptors
            .iter()
            .filter(|(geo, _)| geo.grain() == grain)
            .map(|(geo, fields)| {
                let mut row = vec![Value::text(geo.code())];
                row.extend(
                    names
                        .iter()
                        .map(|n| fields.get(*n).map_or(Value::Missing, |s| Value::text(s.as_str()))),
                );
                row
            })
            .collect();
        Frame::new(format!("{}_descriptors", self.name), columns, rows).map(Some)
    }

    /// Pivot into a wide frame: geo column, `year`, `month` (when any record is
    /// monthly), descriptor columns, then one column per variable.
    ///
    /// Geographies must share the table's grain.
    pub fn to_frame(&self, grain: Grain) -> Result<Frame, PanelError> {
        self.pivot(grain, self.is_monthly())
    }

    /// Pivot with an explicit choice of the `month` column, so tables of one
    /// source line up on the same keys.
    pub fn pivot(&self, grain: Grain, monthly: bool) -> Result<Frame, PanelError> {
        let variables: Vec<String> = self.variables().into_iter().map(String::from).collect();
        let descriptor_names: BTreeSet<&str> = self
            .descriptors
            .values()
            .flat_map(|d| d.keys().map(String::as_str))
            .collect();

        let mut columns = vec![grain.geo_column().to_string(), "year".to_string()];
        if monthly {
            columns.push("month".into());
        }
        columns.extend(descriptor_names.iter().map(|s| s.to_string()));
        columns.extend(variables.iter().cloned());

        let mut cells: BTreeMap<(GeoKey, TimeKey), Vec<Value>> = BTreeMap::new();
        for record in &self.records {
            if record.geo.grain() != grain {
                return Err(PanelError::malformed(
                    record.geo.code(),
                    format!("table '{}' expects {grain} keys", self.name),
                ));
            }
            let slot = variables
                .iter()
                .position(|v| *v == record.variable)
                .unwrap_or_default();
            let row = cells
                .entry((record.geo.clone(), record.time))
                .or_insert_with(|| vec![Value::Missing; variables.len()]);
            row[slot] = record.value.clone();
        }

        let rows = cells
            .into_iter()
            .map(|((geo, time), measures)| {
                let mut row = vec![Value::text(geo.code()), Value::Int(time.year as i64)];
                if monthly {
                    row.push(time.month.map_or(Value::Missing, |m| Value::Int(m as i64)));
                }
                let descriptors = self.descriptors.get(&geo);
                for name in &descriptor_names {
                    row.push(
                        descriptors
                            .and_then(|d| d.get(*name))
                            .map_or(Value::Missing, |s| Value::text(s.as_str())),
                    );
                }
                row.extend(measures);
                row
            })
            .collect();

        Frame::new(self.name.clone(), columns, rows)
    }
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub geo: GeoKey,
    pub time: TimeKey,
    pub values: Vec<Value>,
}

/// The final joined dataset, one row per (geo, time).
#[derive(Debug, Clone)]
pub struct Panel {
    grain: Grain,
    columns: Vec<String>,
    rows: Vec<PanelRow>,
}

impl Panel {
    /// Build the panel from the last join output. Rows are ordered by
    /// (geo, year, month).
    pub fn from_frame(frame: &Frame, grain: Grain) -> Result<Self, PanelError> {
        let geo_idx = frame.require_column(grain.geo_column())?;
        let year_idx = frame.require_column("year")?;
        let month_idx = frame.column_index("month");

        let mut rows = Vec::with_capacity(frame.len());
        for row in frame.rows() {
            let code = row[geo_idx]
                .key_repr()
                .ok_or_else(|| PanelError::malformed("", "panel row without geography"))?;
            let geo = GeoKey::parse(&code, grain)?;
            let year = row[year_idx]
                .as_i64()
                .ok_or_else(|| PanelError::malformed(row[year_idx].to_string(), "panel row without year"))?
                as i32;
            let time = match month_idx.and_then(|i| row[i].as_i64()) {
                Some(m) => TimeKey::monthly(year, m as u8)?,
                None => TimeKey::annual(year),
            };
            rows.push(PanelRow {
                geo,
                time,
                values: row.clone(),
            });
        }
        rows.sort_by(|a, b| (&a.geo, a.time).cmp(&(&b.geo, b.time)));

        Ok(Self {
            grain,
            columns: frame.columns().to_vec(),
            rows,
        })
    }

    pub fn grain(&self) -> Grain {
        self.grain
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows for `geo` contemporaneous with `time`.
    pub fn rows_at<'a>(&'a self, geo: &'a GeoKey, time: TimeKey) -> impl Iterator<Item = &'a PanelRow> {
        self.rows
            .iter()
            .filter(move |r| &r.geo == geo && r.time.is_contemporaneous(&time))
    }

    /// Value of `column` in `row`.
    pub fn value<'a>(&self, row: &'a PanelRow, column: &str) -> Option<&'a Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        row.values.get(idx)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelMeta {
    pub config_name: String,
    pub grain: Grain,
    pub initial_year: i32,
    pub last_year: i32,
    pub engine_version: String,
    pub run_at: String,
    pub rows: usize,
    pub columns: usize,
}
