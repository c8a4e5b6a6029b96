use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (year range, missing required source, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// A geographic, industry or time code failed width/character validation.
    #[error("malformed key '{value}': {reason}")]
    MalformedKey { value: String, reason: String },

    /// A table lacks a column the operation needs.
    #[error("table '{table}': missing column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A join key column is absent from one side of a join.
    #[error("table '{table}': missing join key '{key}'")]
    MissingJoinKey { table: String, key: String },

    /// The same join key appears more than once on a side that must be unique.
    #[error("table '{table}': duplicate key [{key}]")]
    DuplicateKey { table: String, key: String },

    /// A non-key column exists on both sides of a join.
    #[error("table '{table}': column '{column}' already present in '{left}'")]
    ColumnCollision {
        left: String,
        table: String,
        column: String,
    },

    /// A row does not have one value per column.
    #[error("table '{table}': row {row} has {found} values, expected {expected}")]
    RowWidth {
        table: String,
        row: usize,
        found: usize,
        expected: usize,
    },

    /// Two records for the same (geo, time, variable) disagree.
    #[error("source '{table}', variable '{variable}': conflicting values for [{key}]")]
    ConflictingMeasure {
        table: String,
        variable: String,
        key: String,
    },

    /// A required source failed to load upstream of the merge.
    #[error("source '{name}' failed to load: {message}")]
    SourceFailed { name: String, message: String },

    /// A pipeline stage failed; wraps the underlying error with the stage label.
    #[error("stage '{stage}': {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<PanelError>,
    },
}

impl PanelError {
    pub fn malformed(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Wrap this error with the label of the stage that produced it.
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }
}
