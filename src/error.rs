//! Errors raised while building the feature table and fitting regressions.
use std::path::PathBuf;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid taxonomy: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid regression config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown {kind} label {label:?}")]
    UnknownCategory { kind: &'static str, label: String },
    #[error("{table} references unknown {entity} {key:?}")]
    DanglingReference {
        table: &'static str,
        entity: &'static str,
        key: String,
    },
    #[error("duplicate key {key:?} in {table}")]
    DuplicateKey { table: &'static str, key: String },

    #[error("column {0:?} not found")]
    MissingColumn(String),
    #[error("column {column:?} is not {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },
    #[error("cannot take the log of {value} in column {column:?}")]
    Domain { column: String, value: f64 },
    #[error("column {0:?} has zero spread and cannot be standardized")]
    ConstantColumn(String),
    #[error("column {0:?} still holds missing values")]
    MissingValues(String),

    #[error("least squares fit failed: {0}")]
    Fit(String),
    #[error("need at least {needed} observations, got {got}")]
    NotEnoughObservations { needed: usize, got: usize },

    #[error("failed to draw {path}: {message}")]
    Plot { path: PathBuf, message: String },
}
