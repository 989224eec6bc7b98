use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("malformed input: {0}")]
    Shape(String),

    #[error(
        "path index {found} in rows doesn't match configured path index {expected}, rows for several paths need a multi-path merge"
    )]
    PathMismatch { found: i64, expected: i64 },

    #[error("partition file '{0}' has size zero")]
    EmptyFile(String),

    #[error("'{column}' not among headers in '{file}', maybe this isn't a partition file?")]
    MissingColumn { file: String, column: String },

    #[error("unhandled partition file suffix for '{0}'")]
    UnsupportedFormat(String),

    #[error("could not parse column '{column}' value '{value}'")]
    InvalidField { column: String, value: String },

    #[error("invalid partition: {0}")]
    InvalidPartition(String),

    #[error("best step pointers are stale after removing the first step, call recompute_best() first")]
    StaleBest,

    #[error("path has no steps, so no best step")]
    NoBest,

    #[error("unknown sequence identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("no sequence for identifier '{0}'")]
    MissingSequence(String),

    #[error("identifier '{uid}' has {count} sequences, expected exactly one")]
    MultipleSequences { uid: String, count: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PathError>;
