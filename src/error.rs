use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("no result count in response for `{expression}`: {reason}")]
    CountParse { expression: String, reason: String },

    #[error("invalid date `{0}` (expected MM/DD/YYYY or YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("missing input: {0}")]
    MissingInput(&'static str),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, TallyError>;
