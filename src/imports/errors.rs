use thiserror::Error;

/// Fatal import failures. Malformed individual lines are not errors; they
/// are skipped and reported as warnings in the summary.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error reading shared log: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("shared log is not valid UTF-8")]
    Encoding,
}
