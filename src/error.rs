use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("malformed substitution row: expected at least {expected} line segments, got {got} in {row:?}")]
    MalformedRow {
        expected: usize,
        got: usize,
        row: String,
    },

    #[error("database: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("webhook rejected delivery with HTTP {status}")]
    Delivery { status: StatusCode },

    #[error("webhook transport: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config: {0}")]
    Config(String),
}
