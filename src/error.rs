#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Unexpected payload: {0}")]
    Payload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sheets API error: {0}")]
    Sheets(String),

    #[error("Giving up after {failures} consecutive failed cycles; last error: {last}")]
    TooManyFailures { failures: u32, last: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
