use thiserror::Error;

/// Remote read or write failure against the listing source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("local store error: {0}")]
    Store(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() { FetchError::Decode(e.to_string()) } else { FetchError::Transport(e.to_string()) }
    }
}

impl From<sqlx::Error> for FetchError {
    fn from(e: sqlx::Error) -> Self { FetchError::Store(e.to_string()) }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self { FetchError::Decode(e.to_string()) }
}

/// Failure of an external image/video upload. Never retried here.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("upload transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upload rejected with status {0}")]
    Rejected(u16),
    #[error("upload response missing url: {0}")]
    MissingUrl(String),
}

/// The device media layer refused a play or pause request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("player rejected {action} for {slot}: {reason}")]
pub struct PlaybackCommandError {
    pub slot: String,
    pub action: &'static str,
    pub reason: String,
}

/// Listing draft rejected before or during publication.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error("missing required field: {0}")]
    Missing(&'static str),
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("at least one image is required")]
    NoImages,
    #[error(transparent)]
    Remote(#[from] FetchError),
}
