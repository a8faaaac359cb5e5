use thiserror::Error;
use tunemirror_scanner::FetchError;

/// Failures that end a crawl. Per-identifier remote faults never show up
/// here; they are absorbed by the scan loop.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("could not fetch the target tunebook: {0}")]
    Fetch(#[from] FetchError),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl RecommendError {
    /// True when the remote says the member does not exist or the tunebook
    /// is private.
    pub fn is_unknown_member(&self) -> bool {
        matches!(self, RecommendError::Fetch(e) if e.is_not_found())
    }
}
