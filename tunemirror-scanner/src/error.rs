use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("member not found or tunebook gone (HTTP {status})")]
    NotFound { status: u16 },

    #[error("transient network fault: {0}")]
    Transient(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} on page {page}")]
    Status { status: u16, page: u32 },

    #[error("malformed tunebook JSON on page {page}: {source}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Coarse failure classes the scanner's policy is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Transient,
    Fatal,
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::NotFound { .. } => FailureKind::NotFound,
            FetchError::Transient(_) => FailureKind::Transient,
            FetchError::Status { .. } | FetchError::Decode { .. } | FetchError::InvalidUrl(_) => {
                FailureKind::Fatal
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == FailureKind::NotFound
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
