use std::fmt;

use thiserror::Error;

use crate::utils::multierr::MultiError;

/// Why an extractor could not produce a value from a page body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractErrorKind {
    /// The pattern did not match anywhere in the body.
    NotFound,
    /// The pattern matched but its content could not be decoded.
    MalformedData,
}

impl fmt::Display for ExtractErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractErrorKind::NotFound => write!(f, "not found"),
            ExtractErrorKind::MalformedData => write!(f, "malformed data"),
        }
    }
}

#[derive(Debug)]
pub struct ExtractError {
    kind: ExtractErrorKind,
    what: &'static str,
    detail: Option<String>,
}

impl ExtractError {
    pub fn not_found(what: &'static str) -> Self {
        Self {
            kind: ExtractErrorKind::NotFound,
            what,
            detail: None,
        }
    }

    pub fn malformed(what: &'static str, detail: impl fmt::Display) -> Self {
        Self {
            kind: ExtractErrorKind::MalformedData,
            what,
            detail: Some(detail.to_string()),
        }
    }

    pub fn kind(&self) -> ExtractErrorKind {
        self.kind
    }

}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.what, self.kind)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExtractError {}

#[derive(Error, Debug)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bad cookie: redirected to login page from {url}")]
    Authentication { url: String },

    #[error("extract error: {0}")]
    Extract(#[from] ExtractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("module task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("spawner closed: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Modules(MultiError<Error>),
}

impl Error {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True when the session was rejected, directly or in any module.
    pub fn is_authentication(&self) -> bool {
        match self {
            Error::Authentication { .. } => true,
            Error::Modules(errs) => errs.errors().iter().any(|(_, e)| e.is_authentication()),
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
