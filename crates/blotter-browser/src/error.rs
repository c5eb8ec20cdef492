use blotter_core::FailureReason;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("Portal authentication expired")]
    AuthExpired,

    #[error("Could not parse results page: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}

impl Error {
    /// Collapse into the per-query failure taxonomy. Everything that isn't an
    /// auth expiry reads as a transport problem; genuine timeouts are the
    /// worker's to declare.
    pub fn into_failure(self) -> FailureReason {
        match self {
            Error::AuthExpired => FailureReason::AuthExpired,
            Error::Parse(reason) => FailureReason::Parse(reason),
            other => FailureReason::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
