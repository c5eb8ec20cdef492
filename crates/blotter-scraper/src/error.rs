use thiserror::Error;

/// Run-level failures: nothing was scraped. Per-query failures live in each
/// query's result status instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("Could not create a portal session: {0}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, Error>;
