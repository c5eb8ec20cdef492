use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse results file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("Last name must not be empty")]
    EmptyLastName,

    #[error("Cannot parse name on line {line}: {text:?}")]
    NameLine { line: usize, text: String },

    #[error("Invalid field pattern: {0}")]
    InvalidPattern(String),

    #[error("Export error: {0}")]
    Export(String),
}

pub type Result<T> = std::result::Result<T, Error>;
