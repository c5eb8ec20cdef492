pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod query;
pub mod record;
pub mod report;
pub mod result;

pub use config::{Credentials, PortalConfig, ScrapeConfig};
pub use error::{Error, Result};
pub use query::{Batch, SearchQuery, parse_name_lines};
pub use record::BookingRecord;
pub use result::{FailureReason, SearchResult, SearchStatus};
