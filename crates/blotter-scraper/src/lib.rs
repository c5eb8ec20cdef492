// Search coordination: a bounded pool of portal sessions working through an
// ordered batch of queries.

mod cancel;
mod coordinator;
mod error;
mod pacing;
mod progress;
mod session;
mod worker;

pub use cancel::CancelToken;
pub use coordinator::Coordinator;
pub use error::{Error, Result};
pub use pacing::Pacing;
pub use progress::{ProgressReceiver, ProgressSender, ProgressUpdate, progress_channel};
pub use session::{Session, SessionFactory};
pub use worker::SearchWorker;
