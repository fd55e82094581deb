//! Reply pipeline: the scheduled job that answers replies to our posts.
//!
//! Per reply the only transition is unprocessed → processed, made by
//! `ReplyStore::mark_processed` after a successful post. A crash anywhere
//! leaves the reply unprocessed and it is picked up again next cycle.

mod cancel;
mod config;
mod error;
mod runner;

pub use cancel::CancelSignal;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use runner::{CycleReport, PipelineRunner};
