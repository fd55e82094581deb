//! Service layer: reply discovery and response posting.
//!
//! Services take their collaborators by value and can be driven from the
//! pipeline or directly from the CLI.

pub mod fetcher;
pub mod poster;

pub use fetcher::{FetchOutcome, ReplyFetcher};
pub use poster::ReplyPoster;
