//! Domain models for the reply pipeline.

mod parent;
mod reply;

pub use parent::{parse_status_id, ParentMessage};
pub use reply::{ProcessingState, ReplyRecord, ReplyStats};
