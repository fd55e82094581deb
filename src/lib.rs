//! reply-engine - engagement reply pipeline.
//!
//! Discovers replies to our posts, answers each one at most once, and keeps
//! platform usage under its rate limits.

// Config enums use `from_str` methods that return Option<Self>,
// not Result<Self, Error> as std::str::FromStr requires.
#![allow(clippy::should_implement_trait)]

pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod platform;
pub mod rate_limit;
pub mod repository;
pub mod schema;
pub mod services;
