//! Command-line interface for the reply engine.

mod commands;
mod icons;

pub use commands::{is_verbose, run};
