//! CLI Module Organization
//!
//! - args: CLI argument structures and value enums
//! - commands: command execution and input loading
//! - output: report rendering and display functions

pub mod args;
pub mod commands;
pub mod output;

// Re-export commonly used items for convenience
pub use args::*;
pub use commands::*;
