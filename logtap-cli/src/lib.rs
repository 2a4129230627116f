//! logtap command-line host.
//!
//! The binary in `main.rs` parses arguments, initialises diagnostics, and
//! dispatches to one handler per subcommand in [`commands`]. Handlers render
//! their results through [`output::OutputWriter`] so every command supports
//! both text and JSON output.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod output;
