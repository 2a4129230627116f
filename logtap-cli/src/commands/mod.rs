//! Command handlers, one module per subcommand

pub mod config;
pub mod logdir;
pub mod pipe;
pub mod run;
pub mod status;
pub mod toggle;

mod session;
