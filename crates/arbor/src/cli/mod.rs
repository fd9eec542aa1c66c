//! Subcommands of the `arbor` binary.

pub mod classify;
pub mod config;
pub mod gate;
pub mod output;
pub mod replay;
pub mod script;
pub mod segment;
