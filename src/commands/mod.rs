//! Command-line interface definitions and helpers for the bigsid CLI.

pub mod args;
pub mod daemon_ctl;
pub mod sketch;

pub use args::{Cli, Commands};
