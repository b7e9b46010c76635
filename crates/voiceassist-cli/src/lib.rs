//! Command-line front end for voiceassist.
//!
//! This crate provides the `voiceassist` binary.

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Cli, Command};
pub use error::{CliError, CliResult};
