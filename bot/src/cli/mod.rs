//! CLI module
//!
//! Argument definitions for the `muicebot` binary.

pub mod args;

pub use args::{Cli, Commands, Identity};
