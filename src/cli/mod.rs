//! Command-line front end: command parsing/execution and terminal output.

pub mod commands;
pub mod output;
