//! ya-backup CLI library
//!
//! Exports the command definitions, exit codes and output formatting used by
//! the `yb` binary.

pub mod commands;
pub mod exit_code;
pub mod output;
