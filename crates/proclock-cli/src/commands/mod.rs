//! Subcommands

pub mod replay;
