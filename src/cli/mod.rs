//! CLI module for punchr - command-line interface and subcommands.
//!
//! Inspection and estimation commands over the shared store: the engine
//! runs inside the host automation process; the CLI reads (and prunes) the
//! same durable state from outside.

pub mod commands;

pub use commands::Cli;
