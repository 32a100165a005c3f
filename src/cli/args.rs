//! Defines the command-line arguments and subcommands for the sqlcanon CLI.
//!
//! This module uses the `clap` crate with its "derive" feature to create a
//! declarative and type-safe argument parsing structure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "sqlcanon",
    version,
    about = "Canonical reformatter for SQL query expressions."
)]
pub struct CanonArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse, prune, and print the canonical form of a query.
    Format {
        /// The query file to format, or `-` for stdin.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Print the typed syntax tree of a query as JSON.
    Ast {
        /// The query file to parse, or `-` for stdin.
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Parse and prune a query, reporting diagnostics without output.
    Check {
        /// The query file to check, or `-` for stdin.
        #[arg(required = true)]
        file: PathBuf,
    },
}
