//! The sqlcanon command-line interface.
//!
//! This module is the main entry point for all CLI commands and
//! orchestrates the core library functions: parse, prune, and either
//! format, dump, or check the query.

use std::io::Read;
use std::path::Path;
use std::{fs, process};

use clap::Parser;
use miette::IntoDiagnostic;

use crate::cli::args::{CanonArgs, Command};
use crate::errors::SourceContext;
use crate::formatter;
use crate::syntax::parser;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = CanonArgs::parse();

    let result = match args.command {
        Command::Format { file } => handle_format(&file),
        Command::Ast { file } => handle_ast(&file),
        Command::Check { file } => handle_check(&file),
    };

    if let Err(report) = result {
        eprintln!("{:?}", report);
        process::exit(1);
    }
}

/// Read the query text from a file, or from stdin when the path is `-`.
fn read_source(path: &Path) -> miette::Result<(String, String)> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .into_diagnostic()?;
        Ok(("<stdin>".to_string(), content))
    } else {
        let content = fs::read_to_string(path).into_diagnostic()?;
        Ok((path.display().to_string(), content))
    }
}

/// Handles the `format` subcommand.
fn handle_format(path: &Path) -> miette::Result<()> {
    let (name, content) = read_source(path)?;
    let mut tree = parser::parse(&content, SourceContext::from_file(name.as_str(), content.as_str()))?;
    let root = tree.root();
    tree.prune(root);
    let formatted = formatter::format(&tree)?;
    output::print_formatted(&formatted);
    Ok(())
}

/// Handles the `ast` subcommand.
fn handle_ast(path: &Path) -> miette::Result<()> {
    let (name, content) = read_source(path)?;
    let tree = parser::parse(&content, SourceContext::from_file(name.as_str(), content.as_str()))?;
    let dump = tree.dump(tree.root());
    let json = serde_json::to_string_pretty(&dump).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

/// Handles the `check` subcommand.
fn handle_check(path: &Path) -> miette::Result<()> {
    let (name, content) = read_source(path)?;
    let mut tree = parser::parse(&content, SourceContext::from_file(name.as_str(), content.as_str()))?;
    let root = tree.root();
    tree.prune(root);
    output::print_verdict(&name, tree.select_expressions().len());
    Ok(())
}
