//! Handles all user-facing output for the CLI.
//!
//! Centralizing printing here keeps the command handlers free of
//! formatting concerns and the user experience consistent across
//! subcommands. Diagnostics themselves render through miette.

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Write canonical query text to stdout exactly as rendered.
pub fn print_formatted(text: &str) {
    print!("{}", text);
}

/// Print the `check` verdict line for a successfully parsed query.
pub fn print_verdict(name: &str, expressions: usize) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    print!("ok");
    let _ = stdout.reset();
    let plural = if expressions == 1 { "" } else { "s" };
    println!(": {} ({} select expression{})", name, expressions, plural);
}
