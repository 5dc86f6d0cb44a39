//! Diagnostic output on stderr

use colored::Colorize;

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}
