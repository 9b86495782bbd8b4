//! Terminal output for CLI commands

use colored::Colorize;
use sluice_runtime::FilterFault;

/// Print the replication decision for one document
pub fn verdict(id: &str, allowed: bool) {
    if allowed {
        println!("{} {} replicates", "✓".green(), id.bold());
    } else {
        println!("{} {} is filtered out", "✗".yellow(), id.bold());
    }
}

/// Print a fault that forced the safe default
pub fn fault(id: &str, fault: &FilterFault) {
    println!(
        "{} {} is filtered out ({} fault)",
        "✗".red(),
        id.bold(),
        fault.kind().as_str()
    );
    eprintln!("  {}", fault.to_string().dimmed());
    if let FilterFault::Execution {
        stack: Some(stack), ..
    } = fault
    {
        for line in stack.lines() {
            eprintln!("    {}", line.dimmed());
        }
    }
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}
