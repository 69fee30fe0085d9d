//! Terminal presentation helpers.

pub mod progress;

use console::style;

/// Print the closing line of a run followed by any warnings it collected.
pub fn print_summary(headline: &str, warnings: &[String]) {
    println!("{} {}", style("✓").green().bold(), headline);
    print_warnings(warnings);
}

pub fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }

    println!();
    println!("{}", style("Some steps did not complete:").yellow().bold());
    for warning in warnings {
        println!("  {} {}", style("!").yellow(), warning);
    }
}

/// Print a labelled value, aligned with the other status lines.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<14} {}", format!("{}:", label), value);
}
