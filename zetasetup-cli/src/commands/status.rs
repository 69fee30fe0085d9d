//! Status command - show the configured release and the installed one.

use console::style;
use zetasetup::logging::LOG_FILE_NAME;
use zetasetup::manager::{directory_size, format_size, InstallAction, ShellExtractor};

use super::common::CommandContext;
use crate::error::CliError;
use crate::ui::print_field;

/// Run the status command.
pub fn run(ctx: &CommandContext) -> Result<(), CliError> {
    let config = ctx.config()?;

    println!("{}", style(format!("ZetaGlest Setup v{}", env!("CARGO_PKG_VERSION"))).bold());
    println!();

    println!("{}", style("Release").bold());
    print_field("Config file", ctx.config_path().display());
    print_field("Version", &config.version);
    print_field("Binaries", &config.stable.binaries.url);
    print_field(
        "Data",
        format!("{} ({})", config.stable.data.url, format_size(config.data_bytes)),
    );
    print_field(
        "Development",
        if config.development.is_some() {
            "configured"
        } else {
            "not configured"
        },
    );
    match ShellExtractor::locate(config.engine_path.as_deref()) {
        Ok(engine) => print_field("7-Zip", engine.program().display()),
        Err(e) => print_field("7-Zip", style(e.to_string()).red()),
    }
    println!();

    println!("{}", style("Installation").bold());
    let installer = ctx.installer()?;
    match installer.detect_existing() {
        Some(existing) => {
            print_field("Version", &existing.version);
            print_field("Location", existing.path.display());
            if existing.path.is_dir() {
                print_field("Size", format_size(directory_size(&existing.path)));
            } else {
                print_field("Size", style("directory missing").yellow());
            }
            let action = InstallAction::classify(Some(&existing.version), &config.version);
            print_field("Install would", action.label());
        }
        None => {
            print_field("Status", "not installed");
            print_field("Default path", ctx.paths().default_install_dir().display());
        }
    }
    println!();

    print_field("Log file", ctx.paths().log_dir().join(LOG_FILE_NAME).display());
    Ok(())
}
