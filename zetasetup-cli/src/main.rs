//! ZetaSetup CLI - installs, upgrades and removes ZetaGlest.
//!
//! This binary is a thin front end over the `zetasetup` library: it parses
//! arguments, asks for confirmation and renders progress, while all of the
//! actual work happens on the library's worker thread.

mod commands;
mod error;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use tracing::{error, info};
use zetasetup::config::InstallerPaths;
use zetasetup::logging::{self, LoggingConfig};

use commands::common::CommandContext;
use commands::install::InstallArgs;
use commands::uninstall::UninstallArgs;

#[derive(Debug, Parser)]
#[command(name = "zetasetup")]
#[command(version, about = "Install and uninstall ZetaGlest", long_about = None)]
struct Cli {
    /// Installer configuration file (defaults to zetasetup.ini next to this executable)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also print warnings and errors from the diagnostic log to the terminal
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install ZetaGlest, replacing any registered installation
    Install {
        /// Destination directory
        #[arg(long, value_name = "DIR")]
        path: Option<PathBuf>,

        /// Install the development snapshot instead of the release
        #[arg(long)]
        dev: bool,

        /// Do not create the desktop shortcut
        #[arg(long)]
        no_desktop_shortcut: bool,

        /// Do not create the menu shortcuts
        #[arg(long)]
        no_menu_shortcut: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Remove an installation
    Uninstall {
        /// Installation directory (defaults to the registered one)
        #[arg(long, value_name = "DIR")]
        path: Option<PathBuf>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the configured release and the registered installation
    Status,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let paths = InstallerPaths::detect();

    let logging_config = LoggingConfig::new(paths.log_dir()).with_console(cli.verbose);
    let _logging_guard = match logging::init(&logging_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!(
                "{} could not open the diagnostic log in {}: {}",
                style("Warning:").yellow().bold(),
                logging_config.log_dir.display(),
                e
            );
            None
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "zetasetup starting"
    );

    let ctx = CommandContext::new(cli.config, paths);
    let result = match cli.command {
        Commands::Install {
            path,
            dev,
            no_desktop_shortcut,
            no_menu_shortcut,
            yes,
        } => commands::install::run(
            &ctx,
            InstallArgs {
                path,
                dev,
                no_desktop_shortcut,
                no_menu_shortcut,
                yes,
            },
        ),
        Commands::Uninstall { path, yes } => {
            commands::uninstall::run(&ctx, UninstallArgs { path, yes })
        }
        Commands::Status => commands::status::run(&ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("{} {}", style("Error:").red().bold(), e);
            eprintln!("Details were written to {}", logging_config.log_file().display());
            ExitCode::FAILURE
        }
    }
}
