//! Uninstall command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;
use zetasetup::manager::{InstallSession, Installer};

use super::common::{confirm, drive, CommandContext, Interrupts};
use crate::error::CliError;
use crate::ui::print_summary;

/// Arguments for the uninstall command.
pub struct UninstallArgs {
    pub path: Option<PathBuf>,
    pub yes: bool,
}

/// Run the uninstall command.
pub fn run(ctx: &CommandContext, args: UninstallArgs) -> Result<(), CliError> {
    let installer = ctx.installer()?;
    let existing = installer.detect_existing();

    let path = match args.path.or_else(|| existing.as_ref().map(|e| e.path.clone())) {
        Some(path) => path,
        None => {
            println!("No ZetaGlest installation is registered.");
            println!("Use --path to remove an installation anyway.");
            return Ok(());
        }
    };

    if let Some(existing) = &existing {
        if existing.path != path {
            warn!(
                registered = %existing.path.display(),
                requested = %path.display(),
                "Removing an installation other than the registered one"
            );
        }
    }

    if !args.yes && !confirm(&format!("Remove ZetaGlest from {}?", path.display()), false)? {
        println!("Nothing was changed.");
        return Ok(());
    }

    let interrupts = Interrupts::install(&installer)?;
    remove(&installer, &path, &interrupts)
}

/// Remove the installation at `path` and report the result.
pub fn remove(installer: &Arc<Installer>, path: &Path, interrupts: &Interrupts) -> Result<(), CliError> {
    let session = InstallSession::uninstall(Arc::clone(installer), path.to_path_buf());
    let report = drive(session, "Removing", interrupts, false, false);
    report.result?;

    print_summary(
        &format!("ZetaGlest was removed from {}", path.display()),
        &report.warnings,
    );
    Ok(())
}
