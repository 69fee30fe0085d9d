//! Common types and utilities shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use tracing::{info, warn};
use zetasetup::config::{InstallConfig, InstallerPaths, CONFIG_FILE_NAME};
use zetasetup::manager::{ExistingInstall, InstallSession, Installer, RecoveryOption, RunReport};

use crate::error::CliError;
use crate::ui::progress::RunProgress;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settings every command shares.
#[derive(Debug)]
pub struct CommandContext {
    config_path: PathBuf,
    paths: InstallerPaths,
}

impl CommandContext {
    pub fn new(config_path: Option<PathBuf>, paths: InstallerPaths) -> Self {
        Self {
            config_path: config_path.unwrap_or_else(default_config_path),
            paths,
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn paths(&self) -> &InstallerPaths {
        &self.paths
    }

    pub fn config(&self) -> Result<Arc<InstallConfig>, CliError> {
        Ok(InstallConfig::global(&self.config_path)?)
    }

    pub fn installer(&self) -> Result<Arc<Installer>, CliError> {
        let installer = Installer::with_paths(self.config()?, &self.paths)?;
        Ok(Arc::new(installer))
    }
}

/// `zetasetup.ini` next to the running executable.
fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Resolve the install destination: CLI > registered install > default.
pub fn resolve_install_path(
    explicit: Option<PathBuf>,
    existing: Option<&ExistingInstall>,
    paths: &InstallerPaths,
) -> PathBuf {
    explicit
        .or_else(|| existing.map(|e| e.path.clone()))
        .unwrap_or_else(|| paths.default_install_dir())
}

pub fn confirm(prompt: &str, default: bool) -> Result<bool, CliError> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| CliError::Prompt(e.to_string()))
}

fn recovery_label(option: RecoveryOption) -> &'static str {
    match option {
        RecoveryOption::Retry => "Retry (verified downloads are reused)",
        RecoveryOption::Abort => "Abort and remove the partial installation",
        RecoveryOption::Ignore => "Ignore and leave the files as they are",
    }
}

/// Ask how to continue after a failed run.
pub fn choose_recovery(options: &[RecoveryOption]) -> Result<RecoveryOption, CliError> {
    match options {
        [] => Ok(RecoveryOption::Ignore),
        [only] => Ok(*only),
        _ => {
            let labels: Vec<&str> = options.iter().copied().map(recovery_label).collect();
            let index = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("What would you like to do?")
                .items(&labels)
                .default(0)
                .interact()
                .map_err(|e| CliError::Prompt(e.to_string()))?;
            Ok(options[index])
        }
    }
}

/// Ctrl+C handling for the runs of one command.
///
/// While a run is busy an interrupt only raises a flag that [`drive`] acts
/// on; otherwise it ends the process.
pub struct Interrupts {
    flag: Arc<AtomicBool>,
}

impl Interrupts {
    /// Install the process-wide handler. Call once per command.
    pub fn install(installer: &Arc<Installer>) -> Result<Self, CliError> {
        let flag = Arc::new(AtomicBool::new(false));
        let handler_flag = Arc::clone(&flag);
        let installer = Arc::clone(installer);

        ctrlc::set_handler(move || {
            if installer.is_busy() {
                handler_flag.store(true, Ordering::SeqCst);
            } else {
                std::process::exit(130);
            }
        })
        .map_err(|e| CliError::Signal(e.to_string()))?;

        Ok(Self { flag })
    }

    fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

/// Render a session until it ends.
///
/// For a cancellable run an interrupt asks whether to cancel (or cancels
/// straight away with `assume_yes`); other runs keep going.
pub fn drive(
    mut session: InstallSession,
    title: &str,
    interrupts: &Interrupts,
    cancellable: bool,
    assume_yes: bool,
) -> RunReport {
    let mut progress = RunProgress::new(title);
    let mut cancelling = false;

    loop {
        while let Some(event) = session.try_next_event() {
            progress.apply(&event);
        }

        if session.is_finished() {
            while let Some(event) = session.try_next_event() {
                progress.apply(&event);
            }
            break;
        }

        if interrupts.take() && !cancelling {
            if cancellable {
                // A prompt that cannot be shown counts as a yes.
                let confirmed = assume_yes
                    || progress
                        .suspend(|| confirm("Cancel the running installation?", false))
                        .unwrap_or(true);
                if confirmed {
                    info!("Cancellation requested");
                    session.cancel();
                    progress.set_message("Cancelling...");
                    cancelling = true;
                }
            } else {
                warn!("Interrupt ignored while removing files");
                progress.set_message("Removing files, please wait...");
            }
        }

        thread::sleep(POLL_INTERVAL);
    }

    progress.finish();
    session.wait()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> InstallerPaths {
        InstallerPaths::with_roots("/home/u/.local/share", "/home/u/Desktop")
    }

    #[test]
    fn test_install_path_precedence() {
        let existing = ExistingInstall {
            path: PathBuf::from("/games/ZetaGlest"),
            version: "0.8.0".to_string(),
        };

        assert_eq!(
            resolve_install_path(Some(PathBuf::from("/opt/zg")), Some(&existing), &paths()),
            PathBuf::from("/opt/zg")
        );
        assert_eq!(
            resolve_install_path(None, Some(&existing), &paths()),
            PathBuf::from("/games/ZetaGlest")
        );
        assert_eq!(
            resolve_install_path(None, None, &paths()),
            PathBuf::from("/home/u/.local/share/ZetaGlest")
        );
    }

    #[test]
    fn test_single_recovery_option_needs_no_prompt() {
        assert_eq!(
            choose_recovery(&[RecoveryOption::Abort]).unwrap(),
            RecoveryOption::Abort
        );
        assert_eq!(choose_recovery(&[]).unwrap(), RecoveryOption::Ignore);
    }

    #[test]
    fn test_explicit_config_path() {
        let ctx = CommandContext::new(Some(PathBuf::from("/etc/zs.ini")), paths());
        assert_eq!(ctx.config_path(), Path::new("/etc/zs.ini"));
    }

    #[test]
    fn test_default_config_path_name() {
        let ctx = CommandContext::new(None, paths());
        assert_eq!(
            ctx.config_path().file_name().and_then(|n| n.to_str()),
            Some(CONFIG_FILE_NAME)
        );
    }
}
