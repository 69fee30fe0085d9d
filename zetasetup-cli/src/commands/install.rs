//! Install command - install, upgrade or reinstall ZetaGlest.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use tracing::info;
use zetasetup::config::{Channel, InstallConfig};
use zetasetup::manager::{
    error_chain, format_size, ExistingInstall, FailureKind, InstallAction, InstallOptions,
    InstallSession, ManagerError, RecoveryOption, RunOutcome,
};

use super::common::{choose_recovery, confirm, drive, resolve_install_path, CommandContext, Interrupts};
use super::uninstall;
use crate::error::CliError;
use crate::ui::{print_field, print_summary, print_warnings};

/// Arguments for the install command.
pub struct InstallArgs {
    pub path: Option<PathBuf>,
    pub dev: bool,
    pub no_desktop_shortcut: bool,
    pub no_menu_shortcut: bool,
    pub yes: bool,
}

impl InstallArgs {
    fn options(&self) -> InstallOptions {
        InstallOptions {
            channel: if self.dev {
                Channel::Development
            } else {
                Channel::Stable
            },
            menu_shortcuts: !self.no_menu_shortcut,
            desktop_shortcut: !self.no_desktop_shortcut,
        }
    }
}

/// Run the install command.
pub fn run(ctx: &CommandContext, args: InstallArgs) -> Result<(), CliError> {
    let installer = ctx.installer()?;
    let config = Arc::clone(installer.config());
    let options = args.options();

    if config.sources(options.channel).is_none() {
        return Err(ManagerError::ChannelUnavailable(options.channel.to_string()).into());
    }

    let existing = installer.detect_existing();
    let action = InstallAction::classify(existing.as_ref().map(|e| e.version.as_str()), &config.version);
    let path = resolve_install_path(args.path.clone(), existing.as_ref(), ctx.paths());

    println!("{}", style(format!("ZetaGlest Setup {}", config.version)).bold());
    println!();
    print_plan(&config, action, existing.as_ref(), &path, &options);
    println!();

    let interrupts = Interrupts::install(&installer)?;

    if !args.yes {
        if let (InstallAction::Reinstall, Some(existing)) = (action, existing.as_ref()) {
            let prompt = format!(
                "ZetaGlest {} is already installed in {}. Uninstall it instead?",
                existing.version,
                existing.path.display()
            );
            if confirm(&prompt, false)? {
                return uninstall::remove(&installer, &existing.path, &interrupts);
            }
        }

        let prompt = format!(
            "{} ZetaGlest {} in {}?",
            action.label(),
            config.version,
            path.display()
        );
        if !confirm(&prompt, true)? {
            println!("Nothing was changed.");
            return Ok(());
        }
    }

    loop {
        info!(path = %path.display(), action = action.label(), "Starting install");
        let session = InstallSession::install(Arc::clone(&installer), path.clone(), options);
        let report = drive(session, "Installing", &interrupts, true, args.yes);

        let error = match report.result {
            Ok(RunOutcome::Completed) => {
                print_summary(
                    &format!("ZetaGlest {} was installed in {}", config.version, path.display()),
                    &report.warnings,
                );
                return Ok(());
            }
            Ok(RunOutcome::Cancelled) => {
                println!(
                    "{} Installation cancelled, the partial installation was removed.",
                    style("✗").yellow().bold()
                );
                print_warnings(&report.warnings);
                return Ok(());
            }
            Err(e) => e,
        };

        eprintln!("{} {}", style("Installation failed:").red().bold(), error_chain(&error));
        print_warnings(&report.warnings);

        // Without prompts the files stay in place for a later retry.
        if args.yes || error.kind() == FailureKind::Configuration {
            return Err(error.into());
        }

        match choose_recovery(error.recovery_options())? {
            RecoveryOption::Retry => continue,
            RecoveryOption::Abort => {
                uninstall::remove(&installer, &path, &interrupts)?;
                return Err(error.into());
            }
            RecoveryOption::Ignore => {
                println!("The files in {} were left as they are.", path.display());
                return Err(error.into());
            }
        }
    }
}

fn print_plan(
    config: &InstallConfig,
    action: InstallAction,
    existing: Option<&ExistingInstall>,
    path: &Path,
    options: &InstallOptions,
) {
    print_field("Action", action.label());
    if let Some(existing) = existing {
        print_field(
            "Installed",
            format!("{} in {}", existing.version, existing.path.display()),
        );
    }
    print_field("Destination", path.display());
    print_field("Channel", options.channel);
    print_field("Data size", format_size(config.data_bytes));

    let shortcuts = match (options.menu_shortcuts, options.desktop_shortcut) {
        (true, true) => "menu and desktop",
        (true, false) => "menu only",
        (false, true) => "desktop only",
        (false, false) => "none",
    };
    print_field("Shortcuts", shortcuts);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> InstallArgs {
        InstallArgs {
            path: None,
            dev: false,
            no_desktop_shortcut: false,
            no_menu_shortcut: false,
            yes: false,
        }
    }

    #[test]
    fn test_default_options() {
        assert_eq!(args().options(), InstallOptions::default());
    }

    #[test]
    fn test_flags_map_to_options() {
        let options = InstallArgs {
            dev: true,
            no_menu_shortcut: true,
            ..args()
        }
        .options();

        assert_eq!(options.channel, Channel::Development);
        assert!(!options.menu_shortcuts);
        assert!(options.desktop_shortcut);
    }
}
