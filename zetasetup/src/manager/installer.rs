//! Install and uninstall orchestration.
//!
//! This module sequences the full installation workflow:
//! 1. Reuse archives already present and valid in the install directory
//! 2. Download the data archive in the background, the binaries in the foreground
//! 3. Verify checksums
//! 4. Extract and normalize the binaries
//! 5. Join the data download, then verify, extract and normalize the data
//! 6. Clean up temporary files
//! 7. Register the installation and create shortcuts

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Channel, ChannelSources, InstallConfig, InstallerPaths, UnitSource};

use super::context::RunContext;
use super::download::{is_cached_valid, verify_checksum, HttpFetcher};
use super::error::{error_chain, ManagerError, ManagerResult};
use super::extractor::{ShellExtractor, ENGINE_CANDIDATES};
use super::fsutil::{delete_dir_if_exists, delete_entry_if_exists, delete_file_if_exists, directory_size};
use super::layout::{self, SelfImage, BINARIES_STAGING_DIR};
use super::progress::{
    ProgressTracker, ProgressWindow, DATA_DOWNLOAD_WINDOW, DATA_EXTRACT_WINDOW, PROGRESS_SCALE,
};
use super::registrar::{IniRegistrar, InstalledRecord};
use super::shortcuts::DesktopEntryShortcuts;
use super::traits::{ArchiveExtractor, EnvironmentRegistrar, Fetcher, LineMonitor, ShortcutManager};
use super::unit::{Unit, UnitState};

/// What the user asked for besides the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallOptions {
    /// Release channel to install from.
    pub channel: Channel,
    /// Create the menu folder entries.
    pub menu_shortcuts: bool,
    /// Create the desktop entry.
    pub desktop_shortcut: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            channel: Channel::Stable,
            menu_shortcuts: true,
            desktop_shortcut: true,
        }
    }
}

/// How the configured version relates to the installed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    /// Nothing is installed yet.
    Install,
    /// A lower version is installed.
    Upgrade,
    /// A higher version is installed.
    Downgrade,
    /// The same version is installed.
    Reinstall,
}

impl InstallAction {
    /// Compare an installed version (if any) with the configured one.
    ///
    /// Versions are compared as semantic versions after padding missing
    /// components with zeros; unparseable versions only compare for equality.
    pub fn classify(installed: Option<&str>, configured: &str) -> Self {
        let Some(installed) = installed else {
            return Self::Install;
        };

        match (parse_version(installed), parse_version(configured)) {
            (Some(old), Some(new)) => match old.cmp(&new) {
                std::cmp::Ordering::Less => Self::Upgrade,
                std::cmp::Ordering::Greater => Self::Downgrade,
                std::cmp::Ordering::Equal => Self::Reinstall,
            },
            _ if installed.trim() == configured.trim() => Self::Reinstall,
            _ => Self::Upgrade,
        }
    }

    /// Short label for confirmation prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Install => "Install",
            Self::Upgrade => "Update",
            Self::Downgrade => "Downgrade",
            Self::Reinstall => "Reinstall",
        }
    }
}

fn parse_version(raw: &str) -> Option<semver::Version> {
    let raw = raw.trim().trim_start_matches('v');
    let (core, suffix) = match raw.find(['-', '+']) {
        Some(i) => raw.split_at(i),
        None => (raw, ""),
    };

    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }

    semver::Version::parse(&format!("{}{}", parts.join("."), suffix)).ok()
}

/// An installation found in the registration store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingInstall {
    pub path: PathBuf,
    pub version: String,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Everything ran to the end (warnings aside).
    Completed,
    /// The user cancelled; the partial install was rolled back.
    Cancelled,
}

/// The replaceable collaborators of an [`Installer`].
pub struct Collaborators {
    pub fetcher: Box<dyn Fetcher>,
    pub extractor: Box<dyn ArchiveExtractor>,
    pub registrar: Box<dyn EnvironmentRegistrar>,
    pub shortcuts: Box<dyn ShortcutManager>,
}

/// Clears the busy flag when a run ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Installer orchestrator.
///
/// Holds the immutable configuration and the collaborators; all per-run
/// state lives in the [`RunContext`] passed to each call. Runs started
/// through [`start_install`](Self::start_install) and
/// [`start_uninstall`](Self::start_uninstall) are serialized by a run lock.
pub struct Installer {
    config: Arc<InstallConfig>,
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn ArchiveExtractor>,
    registrar: Box<dyn EnvironmentRegistrar>,
    shortcuts: Box<dyn ShortcutManager>,
    self_image: SelfImage,
    run_lock: Mutex<()>,
    busy: AtomicBool,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("version", &self.config.version)
            .field("self_image", &self.self_image)
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

impl Installer {
    /// Create an installer from explicit collaborators.
    pub fn new(config: Arc<InstallConfig>, collaborators: Collaborators, self_image: SelfImage) -> Self {
        Self {
            config,
            fetcher: collaborators.fetcher,
            extractor: collaborators.extractor,
            registrar: collaborators.registrar,
            shortcuts: collaborators.shortcuts,
            self_image,
            run_lock: Mutex::new(()),
            busy: AtomicBool::new(false),
        }
    }

    /// Create an installer using the current user's standard locations.
    pub fn with_defaults(config: Arc<InstallConfig>) -> ManagerResult<Self> {
        Self::with_paths(config, &InstallerPaths::detect())
    }

    /// Create an installer with the HTTP fetcher, the 7-Zip extractor, the
    /// INI registrar and `.desktop` shortcuts rooted at `paths`.
    ///
    /// A missing 7-Zip is only reported when an extraction is attempted.
    pub fn with_paths(config: Arc<InstallConfig>, paths: &InstallerPaths) -> ManagerResult<Self> {
        let self_image = SelfImage::current(&config)?;

        let extractor = ShellExtractor::locate(config.engine_path.as_deref()).unwrap_or_else(|e| {
            warn!(error = %e, "Decompression engine not found");
            ShellExtractor::new(ENGINE_CANDIDATES[0])
        });

        let collaborators = Collaborators {
            fetcher: Box::new(HttpFetcher::new()?),
            extractor: Box::new(extractor),
            registrar: Box::new(IniRegistrar::new(paths.registry_dir())),
            shortcuts: Box::new(DesktopEntryShortcuts::from_paths(
                paths,
                self_image.executable_name(),
            )),
        };

        Ok(Self::new(config, collaborators, self_image))
    }

    pub fn config(&self) -> &Arc<InstallConfig> {
        &self.config
    }

    /// Whether a run currently holds the run lock.
    ///
    /// Only a hint for the presentation layer.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Build a fresh context for one run.
    pub fn new_context(&self, cancel: CancellationToken, progress: ProgressTracker) -> RunContext {
        RunContext::new(Arc::clone(&self.config), cancel, progress)
    }

    /// Find an installation recorded in the registration store.
    ///
    /// An absent or unreadable record yields `None`.
    pub fn detect_existing(&self) -> Option<ExistingInstall> {
        match self.registrar.read() {
            Ok(Some(record)) => {
                let path = record.install_path();
                if path.is_none() {
                    debug!(command = %record.uninstall_command, "Record has no usable install path");
                }
                path.map(|path| ExistingInstall {
                    path,
                    version: record.version,
                })
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %error_chain(&e), "Ignoring unreadable registration record");
                None
            }
        }
    }

    /// How installing the configured version relates to what is installed.
    pub fn install_action(&self) -> InstallAction {
        let existing = self.detect_existing();
        InstallAction::classify(existing.as_ref().map(|e| e.version.as_str()), &self.config.version)
    }

    /// Full install run: uninstall what is registered, then install.
    ///
    /// A cancelled run is rolled back and reported as
    /// [`RunOutcome::Cancelled`]; failures leave the directory for a retry.
    pub fn start_install(
        &self,
        ctx: &RunContext,
        path: &Path,
        options: &InstallOptions,
    ) -> ManagerResult<RunOutcome> {
        let _lock = self.run_lock.lock();
        let _busy = BusyGuard::set(&self.busy);
        ctx.begin_run();

        info!(
            path = %path.display(),
            version = %self.config.version,
            channel = %options.channel,
            "Install run started"
        );

        // Reject before the previous install is touched.
        if self.config.sources(options.channel).is_none() {
            let e = ManagerError::ChannelUnavailable(options.channel.to_string());
            error!(error = %e, "Install run rejected");
            return Err(e);
        }

        if let Some(existing) = self.detect_existing() {
            info!(
                path = %existing.path.display(),
                version = %existing.version,
                "Removing previous installation"
            );
            ctx.progress().status("Removing previous installation...");
            self.uninstall(ctx, &existing.path);
        }

        match self.install(ctx, path, options) {
            Ok(()) => {
                info!(path = %path.display(), warnings = ctx.warnings().len(), "Install run completed");
                Ok(RunOutcome::Completed)
            }
            Err(ManagerError::Cancelled) => {
                ctx.finish_units(UnitState::Cancelled);
                info!(path = %path.display(), "Install cancelled, rolling back");
                ctx.progress().status("Cancelling...");
                self.uninstall(ctx, path);
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                ctx.finish_units(UnitState::Failed);
                error!(
                    path = %path.display(),
                    kind = ?e.kind(),
                    error = %error_chain(&e),
                    "Install run failed"
                );
                Err(e)
            }
        }
    }

    /// Full uninstall run under the run lock.
    pub fn start_uninstall(&self, ctx: &RunContext, path: &Path) -> ManagerResult<RunOutcome> {
        let _lock = self.run_lock.lock();
        let _busy = BusyGuard::set(&self.busy);
        ctx.begin_run();

        info!(path = %path.display(), "Uninstall run started");
        ctx.progress().status("Uninstalling...");
        self.uninstall(ctx, path);
        ctx.progress().advance_to(PROGRESS_SCALE);
        info!(path = %path.display(), warnings = ctx.warnings().len(), "Uninstall run completed");

        Ok(RunOutcome::Completed)
    }

    /// Remove an installation. Each step is attempted independently and
    /// failures become warnings; this never fails.
    pub fn uninstall(&self, ctx: &RunContext, path: &Path) {
        if path.parent().is_none() {
            ctx.warn(format!(
                "Refusing to delete {} as an install directory",
                path.display()
            ));
        } else if let Err(e) = delete_dir_if_exists(path) {
            ctx.warn(format!("Could not delete the install directory: {}", error_chain(&e)));
        }

        for location in self.shortcuts.known_locations() {
            if let Err(e) = delete_entry_if_exists(&location) {
                ctx.warn(format!("Could not delete shortcut: {}", error_chain(&e)));
            }
        }

        if let Err(e) = self.registrar.remove() {
            ctx.warn(format!(
                "Could not delete the registration record: {}",
                error_chain(&e)
            ));
        }

        debug!(path = %path.display(), "Uninstall finished");
    }

    /// Install into `path`.
    ///
    /// On failure before registration the directory is left in place, so a
    /// retry can reuse verified archives.
    pub fn install(&self, ctx: &RunContext, path: &Path, options: &InstallOptions) -> ManagerResult<()> {
        let sources = self
            .config
            .sources(options.channel)
            .ok_or_else(|| ManagerError::ChannelUnavailable(options.channel.to_string()))?;

        ctx.checkpoint()?;
        fs::create_dir_all(path).map_err(|e| ManagerError::CreateDirFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.download_and_extract(ctx, sources, path)?;

        let units = ctx.unit_states();
        if !units.all_installed() {
            return Err(ManagerError::Internal(format!(
                "refusing to register with binaries {} and data {}",
                units.get(Unit::Binaries),
                units.get(Unit::Data)
            )));
        }

        self.delete_temporary(ctx, path);
        self.register(ctx, path);
        self.create_shortcuts(ctx, path, options);
        Ok(())
    }

    fn download_and_extract(
        &self,
        ctx: &RunContext,
        sources: &ChannelSources,
        path: &Path,
    ) -> ManagerResult<()> {
        let binaries_archive = path.join(Unit::Binaries.archive_name());
        let data_archive = path.join(Unit::Data.archive_name());

        let binaries_cached = is_cached_valid(&binaries_archive, &sources.binaries.checksum);
        if binaries_cached {
            info!(archive = %binaries_archive.display(), "Reusing verified binaries archive");
            ctx.set_unit_state(Unit::Binaries, UnitState::Verified);
        }

        let data_cached = is_cached_valid(&data_archive, &sources.data.checksum);
        if data_cached {
            info!(archive = %data_archive.display(), "Reusing verified data archive");
            ctx.set_unit_state(Unit::Data, UnitState::Verified);
            ctx.progress().advance_to(DATA_DOWNLOAD_WINDOW.target());
        }

        // Cancelled when the binaries side fails so the transfer stops too.
        let data_cancel = ctx.cancel_token().child_token();

        thread::scope(|scope| {
            let data_task = (!data_cached).then(|| {
                ctx.set_unit_state(Unit::Data, UnitState::Downloading);
                ctx.progress().status(format!(
                    "Downloading data ({})...",
                    format_size(self.config.data_bytes)
                ));
                let cancel = data_cancel.clone();
                let archive = data_archive.as_path();
                scope.spawn(move || {
                    self.download(
                        ctx,
                        &sources.data,
                        archive,
                        &cancel,
                        Some(DATA_DOWNLOAD_WINDOW),
                    )
                })
            });

            if let Err(e) = self.install_binaries(ctx, &sources.binaries, path, &binaries_archive, binaries_cached) {
                data_cancel.cancel();
                if let Some(task) = data_task {
                    let _ = task.join();
                }
                return Err(e);
            }

            if let Some(task) = data_task {
                task.join()
                    .map_err(|_| ManagerError::Internal("data download thread panicked".to_string()))??;
            }

            Ok(())
        })?;

        ctx.checkpoint()?;
        self.install_data(ctx, &sources.data, path, &data_archive, data_cached)
    }

    fn download(
        &self,
        ctx: &RunContext,
        source: &UnitSource,
        dest: &Path,
        cancel: &CancellationToken,
        window: Option<ProgressWindow>,
    ) -> ManagerResult<()> {
        let bytes = self.fetcher.fetch(source.url.as_str(), dest, cancel, &|received, total| {
            if let Some(window) = window {
                match total {
                    Some(total) => {
                        ctx.progress().advance_in(window, received, total);
                    }
                    None => ctx.progress().set_indeterminate(),
                }
            }
        })?;

        debug!(url = %source.url, bytes, "Archive downloaded");
        Ok(())
    }

    fn install_binaries(
        &self,
        ctx: &RunContext,
        source: &UnitSource,
        path: &Path,
        archive: &Path,
        cached: bool,
    ) -> ManagerResult<()> {
        if !cached {
            ctx.set_unit_state(Unit::Binaries, UnitState::Downloading);
            ctx.progress().status("Downloading binaries...");
            self.download(ctx, source, archive, ctx.cancel_token(), None)?;

            ctx.checkpoint()?;
            verify_checksum(archive, &source.checksum)?;
            ctx.set_unit_state(Unit::Binaries, UnitState::Verified);
        }

        ctx.checkpoint()?;
        ctx.set_unit_state(Unit::Binaries, UnitState::Extracting);
        ctx.progress().status("Extracting binaries...");
        self.extractor.extract(archive, path, None, ctx.cancel_token())?;

        ctx.checkpoint()?;
        layout::normalize_binaries(path, &source.root_dir, self.config.binaries_variant.as_deref())?;
        layout::copy_self_image(path, &self.self_image)?;
        ctx.set_unit_state(Unit::Binaries, UnitState::Installed);
        info!(path = %path.display(), "Binaries installed");
        Ok(())
    }

    fn install_data(
        &self,
        ctx: &RunContext,
        source: &UnitSource,
        path: &Path,
        archive: &Path,
        cached: bool,
    ) -> ManagerResult<()> {
        if !cached {
            verify_checksum(archive, &source.checksum)?;
            ctx.set_unit_state(Unit::Data, UnitState::Verified);
        }
        ctx.progress().advance_to(DATA_EXTRACT_WINDOW.start());

        ctx.checkpoint()?;
        ctx.set_unit_state(Unit::Data, UnitState::Extracting);
        ctx.progress().status("Extracting data...");

        let expected = self.config.data_line_count;
        let monitor = LineMonitor::new(expected, |lines| {
            ctx.progress().advance_in(DATA_EXTRACT_WINDOW, lines, expected);
        });
        self.extractor
            .extract(archive, path, Some(&monitor), ctx.cancel_token())?;

        ctx.checkpoint()?;
        layout::normalize_data(path, &source.root_dir)?;
        ctx.set_unit_state(Unit::Data, UnitState::Installed);
        ctx.progress().advance_to(PROGRESS_SCALE);
        info!(path = %path.display(), "Data installed");
        Ok(())
    }

    /// Delete the archives and the staged binaries root.
    fn delete_temporary(&self, ctx: &RunContext, path: &Path) {
        ctx.progress().status("Cleaning up...");

        for unit in [Unit::Binaries, Unit::Data] {
            let archive = path.join(unit.archive_name());
            if let Err(e) = delete_file_if_exists(&archive) {
                ctx.warn(format!("Could not delete {}: {}", unit.archive_name(), error_chain(&e)));
            }
        }

        if let Err(e) = delete_dir_if_exists(&path.join(BINARIES_STAGING_DIR)) {
            ctx.warn(format!(
                "Could not delete temporary directory {}: {}",
                BINARIES_STAGING_DIR,
                error_chain(&e)
            ));
        }
    }

    fn register(&self, ctx: &RunContext, path: &Path) {
        let size = directory_size(path);
        let record = InstalledRecord::new(
            &self.config.version,
            &self.self_image.installed_executable(path),
            size,
        );

        if let Err(e) = self.registrar.write(&record) {
            ctx.warn(format!("Could not write the registration record: {}", error_chain(&e)));
        }
    }

    fn create_shortcuts(&self, ctx: &RunContext, path: &Path, options: &InstallOptions) {
        if options.menu_shortcuts {
            if let Err(e) = self.shortcuts.create_menu_entries(path) {
                ctx.warn(format!("Could not add menu shortcuts: {}", error_chain(&e)));
            }
        }

        if options.desktop_shortcut {
            if let Err(e) = self.shortcuts.create_desktop_entry(path) {
                ctx.warn(format!("Could not add desktop shortcut: {}", error_chain(&e)));
            }
        }
    }
}

/// Human-readable byte count for status lines.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
