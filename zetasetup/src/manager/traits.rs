//! Collaborator traits used by the installer.
//!
//! The orchestrator only talks to the network, the decompression engine,
//! the registration store and the shortcut locations through these traits,
//! so each can be replaced by an in-process fake in tests.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use super::error::ManagerResult;
use super::registrar::InstalledRecord;

/// Byte-level progress callback: `(received, total)`.
///
/// `total` is `None` when the server did not report a content length.
pub type FetchProgress<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// Retrieves a remote archive to a local path.
pub trait Fetcher: Send + Sync {
    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// Returns [`ManagerError::Cancelled`](super::ManagerError::Cancelled)
    /// when `cancel` fires mid-transfer.
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &FetchProgress<'_>,
    ) -> ManagerResult<u64>;
}

/// Maps extraction output lines into a progress window.
///
/// The callback receives the number of lines seen so far.
pub struct LineMonitor<'a> {
    /// Number of output lines the engine is expected to print.
    pub expected_lines: u64,
    /// Called after every stdout line.
    pub on_line: Box<dyn Fn(u64) + Send + Sync + 'a>,
}

impl<'a> LineMonitor<'a> {
    pub fn new(expected_lines: u64, on_line: impl Fn(u64) + Send + Sync + 'a) -> Self {
        Self {
            expected_lines,
            on_line: Box::new(on_line),
        }
    }
}

impl std::fmt::Debug for LineMonitor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineMonitor")
            .field("expected_lines", &self.expected_lines)
            .finish_non_exhaustive()
    }
}

/// Unpacks an archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest_dir`.
    ///
    /// When a monitor is given it is called once per engine output line.
    fn extract(
        &self,
        archive: &Path,
        dest_dir: &Path,
        monitor: Option<&LineMonitor<'_>>,
        cancel: &CancellationToken,
    ) -> ManagerResult<()>;
}

/// Persists installation metadata for the host environment.
pub trait EnvironmentRegistrar: Send + Sync {
    /// Read the current record, if any.
    fn read(&self) -> ManagerResult<Option<InstalledRecord>>;

    /// Create or overwrite the record.
    fn write(&self, record: &InstalledRecord) -> ManagerResult<()>;

    /// Delete the record. A missing record is not an error.
    fn remove(&self) -> ManagerResult<()>;
}

/// Creates and removes launcher shortcuts.
pub trait ShortcutManager: Send + Sync {
    /// Create the menu folder entries for an install at `install_dir`.
    fn create_menu_entries(&self, install_dir: &Path) -> ManagerResult<Vec<PathBuf>>;

    /// Create the desktop entry for an install at `install_dir`.
    fn create_desktop_entry(&self, install_dir: &Path) -> ManagerResult<PathBuf>;

    /// Every location a shortcut may have been created at.
    ///
    /// Uninstall deletes each of them independently.
    fn known_locations(&self) -> Vec<PathBuf>;
}
