//! Install manager for the ZetaGlest binaries and data bundles.
//!
//! This module provides:
//! - Archive downloads with checksum verification (`download`)
//! - Extraction through the 7-Zip command line (`extractor`)
//! - Relocation of the extracted trees (`layout`)
//! - Registration records and launcher shortcuts (`registrar`, `shortcuts`)
//! - The install/uninstall orchestrator (`installer`) and its background
//!   runner (`session`)
//!
//! # Architecture
//!
//! ```text
//! InstallSession (worker thread, event channel)
//!         │
//!         └── Installer (run lock, orchestration)
//!                 ├── Fetcher (trait)              ── HttpFetcher
//!                 ├── ArchiveExtractor (trait)     ── ShellExtractor
//!                 ├── EnvironmentRegistrar (trait) ── IniRegistrar
//!                 ├── ShortcutManager (trait)      ── DesktopEntryShortcuts
//!                 └── RunContext (per run: cancel token, warnings, progress)
//! ```

mod context;
mod download;
mod error;
mod extractor;
mod fsutil;
mod installer;
mod layout;
mod progress;
mod registrar;
mod session;
mod shortcuts;
mod traits;
mod unit;

pub use context::{RunContext, WarningLog};
pub use download::{
    calculate_file_checksum, is_cached_valid, verify_checksum, ChecksumAlgorithm, ExpectedChecksum,
    HttpFetcher, USER_AGENT,
};
pub use error::{error_chain, FailureKind, ManagerError, ManagerResult, RecoveryOption};
pub use extractor::{find_engine_error, ShellExtractor, ENGINE_CANDIDATES};
pub use fsutil::{
    copy_dir_recursive, delete_dir_if_exists, delete_entry_if_exists, delete_file_if_exists,
    directory_size, move_entry,
};
pub use installer::{
    format_size, Collaborators, ExistingInstall, InstallAction, InstallOptions, Installer,
    RunOutcome,
};
pub use layout::{
    copy_self_image, normalize_binaries, normalize_data, SelfImage, BINARIES_STAGING_DIR,
    DATA_DIR_NAME,
};
pub use progress::{
    ProgressEvent, ProgressTracker, ProgressWindow, DATA_DOWNLOAD_WINDOW, DATA_EXTRACT_WINDOW,
    PROGRESS_SCALE,
};
pub use registrar::{IniRegistrar, InstalledRecord, PRODUCT_ID};
pub use session::{InstallSession, RunReport};
pub use shortcuts::{tool_executable, DesktopEntryShortcuts, BITNESS};
pub use traits::{ArchiveExtractor, EnvironmentRegistrar, FetchProgress, Fetcher, LineMonitor, ShortcutManager};
pub use unit::{InvalidTransition, Unit, UnitState, UnitStates};
