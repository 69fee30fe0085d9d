//! ZetaSetup - installer core for the ZetaGlest binaries and data bundles.
//!
//! This library downloads the two release archives, verifies them against
//! the configured checksums, unpacks them with the 7-Zip command line,
//! normalizes the extracted layout and registers the installation so it can
//! later be upgraded or removed.
//!
//! # Modules
//!
//! - [`config`]: installer configuration loaded once from `zetasetup.ini`
//! - [`manager`]: download, verification, extraction, layout and the
//!   install/uninstall orchestrator
//! - [`logging`]: diagnostic log file and console tracing setup
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zetasetup::config::InstallConfig;
//! use zetasetup::manager::{InstallOptions, InstallSession, Installer};
//!
//! let config = InstallConfig::global("zetasetup.ini")?;
//! let installer = Arc::new(Installer::with_defaults(config)?);
//!
//! let mut session = InstallSession::install(installer, "/opt/zetaglest".into(), InstallOptions::default());
//! while let Some(event) = session.next_event() {
//!     println!("{:?}", event);
//! }
//! let report = session.wait();
//! ```

pub mod config;
pub mod logging;
pub mod manager;
