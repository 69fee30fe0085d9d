//! Well-known filesystem locations used by the installer.

use std::env;
use std::path::{Path, PathBuf};

/// Product directory name used for the default install path and menu folder.
pub const PRODUCT_DIR_NAME: &str = "ZetaGlest";

/// Directory name for installer state (diagnostic log, registration records).
const STATE_DIR_NAME: &str = "zetasetup";

/// Resolved locations for installer state, shortcuts and the default install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerPaths {
    /// Per-user data directory all other defaults derive from.
    pub data_dir: PathBuf,
    /// Desktop directory for the desktop shortcut.
    pub desktop_dir: PathBuf,
}

impl Default for InstallerPaths {
    fn default() -> Self {
        Self::detect()
    }
}

impl InstallerPaths {
    /// Detect locations from the current user's environment.
    ///
    /// Falls back to the system temp directory when the platform reports no
    /// data directory, and to `<home>/Desktop` when it reports no desktop.
    pub fn detect() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(env::temp_dir);
        let desktop_dir = dirs::desktop_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join("Desktop")))
            .unwrap_or_else(|| data_dir.join("Desktop"));

        Self {
            data_dir,
            desktop_dir,
        }
    }

    /// Use explicit roots, mainly for tests and portable setups.
    pub fn with_roots(data_dir: impl Into<PathBuf>, desktop_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            desktop_dir: desktop_dir.into(),
        }
    }

    /// Default destination offered when nothing is installed yet.
    pub fn default_install_dir(&self) -> PathBuf {
        self.data_dir.join(PRODUCT_DIR_NAME)
    }

    /// Root of the installer's own state.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join(STATE_DIR_NAME)
    }

    /// Directory holding installation registration records.
    pub fn registry_dir(&self) -> PathBuf {
        self.state_dir().join("registry")
    }

    /// Directory for the diagnostic log file.
    pub fn log_dir(&self) -> PathBuf {
        self.state_dir()
    }

    /// Menu folder holding the application's launcher entries.
    pub fn menu_dir(&self) -> PathBuf {
        self.data_dir.join("applications").join(PRODUCT_DIR_NAME)
    }

    /// Desktop directory.
    pub fn desktop_dir(&self) -> &Path {
        &self.desktop_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_locations() {
        let paths = InstallerPaths::with_roots("/home/u/.local/share", "/home/u/Desktop");

        assert_eq!(
            paths.default_install_dir(),
            PathBuf::from("/home/u/.local/share/ZetaGlest")
        );
        assert_eq!(
            paths.registry_dir(),
            PathBuf::from("/home/u/.local/share/zetasetup/registry")
        );
        assert_eq!(
            paths.menu_dir(),
            PathBuf::from("/home/u/.local/share/applications/ZetaGlest")
        );
        assert_eq!(paths.desktop_dir(), Path::new("/home/u/Desktop"));
    }
}
