//! Installation registration records.
//!
//! One INI file per product under the per-user state directory records the
//! installed version, its size and the command that uninstalls it.

use std::path::{Path, PathBuf};

use chrono::Local;
use ini::Ini;
use tracing::{debug, info};

use super::error::{ManagerError, ManagerResult};
use super::fsutil::delete_file_if_exists;
use super::traits::EnvironmentRegistrar;

/// Fixed identifier of the product in the registration store.
pub const PRODUCT_ID: &str = "{8C1F0D3E-5B7A-4E2C-9A61-2F4D7B3E9C10}";

/// Section holding the record inside the INI file.
const RECORD_SECTION: &str = "uninstall";

pub const DISPLAY_NAME: &str = "ZetaGlest";
pub const PUBLISHER: &str = "ZetaGlest Team";
pub const INFO_URL: &str = "https://zetaglest.github.io/";
pub const CONTACT: &str = "zetaglest@gmail.com";

/// Metadata recorded for an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledRecord {
    pub display_name: String,
    pub version: String,
    pub publisher: String,
    pub icon_path: String,
    /// `YYYYMMDD`.
    pub install_date: String,
    /// Quoted installer path followed by its uninstall arguments.
    pub uninstall_command: String,
    pub estimated_size_kib: u64,
    pub info_url: String,
    pub contact: String,
}

impl InstalledRecord {
    /// Build the record for an install, dated today.
    pub fn new(version: &str, installed_executable: &Path, size_bytes: u64) -> Self {
        let quoted = format!("\"{}\"", installed_executable.display());
        Self {
            display_name: DISPLAY_NAME.to_string(),
            version: version.to_string(),
            publisher: PUBLISHER.to_string(),
            icon_path: quoted.clone(),
            install_date: Local::now().format("%Y%m%d").to_string(),
            uninstall_command: format!("{} uninstall --yes", quoted),
            estimated_size_kib: size_bytes / 1024,
            info_url: INFO_URL.to_string(),
            contact: CONTACT.to_string(),
        }
    }

    /// Install directory: the parent of the quoted executable path.
    pub fn install_path(&self) -> Option<PathBuf> {
        let command = self.uninstall_command.trim();
        let executable = match command.strip_prefix('"') {
            Some(rest) => &rest[..rest.find('"')?],
            None => command.split_whitespace().next()?,
        };

        Path::new(executable)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some(RECORD_SECTION))
            .set("DisplayName", self.display_name.as_str())
            .set("DisplayVersion", self.version.as_str())
            .set("Publisher", self.publisher.as_str())
            .set("DisplayIcon", self.icon_path.as_str())
            .set("InstallDate", self.install_date.as_str())
            .set("UninstallString", self.uninstall_command.as_str())
            .set("EstimatedSize", self.estimated_size_kib.to_string())
            .set("URLInfoAbout", self.info_url.as_str())
            .set("Contact", self.contact.as_str());
        ini
    }

    fn from_ini(ini: &Ini) -> Result<Self, String> {
        let section = ini
            .section(Some(RECORD_SECTION))
            .ok_or_else(|| format!("missing [{}] section", RECORD_SECTION))?;

        let get = |key: &str| section.get(key).map(str::trim).unwrap_or_default().to_string();
        let required = |key: &str| {
            section
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| format!("missing {}", key))
        };

        let size = get("EstimatedSize");
        let estimated_size_kib = if size.is_empty() {
            0
        } else {
            size.parse()
                .map_err(|e| format!("invalid EstimatedSize '{}': {}", size, e))?
        };

        Ok(Self {
            display_name: get("DisplayName"),
            version: required("DisplayVersion")?,
            publisher: get("Publisher"),
            icon_path: get("DisplayIcon"),
            install_date: get("InstallDate"),
            uninstall_command: required("UninstallString")?,
            estimated_size_kib,
            info_url: get("URLInfoAbout"),
            contact: get("Contact"),
        })
    }
}

/// Registration store backed by an INI file per product.
#[derive(Debug, Clone)]
pub struct IniRegistrar {
    record_file: PathBuf,
}

impl IniRegistrar {
    /// Store records for [`PRODUCT_ID`] in `registry_dir`.
    pub fn new(registry_dir: impl AsRef<Path>) -> Self {
        Self {
            record_file: registry_dir.as_ref().join(format!("{}.ini", PRODUCT_ID)),
        }
    }

    pub fn record_file(&self) -> &Path {
        &self.record_file
    }

    fn registry_error(&self, reason: impl ToString) -> ManagerError {
        ManagerError::RegistryFailed {
            path: self.record_file.clone(),
            reason: reason.to_string(),
        }
    }
}

impl EnvironmentRegistrar for IniRegistrar {
    fn read(&self) -> ManagerResult<Option<InstalledRecord>> {
        if !self.record_file.is_file() {
            return Ok(None);
        }

        let ini = Ini::load_from_file_opt(
            &self.record_file,
            ini::ParseOption {
                enabled_escape: false,
                ..ini::ParseOption::default()
            },
        )
        .map_err(|e| self.registry_error(e))?;

        InstalledRecord::from_ini(&ini)
            .map(Some)
            .map_err(|reason| self.registry_error(reason))
    }

    fn write(&self, record: &InstalledRecord) -> ManagerResult<()> {
        if let Some(parent) = self.record_file.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        record
            .to_ini()
            .write_to_file_opt(
                &self.record_file,
                ini::WriteOption {
                    escape_policy: ini::EscapePolicy::Nothing,
                    ..ini::WriteOption::default()
                },
            )
            .map_err(|e| ManagerError::WriteFailed {
                path: self.record_file.clone(),
                source: e,
            })?;

        info!(
            record = %self.record_file.display(),
            version = %record.version,
            size_kib = record.estimated_size_kib,
            "Installation registered"
        );
        Ok(())
    }

    fn remove(&self) -> ManagerResult<()> {
        if delete_file_if_exists(&self.record_file)? {
            debug!(record = %self.record_file.display(), "Registration removed");
        }
        Ok(())
    }
}
