//! Installer configuration.
//!
//! The configuration is an INI file shipped next to the installer executable
//! (and copied into every install so the installed copy can uninstall
//! itself). It names the release version and, for each of the two archive
//! units, where to download it, its checksum and the root directory it
//! unpacks to.
//!
//! ```ini
//! [installer]
//! version = 0.8.1
//! binaries = https://example.org/zetaglest-0.8.1-win64.zip
//! binaries-md5 = 9E107D9D-372BB682-6BD81D35-42A419D6
//! binaries-dir = zetaglest-0.8.1
//! data = https://example.org/zetaglest-data-0.8.1.zip
//! data-md5 = e4d909c290d0fb1ca068ffaddf22cbd0
//! data-dir = zetaglest-data-0.8.1
//! data-bytes = 734003200
//! data-7zlinecount = 5230
//!
//! [engine]
//! path = /usr/bin/7z
//! ```
//!
//! Loading is done once per process through [`InstallConfig::global`]; the
//! returned configuration is immutable and shared read-only.

mod error;
mod paths;

pub use error::ConfigError;
pub use paths::InstallerPaths;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use ini::{Ini, ParseOption, Properties};
use reqwest::Url;

use crate::manager::ExpectedChecksum;

/// Main configuration section.
pub const INSTALLER_SECTION: &str = "installer";

/// Optional section describing the decompression engine.
pub const ENGINE_SECTION: &str = "engine";

/// Build-variant directory inside the binaries archive when none is configured.
pub const DEFAULT_BINARIES_VARIANT: &str = "vs2017";

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "zetasetup.ini";

static GLOBAL_CONFIG: OnceLock<Arc<InstallConfig>> = OnceLock::new();

/// Release channel to install from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    /// Regular release archives.
    #[default]
    Stable,
    /// Development snapshot archives.
    Development,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stable => write!(f, "stable"),
            Self::Development => write!(f, "development"),
        }
    }
}

/// Where one archive unit comes from and what it unpacks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSource {
    /// Download URL of the archive.
    pub url: Url,
    /// Expected digest of the archive, already normalized.
    pub checksum: ExpectedChecksum,
    /// Name of the root directory inside the archive.
    pub root_dir: String,
}

/// The binaries and data sources of one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSources {
    pub binaries: UnitSource,
    pub data: UnitSource,
}

/// Immutable installer configuration.
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Version this installer installs.
    pub version: String,
    /// Stable channel archives.
    pub stable: ChannelSources,
    /// Development channel archives, if the configuration provides them.
    pub development: Option<ChannelSources>,
    /// Build-variant subdirectory of the binaries root whose files are
    /// flattened into the install root. `None` flattens the binaries root.
    pub binaries_variant: Option<String>,
    /// Raw size of the data archive in bytes.
    pub data_bytes: u64,
    /// Number of output lines 7-Zip prints while unpacking the data archive.
    pub data_line_count: u64,
    /// Explicit decompression engine executable.
    pub engine_path: Option<PathBuf>,
    /// File the configuration was loaded from.
    source_file: Option<PathBuf>,
}

impl InstallConfig {
    /// Return the process-wide configuration, loading it on first use.
    ///
    /// Subsequent calls return the cached instance regardless of `path`.
    /// A failed load is not cached, so a later call may retry.
    pub fn global(path: impl AsRef<Path>) -> Result<Arc<Self>, ConfigError> {
        if let Some(config) = GLOBAL_CONFIG.get() {
            return Ok(Arc::clone(config));
        }

        let loaded = Arc::new(Self::load(path)?);
        Ok(Arc::clone(GLOBAL_CONFIG.get_or_init(|| loaded)))
    }

    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ini = Ini::load_from_file_opt(path, parse_options()).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse(e.to_string()),
        })?;

        let mut config = Self::from_ini(&ini)?;
        config.source_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse a configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str_opt(text, parse_options())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let section = ini
            .section(Some(INSTALLER_SECTION))
            .ok_or_else(|| ConfigError::MissingSection(INSTALLER_SECTION.to_string()))?;
        let reader = SectionReader::new(INSTALLER_SECTION, section);

        let stable = ChannelSources {
            binaries: reader.unit_source("binaries", "binaries-md5", "binaries-dir")?,
            data: reader.unit_source("data", "data-md5", "data-dir")?,
        };

        let binaries_variant = match reader.optional("binaries-variant") {
            None => Some(DEFAULT_BINARIES_VARIANT.to_string()),
            Some(v) if v.is_empty() => None,
            Some(v) => Some(v.to_string()),
        };

        let engine_path = ini
            .section(Some(ENGINE_SECTION))
            .and_then(|s| s.get("path"))
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            version: reader.required("version")?.to_string(),
            development: reader.development_sources()?,
            stable,
            binaries_variant,
            data_bytes: reader.integer("data-bytes")?,
            data_line_count: reader.integer("data-7zlinecount")?,
            engine_path,
            source_file: None,
        })
    }

    /// Archive sources for the given channel, if configured.
    pub fn sources(&self, channel: Channel) -> Option<&ChannelSources> {
        match channel {
            Channel::Stable => Some(&self.stable),
            Channel::Development => self.development.as_ref(),
        }
    }

    /// File this configuration was loaded from, if any.
    pub fn source_file(&self) -> Option<&Path> {
        self.source_file.as_deref()
    }
}

/// Values are taken literally so Windows paths keep their backslashes.
fn parse_options() -> ParseOption {
    ParseOption {
        enabled_escape: false,
        ..ParseOption::default()
    }
}

/// Typed access to the values of one INI section.
struct SectionReader<'a> {
    name: &'a str,
    properties: &'a Properties,
}

impl<'a> SectionReader<'a> {
    fn new(name: &'a str, properties: &'a Properties) -> Self {
        Self { name, properties }
    }

    fn optional(&self, key: &str) -> Option<&'a str> {
        self.properties.get(key).map(str::trim)
    }

    fn required(&self, key: &str) -> Result<&'a str, ConfigError> {
        self.optional(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                section: self.name.to_string(),
                key: key.to_string(),
            })
    }

    fn integer(&self, key: &str) -> Result<u64, ConfigError> {
        let raw = self.required(key)?;
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{}' is not a non-negative integer: {}", raw, e),
        })
    }

    fn url(&self, key: &str) -> Result<Url, ConfigError> {
        let raw = self.required(key)?;
        Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("'{}' is not a valid URL: {}", raw, e),
        })
    }

    fn checksum(&self, key: &str) -> Result<ExpectedChecksum, ConfigError> {
        let raw = self.required(key)?;
        ExpectedChecksum::parse(raw).map_err(|reason| ConfigError::InvalidValue {
            key: key.to_string(),
            reason,
        })
    }

    fn unit_source(
        &self,
        url_key: &str,
        checksum_key: &str,
        dir_key: &str,
    ) -> Result<UnitSource, ConfigError> {
        Ok(UnitSource {
            url: self.url(url_key)?,
            checksum: self.checksum(checksum_key)?,
            root_dir: self.required(dir_key)?.to_string(),
        })
    }

    /// The development channel is all-or-nothing.
    fn development_sources(&self) -> Result<Option<ChannelSources>, ConfigError> {
        const KEYS: [&str; 6] = [
            "dev",
            "dev-md5",
            "dev-dir",
            "data-dev",
            "data-dev-md5",
            "data-dev-dir",
        ];

        let present = KEYS
            .iter()
            .filter(|k| self.optional(k).is_some_and(|v| !v.is_empty()))
            .count();

        if present == 0 {
            return Ok(None);
        }

        if let Some(missing) = KEYS
            .iter()
            .find(|k| self.optional(k).map_or(true, str::is_empty))
        {
            return Err(ConfigError::IncompleteChannel((*missing).to_string()));
        }

        Ok(Some(ChannelSources {
            binaries: self.unit_source("dev", "dev-md5", "dev-dir")?,
            data: self.unit_source("data-dev", "data-dev-md5", "data-dev-dir")?,
        }))
    }
}
