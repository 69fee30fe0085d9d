//! Configuration error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the installer configuration.
///
/// Every variant is fatal: the installer cannot start without a complete,
/// well-formed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid INI.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A required section is absent.
    #[error("missing section [{0}]")]
    MissingSection(String),

    /// A required key is absent or empty.
    #[error("missing required key '{key}' in [{section}]")]
    MissingKey { section: String, key: String },

    /// A key is present but its value cannot be parsed.
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Some, but not all, development channel keys are present.
    #[error("incomplete development channel: missing '{0}'")]
    IncompleteChannel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_display() {
        let err = ConfigError::MissingKey {
            section: "installer".to_string(),
            key: "data-md5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required key 'data-md5' in [installer]"
        );
    }

    #[test]
    fn test_read_error_has_source() {
        use std::error::Error;

        let err = ConfigError::Read {
            path: PathBuf::from("/etc/zetasetup.ini"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/etc/zetasetup.ini"));
        assert!(err.source().is_some());
    }
}
