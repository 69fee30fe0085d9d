//! CLI error type.

use std::fmt;

use zetasetup::config::ConfigError;
use zetasetup::manager::{error_chain, ManagerError};

/// Errors that end a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// The installer configuration could not be loaded.
    Config(ConfigError),
    /// An install or uninstall run failed.
    Manager(ManagerError),
    /// An interactive prompt could not be shown or answered.
    Prompt(String),
    /// The interrupt handler could not be installed.
    Signal(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", error_chain(e)),
            CliError::Manager(e) => write!(f, "{}", error_chain(e)),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
            CliError::Signal(msg) => write!(f, "Failed to set signal handler: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Manager(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CliError::from(ConfigError::MissingSection("installer".to_string()));
        assert_eq!(err.to_string(), "Configuration error: missing section [installer]");
    }

    #[test]
    fn test_manager_error_keeps_chain() {
        let err = CliError::from(ManagerError::WriteFailed {
            path: "/opt/ZetaGlest".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        assert_eq!(err.to_string(), "failed to write /opt/ZetaGlest: denied");
        assert!(std::error::Error::source(&err).is_some());
    }
}
