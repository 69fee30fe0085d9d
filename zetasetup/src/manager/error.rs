//! Error types for the install manager.

use std::io;
use std::path::PathBuf;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while installing or uninstalling.
#[derive(Debug)]
pub enum ManagerError {
    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to delete a file or directory.
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Failed to move a file or directory.
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// Failed to download an archive.
    DownloadFailed { url: String, reason: String },

    /// Network timeout.
    Timeout { url: String, timeout_secs: u64 },

    /// HTTP client could not be constructed.
    HttpClient(String),

    /// Checksum verification failed.
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// The decompression engine could not be found or started.
    ExtractorUnavailable { program: String, reason: String },

    /// The decompression engine reported an error.
    ExtractionFailed { path: PathBuf, reason: String },

    /// An expected directory is missing from the extracted archive.
    LayoutMissing { path: PathBuf },

    /// Registration record could not be read or written.
    RegistryFailed { path: PathBuf, reason: String },

    /// The requested release channel is not configured.
    ChannelUnavailable(String),

    /// A worker thread of the run stopped unexpectedly.
    Internal(String),

    /// The run was cancelled.
    Cancelled,
}

/// Broad classification of a failure, used to pick recovery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network failure; retry reuses verified archives.
    Transport,
    /// Archive content does not match its checksum.
    Integrity,
    /// The decompression engine failed or is missing.
    Extraction,
    /// Local filesystem failure.
    Filesystem,
    /// Registration store failure.
    Registration,
    /// Invalid request or configuration.
    Configuration,
    /// A bug in the installer itself.
    Internal,
    /// Cancellation requested by the user.
    Cancelled,
}

/// Choices offered to the user after a fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOption {
    /// Run the install again from the current state.
    Retry,
    /// Remove everything the run produced.
    Abort,
    /// Leave the current state as is.
    Ignore,
}

impl ManagerError {
    /// Classify this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::DownloadFailed { .. } | Self::Timeout { .. } | Self::HttpClient(_) => {
                FailureKind::Transport
            }
            Self::ChecksumMismatch { .. } => FailureKind::Integrity,
            Self::ExtractorUnavailable { .. } | Self::ExtractionFailed { .. } => {
                FailureKind::Extraction
            }
            Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CreateDirFailed { .. }
            | Self::RemoveFailed { .. }
            | Self::MoveFailed { .. }
            | Self::LayoutMissing { .. } => FailureKind::Filesystem,
            Self::RegistryFailed { .. } => FailureKind::Registration,
            Self::ChannelUnavailable(_) => FailureKind::Configuration,
            Self::Internal(_) => FailureKind::Internal,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }

    /// Whether this error is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Recovery options to offer for this error.
    ///
    /// Configuration problems cannot be fixed by retrying, and a cancelled
    /// run has already rolled back.
    pub fn recovery_options(&self) -> &'static [RecoveryOption] {
        match self.kind() {
            FailureKind::Cancelled => &[],
            FailureKind::Configuration | FailureKind::Internal => &[RecoveryOption::Abort],
            _ => &[
                RecoveryOption::Retry,
                RecoveryOption::Abort,
                RecoveryOption::Ignore,
            ],
        }
    }
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::RemoveFailed { path, source } => {
                write!(f, "failed to delete {}: {}", path.display(), source)
            }
            Self::MoveFailed { from, to, source } => {
                write!(
                    f,
                    "failed to move {} to {}: {}",
                    from.display(),
                    to.display(),
                    source
                )
            }
            Self::DownloadFailed { url, reason } => {
                write!(f, "failed to download {}: {}", url, reason)
            }
            Self::Timeout { url, timeout_secs } => {
                write!(f, "request to {} timed out after {}s", url, timeout_secs)
            }
            Self::HttpClient(msg) => write!(f, "HTTP client error: {}", msg),
            Self::ChecksumMismatch {
                filename,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "checksum of {} does not match the one specified in the configuration: expected {}, got {}",
                    filename, expected, actual
                )
            }
            Self::ExtractorUnavailable { program, reason } => {
                write!(f, "could not start {}: {}", program, reason)
            }
            Self::ExtractionFailed { path, reason } => {
                write!(f, "failed to extract {}: {}", path.display(), reason)
            }
            Self::LayoutMissing { path } => {
                write!(
                    f,
                    "expected directory {} is missing after extraction",
                    path.display()
                )
            }
            Self::RegistryFailed { path, reason } => {
                write!(
                    f,
                    "registration record {} is unusable: {}",
                    path.display(),
                    reason
                )
            }
            Self::ChannelUnavailable(channel) => {
                write!(f, "the {} channel is not configured", channel)
            }
            Self::Internal(msg) => write!(f, "internal error: {}", msg),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::RemoveFailed { source, .. } => Some(source),
            Self::MoveFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Flatten an error and its `source()` chain into one line.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        let cause_text = cause.to_string();
        if !message.ends_with(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        current = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_mismatch_display() {
        let err = ManagerError::ChecksumMismatch {
            filename: "binaries.zip".to_string(),
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        assert!(err.to_string().contains("binaries.zip"));
        assert!(err.to_string().contains("abc123"));
        assert!(err.to_string().contains("def456"));
        assert_eq!(err.kind(), FailureKind::Integrity);
    }

    #[test]
    fn test_transport_and_integrity_are_distinct() {
        let transport = ManagerError::DownloadFailed {
            url: "https://example.org/data.zip".to_string(),
            reason: "connection reset".to_string(),
        };
        let integrity = ManagerError::ChecksumMismatch {
            filename: "data.zip".to_string(),
            expected: "a".to_string(),
            actual: "b".to_string(),
        };
        assert_eq!(transport.kind(), FailureKind::Transport);
        assert_ne!(transport.kind(), integrity.kind());
        assert_eq!(
            transport.recovery_options(),
            integrity.recovery_options()
        );
    }

    #[test]
    fn test_cancelled_offers_nothing() {
        assert!(ManagerError::Cancelled.is_cancelled());
        assert!(ManagerError::Cancelled.recovery_options().is_empty());
    }

    #[test]
    fn test_configuration_only_aborts() {
        let err = ManagerError::ChannelUnavailable("development".to_string());
        assert_eq!(err.recovery_options(), &[RecoveryOption::Abort]);
    }

    #[test]
    fn test_error_chain_includes_source() {
        let err = ManagerError::RemoveFailed {
            path: PathBuf::from("/opt/zetaglest/data.zip"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        };
        let chain = error_chain(&err);
        assert!(chain.contains("/opt/zetaglest/data.zip"));
        assert!(chain.ends_with("access denied"));
        // The io::Error text is already part of the top-level message.
        assert_eq!(chain.matches("access denied").count(), 1);
    }
}
