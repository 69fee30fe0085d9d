//! Archive checksum calculation and verification.
//!
//! Release archives are published with an MD5 digest; SHA-256 digests are
//! accepted as well and told apart by their length.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::manager::error::{ManagerError, ManagerResult};

/// Buffer size for reading files during checksum calculation (1MB).
const BUFFER_SIZE: usize = 1024 * 1024;

/// Digest algorithm of a configured checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    /// Number of hex digits in a digest of this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }

    fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            32 => Some(Self::Md5),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }
}

/// A normalized expected digest.
///
/// Separators (`-`, `:` and whitespace) are stripped and the digits are
/// lower-cased once, when the configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedChecksum {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ExpectedChecksum {
    /// Normalize and validate a digest string.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let hex: String = raw
            .chars()
            .filter(|c| !matches!(c, '-' | ':') && !c.is_whitespace())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(format!("'{}' contains non-hex character '{}'", raw, bad));
        }

        let algorithm = ChecksumAlgorithm::from_hex_len(hex.len()).ok_or_else(|| {
            format!(
                "'{}' has {} hex digits, expected 32 (MD5) or 64 (SHA-256)",
                raw,
                hex.len()
            )
        })?;

        Ok(Self { algorithm, hex })
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Normalized lower-case hex digest.
    pub fn as_str(&self) -> &str {
        &self.hex
    }

    /// Case-insensitive comparison against a computed digest.
    pub fn matches(&self, actual: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual)
    }
}

impl std::fmt::Display for ExpectedChecksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Calculate the checksum of a file.
///
/// # Returns
///
/// The lowercase hexadecimal digest of the file contents, with no separators.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn calculate_file_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> ManagerResult<String> {
    let file = File::open(path).map_err(|e| ManagerError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    match algorithm {
        ChecksumAlgorithm::Md5 => digest_reader::<Md5>(file, path),
        ChecksumAlgorithm::Sha256 => digest_reader::<Sha256>(file, path),
    }
}

fn digest_reader<D: Digest>(file: File, path: &Path) -> ManagerResult<String> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| ManagerError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex_lower(&hasher.finalize()))
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Verify that a file matches an expected checksum.
///
/// # Returns
///
/// `Ok(())` if the checksum matches, or an error if it doesn't or if the file cannot be read.
pub fn verify_checksum(path: &Path, expected: &ExpectedChecksum) -> ManagerResult<()> {
    let actual = calculate_file_checksum(path, expected.algorithm())?;
    if !expected.matches(&actual) {
        return Err(ManagerError::ChecksumMismatch {
            filename: path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Whether `path` exists and already matches `expected`.
///
/// Read errors count as "no valid cached file".
pub fn is_cached_valid(path: &Path, expected: &ExpectedChecksum) -> bool {
    path.is_file()
        && calculate_file_checksum(path, expected.algorithm())
            .map(|actual| expected.matches(&actual))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn hello_file(temp: &TempDir) -> std::path::PathBuf {
        let file_path = temp.path().join("test.zip");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"hello world").unwrap();
        file_path
    }

    #[test]
    fn test_calculate_md5() {
        let temp = TempDir::new().unwrap();
        let path = hello_file(&temp);

        let checksum = calculate_file_checksum(&path, ChecksumAlgorithm::Md5).unwrap();
        assert_eq!(checksum, HELLO_MD5);
    }

    #[test]
    fn test_calculate_sha256() {
        let temp = TempDir::new().unwrap();
        let path = hello_file(&temp);

        let checksum = calculate_file_checksum(&path, ChecksumAlgorithm::Sha256).unwrap();
        assert_eq!(checksum, HELLO_SHA256);
    }

    #[test]
    fn test_calculate_empty_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("empty.zip");
        File::create(&file_path).unwrap();

        let checksum = calculate_file_checksum(&file_path, ChecksumAlgorithm::Md5).unwrap();
        assert_eq!(checksum, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_calculate_nonexistent_file() {
        let result = calculate_file_checksum(
            Path::new("/nonexistent/file.zip"),
            ChecksumAlgorithm::Md5,
        );
        assert!(matches!(result, Err(ManagerError::ReadFailed { .. })));
    }

    #[test]
    fn test_expected_checksum_normalization() {
        let expected = ExpectedChecksum::parse(" 5E-B6-3B-BB-E0-1E-EE-D0-93-CB-22-BB-8F-5A-CD-C3 ").unwrap();
        assert_eq!(expected.as_str(), HELLO_MD5);
        assert_eq!(expected.algorithm(), ChecksumAlgorithm::Md5);
        assert!(expected.matches(&HELLO_MD5.to_uppercase()));
    }

    #[test]
    fn test_expected_checksum_rejects_bad_input() {
        assert!(ExpectedChecksum::parse("abc").is_err());
        assert!(ExpectedChecksum::parse(&"z".repeat(32)).is_err());
        assert!(ExpectedChecksum::parse(&"a".repeat(40)).is_err());
    }

    #[test]
    fn test_verify_checksum_match() {
        let temp = TempDir::new().unwrap();
        let path = hello_file(&temp);

        let expected = ExpectedChecksum::parse(HELLO_SHA256).unwrap();
        assert!(verify_checksum(&path, &expected).is_ok());
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = hello_file(&temp);

        let expected = ExpectedChecksum::parse("d41d8cd98f00b204e9800998ecf8427e").unwrap();
        match verify_checksum(&path, &expected) {
            Err(ManagerError::ChecksumMismatch {
                filename, actual, ..
            }) => {
                assert_eq!(filename, "test.zip");
                assert_eq!(actual, HELLO_MD5);
            }
            other => panic!("Expected ChecksumMismatch error, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupted_byte_changes_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("large.zip");

        // Larger than the buffer so the corruption lands in a later chunk.
        let mut data = vec![0xABu8; BUFFER_SIZE + 4096];
        fs::write(&path, &data).unwrap();
        let original = calculate_file_checksum(&path, ChecksumAlgorithm::Md5).unwrap();
        let expected = ExpectedChecksum::parse(&original).unwrap();

        let last = data.len() - 1;
        data[last] ^= 0x01;
        fs::write(&path, &data).unwrap();

        assert!(verify_checksum(&path, &expected).is_err());
        assert!(!is_cached_valid(&path, &expected));
    }

    #[test]
    fn test_is_cached_valid_missing_file() {
        let expected = ExpectedChecksum::parse(HELLO_MD5).unwrap();
        assert!(!is_cached_valid(Path::new("/nonexistent/binaries.zip"), &expected));
    }
}
