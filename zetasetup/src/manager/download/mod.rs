//! Archive download and integrity checking.
//!
//! This module provides:
//! - Streaming HTTP downloads with cancellation (`http`)
//! - MD5 / SHA-256 checksum verification (`checksum`)
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//! use zetasetup::manager::{Fetcher, HttpFetcher, ExpectedChecksum, verify_checksum};
//!
//! let fetcher = HttpFetcher::new()?;
//! let dest = Path::new("/tmp/zetaglest/data.zip");
//!
//! fetcher.fetch("https://example.org/data.zip", dest, &CancellationToken::new(), &|received, total| {
//!     println!("{} of {:?} bytes", received, total);
//! })?;
//!
//! verify_checksum(dest, &ExpectedChecksum::parse("e4d909c290d0fb1ca068ffaddf22cbd0")?)?;
//! ```

mod checksum;
mod http;

pub use checksum::{
    calculate_file_checksum, is_cached_valid, verify_checksum, ChecksumAlgorithm, ExpectedChecksum,
};
pub use http::{HttpFetcher, USER_AGENT};
