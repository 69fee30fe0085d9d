//! HTTP archive fetcher.
//!
//! Streams an archive to disk with byte-level progress callbacks. The
//! transfer runs on a small private tokio runtime and races the
//! cancellation token, so a stalled connection is abandoned as soon as
//! the run is cancelled.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::{FetchProgress, Fetcher};

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Worker threads of the transfer runtime. Two archives at most are in flight.
const RUNTIME_WORKERS: usize = 2;

/// Client identity sent with every request.
pub const USER_AGENT: &str = "ZetaGlest";

/// HTTP-based archive fetcher.
///
/// The client is built with a fixed user agent, with ambient proxy settings
/// disabled, and with certificate validation turned off. Trust in the
/// payload comes from the checksum in the installer configuration, which is
/// verified before anything is extracted; mirrors serving the archives are
/// not required to present a valid certificate chain.
///
/// `fetch` is a blocking call. It must not be made from inside another
/// tokio runtime.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    runtime: Runtime,
    pub(crate) timeout: Duration,
}

impl HttpFetcher {
    /// Create a new fetcher with default settings.
    pub fn new() -> ManagerResult<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> ManagerResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(RUNTIME_WORKERS)
            .thread_name("zetasetup-http")
            .enable_all()
            .build()
            .map_err(|e| ManagerError::HttpClient(e.to_string()))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .no_proxy()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(|e| ManagerError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            timeout,
        })
    }

    fn map_transfer_error(&self, url: &str, e: reqwest::Error) -> ManagerError {
        if e.is_timeout() {
            ManagerError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }

    /// Request `url` and stream the body to `dest`.
    async fn transfer(
        &self,
        url: &str,
        dest: &Path,
        on_progress: &FetchProgress<'_>,
    ) -> ManagerResult<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_transfer_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        let total = response.content_length().filter(|len| *len > 0);

        let file = File::create(dest).map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);
        let mut received = 0u64;

        on_progress(0, total);

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_transfer_error(url, e))?
        {
            writer
                .write_all(&chunk)
                .map_err(|e| ManagerError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            received += chunk.len() as u64;
            on_progress(received, total);
        }

        writer.flush().map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        if let Some(expected) = total {
            if received < expected {
                return Err(ManagerError::DownloadFailed {
                    url: url.to_string(),
                    reason: format!(
                        "connection closed after {} of {} bytes",
                        received, expected
                    ),
                });
            }
        }

        Ok(received)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &FetchProgress<'_>,
    ) -> ManagerResult<u64> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!(url, dest = %dest.display(), "Starting download");

        let bytes = self.runtime.block_on(async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(url, "Transfer aborted by cancellation");
                    Err(ManagerError::Cancelled)
                }
                result = self.transfer(url, dest, on_progress) => result,
            }
        })?;

        info!(url, bytes, "Download complete");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::Instant;
    use tempfile::TempDir;

    /// Serve a single canned HTTP response on a local port, then keep the
    /// connection open for `hold` before closing it.
    fn serve_and_hold(response: Vec<u8>, hold: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut line = String::new();
                while reader.read_line(&mut line).is_ok() {
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    line.clear();
                }
                stream.write_all(&response).ok();
                stream.flush().ok();
                thread::sleep(hold);
            }
        });

        format!("http://{}/archive.zip", addr)
    }

    /// Serve a single canned HTTP response on a local port.
    fn serve_once(response: Vec<u8>) -> String {
        serve_and_hold(response, Duration::ZERO)
    }

    #[test]
    fn test_http_fetcher_default_timeout() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.timeout.as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_http_fetcher_with_timeout() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(60)).unwrap();
        assert_eq!(fetcher.timeout.as_secs(), 60);
    }

    #[test]
    fn test_fetch_writes_body_and_reports_progress() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\nConnection: close\r\n\r\nhello world".to_vec(),
        );
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested").join("archive.zip");

        let last = AtomicU64::new(0);
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(10)).unwrap();
        let bytes = fetcher
            .fetch(&url, &dest, &CancellationToken::new(), &|received, total| {
                assert_eq!(total, Some(11));
                last.store(received, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(bytes, 11);
        assert_eq!(last.load(Ordering::SeqCst), 11);
        assert_eq!(fs::read(&dest).unwrap(), b"hello world");
    }

    #[test]
    fn test_fetch_error_status_is_transport_failure() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        );
        let temp = TempDir::new().unwrap();

        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(10)).unwrap();
        let result = fetcher.fetch(
            &url,
            &temp.path().join("archive.zip"),
            &CancellationToken::new(),
            &|_, _| {},
        );

        assert!(matches!(result, Err(ManagerError::DownloadFailed { .. })));
    }

    #[test]
    fn test_fetch_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let fetcher = HttpFetcher::new().unwrap();
        let result = fetcher.fetch(
            "http://127.0.0.1:9/never",
            &temp.path().join("archive.zip"),
            &cancel,
            &|_, _| {},
        );

        assert!(matches!(result, Err(ManagerError::Cancelled)));
    }

    #[test]
    fn test_cancel_interrupts_stalled_transfer() {
        // Headers promise a large body, three bytes arrive, then nothing.
        let url = serve_and_hold(
            b"HTTP/1.1 200 OK\r\nContent-Length: 1000000\r\n\r\nabc".to_vec(),
            Duration::from_secs(15),
        );
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                cancel.cancel();
            })
        };

        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(8)).unwrap();
        let started = Instant::now();
        let result = fetcher.fetch(&url, &temp.path().join("archive.zip"), &cancel, &|_, _| {});
        let elapsed = started.elapsed();
        canceller.join().unwrap();

        assert!(matches!(result, Err(ManagerError::Cancelled)), "got {:?}", result);
        assert!(elapsed < Duration::from_secs(2), "cancel took {:?}", elapsed);
    }

    #[test]
    fn test_short_body_is_transport_failure() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nabc".to_vec(),
        );
        let temp = TempDir::new().unwrap();

        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(10)).unwrap();
        let result = fetcher.fetch(
            &url,
            &temp.path().join("archive.zip"),
            &CancellationToken::new(),
            &|_, _| {},
        );

        assert!(
            matches!(result, Err(ManagerError::DownloadFailed { .. })),
            "got {:?}",
            result
        );
    }
}
