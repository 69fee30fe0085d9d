//! Archive extraction through the 7-Zip command line.
//!
//! The engine is run as `7z x -y -o<dir> <archive>`. Its stdout is drained
//! line by line on a reader thread so the waiting thread can report
//! progress and react to cancellation without blocking on the pipe.

use std::ffi::OsString;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{ManagerError, ManagerResult};
use super::traits::{ArchiveExtractor, LineMonitor};

/// Executable names tried on the search path, in order.
pub const ENGINE_CANDIDATES: [&str; 3] = ["7z", "7za", "7zz"];

/// Marker 7-Zip prints in front of an error description.
const ERROR_MARKER: &str = "Error:";

/// Bounded wait between cancellation checks.
const WAIT_INTERVAL: Duration = Duration::from_millis(100);

/// How long a killed engine gets to exit.
const KILL_GRACE: Duration = Duration::from_millis(2500);

/// 7-Zip based archive extractor.
#[derive(Debug, Clone)]
pub struct ShellExtractor {
    program: PathBuf,
}

impl ShellExtractor {
    /// Use an explicit engine executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate the engine: the configured path if any, otherwise the first
    /// of [`ENGINE_CANDIDATES`] found on the search path.
    pub fn locate(configured: Option<&Path>) -> ManagerResult<Self> {
        if let Some(path) = configured {
            return Ok(Self::new(path));
        }

        ENGINE_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::new)
            .ok_or_else(|| ManagerError::ExtractorUnavailable {
                program: ENGINE_CANDIDATES[0].to_string(),
                reason: format!(
                    "none of {} found on the search path",
                    ENGINE_CANDIDATES.join(", ")
                ),
            })
    }

    /// Path of the engine executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, archive: &Path, dest_dir: &Path) -> Command {
        let mut output_arg = OsString::from("-o");
        output_arg.push(dest_dir);

        let mut command = Command::new(&self.program);
        command
            .arg("x")
            .arg("-y")
            .arg(output_arg)
            .arg(archive)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    fn spawn(&self, archive: &Path, dest_dir: &Path) -> ManagerResult<Child> {
        self.command(archive, dest_dir)
            .spawn()
            .map_err(|e| ManagerError::ExtractorUnavailable {
                program: self.program.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Kill the engine and give it a bounded time to exit.
    fn terminate(&self, child: &mut Child) {
        if let Err(e) = child.kill() {
            debug!(error = %e, "Engine already exited before kill");
        }

        let deadline = Instant::now() + KILL_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(WAIT_INTERVAL),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Could not query engine state after kill");
                    return;
                }
            }
        }

        warn!(
            program = %self.program.display(),
            grace_ms = KILL_GRACE.as_millis() as u64,
            "Engine unresponsive after kill"
        );
    }
}

impl ArchiveExtractor for ShellExtractor {
    fn extract(
        &self,
        archive: &Path,
        dest_dir: &Path,
        monitor: Option<&LineMonitor<'_>>,
        cancel: &CancellationToken,
    ) -> ManagerResult<()> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        fs::create_dir_all(dest_dir).map_err(|e| ManagerError::CreateDirFailed {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

        info!(
            archive = %archive.display(),
            dest = %dest_dir.display(),
            monitored = monitor.is_some(),
            "Extracting archive"
        );

        let mut child = self.spawn(archive, dest_dir)?;

        let (line_tx, line_rx) = mpsc::channel::<String>();
        let stdout_reader = child.stdout.take().map(|stdout| {
            thread::spawn(move || {
                for line in BufReader::new(stdout).split(b'\n').map_while(Result::ok) {
                    let line = String::from_utf8_lossy(&line).trim_end_matches('\r').to_string();
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            })
        });
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let mut captured = String::new();
        let mut lines_seen = 0u64;
        let mut on_line = |line: String| {
            lines_seen += 1;
            captured.push_str(&line);
            captured.push('\n');
            if let Some(monitor) = monitor {
                (monitor.on_line)(lines_seen);
            }
        };

        let mut stdout_open = true;
        let status: ExitStatus = loop {
            if cancel.is_cancelled() {
                info!(archive = %archive.display(), "Cancelling extraction");
                self.terminate(&mut child);
                return Err(ManagerError::Cancelled);
            }

            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    self.terminate(&mut child);
                    return Err(ManagerError::ExtractionFailed {
                        path: archive.to_path_buf(),
                        reason: format!("could not wait for {}: {}", self.program.display(), e),
                    });
                }
            }

            if stdout_open {
                match line_rx.recv_timeout(WAIT_INTERVAL) {
                    Ok(line) => on_line(line),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stdout_open = false,
                }
            } else {
                thread::sleep(WAIT_INTERVAL);
            }
        };

        // Remaining buffered lines after exit.
        if let Some(reader) = stdout_reader {
            let _ = reader.join();
        }
        for line in line_rx.try_iter() {
            on_line(line);
        }
        let stderr_text = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        captured.push_str(&stderr_text);

        debug!(
            archive = %archive.display(),
            lines = lines_seen,
            status = %status,
            "Engine exited"
        );

        if let Some(message) = find_engine_error(&captured) {
            return Err(ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: message,
            });
        }

        if !status.success() {
            return Err(ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: format!("{} exited with {}", self.program.display(), status),
            });
        }

        Ok(())
    }
}

/// Extract the engine's error description from its captured output.
///
/// Everything after the first `Error:` marker is the message, trimmed and
/// joined onto one line.
pub fn find_engine_error(output: &str) -> Option<String> {
    let index = output.find(ERROR_MARKER)?;
    let message: String = output[index + ERROR_MARKER.len()..]
        .trim()
        .chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .collect();
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_engine_error() {
        let output = "7-Zip 16.02\nExtracting archive: data.zip\nError: disk full\r\n";
        assert_eq!(find_engine_error(output).as_deref(), Some("disk full"));
    }

    #[test]
    fn test_find_engine_error_joins_lines() {
        let output = "Error:\ncannot open file\r\nas archive\n";
        assert_eq!(
            find_engine_error(output).as_deref(),
            Some("cannot open fileas archive")
        );
    }

    #[test]
    fn test_no_marker_no_error() {
        assert!(find_engine_error("Everything is Ok\n").is_none());
    }

    #[test]
    fn test_explicit_engine_path() {
        let extractor = ShellExtractor::locate(Some(Path::new("/opt/7zip/7zz"))).unwrap();
        assert_eq!(extractor.program(), Path::new("/opt/7zip/7zz"));
    }

    #[test]
    fn test_command_line_shape() {
        let extractor = ShellExtractor::new("7z");
        let command = extractor.command(Path::new("/tmp/data.zip"), Path::new("/opt/zg"));
        let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().to_string()).collect();
        assert_eq!(args, vec!["x", "-y", "-o/opt/zg", "/tmp/data.zip"]);
    }

    #[test]
    fn test_missing_engine_is_unavailable() {
        let temp = tempfile::TempDir::new().unwrap();
        let extractor = ShellExtractor::new(temp.path().join("no-such-7z"));
        let result = extractor.extract(
            &temp.path().join("data.zip"),
            &temp.path().join("out"),
            None,
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(ManagerError::ExtractorUnavailable { .. })));
    }

    /// Tests driving a shell script in place of the engine.
    #[cfg(unix)]
    mod fake_engine {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Mutex;
        use tempfile::TempDir;

        use crate::manager::progress::ProgressWindow;

        fn script(temp: &TempDir, body: &str) -> PathBuf {
            let path = temp.path().join("fake7z");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_monitored_lines_reach_target() {
            let temp = TempDir::new().unwrap();
            let engine = script(&temp, "for i in 1 2 3 4 5; do echo \"- file$i\"; done");
            let extractor = ShellExtractor::new(engine);

            let window = ProgressWindow::new(900, 980);
            let values = Mutex::new(Vec::new());
            let monitor = LineMonitor::new(5, |lines| {
                values.lock().unwrap().push(window.interpolate(lines, 5));
            });

            extractor
                .extract(
                    &temp.path().join("data.zip"),
                    &temp.path().join("out"),
                    Some(&monitor),
                    &CancellationToken::new(),
                )
                .unwrap();
            drop(monitor);

            let values = values.into_inner().unwrap();
            assert_eq!(values.len(), 5);
            assert_eq!(*values.last().unwrap(), 980);
            assert!(values.windows(2).all(|w| w[0] <= w[1]));
            assert!(values.iter().all(|v| (900..=980).contains(v)));
        }

        #[test]
        fn test_extra_lines_clamped() {
            let temp = TempDir::new().unwrap();
            let engine = script(&temp, "for i in 1 2 3 4 5 6 7 8; do echo line; done");
            let extractor = ShellExtractor::new(engine);

            let window = ProgressWindow::new(900, 980);
            let highest = AtomicU64::new(0);
            let monitor = LineMonitor::new(4, |lines| {
                highest.fetch_max(u64::from(window.interpolate(lines, 4)), Ordering::SeqCst);
            });

            extractor
                .extract(
                    &temp.path().join("data.zip"),
                    &temp.path().join("out"),
                    Some(&monitor),
                    &CancellationToken::new(),
                )
                .unwrap();

            assert_eq!(highest.load(Ordering::SeqCst), 980);
        }

        #[test]
        fn test_engine_error_message() {
            let temp = TempDir::new().unwrap();
            let engine = script(&temp, "echo 'Extracting'\necho 'Error: disk full'\nexit 2");
            let extractor = ShellExtractor::new(engine);

            let result = extractor.extract(
                &temp.path().join("data.zip"),
                &temp.path().join("out"),
                None,
                &CancellationToken::new(),
            );

            match result {
                Err(ManagerError::ExtractionFailed { reason, .. }) => assert_eq!(reason, "disk full"),
                other => panic!("Expected ExtractionFailed, got {:?}", other),
            }
        }

        #[test]
        fn test_error_on_stderr() {
            let temp = TempDir::new().unwrap();
            let engine = script(&temp, "echo 'Error: cannot open archive' >&2\nexit 2");
            let extractor = ShellExtractor::new(engine);

            let result = extractor.extract(
                &temp.path().join("data.zip"),
                &temp.path().join("out"),
                None,
                &CancellationToken::new(),
            );

            match result {
                Err(ManagerError::ExtractionFailed { reason, .. }) => {
                    assert_eq!(reason, "cannot open archive")
                }
                other => panic!("Expected ExtractionFailed, got {:?}", other),
            }
        }

        #[test]
        fn test_nonzero_exit_without_marker() {
            let temp = TempDir::new().unwrap();
            let engine = script(&temp, "exit 7");
            let extractor = ShellExtractor::new(engine);

            let result = extractor.extract(
                &temp.path().join("data.zip"),
                &temp.path().join("out"),
                None,
                &CancellationToken::new(),
            );

            assert!(matches!(result, Err(ManagerError::ExtractionFailed { .. })));
        }

        #[test]
        fn test_arguments_passed_to_engine() {
            let temp = TempDir::new().unwrap();
            let args_file = temp.path().join("args.txt");
            let engine = script(
                &temp,
                &format!("printf '%s\\n' \"$@\" > '{}'", args_file.display()),
            );
            let extractor = ShellExtractor::new(engine);
            let archive = temp.path().join("binaries.zip");
            let out = temp.path().join("install");

            extractor
                .extract(&archive, &out, None, &CancellationToken::new())
                .unwrap();

            let args = fs::read_to_string(&args_file).unwrap();
            let args: Vec<&str> = args.lines().collect();
            assert_eq!(args[0], "x");
            assert_eq!(args[1], "-y");
            assert_eq!(args[2], format!("-o{}", out.display()));
            assert_eq!(args[3], archive.display().to_string());
            assert!(out.is_dir());
        }

        #[test]
        fn test_cancel_kills_engine() {
            let temp = TempDir::new().unwrap();
            let engine = script(&temp, "echo started\nexec sleep 30");
            let extractor = ShellExtractor::new(engine);

            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            let monitor = LineMonitor::new(10, move |_| trigger.cancel());

            let started = Instant::now();
            let result = extractor.extract(
                &temp.path().join("data.zip"),
                &temp.path().join("out"),
                Some(&monitor),
                &cancel,
            );

            assert!(matches!(result, Err(ManagerError::Cancelled)));
            assert!(started.elapsed() < Duration::from_secs(10));
        }
    }
}
