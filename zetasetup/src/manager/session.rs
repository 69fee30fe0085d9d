//! Background runs with a progress channel.
//!
//! An [`InstallSession`] runs one install or uninstall on a worker thread
//! and hands [`ProgressEvent`]s to the presentation layer over a channel, so
//! the worker never calls into the UI.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

use super::context::RunContext;
use super::error::{ManagerError, ManagerResult};
use super::installer::{InstallOptions, Installer, RunOutcome};
use super::progress::{ProgressEvent, ProgressTracker};
use super::unit::UnitStates;

/// Result of a finished session.
#[derive(Debug)]
pub struct RunReport {
    pub result: ManagerResult<RunOutcome>,
    /// Non-fatal problems collected during the run, in order.
    pub warnings: Vec<String>,
    /// Where each archive unit ended up.
    pub units: UnitStates,
}

/// A run executing on a worker thread.
#[derive(Debug)]
pub struct InstallSession {
    events: UnboundedReceiver<ProgressEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<RunReport>,
}

impl InstallSession {
    /// Start [`Installer::start_install`] in the background.
    pub fn install(installer: Arc<Installer>, path: PathBuf, options: InstallOptions) -> Self {
        Self::spawn(installer, move |installer, ctx| {
            installer.start_install(ctx, &path, &options)
        })
    }

    /// Start [`Installer::start_uninstall`] in the background.
    pub fn uninstall(installer: Arc<Installer>, path: PathBuf) -> Self {
        Self::spawn(installer, move |installer, ctx| {
            installer.start_uninstall(ctx, &path)
        })
    }

    fn spawn<F>(installer: Arc<Installer>, run: F) -> Self
    where
        F: FnOnce(&Installer, &RunContext) -> ManagerResult<RunOutcome> + Send + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = thread::spawn(move || {
            // The sender lives in ctx; dropping ctx closes the event channel.
            let ctx = installer.new_context(token, ProgressTracker::new(tx));
            let result = run(&*installer, &ctx);
            RunReport {
                result,
                warnings: ctx.warnings().snapshot(),
                units: ctx.unit_states(),
            }
        });

        Self {
            events,
            cancel,
            handle,
        }
    }

    /// Token that cancels this run, for signal handlers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request cancellation; the run stops at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the worker has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the next event. `None` once the run has ended and every
    /// event has been received.
    ///
    /// Must not be called from within an async runtime.
    pub fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.blocking_recv()
    }

    /// Take an event if one is ready, without blocking.
    pub fn try_next_event(&mut self) -> Option<ProgressEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the run to end.
    pub fn wait(self) -> RunReport {
        self.handle.join().unwrap_or_else(|_| RunReport {
            result: Err(ManagerError::Internal("install worker panicked".to_string())),
            warnings: Vec::new(),
            units: UnitStates::default(),
        })
    }
}
