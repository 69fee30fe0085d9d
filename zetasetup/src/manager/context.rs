//! Per-run state shared between the orchestrator and its helpers.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::InstallConfig;

use super::error::{ManagerError, ManagerResult};
use super::progress::ProgressTracker;
use super::unit::{Unit, UnitState, UnitStates};

/// Ordered non-fatal problems of one run.
#[derive(Debug, Default)]
pub struct WarningLog {
    entries: Mutex<Vec<String>>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning; it is also written to the diagnostic log.
    pub fn push(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(warning = %message, "Run warning");
        self.entries.lock().push(message);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Copy of the warnings in the order they were recorded.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

/// Everything one install or uninstall run owns.
///
/// Built at the start of a run and dropped at its end; nothing here
/// outlives the run.
#[derive(Debug)]
pub struct RunContext {
    config: Arc<InstallConfig>,
    cancel: CancellationToken,
    warnings: WarningLog,
    progress: ProgressTracker,
    units: Mutex<UnitStates>,
}

impl RunContext {
    pub fn new(config: Arc<InstallConfig>, cancel: CancellationToken, progress: ProgressTracker) -> Self {
        Self {
            config,
            cancel,
            warnings: WarningLog::new(),
            progress,
            units: Mutex::new(UnitStates::default()),
        }
    }

    pub fn config(&self) -> &InstallConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation checkpoint before destructive work.
    pub fn checkpoint(&self) -> ManagerResult<()> {
        if self.cancel.is_cancelled() {
            Err(ManagerError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    /// Shorthand for `warnings().push(..)`.
    pub fn warn(&self, message: impl Into<String>) {
        self.warnings.push(message);
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Clear per-run state before a new run on the same context.
    pub fn begin_run(&self) {
        self.warnings.clear();
        self.progress.reset();
        *self.units.lock() = UnitStates::default();
    }

    pub fn unit_state(&self, unit: Unit) -> UnitState {
        self.units.lock().get(unit)
    }

    /// Copy of both unit states.
    pub fn unit_states(&self) -> UnitStates {
        *self.units.lock()
    }

    /// Record a unit transition.
    ///
    /// An out-of-graph transition is a programming error; it is logged and
    /// ignored rather than aborting the run.
    pub fn set_unit_state(&self, unit: Unit, state: UnitState) {
        if let Err(e) = self.units.lock().transition(unit, state) {
            warn!(error = %e, "Ignoring invalid unit transition");
        }
    }

    /// Mark all unfinished units as failed or cancelled.
    pub fn finish_units(&self, state: UnitState) {
        self.units.lock().finish_open(state);
    }
}
