//! Combined progress for one run on a fixed 0-1000 scale.
//!
//! Each phase owns a [`ProgressWindow`] of the global scale and maps its own
//! progress (bytes received, output lines seen) into it. The
//! [`ProgressTracker`] keeps the reported value monotonic and forwards
//! changes to the presentation layer as [`ProgressEvent`]s.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::mpsc::UnboundedSender;

/// Upper bound of the global progress scale.
pub const PROGRESS_SCALE: u32 = 1000;

/// Window covered by the data archive download.
pub const DATA_DOWNLOAD_WINDOW: ProgressWindow = ProgressWindow::new(0, 900);

/// Window covered by the monitored data archive extraction.
pub const DATA_EXTRACT_WINDOW: ProgressWindow = ProgressWindow::new(900, 980);

/// A `[start, target]` slice of the global scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressWindow {
    start: u32,
    target: u32,
}

impl ProgressWindow {
    /// Create a window; bounds are clamped to the scale and ordered.
    pub const fn new(start: u32, target: u32) -> Self {
        let target = if target > PROGRESS_SCALE {
            PROGRESS_SCALE
        } else {
            target
        };
        let start = if start > target { target } else { start };
        Self { start, target }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Linear position of `done` out of `total`, clamped into the window.
    ///
    /// A zero `total` maps to `start`.
    pub fn interpolate(&self, done: u64, total: u64) -> u32 {
        if total == 0 {
            return self.start;
        }

        let span = u128::from(self.target - self.start);
        let offset = span * u128::from(done.min(total)) / u128::from(total);
        // offset <= span, which fits in u32
        self.start + offset as u32
    }
}

/// Update sent to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// New position on the 0-1000 scale.
    Value(u32),
    /// Progress cannot be measured for now; show an activity indicator.
    Indeterminate,
    /// Human-readable status line.
    Status(String),
}

/// Monotonic progress value for one run.
#[derive(Debug)]
pub struct ProgressTracker {
    value: AtomicU32,
    indeterminate: AtomicBool,
    sender: Option<UnboundedSender<ProgressEvent>>,
}

impl ProgressTracker {
    /// Create a tracker forwarding events to `sender`.
    pub fn new(sender: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            value: AtomicU32::new(0),
            indeterminate: AtomicBool::new(false),
            sender: Some(sender),
        }
    }

    /// Create a tracker that only records the value.
    pub fn detached() -> Self {
        Self {
            value: AtomicU32::new(0),
            indeterminate: AtomicBool::new(false),
            sender: None,
        }
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(sender) = &self.sender {
            // A closed receiver only means nobody is watching any more.
            let _ = sender.send(event);
        }
    }

    /// Current value.
    pub fn value(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    /// Start of a new run: back to 0.
    pub fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
        self.indeterminate.store(false, Ordering::SeqCst);
        self.send(ProgressEvent::Value(0));
    }

    /// Move to `value` unless the tracker is already past it.
    ///
    /// Returns the value now reported.
    pub fn advance_to(&self, value: u32) -> u32 {
        let value = value.min(PROGRESS_SCALE);
        let previous = self.value.fetch_max(value, Ordering::SeqCst);
        let was_indeterminate = self.indeterminate.swap(false, Ordering::SeqCst);

        if value > previous || was_indeterminate {
            self.send(ProgressEvent::Value(value.max(previous)));
        }

        value.max(previous)
    }

    /// Move to the position of `done` out of `total` within `window`.
    pub fn advance_in(&self, window: ProgressWindow, done: u64, total: u64) -> u32 {
        self.advance_to(window.interpolate(done, total))
    }

    /// Switch the presentation to an activity indicator.
    ///
    /// Only the first call until the next value change sends an event.
    pub fn set_indeterminate(&self) {
        if !self.indeterminate.swap(true, Ordering::SeqCst) {
            self.send(ProgressEvent::Indeterminate);
        }
    }

    /// Send a status line.
    pub fn status(&self, text: impl Into<String>) {
        self.send(ProgressEvent::Status(text.into()));
    }
}
