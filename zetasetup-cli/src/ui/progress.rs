//! Terminal progress bar fed by run events.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use zetasetup::manager::{ProgressEvent, PROGRESS_SCALE};

const BAR_TEMPLATE: &str = "{prefix:>12.cyan.bold} [{bar:40.cyan/blue}] {percent:>3}%  {wide_msg}";

const SPINNER_TEMPLATE: &str = "{prefix:>12.cyan.bold} {spinner:.cyan} {wide_msg}";

const BAR_CHARS: &str = "█▓░";

const TICK: Duration = Duration::from_millis(100);

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars(BAR_CHARS))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template(SPINNER_TEMPLATE).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress display for one run on the 0-1000 scale.
///
/// Switches to a spinner while the run reports indeterminate progress and
/// back to the bar on the next value.
pub struct RunProgress {
    bar: ProgressBar,
    indeterminate: bool,
}

impl RunProgress {
    pub fn new(title: &str) -> Self {
        Self::with_bar(ProgressBar::new(PROGRESS_SCALE as u64), title)
    }

    /// A progress display that draws nothing.
    #[cfg(test)]
    pub fn hidden(title: &str) -> Self {
        Self::with_bar(ProgressBar::hidden(), title)
    }

    fn with_bar(bar: ProgressBar, title: &str) -> Self {
        bar.set_length(PROGRESS_SCALE as u64);
        bar.set_style(bar_style());
        bar.set_prefix(title.to_string());
        Self {
            bar,
            indeterminate: false,
        }
    }

    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Value(value) => {
                if self.indeterminate {
                    self.bar.disable_steady_tick();
                    self.bar.set_style(bar_style());
                    self.indeterminate = false;
                }
                self.bar.set_position(u64::from(*value));
            }
            ProgressEvent::Indeterminate => {
                if !self.indeterminate {
                    self.bar.set_style(spinner_style());
                    self.bar.enable_steady_tick(TICK);
                    self.indeterminate = true;
                }
            }
            ProgressEvent::Status(text) => self.bar.set_message(text.clone()),
        }
    }

    pub fn set_message(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    /// Hide the bar while `f` writes to the terminal.
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.bar.suspend(f)
    }

    #[cfg(test)]
    fn is_indeterminate(&self) -> bool {
        self.indeterminate
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}
