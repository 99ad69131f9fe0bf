//! Terminal rendering of fetch progress.

use crate::core::fetch::FetchProgress;
use crate::core::progress::{ProgressDisplay, ProgressObserver};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Mirrors a [`ProgressDisplay`] onto an `indicatif` bar.
pub struct TerminalProgress {
    display: ProgressDisplay,
    bar: ProgressBar,
    spinning: bool,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(Self::spinner_style());
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            display: ProgressDisplay::new(),
            bar,
            spinning: true,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg}\n[{bar:40.cyan/blue}] {pos}/{len} kB")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ")
    }

    pub fn display(&self) -> &ProgressDisplay {
        &self.display
    }

    pub fn finish(&self) {
        if self.display.is_error() {
            self.bar.abandon();
        } else {
            self.bar.finish_and_clear();
        }
    }

    fn render(&mut self) {
        let display = &self.display;
        if display.indeterminate != self.spinning {
            self.spinning = display.indeterminate;
            self.bar.set_style(if self.spinning {
                Self::spinner_style()
            } else {
                Self::bar_style()
            });
        }
        self.bar.set_length(display.max.max(display.value));
        self.bar.set_position(display.value);
        match &display.error {
            Some(error) => self.bar.set_message(format!("{}: {error}", display.title)),
            None => self.bar.set_message(display.title.clone()),
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for TerminalProgress {
    fn on_progress(&mut self, progress: FetchProgress) {
        self.display.apply(&progress);
        self.render();
    }
}
