//! Progress reporting for dictionary fetches.
//!
//! The fetcher pushes plain [`FetchProgress`] values into a
//! [`ProgressObserver`]; rendering is entirely up to the observer.
//! [`ProgressDisplay`] is the framework-free model of what a progress
//! dialog shows, used by the CLI renderer and by tests.

use crate::core::fetch::FetchProgress;

/// Receives the ordered progress stream of a single fetch.
pub trait ProgressObserver {
    fn on_progress(&mut self, progress: FetchProgress);
}

impl ProgressObserver for Vec<FetchProgress> {
    fn on_progress(&mut self, progress: FetchProgress) {
        self.push(progress);
    }
}

/// Title shown while the connection is being opened.
pub const CONNECTING_TITLE: &str = "Connecting";
/// Title shown once a fetch failed.
pub const ERROR_TITLE: &str = "Error";

/// Displayed state of a fetch progress indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressDisplay {
    pub title: String,
    /// Upper bound in kilobytes.
    pub max: u64,
    /// Current value in kilobytes.
    pub value: u64,
    /// Spinner instead of a bar.
    pub indeterminate: bool,
    /// Error text, set once the fetch failed.
    pub error: Option<String>,
}

impl Default for ProgressDisplay {
    fn default() -> Self {
        Self {
            title: CONNECTING_TITLE.to_string(),
            max: 0,
            value: 0,
            indeterminate: false,
            error: None,
        }
    }
}

impl ProgressDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, progress: &FetchProgress) {
        match progress {
            FetchProgress::Status {
                message,
                kilobytes,
                max_kilobytes,
            } => {
                if let Some(max) = max_kilobytes {
                    self.max = *max;
                }
                match kilobytes {
                    Some(value) => {
                        self.value = *value;
                        self.indeterminate = false;
                    }
                    None => self.indeterminate = true,
                }
                // A missing message keeps the current title.
                if let Some(message) = message {
                    self.title = message.clone();
                }
            }
            FetchProgress::Error { message, error } => {
                self.indeterminate = true;
                self.title = ERROR_TITLE.to_string();
                self.error = Some(message.clone().unwrap_or_else(|| error.to_string()));
            }
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl ProgressObserver for ProgressDisplay {
    fn on_progress(&mut self, progress: FetchProgress) {
        self.apply(&progress);
    }
}
