//! # Configuration
//!
//! Tunables for the editor. There is no configuration file (see the crate's
//! non-goals): every field is a compiled-in default.

use std::time::Duration;

/// The size of a tab, in columns.
pub(crate) const TAB_STOP: usize = 4;

/// The number of confirmations needed before quitting with unsaved changes.
pub(crate) const QUIT_TIMES: usize = 3;

/// The duration for which status messages are shown before they expire.
pub(crate) const MESSAGE_DURATION: Duration = Duration::from_secs(5);

/// The maximum number of entries retained on either the undo or the redo stack.
pub(crate) const MAX_UNDO: usize = 1000;

/// The fixed width of the line-number gutter, including its separator.
pub(crate) const LINE_NUM_WIDTH: usize = 5;

/// The global `CCode` configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// The size of a tab. Must be > 0.
    pub(crate) tab_stop: usize,
    /// The number of confirmations needed before quitting, when changes have been made since the
    /// file was last saved.
    pub(crate) quit_times: usize,
    /// The duration for which messages are shown in the status bar.
    pub(crate) message_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self { tab_stop: TAB_STOP, quit_times: QUIT_TIMES, message_duration: MESSAGE_DURATION }
    }
}

impl Config {
    /// Return the compiled-in configuration.
    #[must_use]
    pub fn load() -> Self { Self::default() }
}
