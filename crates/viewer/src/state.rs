//! The viewer's session-state value.
//!
//! All mutable session state lives in one [`ViewerState`] owned by the
//! controller and handed to presentation layers as a snapshot, instead of
//! being mutated from scattered socket callbacks.

use protocol::{FileEntry, Pin};

/// Viewer session phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    /// No session in progress.
    Idle,
    /// Reconnecting with a stored, non-expired session at startup.
    AutoResuming,
    /// Querying the relay's PIN-status endpoint.
    CheckingPin,
    /// Dialing the relay's viewer-attach address.
    Connecting,
    /// Browsing the host's shared tree.
    Active,
    /// Channel closed; terminal for this session instance.
    Disconnected,
}

/// Everything the presentation layer needs to render a session.
#[derive(Debug, Clone)]
pub struct ViewerState {
    /// Current phase.
    pub phase: ViewerPhase,
    /// The connected session's PIN.
    pub pin: Option<Pin>,
    /// The directory the displayed entries belong to.
    pub current_path: String,
    /// The displayed entry set, replaced wholesale by each listing response.
    pub entries: Vec<FileEntry>,
    /// Number of requests awaiting a response.
    pub pending_requests: usize,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            phase: ViewerPhase::Idle,
            pin: None,
            current_path: String::new(),
            entries: Vec::new(),
            pending_requests: 0,
        }
    }
}

impl ViewerState {
    /// Replaces the displayed listing.
    pub(crate) fn apply_listing(&mut self, path: String, entries: Vec<FileEntry>) {
        self.current_path = path;
        self.entries = entries;
    }
}
