//! Viewer session controller.
//!
//! Drives one browsing session: check the PIN with the relay, attach the
//! channel, request the root listing, then translate user actions into
//! outbound requests and inbound responses into state updates. Requests
//! carry correlation ids and are tracked in a pending map, so concurrent
//! operations (several uploads, a listing racing a download) match their
//! responses regardless of arrival order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use protocol::messages::{DeleteFile, DownloadFile, ListFiles, UploadFile};
use protocol::{Envelope, Message, Pin};
use relay_client::{
    ApiError, ChannelError, ChannelEvent, RelayApi, RelayChannel, RelayEndpoints, SessionStore,
    StoredSession,
};

use crate::state::{ViewerPhase, ViewerState};

/// Errors that end or refuse a viewer action.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The pre-connect PIN check or another REST call failed.
    #[error(transparent)]
    Relay(#[from] ApiError),

    /// The channel could not be established or used.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// No stored session is available to resume.
    #[error("no resumable session stored")]
    NothingToResume,

    /// A command was issued without an active session.
    #[error("not connected")]
    NotConnected,

    /// A local file for upload could not be read.
    #[error("cannot read {path}: {source}")]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Events emitted to the user-facing layer.
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    /// The session moved to a new phase.
    PhaseChanged(ViewerPhase),
    /// A listing response replaced the displayed entries.
    ListingUpdated { path: String },
    /// Downloaded bytes were persisted locally.
    DownloadSaved { path: String, saved_to: PathBuf },
    /// An upload was acknowledged by the host.
    UploadFinished { path: String },
    /// The host reported a failed operation, or a payload was unusable.
    OperationFailed { message: String },
    /// The channel closed.
    Closed { reason: String },
}

/// What a pending request was asking for.
#[derive(Debug, Clone)]
enum Pending {
    Listing { path: String },
    Download { path: String },
    Upload { path: String },
    Delete { path: String },
}

/// Orchestrates one viewer session at a time.
pub struct ViewerController {
    api: RelayApi,
    endpoints: RelayEndpoints,
    store: Arc<SessionStore>,
    download_dir: PathBuf,
    state: Arc<RwLock<ViewerState>>,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    channel: tokio::sync::Mutex<Option<Arc<RelayChannel>>>,
    user_disconnect: Arc<AtomicBool>,
    event_tx: broadcast::Sender<ViewerEvent>,
}

impl ViewerController {
    /// Creates a controller for the given relay, session slot and download
    /// directory.
    pub fn new(endpoints: RelayEndpoints, store: SessionStore, download_dir: PathBuf) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            api: RelayApi::new(endpoints.clone()),
            endpoints,
            store: Arc::new(store),
            download_dir,
            state: Arc::new(RwLock::new(ViewerState::default())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            channel: tokio::sync::Mutex::new(None),
            user_disconnect: Arc::new(AtomicBool::new(false)),
            event_tx,
        }
    }

    /// Snapshot of the session state for presentation.
    pub fn state(&self) -> ViewerState {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.event_tx.subscribe()
    }

    /// Connects to the host behind `pin` and requests the root listing.
    pub async fn connect(&self, pin: Pin) -> Result<(), ViewerError> {
        self.connect_with(pin, false).await
    }

    /// Resumes the stored session, when one exists and is fresh enough.
    ///
    /// A failed resume clears the slot so the next startup does not retry a
    /// dead PIN.
    pub async fn auto_resume(&self) -> Result<(), ViewerError> {
        let session = self.store.load_valid().ok_or(ViewerError::NothingToResume)?;
        info!(pin = %session.pin, "auto-resuming stored session");
        self.connect_with(session.pin, true).await
    }

    async fn connect_with(&self, pin: Pin, resuming: bool) -> Result<(), ViewerError> {
        self.set_phase(if resuming {
            ViewerPhase::AutoResuming
        } else {
            ViewerPhase::CheckingPin
        });

        let result = self.establish(pin).await;
        if let Err(e) = &result {
            warn!(error = %e, "viewer connect failed");
            if resuming {
                if let Err(clear_err) = self.store.clear() {
                    warn!(error = %clear_err, "failed to clear stale session slot");
                }
            }
            self.emit(ViewerEvent::OperationFailed {
                message: e.to_string(),
            });
            self.set_phase(ViewerPhase::Idle);
        }
        result
    }

    async fn establish(&self, pin: Pin) -> Result<(), ViewerError> {
        // The socket alone cannot distinguish "wrong PIN" from "right PIN,
        // host offline"; the REST check supplies that taxonomy up front.
        self.api.ensure_host_ready(&pin).await?;

        self.set_phase(ViewerPhase::Connecting);
        let url = self.endpoints.viewer_attach_url(&pin);
        let (channel, mut events) = RelayChannel::connect(&url).await?;
        match events.recv().await {
            Some(ChannelEvent::Opened) => {}
            other => {
                return Err(
                    ChannelError::Connect(format!("channel ended before opening: {other:?}"))
                        .into(),
                );
            }
        }

        if let Err(e) = self.store.save(&StoredSession::new(pin.clone(), None)) {
            warn!(error = %e, "failed to persist session slot");
        }

        let channel = Arc::new(channel);
        *self.channel.lock().await = Some(Arc::clone(&channel));
        self.user_disconnect.store(false, Ordering::SeqCst);
        {
            let mut state = self.state.write().expect("state lock poisoned");
            state.pin = Some(pin.clone());
            state.current_path = String::new();
            state.entries.clear();
        }

        tokio::spawn(run_inbound(InboundContext {
            channel: Arc::clone(&channel),
            state: Arc::clone(&self.state),
            pending: Arc::clone(&self.pending),
            store: Arc::clone(&self.store),
            download_dir: self.download_dir.clone(),
            user_disconnect: Arc::clone(&self.user_disconnect),
            event_tx: self.event_tx.clone(),
        }, events));

        self.set_phase(ViewerPhase::Active);
        info!(%pin, "viewer session active");

        // First action on every session: list the shared root.
        self.list("").await
    }

    /// Requests a directory listing.
    pub async fn list(&self, path: &str) -> Result<(), ViewerError> {
        self.send_request(
            Message::ListFiles(ListFiles::request(path)),
            Pending::Listing {
                path: path.to_string(),
            },
        )
        .await
    }

    /// Requests file bytes; the content lands in the download directory.
    pub async fn download(&self, path: &str) -> Result<(), ViewerError> {
        self.send_request(
            Message::DownloadFile(DownloadFile {
                path: path.to_string(),
            }),
            Pending::Download {
                path: path.to_string(),
            },
        )
        .await
    }

    /// Uploads one local file into the current remote directory.
    ///
    /// The file is read fully into memory and sent as a single message;
    /// several uploads may be in flight at once, each matched to its
    /// response by correlation id.
    pub async fn upload(&self, local: &Path) -> Result<(), ViewerError> {
        let filename = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ViewerError::LocalFile {
                path: local.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            })?;
        let bytes = tokio::fs::read(local)
            .await
            .map_err(|source| ViewerError::LocalFile {
                path: local.to_path_buf(),
                source,
            })?;

        let current = self.state().current_path;
        let remote_path = join_remote_path(&current, &filename);
        debug!(local = %local.display(), %remote_path, bytes = bytes.len(), "uploading");

        self.send_request(
            Message::UploadFile(UploadFile {
                path: remote_path.clone(),
                content: bytes.into(),
                filename,
            }),
            Pending::Upload { path: remote_path },
        )
        .await
    }

    /// Requests deletion of a remote file.
    pub async fn delete(&self, path: &str) -> Result<(), ViewerError> {
        self.send_request(
            Message::DeleteFile(DeleteFile {
                path: path.to_string(),
            }),
            Pending::Delete {
                path: path.to_string(),
            },
        )
        .await
    }

    /// Cleanly ends the session; the stored slot is kept for later resumes.
    pub async fn disconnect(&self) {
        self.user_disconnect.store(true, Ordering::SeqCst);
        if let Some(channel) = self.channel.lock().await.take() {
            channel.close();
        }
    }

    /// Ends the session and forgets the stored slot.
    pub async fn logout(&self) -> Result<(), ViewerError> {
        self.disconnect().await;
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear session slot");
        }
        Ok(())
    }

    async fn send_request(&self, message: Message, pending: Pending) -> Result<(), ViewerError> {
        let channel = self
            .channel
            .lock()
            .await
            .clone()
            .ok_or(ViewerError::NotConnected)?;
        if !channel.is_open() {
            return Err(ViewerError::NotConnected);
        }

        let envelope = Envelope::request(message);
        if let Some(id) = envelope.request_id.clone() {
            let mut map = self.pending.lock().expect("pending lock poisoned");
            map.insert(id, pending);
            let count = map.len();
            drop(map);
            self.state
                .write()
                .expect("state lock poisoned")
                .pending_requests = count;
        }
        channel.send(envelope).await?;
        Ok(())
    }

    fn set_phase(&self, phase: ViewerPhase) {
        self.state.write().expect("state lock poisoned").phase = phase;
        self.emit(ViewerEvent::PhaseChanged(phase));
    }

    fn emit(&self, event: ViewerEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Shared handles the inbound loop works with.
struct InboundContext {
    channel: Arc<RelayChannel>,
    state: Arc<RwLock<ViewerState>>,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    store: Arc<SessionStore>,
    download_dir: PathBuf,
    user_disconnect: Arc<AtomicBool>,
    event_tx: broadcast::Sender<ViewerEvent>,
}

impl InboundContext {
    fn emit(&self, event: ViewerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn take_pending(&self, request_id: &Option<String>) -> Option<Pending> {
        let id = request_id.as_deref()?;
        let mut map = self.pending.lock().expect("pending lock poisoned");
        let taken = map.remove(id);
        let count = map.len();
        drop(map);
        self.state
            .write()
            .expect("state lock poisoned")
            .pending_requests = count;
        taken
    }
}

/// Consumes the ordered channel events for one session.
async fn run_inbound(ctx: InboundContext, mut events: mpsc::Receiver<ChannelEvent>) {
    loop {
        match events.recv().await {
            Some(ChannelEvent::Message(envelope)) => handle_message(&ctx, envelope).await,
            Some(ChannelEvent::Opened) => {}
            Some(ChannelEvent::Closed { code, reason }) => {
                finish_session(&ctx, close_reason(code, &reason));
                return;
            }
            None => {
                finish_session(&ctx, "connection lost".to_string());
                return;
            }
        }
    }
}

fn finish_session(ctx: &InboundContext, reason: String) {
    info!(%reason, "viewer session ended");
    {
        let mut state = ctx.state.write().expect("state lock poisoned");
        state.phase = ViewerPhase::Disconnected;
        state.pending_requests = 0;
    }
    ctx.pending.lock().expect("pending lock poisoned").clear();

    // A clean, user-requested disconnect keeps the slot for later resumes;
    // any other closure invalidates it so the next startup does not retry a
    // dead PIN.
    if !ctx.user_disconnect.load(Ordering::SeqCst) {
        if let Err(e) = ctx.store.clear() {
            warn!(error = %e, "failed to clear session slot");
        }
    }

    ctx.emit(ViewerEvent::PhaseChanged(ViewerPhase::Disconnected));
    ctx.emit(ViewerEvent::Closed { reason });
}

async fn handle_message(ctx: &InboundContext, envelope: Envelope) {
    let pending = ctx.take_pending(&envelope.request_id);
    match envelope.message {
        Message::ListFiles(listing) if !listing.is_request() => {
            let entries = listing.files.unwrap_or_default();
            let count = entries.len();
            ctx.state
                .write()
                .expect("state lock poisoned")
                .apply_listing(listing.path.clone(), entries);
            debug!(path = %listing.path, count, "listing updated");
            ctx.emit(ViewerEvent::ListingUpdated { path: listing.path });
        }
        Message::FileContent(content) => {
            let name = sanitize_filename(&content.filename)
                .or_else(|| sanitize_filename(&content.path))
                .unwrap_or_else(|| "download".to_string());
            match content.content.decode() {
                Ok(bytes) => {
                    let target = ctx.download_dir.join(&name);
                    let written = tokio::fs::create_dir_all(&ctx.download_dir).await;
                    let written = match written {
                        Ok(()) => tokio::fs::write(&target, &bytes).await,
                        Err(e) => Err(e),
                    };
                    match written {
                        Ok(()) => {
                            info!(path = %content.path, saved_to = %target.display(), "download saved");
                            ctx.emit(ViewerEvent::DownloadSaved {
                                path: content.path,
                                saved_to: target,
                            });
                        }
                        Err(e) => ctx.emit(ViewerEvent::OperationFailed {
                            message: format!("failed to save {}: {}", name, e),
                        }),
                    }
                }
                Err(e) => ctx.emit(ViewerEvent::OperationFailed {
                    message: e.to_string(),
                }),
            }
        }
        Message::UploadResponse(outcome) => {
            if outcome.success {
                let path = outcome
                    .path
                    .or_else(|| match &pending {
                        Some(Pending::Upload { path }) => Some(path.clone()),
                        _ => None,
                    })
                    .unwrap_or_default();
                ctx.emit(ViewerEvent::UploadFinished { path });

                // Refresh the view so the new file shows up.
                let current = {
                    let state = ctx.state.read().expect("state lock poisoned");
                    state.current_path.clone()
                };
                let refresh = Envelope::request(Message::ListFiles(ListFiles::request(
                    current.clone(),
                )));
                if let Some(id) = refresh.request_id.clone() {
                    ctx.pending
                        .lock()
                        .expect("pending lock poisoned")
                        .insert(id, Pending::Listing { path: current });
                }
                if let Err(e) = ctx.channel.send(refresh).await {
                    debug!(error = %e, "skipping refresh: channel closed");
                }
            } else {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "operation failed".to_string());
                let message = match pending {
                    Some(Pending::Listing { path }) => format!("list {path:?}: {message}"),
                    Some(Pending::Download { path }) => format!("download {path:?}: {message}"),
                    Some(Pending::Upload { path }) => format!("upload {path:?}: {message}"),
                    Some(Pending::Delete { path }) => format!("delete {path:?}: {message}"),
                    None => message,
                };
                warn!(%message, "host reported failure");
                ctx.emit(ViewerEvent::OperationFailed { message });
            }
        }
        other => {
            debug!(message_type = other.type_str(), "ignoring request-shaped message");
        }
    }
}

/// Maps WebSocket close codes to the reasons users actually see.
fn close_reason(code: Option<u16>, reason: &str) -> String {
    match code {
        Some(1000) => "connection closed normally".to_string(),
        Some(1006) => "connection failed - host not connected or PIN invalid".to_string(),
        Some(1008) => format!("rejected by relay: {reason}"),
        Some(1011) => "relay server error".to_string(),
        Some(code) if !reason.is_empty() => format!("disconnected ({code}): {reason}"),
        Some(code) => format!("disconnected (code {code})"),
        None if !reason.is_empty() => reason.to_string(),
        None => "disconnected".to_string(),
    }
}

/// Reduces a received filename to a safe final path component.
fn sanitize_filename(name: &str) -> Option<String> {
    let candidate = name
        .rsplit(['/', '\\'])
        .find(|part| !part.is_empty())?
        .trim();
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return None;
    }
    Some(candidate.to_string())
}

/// Joins a file name onto the current remote directory.
fn join_remote_path(current: &str, name: &str) -> String {
    let current = current.trim_end_matches('/');
    if current.is_empty() {
        name.to_string()
    } else {
        format!("{current}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote_path() {
        assert_eq!(join_remote_path("", "notes.txt"), "notes.txt");
        assert_eq!(join_remote_path("/", "notes.txt"), "notes.txt");
        assert_eq!(join_remote_path("docs", "notes.txt"), "docs/notes.txt");
        assert_eq!(join_remote_path("docs/", "notes.txt"), "docs/notes.txt");
        assert_eq!(
            join_remote_path("docs/reports", "q3.pdf"),
            "docs/reports/q3.pdf"
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("notes.txt"), Some("notes.txt".to_string()));
        assert_eq!(
            sanitize_filename("docs/readme.md"),
            Some("readme.md".to_string())
        );
        assert_eq!(
            sanitize_filename("../../etc/passwd"),
            Some("passwd".to_string())
        );
        assert_eq!(
            sanitize_filename("c:\\temp\\evil.exe"),
            Some("evil.exe".to_string())
        );
        assert_eq!(sanitize_filename(""), None);
        assert_eq!(sanitize_filename("///"), None);
        assert_eq!(sanitize_filename(".."), None);
    }

    #[test]
    fn test_close_reason_taxonomy() {
        assert_eq!(close_reason(Some(1000), ""), "connection closed normally");
        assert_eq!(
            close_reason(Some(1006), ""),
            "connection failed - host not connected or PIN invalid"
        );
        assert_eq!(
            close_reason(Some(1008), "pin expired"),
            "rejected by relay: pin expired"
        );
        assert_eq!(close_reason(Some(4000), ""), "disconnected (code 4000)");
        assert_eq!(close_reason(None, "io error"), "io error");
        assert_eq!(close_reason(None, ""), "disconnected");
    }

    #[tokio::test]
    async fn test_commands_require_connection() {
        let dir = tempfile::TempDir::new().unwrap();
        let endpoints =
            RelayEndpoints::new("http://localhost:8080", "ws://localhost:8080").unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let controller =
            ViewerController::new(endpoints, store, dir.path().join("downloads"));

        assert!(matches!(
            controller.list("").await,
            Err(ViewerError::NotConnected)
        ));
        assert!(matches!(
            controller.download("notes.txt").await,
            Err(ViewerError::NotConnected)
        ));
        assert!(matches!(
            controller.delete("notes.txt").await,
            Err(ViewerError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_auto_resume_without_slot() {
        let dir = tempfile::TempDir::new().unwrap();
        let endpoints =
            RelayEndpoints::new("http://localhost:8080", "ws://localhost:8080").unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let controller =
            ViewerController::new(endpoints, store, dir.path().join("downloads"));

        let result = controller.auto_resume().await;
        assert!(matches!(result, Err(ViewerError::NothingToResume)));
    }

    #[test]
    fn test_initial_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let endpoints =
            RelayEndpoints::new("http://localhost:8080", "ws://localhost:8080").unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let controller =
            ViewerController::new(endpoints, store, dir.path().join("downloads"));

        let state = controller.state();
        assert_eq!(state.phase, ViewerPhase::Idle);
        assert!(state.pin.is_none());
        assert!(state.entries.is_empty());
        assert_eq!(state.pending_requests, 0);
    }
}
