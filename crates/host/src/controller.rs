//! Host session controller.
//!
//! Drives one sharing session through its phases: pick a root, generate a
//! PIN, register it with the relay, attach the channel, announce the root,
//! then serve viewer requests until the channel closes. Registration and
//! channel failures are surfaced and never retried automatically: starting
//! over is a user-initiated act, and every new attempt uses a fresh PIN.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use protocol::messages::{FileContent, ListFiles, RegisterBaseDir, UploadResponse};
use protocol::{Envelope, Message, Pin};
use relay_client::{
    ApiError, ChannelError, ChannelEvent, RelayApi, RelayChannel, RelayEndpoints, SessionStore,
    StoredSession,
};

use crate::files::{FileOperationExecutor, FsError, PathResolver};

/// Errors that end a host attempt.
#[derive(Debug, Error)]
pub enum HostError {
    /// The chosen root is unusable.
    #[error("shared root rejected: {0}")]
    Root(#[from] FsError),

    /// The relay refused the PIN registration or another REST call failed.
    #[error(transparent)]
    Relay(#[from] ApiError),

    /// The channel could not be established.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// No stored session is available to resume.
    #[error("no resumable session stored")]
    NothingToResume,
}

/// Host session phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    /// No session in progress.
    Idle,
    /// Validating the chosen root directory.
    SelectingRoot,
    /// Generating a fresh PIN.
    AwaitingPin,
    /// Announcing the PIN to the relay's registration endpoint.
    RegisteringPin,
    /// Dialing the relay's host-attach address.
    Connecting,
    /// Channel open, root announced.
    Registered,
    /// Serving viewer requests.
    Active,
    /// Channel closed; terminal for this session instance.
    Disconnected,
}

/// Events emitted to the user-facing layer.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// The session moved to a new phase.
    PhaseChanged(HostPhase),
    /// The session is live: share this PIN with viewers.
    SessionReady { pin: Pin, root: PathBuf },
    /// A failure was surfaced; the session attempt is over.
    Error { message: String },
    /// The channel closed.
    Closed { reason: String },
}

/// Orchestrates one host session at a time.
pub struct HostController {
    api: RelayApi,
    endpoints: RelayEndpoints,
    store: SessionStore,
    phase: Arc<RwLock<HostPhase>>,
    event_tx: broadcast::Sender<HostEvent>,
    shutdown: CancellationToken,
}

impl HostController {
    /// Creates a controller for the given relay and session slot.
    pub fn new(endpoints: RelayEndpoints, store: SessionStore) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            api: RelayApi::new(endpoints.clone()),
            endpoints,
            store,
            phase: Arc::new(RwLock::new(HostPhase::Idle)),
            event_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> HostPhase {
        *self.phase.read().expect("phase lock poisoned")
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.event_tx.subscribe()
    }

    /// Token that ends the serve loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Shares `root` until the channel closes or shutdown is requested.
    ///
    /// The folder picker is the caller's concern; this takes the picked
    /// path. Returns once the session reaches `Disconnected`, or with an
    /// error if it never became active.
    pub async fn share(&self, root: &Path) -> Result<(), HostError> {
        self.set_phase(HostPhase::SelectingRoot);
        let resolver = match PathResolver::new(root) {
            Ok(resolver) => resolver,
            Err(e) => {
                self.fail(&e);
                return Err(e.into());
            }
        };
        let root = resolver.root().to_path_buf();
        let executor = FileOperationExecutor::new(resolver);

        self.set_phase(HostPhase::AwaitingPin);
        let pin = Pin::generate();
        debug!(%pin, root = %root.display(), "starting host session");

        // An unregistered PIN can never be dialed by a viewer, so the
        // socket is not attempted before registration succeeds.
        self.set_phase(HostPhase::RegisteringPin);
        if let Err(e) = self.api.register_pin(&pin).await {
            self.fail(&e);
            return Err(e.into());
        }

        self.set_phase(HostPhase::Connecting);
        let url = self.endpoints.host_attach_url(&pin);
        let (channel, mut events) = match RelayChannel::connect(&url).await {
            Ok(connected) => connected,
            Err(e) => {
                self.fail(&e);
                return Err(e.into());
            }
        };
        let channel = Arc::new(channel);

        // The first event is Opened; announce the root immediately after.
        match events.recv().await {
            Some(ChannelEvent::Opened) => {}
            other => {
                let e = ChannelError::Connect(format!("channel ended before opening: {other:?}"));
                self.fail(&e);
                return Err(e.into());
            }
        }
        channel
            .send(Envelope::new(Message::RegisterBaseDir(RegisterBaseDir {
                path: root.to_string_lossy().to_string(),
            })))
            .await?;
        self.set_phase(HostPhase::Registered);

        if let Err(e) = self
            .store
            .save(&StoredSession::new(pin.clone(), Some(root.clone())))
        {
            warn!(error = %e, "failed to persist session slot");
        }

        self.set_phase(HostPhase::Active);
        self.emit(HostEvent::SessionReady {
            pin: pin.clone(),
            root: root.clone(),
        });
        info!(%pin, root = %root.display(), "host session active");

        self.serve(channel, &mut events, executor).await;
        Ok(())
    }

    /// Re-shares the stored root with a freshly generated PIN.
    ///
    /// Old PINs are never reused. When the slot lacks a root (it was written
    /// by an older build), the relay's recovery endpoint supplies it.
    pub async fn resume(&self) -> Result<(), HostError> {
        let session = self.store.load_valid().ok_or(HostError::NothingToResume)?;
        let root = match session.root_path {
            Some(root) => root,
            None => PathBuf::from(self.api.get_base_dir(&session.pin).await?),
        };
        info!(root = %root.display(), "resuming host session");
        self.share(&root).await
    }

    /// Serves viewer requests until the channel closes.
    ///
    /// Each request is dispatched on its own task so a slow disk operation
    /// never stalls message decoding; a burst of requests queues in arrival
    /// order.
    async fn serve(
        &self,
        channel: Arc<RelayChannel>,
        events: &mut tokio::sync::mpsc::Receiver<ChannelEvent>,
        executor: FileOperationExecutor,
    ) {
        let mut closing = false;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled(), if !closing => {
                    debug!("shutdown requested; closing channel");
                    closing = true;
                    channel.close();
                    // Keep draining until the Closed event lands.
                }
                maybe = events.recv() => {
                    match maybe {
                        Some(ChannelEvent::Message(envelope)) => {
                            let channel = Arc::clone(&channel);
                            let executor = executor.clone();
                            tokio::spawn(async move {
                                dispatch(channel, executor, envelope).await;
                            });
                        }
                        Some(ChannelEvent::Closed { code, reason }) => {
                            info!(?code, %reason, "channel closed");
                            self.set_phase(HostPhase::Disconnected);
                            // The stored session survives a lost channel so a
                            // manual reconnect can reuse the root.
                            self.emit(HostEvent::Closed { reason });
                            return;
                        }
                        Some(ChannelEvent::Opened) => {}
                        None => {
                            self.set_phase(HostPhase::Disconnected);
                            self.emit(HostEvent::Closed {
                                reason: "event stream ended".to_string(),
                            });
                            return;
                        }
                    }
                }
            }
        }
    }

    fn set_phase(&self, phase: HostPhase) {
        *self.phase.write().expect("phase lock poisoned") = phase;
        self.emit(HostEvent::PhaseChanged(phase));
    }

    fn fail(&self, error: &dyn std::error::Error) {
        error!(%error, "host attempt failed");
        self.emit(HostEvent::Error {
            message: error.to_string(),
        });
        self.set_phase(HostPhase::Idle);
    }

    fn emit(&self, event: HostEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Runs one request off the receive path and sends its response.
async fn dispatch(channel: Arc<RelayChannel>, executor: FileOperationExecutor, envelope: Envelope) {
    let response = tokio::task::spawn_blocking(move || handle_request(&executor, envelope))
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, "request handler panicked");
            None
        });

    if let Some(response) = response {
        if let Err(e) = channel.send(response).await {
            warn!(error = %e, "dropping response: channel no longer open");
        }
    }
}

/// Maps one inbound envelope to its single correlated response.
///
/// Filesystem and payload errors become `upload_response` failure payloads;
/// they never close the channel. Response-shaped messages arriving as
/// requests are ignored.
fn handle_request(executor: &FileOperationExecutor, envelope: Envelope) -> Option<Envelope> {
    let request_id = envelope.request_id.clone();
    match envelope.message {
        Message::ListFiles(listing) if listing.is_request() => {
            let message = match executor.list(&listing.path) {
                Ok(files) => Message::ListFiles(ListFiles::response(listing.path, files)),
                Err(e) => failure(&listing.path, &e),
            };
            Some(Envelope::response(message, request_id))
        }
        Message::DownloadFile(request) => {
            let message = match executor.read(&request.path) {
                Ok(bytes) => Message::FileContent(FileContent {
                    filename: file_name_of(&request.path),
                    path: request.path,
                    content: bytes.into(),
                }),
                Err(e) => failure(&request.path, &e),
            };
            Some(Envelope::response(message, request_id))
        }
        Message::UploadFile(upload) => {
            let message = match upload.content.decode() {
                Ok(bytes) => match executor.write(&upload.path, &bytes) {
                    Ok(()) => Message::UploadResponse(UploadResponse::ok(upload.path)),
                    Err(e) => failure(&upload.path, &e),
                },
                Err(e) => {
                    warn!(path = %upload.path, error = %e, "rejecting upload payload");
                    Message::UploadResponse(UploadResponse::failed(e.to_string()))
                }
            };
            Some(Envelope::response(message, request_id))
        }
        Message::DeleteFile(request) => {
            // A successful delete answers with a fresh listing of the
            // parent directory.
            let message = match executor.delete(&request.path) {
                Ok(()) => {
                    let parent = parent_of(&request.path);
                    match executor.list(&parent) {
                        Ok(files) => Message::ListFiles(ListFiles::response(parent, files)),
                        Err(e) => failure(&parent, &e),
                    }
                }
                Err(e) => failure(&request.path, &e),
            };
            Some(Envelope::response(message, request_id))
        }
        Message::ListFiles(_)
        | Message::RegisterBaseDir(_)
        | Message::FileContent(_)
        | Message::UploadResponse(_) => {
            debug!(
                message_type = envelope.message.type_str(),
                "ignoring non-request message"
            );
            None
        }
    }
}

fn failure(path: &str, error: &FsError) -> Message {
    warn!(%path, %error, "request failed");
    Message::UploadResponse(UploadResponse::failed(error.to_string()))
}

/// Final component of a relay-relative path.
fn file_name_of(path: &str) -> String {
    path.rsplit('/')
        .find(|part| !part.is_empty())
        .unwrap_or(path)
        .to_string()
}

/// Parent of a relay-relative path; the root is its own parent.
fn parent_of(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    }
}
