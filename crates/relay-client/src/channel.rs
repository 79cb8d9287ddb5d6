//! The persistent relay channel.
//!
//! A [`RelayChannel`] owns one WebSocket connection to the relay and exposes
//! the message traffic as a single ordered event stream. The state machine is
//! `Idle -> Connecting -> Open -> Closed`, with `Connecting -> Closed` on
//! immediate failure and `Open -> Closed` on any close event (peer close,
//! network error, explicit close).
//!
//! There is no automatic reconnect here: losing the channel ends it, and a
//! controller that wants a new session re-runs its full handshake. Silently
//! resuming the transport could attach to a PIN whose peer has changed.

use std::sync::{Arc, RwLock};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::CloseFrame, Message as WsMessage},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use protocol::Envelope;

/// Buffered outbound envelopes before `send` applies backpressure.
const OUTBOUND_BUFFER: usize = 64;
/// Buffered inbound events before the reader applies backpressure.
const EVENT_BUFFER: usize = 256;

/// Errors surfaced by the channel itself.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The attach URL failed to parse.
    #[error("invalid relay URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The WebSocket connection could not be established.
    #[error("relay connection failed: {0}")]
    Connect(String),

    /// `send` was called while the channel was not open.
    #[error("channel is not open")]
    NotOpen,
}

/// Lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Created but not yet dialing.
    Idle,
    /// Dialing the relay.
    Connecting,
    /// Attached; messages flow.
    Open,
    /// Ended; terminal.
    Closed,
}

/// Events delivered, in order, to the channel's single consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The channel reached `Open`. Always the first event.
    Opened,
    /// An inbound envelope, in arrival order.
    Message(Envelope),
    /// The channel reached `Closed`. Always the last event.
    Closed {
        /// WebSocket close code, when the peer sent one.
        code: Option<u16>,
        /// Human-readable close reason.
        reason: String,
    },
}

/// One persistent socket connection to the relay.
pub struct RelayChannel {
    state: Arc<RwLock<ChannelState>>,
    outbound_tx: mpsc::Sender<Envelope>,
    close_token: CancellationToken,
}

impl RelayChannel {
    /// Dials the relay and returns the open channel plus its event stream.
    ///
    /// The returned receiver yields [`ChannelEvent::Opened`] first, then
    /// inbound messages in FIFO order, then exactly one
    /// [`ChannelEvent::Closed`]. An immediate connection failure returns
    /// `Err` instead of a channel.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<ChannelEvent>), ChannelError> {
        Url::parse(url).map_err(|e| ChannelError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(%url, "connecting to relay");
        let state = Arc::new(RwLock::new(ChannelState::Connecting));

        let (ws_stream, _) = connect_async(url).await.map_err(|e| {
            *state.write().expect("state lock poisoned") = ChannelState::Closed;
            ChannelError::Connect(e.to_string())
        })?;

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Envelope>(OUTBOUND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel::<ChannelEvent>(EVENT_BUFFER);
        let close_token = CancellationToken::new();

        *state.write().expect("state lock poisoned") = ChannelState::Open;
        let _ = event_tx.send(ChannelEvent::Opened).await;

        // Writer: serializes outbound envelopes; a close request sends a
        // close frame and stops accepting sends.
        let writer_state = Arc::clone(&state);
        let writer_token = close_token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_token.cancelled() => {
                        let _ = ws_sink.send(WsMessage::Close(None)).await;
                        break;
                    }
                    maybe = outbound_rx.recv() => {
                        let Some(envelope) = maybe else { break };
                        match envelope.to_json() {
                            Ok(text) => {
                                if let Err(e) = ws_sink.send(WsMessage::Text(text)).await {
                                    warn!(error = %e, "relay send failed");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "dropping unserializable envelope");
                            }
                        }
                    }
                }
            }
            *writer_state.write().expect("state lock poisoned") = ChannelState::Closed;
        });

        // Reader: decodes inbound frames into the ordered event stream.
        // Malformed payloads are dropped with a decode diagnostic and never
        // close the channel.
        let reader_state = Arc::clone(&state);
        tokio::spawn(async move {
            let closed = loop {
                match ws_source.next().await {
                    Some(Ok(WsMessage::Text(text))) => match Envelope::from_json(&text) {
                        Ok(envelope) => {
                            if event_tx.send(ChannelEvent::Message(envelope)).await.is_err() {
                                break ChannelEvent::Closed {
                                    code: None,
                                    reason: "event consumer dropped".to_string(),
                                };
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, raw = %truncate_for_log(&text), "dropping undecodable relay frame");
                        }
                    },
                    Some(Ok(WsMessage::Close(frame))) => {
                        break close_event(frame);
                    }
                    Some(Ok(_)) => {
                        // Ping/pong/binary frames carry no envelopes.
                    }
                    Some(Err(e)) => {
                        break ChannelEvent::Closed {
                            code: None,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        break ChannelEvent::Closed {
                            code: None,
                            reason: "connection lost".to_string(),
                        };
                    }
                }
            };
            *reader_state.write().expect("state lock poisoned") = ChannelState::Closed;
            let _ = event_tx.send(closed).await;
        });

        Ok((
            Self {
                state,
                outbound_tx,
                close_token,
            },
            event_rx,
        ))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChannelState {
        *self.state.read().expect("state lock poisoned")
    }

    /// True while messages can be sent.
    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Sends an envelope over the channel.
    ///
    /// Fails with [`ChannelError::NotOpen`] once the channel has closed;
    /// callers gate sends on [`state`](Self::state).
    pub async fn send(&self, envelope: Envelope) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::NotOpen);
        }
        self.outbound_tx
            .send(envelope)
            .await
            .map_err(|_| ChannelError::NotOpen)
    }

    /// Requests a graceful shutdown. Idempotent.
    ///
    /// The `Closed` event is delivered through the event stream once the
    /// close completes.
    pub fn close(&self) {
        self.close_token.cancel();
    }
}

fn close_event(frame: Option<CloseFrame<'_>>) -> ChannelEvent {
    match frame {
        Some(frame) => ChannelEvent::Closed {
            code: Some(frame.code.into()),
            reason: if frame.reason.is_empty() {
                "closed by peer".to_string()
            } else {
                frame.reason.to_string()
            },
        },
        None => ChannelEvent::Closed {
            code: None,
            reason: "closed by peer".to_string(),
        },
    }
}

fn truncate_for_log(text: &str) -> &str {
    let limit = 120;
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
