//! # PinPort Relay Client Library
//!
//! Client-side relay plumbing shared by the host and viewer:
//!
//! - [`RelayEndpoints`]: the explicit `{registration, socket}` base-URL pair
//! - [`RelayApi`]: the REST calls that run ahead of the persistent channel
//! - [`RelayChannel`]: one WebSocket connection with an ordered event stream
//! - [`SessionStore`]: the single persisted session slot with its 15-day
//!   validity window
//!
//! The channel never reconnects on its own. A controller that loses it
//! re-runs its full handshake (fresh PIN check for viewers, fresh
//! registration for hosts), because silently resuming the transport could
//! attach to a PIN whose peer has changed.

pub mod api;
pub mod channel;
pub mod endpoints;
pub mod store;

pub use api::{ApiError, PinStatus, RelayApi};
pub use channel::{ChannelError, ChannelEvent, ChannelState, RelayChannel};
pub use endpoints::{
    EndpointError, RelayEndpoints, DEFAULT_REGISTRATION_URL, DEFAULT_SOCKET_URL,
};
pub use store::{SessionStore, StoreError, StoredSession, SESSION_VALIDITY};
