//! # PinPort Protocol Library
//!
//! Wire-level definitions shared by the host and viewer clients:
//!
//! - **Message envelope**: the `{type, data}` JSON frames exchanged over the
//!   persistent relay channel, with optional request correlation ids
//! - **PIN handling**: validation and generation of 6-digit session PINs
//! - **REST contracts**: the relay's registration and status endpoints
//!
//! The relay itself never interprets these payloads; it routes frames
//! between the host and viewer sockets attached under the same PIN.
//!
//! ## Example
//!
//! ```rust
//! use protocol::{Envelope, Message};
//! use protocol::messages::ListFiles;
//!
//! // A viewer's opening request: list the shared root.
//! let envelope = Envelope::request(Message::ListFiles(ListFiles::request("")));
//! let frame = envelope.to_json().unwrap();
//! assert!(frame.contains("\"type\":\"list_files\""));
//! ```

pub mod error;
pub mod messages;
pub mod pin;
pub mod relay;

pub use error::{ProtocolError, Result};
pub use messages::{Envelope, FileBytes, FileEntry, Message};
pub use pin::{Pin, PIN_LENGTH};
pub use relay::{CheckPinResponse, GetBaseDirResponse, RegisterPinRequest, RegisterPinResponse};
