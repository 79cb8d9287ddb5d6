//! # PinPort Host Library
//!
//! The host side of PinPort: shares one local directory tree through the
//! relay so viewers holding the session PIN can browse, upload, download and
//! delete files in it.
//!
//! ## Architecture
//!
//! ```text
//! viewer request ──▶ RelayChannel ──▶ HostController ──▶ FileOperationExecutor
//!                                          │                    │
//!                                          │              PathResolver
//!                                          ▼                    │
//!                                    one correlated ◀───────────┘
//!                                       response
//! ```
//!
//! [`files::PathResolver`] is the sole access-control boundary: every
//! relay-supplied path resolves under the registered root or the request
//! fails with a structured error payload.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration and environment overrides
//! - [`files`]: path resolution and the four file operations
//! - [`controller`]: the host session state machine

pub mod config;
pub mod controller;
pub mod files;

pub use config::HostConfig;
pub use controller::{HostController, HostError, HostEvent, HostPhase};
pub use files::{FileOperationExecutor, FsError, PathResolver};
