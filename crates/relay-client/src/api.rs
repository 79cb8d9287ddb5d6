//! HTTP client for the relay's REST endpoints.
//!
//! The REST endpoints run ahead of the persistent channel: a host announces
//! its PIN before dialing the socket, a viewer checks a PIN's status before
//! dialing, and a host can recover a previously registered root directory.

use protocol::relay::{CheckPinResponse, GetBaseDirResponse, RegisterPinRequest};
use protocol::Pin;
use thiserror::Error;
use tracing::debug;

use crate::endpoints::RelayEndpoints;

/// Errors from the relay REST endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The relay refused to register the PIN; the attempt is fatal because
    /// an unregistered PIN can never be dialed by a viewer.
    #[error("PIN registration failed: {0}")]
    RegistrationFailed(String),

    /// The PIN is unknown to the relay or has expired.
    #[error("PIN not found: {0}")]
    PinUnregistered(String),

    /// The PIN is registered but no host is currently attached.
    #[error("host not connected for PIN {0}")]
    HostOffline(String),

    /// The relay knows the PIN but has no root directory recorded for it.
    #[error("no base directory registered for PIN {0}")]
    BaseDirMissing(String),

    /// Transport-level HTTP failure.
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Outcome of the viewer's pre-connect PIN check.
///
/// The socket layer alone cannot distinguish "wrong PIN" from "right PIN,
/// host offline" once the relay refuses the upgrade, so viewers run this
/// check first for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinStatus {
    /// PIN registered and a host is attached; safe to dial.
    Ready,
    /// PIN unknown or expired.
    Unregistered,
    /// PIN registered but the host is not attached.
    HostOffline,
}

/// Thin reqwest wrapper over the relay REST contract.
#[derive(Debug, Clone)]
pub struct RelayApi {
    client: reqwest::Client,
    endpoints: RelayEndpoints,
}

impl RelayApi {
    /// Creates an API client for the given endpoints.
    pub fn new(endpoints: RelayEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    /// The endpoints this client dials.
    pub fn endpoints(&self) -> &RelayEndpoints {
        &self.endpoints
    }

    /// Announces a PIN to the relay ahead of the host's socket attach.
    ///
    /// Any non-success response is fatal to the sharing attempt.
    pub async fn register_pin(&self, pin: &Pin) -> Result<(), ApiError> {
        let url = self.endpoints.register_pin_url();
        debug!(%pin, %url, "registering PIN");

        let response = self
            .client
            .post(&url)
            .json(&RegisterPinRequest {
                pin: pin.as_str().to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::RegistrationFailed(format!(
                "{} ({})",
                status,
                body.trim()
            )));
        }
        Ok(())
    }

    /// Queries a PIN's status ahead of the viewer's socket attach.
    pub async fn check_pin(&self, pin: &Pin) -> Result<PinStatus, ApiError> {
        let url = self.endpoints.check_pin_url(pin);
        debug!(%pin, %url, "checking PIN");

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<CheckPinResponse>()
            .await?;

        if !response.valid {
            return Ok(PinStatus::Unregistered);
        }
        if !response.pc_connected.unwrap_or(false) {
            return Ok(PinStatus::HostOffline);
        }
        Ok(PinStatus::Ready)
    }

    /// Like [`check_pin`](Self::check_pin) but maps non-ready outcomes to
    /// errors carrying the PIN for user feedback.
    pub async fn ensure_host_ready(&self, pin: &Pin) -> Result<(), ApiError> {
        match self.check_pin(pin).await? {
            PinStatus::Ready => Ok(()),
            PinStatus::Unregistered => Err(ApiError::PinUnregistered(pin.to_string())),
            PinStatus::HostOffline => Err(ApiError::HostOffline(pin.to_string())),
        }
    }

    /// Recovers the root directory previously registered for a PIN.
    pub async fn get_base_dir(&self, pin: &Pin) -> Result<String, ApiError> {
        let url = self.endpoints.get_base_dir_url(pin);
        debug!(%pin, %url, "recovering base directory");

        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<GetBaseDirResponse>()
            .await?;

        response
            .base_directory
            .ok_or_else(|| ApiError::BaseDirMissing(pin.to_string()))
    }
}
