//! REST contracts for the relay's HTTP endpoints.
//!
//! The relay exposes three JSON endpoints ahead of the persistent channel:
//! `POST /register-pin`, `GET /check-pin/{pin}` and `GET /get-base-dir/{pin}`.
//! Field names follow the relay's wire format exactly.

use serde::{Deserialize, Serialize};

/// Body of `POST /register-pin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPinRequest {
    /// The PIN to announce.
    pub pin: String,
}

/// Response of `POST /register-pin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterPinResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// RFC 3339 expiry timestamp assigned by the relay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// Response of `GET /check-pin/{pin}`.
///
/// Three outcomes matter to a viewer: the PIN is unknown or expired
/// (`valid == false`), the PIN is known but no host is attached
/// (`valid && !pc_connected`), or the session is ready to dial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckPinResponse {
    /// Whether the PIN is registered and unexpired.
    pub valid: bool,
    /// RFC 3339 expiry timestamp, when valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Whether a host is currently attached for this PIN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pc_connected: Option<bool>,
    /// Failure reason, when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckPinResponse {
    /// True when a viewer can proceed to attach.
    pub fn host_ready(&self) -> bool {
        self.valid && self.pc_connected.unwrap_or(false)
    }
}

/// Response of `GET /get-base-dir/{pin}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetBaseDirResponse {
    /// The root directory previously registered for the PIN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_directory: Option<String>,
    /// Failure reason, when the PIN or its root is unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_pin_ready() {
        let json = r#"{"valid":true,"expires_at":"2026-08-07T10:00:00Z","pc_connected":true}"#;
        let response: CheckPinResponse = serde_json::from_str(json).unwrap();
        assert!(response.host_ready());
    }

    #[test]
    fn test_check_pin_host_offline() {
        let json = r#"{"valid":true,"expires_at":"2026-08-07T10:00:00Z","pc_connected":false}"#;
        let response: CheckPinResponse = serde_json::from_str(json).unwrap();
        assert!(response.valid);
        assert!(!response.host_ready());
    }

    #[test]
    fn test_check_pin_unknown() {
        // The relay omits pc_connected entirely for unknown PINs.
        let json = r#"{"valid":false,"error":"PIN not found"}"#;
        let response: CheckPinResponse = serde_json::from_str(json).unwrap();
        assert!(!response.valid);
        assert!(!response.host_ready());
        assert_eq!(response.error.as_deref(), Some("PIN not found"));
    }

    #[test]
    fn test_register_pin_body() {
        let body = RegisterPinRequest {
            pin: "482913".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"pin":"482913"}"#
        );
    }

    #[test]
    fn test_get_base_dir_variants() {
        let ok: GetBaseDirResponse =
            serde_json::from_str(r#"{"base_directory":"/share"}"#).unwrap();
        assert_eq!(ok.base_directory.as_deref(), Some("/share"));

        let missing: GetBaseDirResponse =
            serde_json::from_str(r#"{"error":"Base directory not set"}"#).unwrap();
        assert!(missing.base_directory.is_none());
    }
}
