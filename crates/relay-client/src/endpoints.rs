//! Relay endpoint configuration and URL building.
//!
//! Both clients receive an explicit [`RelayEndpoints`] value at construction
//! instead of consulting hardcoded globals. The registration base serves the
//! REST endpoints; the socket base serves the persistent channel upgrades.

use thiserror::Error;
use url::Url;

use protocol::Pin;

/// Default relay for official builds.
pub const DEFAULT_REGISTRATION_URL: &str = "https://relay.pinport.dev";
/// Default socket base matching [`DEFAULT_REGISTRATION_URL`].
pub const DEFAULT_SOCKET_URL: &str = "wss://relay.pinport.dev";

/// Errors produced while validating endpoint configuration.
#[derive(Debug, Error, PartialEq)]
pub enum EndpointError {
    /// The registration base must be http(s).
    #[error("registration URL must start with http:// or https://, got {0}")]
    InvalidRegistrationUrl(String),

    /// The socket base must be ws(s).
    #[error("socket URL must start with ws:// or wss://, got {0}")]
    InvalidSocketUrl(String),

    /// The URL failed to parse at all.
    #[error("malformed URL {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// The pair of relay base URLs a client dials.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayEndpoints {
    /// Base URL for the REST endpoints (`http://` or `https://`).
    pub registration_base_url: String,
    /// Base URL for the channel upgrades (`ws://` or `wss://`).
    pub socket_base_url: String,
}

impl Default for RelayEndpoints {
    fn default() -> Self {
        Self {
            registration_base_url: DEFAULT_REGISTRATION_URL.to_string(),
            socket_base_url: DEFAULT_SOCKET_URL.to_string(),
        }
    }
}

impl RelayEndpoints {
    /// Creates a validated endpoint pair.
    pub fn new(
        registration_base_url: impl Into<String>,
        socket_base_url: impl Into<String>,
    ) -> Result<Self, EndpointError> {
        let endpoints = Self {
            registration_base_url: registration_base_url.into(),
            socket_base_url: socket_base_url.into(),
        };
        endpoints.validate()?;
        Ok(endpoints)
    }

    /// Validates schemes and URL syntax of both bases.
    pub fn validate(&self) -> Result<(), EndpointError> {
        let registration = &self.registration_base_url;
        if !registration.starts_with("http://") && !registration.starts_with("https://") {
            return Err(EndpointError::InvalidRegistrationUrl(registration.clone()));
        }
        Url::parse(registration).map_err(|e| EndpointError::Malformed {
            url: registration.clone(),
            reason: e.to_string(),
        })?;

        let socket = &self.socket_base_url;
        if !socket.starts_with("ws://") && !socket.starts_with("wss://") {
            return Err(EndpointError::InvalidSocketUrl(socket.clone()));
        }
        Url::parse(socket).map_err(|e| EndpointError::Malformed {
            url: socket.clone(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// `POST` target announcing a PIN.
    pub fn register_pin_url(&self) -> String {
        format!("{}/register-pin", self.registration_base())
    }

    /// `GET` target checking a PIN's status.
    pub fn check_pin_url(&self, pin: &Pin) -> String {
        format!("{}/check-pin/{}", self.registration_base(), pin)
    }

    /// `GET` target recovering a PIN's registered root directory.
    pub fn get_base_dir_url(&self, pin: &Pin) -> String {
        format!("{}/get-base-dir/{}", self.registration_base(), pin)
    }

    /// Channel upgrade target for the host role.
    pub fn host_attach_url(&self, pin: &Pin) -> String {
        format!("{}/connect-pc/{}", self.socket_base(), pin)
    }

    /// Channel upgrade target for the viewer role.
    pub fn viewer_attach_url(&self, pin: &Pin) -> String {
        format!("{}/connect-user/{}", self.socket_base(), pin)
    }

    fn registration_base(&self) -> &str {
        self.registration_base_url.trim_end_matches('/')
    }

    fn socket_base(&self) -> &str {
        self.socket_base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin() -> Pin {
        Pin::parse("482913").unwrap()
    }

    #[test]
    fn test_url_builders() {
        let endpoints =
            RelayEndpoints::new("https://relay.example.com", "wss://relay.example.com").unwrap();
        assert_eq!(
            endpoints.register_pin_url(),
            "https://relay.example.com/register-pin"
        );
        assert_eq!(
            endpoints.check_pin_url(&pin()),
            "https://relay.example.com/check-pin/482913"
        );
        assert_eq!(
            endpoints.get_base_dir_url(&pin()),
            "https://relay.example.com/get-base-dir/482913"
        );
        assert_eq!(
            endpoints.host_attach_url(&pin()),
            "wss://relay.example.com/connect-pc/482913"
        );
        assert_eq!(
            endpoints.viewer_attach_url(&pin()),
            "wss://relay.example.com/connect-user/482913"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let endpoints =
            RelayEndpoints::new("http://localhost:8080/", "ws://localhost:8080/").unwrap();
        assert_eq!(
            endpoints.register_pin_url(),
            "http://localhost:8080/register-pin"
        );
        assert_eq!(
            endpoints.host_attach_url(&pin()),
            "ws://localhost:8080/connect-pc/482913"
        );
    }

    #[test]
    fn test_scheme_validation() {
        let result = RelayEndpoints::new("ftp://relay.example.com", "wss://relay.example.com");
        assert!(matches!(
            result,
            Err(EndpointError::InvalidRegistrationUrl(_))
        ));

        let result = RelayEndpoints::new("https://relay.example.com", "https://relay.example.com");
        assert!(matches!(result, Err(EndpointError::InvalidSocketUrl(_))));
    }

    #[test]
    fn test_default_is_valid() {
        assert!(RelayEndpoints::default().validate().is_ok());
    }
}
