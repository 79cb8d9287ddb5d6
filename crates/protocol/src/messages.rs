//! Protocol message definitions for PinPort.
//!
//! This module defines the message envelope exchanged over the persistent
//! relay channel once a host or viewer has attached. Messages are serialized
//! as JSON with a `{"type": ..., "data": ...}` shape; the relay forwards
//! frames verbatim and never inspects payloads.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Envelope wrapper for all channel messages.
///
/// The wire shape is `{"type": ..., "data": ..., "request_id"?: ...}`.
/// `request_id` correlates a response to the request that caused it: the
/// requesting side generates it, the responding side echoes it verbatim.
/// Envelopes without one still decode; receivers then fall back to matching
/// by message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The actual message payload.
    #[serde(flatten)]
    pub message: Message,
    /// Correlation identifier, echoed on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Envelope {
    /// Wraps a message with no correlation identifier.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            request_id: None,
        }
    }

    /// Wraps a request message with a freshly generated correlation id.
    pub fn request(message: Message) -> Self {
        Self {
            message,
            request_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Wraps a response message, echoing the request's correlation id.
    pub fn response(message: Message, request_id: Option<String>) -> Self {
        Self {
            message,
            request_id,
        }
    }

    /// Serializes the envelope to its JSON wire form.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::from)
    }

    /// Parses an envelope from its JSON wire form.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::from)
    }
}

/// Top-level message enum containing all channel message types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    /// Host declares the shared root directory for its PIN.
    RegisterBaseDir(RegisterBaseDir),
    /// Directory listing: a request when `files` is absent, a response when
    /// present.
    ListFiles(ListFiles),
    /// Viewer requests file bytes.
    DownloadFile(DownloadFile),
    /// Host replies with file bytes.
    FileContent(FileContent),
    /// Viewer sends file bytes to store.
    UploadFile(UploadFile),
    /// Host reports a write (or other operation) outcome.
    UploadResponse(UploadResponse),
    /// Viewer requests deletion of a file.
    DeleteFile(DeleteFile),
}

impl Message {
    /// Wire `type` string for this message, for logging and fallback
    /// correlation.
    pub fn type_str(&self) -> &'static str {
        match self {
            Message::RegisterBaseDir(_) => "register_base_dir",
            Message::ListFiles(_) => "list_files",
            Message::DownloadFile(_) => "download_file",
            Message::FileContent(_) => "file_content",
            Message::UploadFile(_) => "upload_file",
            Message::UploadResponse(_) => "upload_response",
            Message::DeleteFile(_) => "delete_file",
        }
    }
}

/// Host -> relay: declares the shared root for this PIN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterBaseDir {
    /// Absolute path of the shared root on the host.
    pub path: String,
}

/// Directory listing request/response.
///
/// A request carries only `path`; the host's response echoes the requested
/// `path` and fills `files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListFiles {
    /// Relay-relative directory path; empty string and "/" mean the root.
    pub path: String,
    /// Present on responses only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,
}

impl ListFiles {
    /// Builds a listing request for the given path.
    pub fn request(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            files: None,
        }
    }

    /// Builds a listing response echoing the requested path.
    pub fn response(path: impl Into<String>, files: Vec<FileEntry>) -> Self {
        Self {
            path: path.into(),
            files: Some(files),
        }
    }

    /// True when this message is a request (no entries attached).
    pub fn is_request(&self) -> bool {
        self.files.is_none()
    }
}

/// A single file or directory entry in a listing.
///
/// `path` is relay-relative, '/'-separated and rooted at the host's shared
/// directory; it is the value a viewer sends back in subsequent requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Entry name (final path component).
    pub name: String,
    /// Relay-relative path of the entry.
    pub path: String,
    /// Whether the entry is a directory.
    pub is_directory: bool,
    /// Size in bytes; absent for directories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last modified time as Unix epoch seconds, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<u64>,
}

/// Viewer -> host: request file bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFile {
    /// Relay-relative path of the file to download.
    pub path: String,
}

/// Host -> viewer: file bytes reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    /// Relay-relative path that was requested.
    pub path: String,
    /// The file bytes.
    pub content: FileBytes,
    /// Suggested name for saving (final path component).
    pub filename: String,
}

/// Viewer -> host: file bytes to store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadFile {
    /// Relay-relative destination path.
    pub path: String,
    /// The file bytes.
    pub content: FileBytes,
    /// The file's name on the viewer side.
    pub filename: String,
}

/// Host -> viewer: outcome of a write or other channel-reported operation.
///
/// Carries `success=false` plus a human-readable `error` for any filesystem
/// failure the host recovered locally; such failures never close the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// The relay-relative path that was written, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Human-readable failure reason, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    /// Builds a success outcome for the given path.
    pub fn ok(path: impl Into<String>) -> Self {
        Self {
            success: true,
            path: Some(path.into()),
            error: None,
        }
    }

    /// Builds a failure outcome carrying the reason.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            path: None,
            error: Some(error.into()),
        }
    }
}

/// Viewer -> host: delete request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteFile {
    /// Relay-relative path of the file to delete.
    pub path: String,
}

/// File content on the wire.
///
/// The canonical encoding is a JSON array of byte values; a base64 string is
/// accepted as an alternate encoding for senders that cannot emit byte
/// arrays cheaply. Decoding a malformed base64 string fails with
/// [`ProtocolError::InvalidUploadPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileBytes {
    /// Raw byte values, `[72, 105]`-style.
    Raw(Vec<u8>),
    /// Standard base64 without line breaks.
    Base64(String),
}

impl FileBytes {
    /// Decodes the content into bytes.
    pub fn decode(&self) -> Result<Vec<u8>, ProtocolError> {
        use base64::Engine;
        match self {
            FileBytes::Raw(bytes) => Ok(bytes.clone()),
            FileBytes::Base64(text) => base64::engine::general_purpose::STANDARD
                .decode(text.trim())
                .map_err(|e| ProtocolError::InvalidUploadPayload(e.to_string())),
        }
    }

    /// Number of encoded bytes, without decoding base64 content.
    pub fn encoded_len(&self) -> usize {
        match self {
            FileBytes::Raw(bytes) => bytes.len(),
            FileBytes::Base64(text) => text.len(),
        }
    }
}

impl From<Vec<u8>> for FileBytes {
    fn from(bytes: Vec<u8>) -> Self {
        FileBytes::Raw(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_files_request_wire_shape() {
        let envelope = Envelope::new(Message::ListFiles(ListFiles::request("")));
        let json = envelope.to_json().unwrap();
        assert_eq!(json, r#"{"type":"list_files","data":{"path":""}}"#);
    }

    #[test]
    fn test_list_files_response_round_trip() {
        let entries = vec![FileEntry {
            name: "notes.txt".to_string(),
            path: "notes.txt".to_string(),
            is_directory: false,
            size: Some(2),
            modified: Some(1704067200),
        }];
        let envelope = Envelope::new(Message::ListFiles(ListFiles::response("", entries)));
        let json = envelope.to_json().unwrap();
        assert!(json.contains(r#""type":"list_files""#));
        assert!(json.contains(r#""is_directory":false"#));

        let parsed = Envelope::from_json(&json).unwrap();
        match parsed.message {
            Message::ListFiles(listing) => {
                assert!(!listing.is_request());
                let files = listing.files.unwrap();
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "notes.txt");
                assert_eq!(files[0].size, Some(2));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_register_base_dir_wire_shape() {
        let envelope = Envelope::new(Message::RegisterBaseDir(RegisterBaseDir {
            path: "/share".to_string(),
        }));
        let json = envelope.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"type":"register_base_dir","data":{"path":"/share"}}"#
        );
    }

    #[test]
    fn test_upload_file_raw_content() {
        let json = r#"{"type":"upload_file","data":{"path":"notes.txt","content":[72,105],"filename":"notes.txt"}}"#;
        let envelope = Envelope::from_json(json).unwrap();
        match envelope.message {
            Message::UploadFile(upload) => {
                assert_eq!(upload.path, "notes.txt");
                assert_eq!(upload.content.decode().unwrap(), b"Hi");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_upload_file_base64_content() {
        let json = r#"{"type":"upload_file","data":{"path":"notes.txt","content":"SGk=","filename":"notes.txt"}}"#;
        let envelope = Envelope::from_json(json).unwrap();
        match envelope.message {
            Message::UploadFile(upload) => {
                assert_eq!(upload.content.decode().unwrap(), b"Hi");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_base64_content_fails() {
        let content = FileBytes::Base64("not valid base64!!".to_string());
        let result = content.decode();
        assert!(matches!(result, Err(ProtocolError::InvalidUploadPayload(_))));
    }

    #[test]
    fn test_request_id_echoed_and_optional() {
        let request = Envelope::request(Message::DownloadFile(DownloadFile {
            path: "notes.txt".to_string(),
        }));
        let id = request.request_id.clone();
        assert!(id.is_some());

        let response = Envelope::response(
            Message::FileContent(FileContent {
                path: "notes.txt".to_string(),
                content: FileBytes::Raw(vec![72, 105]),
                filename: "notes.txt".to_string(),
            }),
            request.request_id,
        );
        assert_eq!(response.request_id, id);

        // Envelopes without an id still decode.
        let bare = r#"{"type":"delete_file","data":{"path":"old.txt"}}"#;
        let parsed = Envelope::from_json(bare).unwrap();
        assert!(parsed.request_id.is_none());
        assert_eq!(parsed.message.type_str(), "delete_file");
    }

    #[test]
    fn test_upload_response_shapes() {
        let ok = Envelope::new(Message::UploadResponse(UploadResponse::ok("notes.txt")));
        let json = ok.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"type":"upload_response","data":{"success":true,"path":"notes.txt"}}"#
        );

        let failed = UploadResponse::failed("file not found: missing.txt");
        assert!(!failed.success);
        assert!(failed.path.is_none());
        assert_eq!(
            failed.error.as_deref(),
            Some("file not found: missing.txt")
        );
    }

    #[test]
    fn test_file_content_round_trip() {
        let envelope = Envelope::new(Message::FileContent(FileContent {
            path: "docs/readme.md".to_string(),
            content: FileBytes::Raw(vec![]),
            filename: "readme.md".to_string(),
        }));
        let json = envelope.to_json().unwrap();
        let parsed = Envelope::from_json(&json).unwrap();
        match parsed.message {
            Message::FileContent(content) => {
                assert_eq!(content.path, "docs/readme.md");
                assert_eq!(content.content.decode().unwrap(), Vec::<u8>::new());
                assert_eq!(content.filename, "readme.md");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_fails_to_decode() {
        let json = r#"{"type":"format_disk","data":{"path":"/"}}"#;
        let result = Envelope::from_json(json);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_missing_payload_field_fails_to_decode() {
        let json = r#"{"type":"download_file","data":{}}"#;
        let result = Envelope::from_json(json);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }
}
