use std::fmt;
use std::fmt::{Debug, Formatter};
use std::path::PathBuf;

use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// A single object as reported by a container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub name: String,
    pub size_bytes: u64,
}

impl ObjectEntry {
    pub fn new(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }
}

/// One page of a container listing.
///
/// A failed page never carries entries. `next_marker` is the continuation
/// point for the following page; `None` marks the end of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    pub success: bool,
    pub items: Vec<ObjectEntry>,
    pub error: Option<String>,
    pub next_marker: Option<String>,
}

impl ListingPage {
    pub fn succeeded(items: Vec<ObjectEntry>, next_marker: Option<String>) -> Self {
        Self {
            success: true,
            items,
            error: None,
            next_marker,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            error: Some(error.into()),
            next_marker: None,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.items.iter().map(|entry| entry.size_bytes).sum()
    }
}

/// The metadata fields compared when deciding whether two objects are the same.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectHeaders {
    pub content_length: u64,
    pub etag: String,
    pub content_type: String,
}

/// Result of a metadata lookup for a single object name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatResult {
    pub object: String,
    pub success: bool,
    pub headers: Option<ObjectHeaders>,
    pub error: Option<String>,
}

impl StatResult {
    pub fn found(object: impl Into<String>, headers: ObjectHeaders) -> Self {
        Self {
            object: object.into(),
            success: true,
            headers: Some(headers),
            error: None,
        }
    }

    pub fn not_found(object: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            success: false,
            headers: None,
            error: Some(error.into()),
        }
    }

    pub fn content_length(&self) -> u64 {
        self.headers.as_ref().map_or(0, |h| h.content_length)
    }
}

/// Store-side details attached to a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteResponseDetails {
    pub request_id: Option<String>,
    pub version_id: Option<String>,
    pub delete_marker: bool,
}

/// Per-object outcome of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResponse {
    pub success: bool,
    pub action: String,
    pub container: String,
    pub object: String,
    pub attempts: u32,
    pub response: Option<DeleteResponseDetails>,
    pub error: Option<String>,
}

/// Diagnostic events emitted by the audit components.
///
/// The pipeline hands the sending side to every component; the binary drains
/// the receiving side for the progress display.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditStatistics {
    PageListed {
        container: String,
        objects: u64,
        bytes: u64,
    },
    PageFailed {
        container: String,
        error: String,
    },
    DuplicateFound {
        key: String,
        bytes: u64,
    },
    NotDuplicate {
        key: String,
    },
    StatAmbiguous {
        key: String,
    },
    DeleteComplete {
        key: String,
    },
    DeleteError {
        key: String,
    },
    MissingLocal {
        key: String,
    },
}

/// AWS configuration file locations.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigLocation {
    pub aws_config_file: Option<PathBuf>,
    pub aws_shared_credentials_file: Option<PathBuf>,
}

/// Credential sources for the object store session.
#[derive(Debug, Clone)]
pub enum S3Credentials {
    Profile(String),
    Credentials { access_keys: AccessKeys },
    FromEnvironment,
}

/// Access key pair. Secrets are cleared from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessKeys {
    pub access_key: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl Debug for AccessKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut keys = f.debug_struct("AccessKeys");
        let session_token = self
            .session_token
            .as_ref()
            .map_or("None", |_| "** redacted **");
        keys.field("access_key", &self.access_key)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &session_token);
        keys.finish()
    }
}
