use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::SUMMARY_SUFFIX;

/// Identity attributes consumed from the identity provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub display_name: Option<String>,
    pub picture: Option<String>,
    pub email: Option<String>,
}

impl UserRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: None,
            picture: None,
            email: None,
        }
    }

    /// Name shown in the welcome card: display name, then username, then "User".
    pub fn greeting_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| Some(self.username.as_str()).filter(|name| !name.is_empty()))
            .unwrap_or("User")
    }
}

/// Tokens returned by the identity provider for one sign-in.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Persisted form of an authenticated session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub user: UserRecord,
    pub tokens: TokenSet,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// One object in the per-user namespace, as reported by the bucket.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

impl StoredObject {
    pub fn is_summary(&self) -> bool {
        is_summary_key(&self.key)
    }
}

/// A primary object prepared for display.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    pub key: String,
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
}

/// One page of a prefix listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<StoredObject>,
    /// Present when more objects remain after this page.
    pub cursor: Option<String>,
}

/// The file selected in the upload form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadCandidate {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadCandidate {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Bytes and metadata of a fetched object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

pub fn is_summary_key(key: &str) -> bool {
    key.ends_with(SUMMARY_SUFFIX)
}

pub fn summary_key_for(primary_key: &str) -> String {
    format!("{}{}", primary_key, SUMMARY_SUFFIX)
}
