//! Records handled by the invitation backend.
//!
//! All records use soft delete: `is_deleted` records stay in the store but are
//! never returned by lookups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invitation owner (the couple hosting the event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    /// Public URL of the uploaded avatar.
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// A person on the owner's guest list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub realname: String,
    pub nickname: Option<String>,
    pub facebook: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGuest {
    pub realname: String,
    pub nickname: Option<String>,
    pub facebook: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub content: Option<String>,
}

/// Field-by-field update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestPatch {
    pub realname: Option<String>,
    pub nickname: Option<String>,
    pub facebook: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub content: Option<String>,
}

impl GuestPatch {
    pub fn apply(&self, guest: &mut Guest) {
        if let Some(v) = &self.realname {
            guest.realname = v.clone();
        }
        if let Some(v) = &self.nickname {
            guest.nickname = Some(v.clone());
        }
        if let Some(v) = &self.facebook {
            guest.facebook = Some(v.clone());
        }
        if let Some(v) = &self.email {
            guest.email = Some(v.clone());
        }
        if let Some(v) = &self.phone {
            guest.phone = Some(v.clone());
        }
        if let Some(v) = &self.content {
            guest.content = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestImage {
    pub id: Uuid,
    pub guest_id: Uuid,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
}

/// A message a guest leaves for the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestBookEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub guest_name: String,
    pub content: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing, default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewGuestBookEntry {
    pub guest_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestBookPatch {
    pub guest_name: Option<String>,
    pub content: Option<String>,
}

/// Raw image received from a client.
#[derive(Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkDeleteReport {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistedToken {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Refresh token issued to a signed-in user, with the lifetimes it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: Uuid,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}
