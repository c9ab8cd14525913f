//! Repository abstractions for users, guests, guestbook entries and tokens.
//!
//! Services only see these traits; the concrete store is chosen at registration
//! time (see `container`). The in-memory implementations live in [`memory`].

pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    Guest, GuestBookEntry, GuestBookPatch, GuestImage, GuestPatch, NewGuest, NewGuestBookEntry,
    NewUser, User, UserPatch,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("conflict: {0}")]
    Conflict(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

pub trait UserRepository: Send + Sync {
    fn get_user_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Fails with `Conflict` if the username is taken by a live user.
    fn create_user(&self, user: NewUser) -> RepoResult<User>;
    /// Applies `patch` and sets the avatar to `avatar` (which may be the current one).
    /// A new username taken by another live user fails with `Conflict`.
    fn update_user(
        &self,
        user_id: Uuid,
        patch: &UserPatch,
        avatar: Option<String>,
    ) -> RepoResult<Option<User>>;
    /// Soft delete; returns the deleted record.
    fn delete_user(&self, user_id: Uuid) -> RepoResult<Option<User>>;
}

pub trait GuestRepository: Send + Sync {
    fn get_guest_by_id(&self, guest_id: Uuid) -> RepoResult<Option<Guest>>;
    fn get_guests_by_user_id(&self, user_id: Uuid) -> RepoResult<Vec<Guest>>;
    fn get_guest_by_nickname(&self, nickname: &str) -> RepoResult<Option<Guest>>;
    fn get_guest_by_phone(&self, phone: &str) -> RepoResult<Option<Guest>>;
    fn create_guest(&self, user_id: Uuid, guest: NewGuest) -> RepoResult<Guest>;
    fn update_guest(&self, guest_id: Uuid, patch: &GuestPatch) -> RepoResult<Option<Guest>>;
    fn delete_guest(&self, guest_id: Uuid) -> RepoResult<Option<Guest>>;

    fn add_guest_image(&self, guest_id: Uuid, image_url: String) -> RepoResult<GuestImage>;
    fn remove_guest_image(&self, image_id: Uuid) -> RepoResult<Option<GuestImage>>;
    /// Returns how many images were removed.
    fn remove_all_guest_images(&self, guest_id: Uuid) -> RepoResult<usize>;
    fn get_guest_images(&self, guest_id: Uuid) -> RepoResult<Vec<GuestImage>>;
}

pub trait GuestBookRepository: Send + Sync {
    fn get_guest_book_by_id(&self, entry_id: Uuid) -> RepoResult<Option<GuestBookEntry>>;
    fn get_guest_books_by_user_id(&self, user_id: Uuid) -> RepoResult<Vec<GuestBookEntry>>;
    fn create_guest_book(
        &self,
        user_id: Uuid,
        entry: NewGuestBookEntry,
        image: Option<String>,
    ) -> RepoResult<GuestBookEntry>;
    /// Applies `patch` and sets the image to `image` (which may be the current one).
    fn update_guest_book(
        &self,
        entry_id: Uuid,
        patch: &GuestBookPatch,
        image: Option<String>,
    ) -> RepoResult<Option<GuestBookEntry>>;
    /// Returns `false` if no live entry had this id.
    fn delete_guest_book(&self, entry_id: Uuid) -> RepoResult<bool>;
}

pub trait TokenRepository: Send + Sync {
    fn save_refresh_token(&self, user_id: Uuid, token: String) -> RepoResult<()>;
    fn get_refresh_token(&self, user_id: Uuid) -> RepoResult<Option<String>>;
    fn delete_refresh_token(&self, user_id: Uuid) -> RepoResult<()>;

    fn to_blacklist(&self, user_id: Uuid, token: String, expires_at: DateTime<Utc>)
        -> RepoResult<()>;
    fn is_token_blacklisted(&self, user_id: Uuid, token: &str) -> RepoResult<bool>;
    /// Drops blacklist entries that expired at or before `now`; returns how many.
    fn purge_expired(&self, now: DateTime<Utc>) -> RepoResult<usize>;
}
