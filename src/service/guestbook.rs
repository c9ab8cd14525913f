use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{required, ServiceError, ServiceResult};
use crate::container::capabilities;
use crate::domain::{
    BulkDeleteReport, GuestBookEntry, GuestBookPatch, ImageUpload, NewGuestBookEntry, User,
};
use crate::repository::{GuestBookRepository, UserRepository};
use crate::storage::ImageStorage;
use crate::{Registry, RegistryError};

const IMAGE_FOLDER: &str = "guest_books";

/// Guestbook: messages guests leave for the owner, optionally with one photo.
pub struct GuestBookService {
    entries: Arc<dyn GuestBookRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn ImageStorage>,
}

impl GuestBookService {
    pub fn new(
        entries: Arc<dyn GuestBookRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn ImageStorage>,
    ) -> Self {
        Self {
            entries,
            users,
            storage,
        }
    }

    pub fn from_registry(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self::new(
            registry.resolve::<capabilities::GuestBookRepository>()?,
            registry.resolve::<capabilities::UserRepository>()?,
            registry.resolve::<capabilities::ImageStorage>()?,
        ))
    }

    pub fn get_entry(&self, entry_id: Uuid) -> ServiceResult<GuestBookEntry> {
        debug!(%entry_id, "fetching guestbook entry");
        self.entries
            .get_guest_book_by_id(entry_id)?
            .ok_or_else(|| ServiceError::not_found("Guest book"))
    }

    pub fn list_entries(&self, user_id: Uuid) -> ServiceResult<Vec<GuestBookEntry>> {
        Ok(self.entries.get_guest_books_by_user_id(user_id)?)
    }

    pub fn list_entries_by_username(&self, username: &str) -> ServiceResult<Vec<GuestBookEntry>> {
        let user = self.user_by_username(username)?;
        self.list_entries(user.id)
    }

    /// Owner-side creation.
    pub fn create_entry(
        &self,
        user_id: Uuid,
        entry: NewGuestBookEntry,
        image: Option<ImageUpload>,
    ) -> ServiceResult<GuestBookEntry> {
        let user = self
            .users
            .get_user_by_id(user_id)?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        self.create_for(&user, entry, image)
    }

    /// Guest-side creation: guests only know the owner's public username.
    pub fn create_entry_guest_side(
        &self,
        username: &str,
        entry: NewGuestBookEntry,
        image: Option<ImageUpload>,
    ) -> ServiceResult<GuestBookEntry> {
        let user = self.user_by_username(username)?;
        self.create_for(&user, entry, image)
    }

    /// Update text fields and optionally replace the photo.
    ///
    /// The owner never changes. With a new image the old one is deleted
    /// best-effort once the entry points at the new upload; without one the old
    /// image is kept. If the update fails the new upload is discarded and the
    /// stored entry is untouched.
    pub fn update_entry(
        &self,
        entry_id: Uuid,
        patch: GuestBookPatch,
        image: Option<ImageUpload>,
    ) -> ServiceResult<GuestBookEntry> {
        let existing = self.get_entry(entry_id)?;
        let patch = GuestBookPatch {
            guest_name: patch
                .guest_name
                .map(|v| required("guest_name", &v))
                .transpose()?,
            content: patch
                .content
                .map(|v| required("content", &v))
                .transpose()?,
        };

        let uploaded = image.map(|upload| self.upload(&upload)).transpose()?;
        let image_url = uploaded.clone().or_else(|| existing.image.clone());

        let updated = match self.entries.update_guest_book(entry_id, &patch, image_url) {
            Ok(Some(updated)) => updated,
            outcome => {
                if let Some(url) = &uploaded {
                    self.discard_image(url);
                }
                return match outcome {
                    Err(err) => Err(err.into()),
                    _ => Err(ServiceError::not_found("Guest book")),
                };
            }
        };

        if let (Some(_), Some(old)) = (&uploaded, &existing.image) {
            self.discard_image(old);
        }
        Ok(updated)
    }

    /// Soft-delete several entries. Unknown ids are counted as failures.
    pub fn delete_entries(&self, entry_ids: &[Uuid]) -> ServiceResult<BulkDeleteReport> {
        if entry_ids.is_empty() {
            return Err(ServiceError::validation("no guest book ids provided"));
        }

        let mut success_count = 0;
        for &entry_id in entry_ids {
            let Some(entry) = self.entries.get_guest_book_by_id(entry_id)? else {
                continue;
            };
            if let Some(url) = &entry.image {
                self.discard_image(url);
            }
            if self.entries.delete_guest_book(entry_id)? {
                success_count += 1;
            }
        }

        let report = BulkDeleteReport {
            total: entry_ids.len(),
            success_count,
            failed_count: entry_ids.len() - success_count,
        };
        info!(total = report.total, deleted = report.success_count, "guestbook entries deleted");
        Ok(report)
    }

    fn user_by_username(&self, username: &str) -> ServiceResult<User> {
        self.users
            .get_user_by_username(username)?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    fn create_for(
        &self,
        user: &User,
        entry: NewGuestBookEntry,
        image: Option<ImageUpload>,
    ) -> ServiceResult<GuestBookEntry> {
        let entry = NewGuestBookEntry {
            guest_name: required("guest_name", &entry.guest_name)?,
            content: required("content", &entry.content)?,
        };
        let image_url = image.map(|upload| self.upload(&upload)).transpose()?;

        let created = self.entries.create_guest_book(user.id, entry, image_url)?;
        info!(entry_id = %created.id, user_id = %user.id, "guestbook entry created");
        Ok(created)
    }

    fn upload(&self, image: &ImageUpload) -> ServiceResult<String> {
        if image.is_empty() {
            return Err(ServiceError::validation("image cannot be empty"));
        }
        Ok(self.storage.upload_image(image, IMAGE_FOLDER)?)
    }

    fn discard_image(&self, url: &str) {
        if let Err(err) = self.storage.delete_image(url) {
            warn!(%url, error = %err, "failed to delete guestbook image");
        }
    }
}
