use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{required, ServiceError, ServiceResult};
use crate::container::capabilities;
use crate::domain::{Guest, GuestImage, GuestPatch, ImageUpload, NewGuest};
use crate::repository::GuestRepository;
use crate::storage::ImageStorage;
use crate::{Registry, RegistryError};

fn image_folder(guest_id: Uuid) -> String {
    format!("guest_images/{guest_id}")
}

/// Guest list management, including per-guest photos.
pub struct GuestService {
    guests: Arc<dyn GuestRepository>,
    storage: Arc<dyn ImageStorage>,
}

impl GuestService {
    pub fn new(guests: Arc<dyn GuestRepository>, storage: Arc<dyn ImageStorage>) -> Self {
        Self { guests, storage }
    }

    pub fn from_registry(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self::new(
            registry.resolve::<capabilities::GuestRepository>()?,
            registry.resolve::<capabilities::ImageStorage>()?,
        ))
    }

    pub fn get_guests_by_user_id(&self, user_id: Uuid) -> ServiceResult<Vec<Guest>> {
        Ok(self.guests.get_guests_by_user_id(user_id)?)
    }

    pub fn get_guest_by_id(&self, guest_id: Uuid) -> ServiceResult<Guest> {
        self.guests
            .get_guest_by_id(guest_id)?
            .ok_or_else(|| ServiceError::not_found("Guest"))
    }

    pub fn get_guest_by_nickname(&self, nickname: &str) -> ServiceResult<Guest> {
        self.guests
            .get_guest_by_nickname(nickname)?
            .ok_or_else(|| ServiceError::not_found("Guest"))
    }

    /// Create a guest for `user_id` and upload its images.
    ///
    /// All images are checked before anything is written. If an upload fails the
    /// guest and the images uploaded so far are rolled back.
    pub fn create_guest(
        &self,
        user_id: Uuid,
        guest: NewGuest,
        images: Vec<ImageUpload>,
    ) -> ServiceResult<(Guest, Vec<GuestImage>)> {
        let realname = required("realname", &guest.realname)?;
        if images.iter().any(ImageUpload::is_empty) {
            return Err(ServiceError::validation("image cannot be empty"));
        }

        let created = self.guests.create_guest(user_id, NewGuest { realname, ..guest })?;

        let folder = image_folder(created.id);
        let mut stored = Vec::with_capacity(images.len());
        for image in &images {
            match self.storage.upload_image(image, &folder) {
                Ok(url) => stored.push(self.guests.add_guest_image(created.id, url)?),
                Err(err) => {
                    warn!(guest_id = %created.id, error = %err, "image upload failed, rolling back guest");
                    self.discard_images(&stored);
                    self.guests.remove_all_guest_images(created.id)?;
                    self.guests.delete_guest(created.id)?;
                    return Err(err.into());
                }
            }
        }

        info!(guest_id = %created.id, %user_id, images = stored.len(), "guest created");
        Ok((created, stored))
    }

    pub fn update_guest(
        &self,
        user_id: Uuid,
        guest_id: Uuid,
        patch: GuestPatch,
    ) -> ServiceResult<Guest> {
        self.owned_guest(user_id, guest_id)?;
        let patch = GuestPatch {
            realname: patch
                .realname
                .map(|name| required("realname", &name))
                .transpose()?,
            ..patch
        };
        self.guests
            .update_guest(guest_id, &patch)?
            .ok_or_else(|| ServiceError::not_found("Guest"))
    }

    /// Soft-delete a guest together with its images.
    pub fn delete_guest(&self, user_id: Uuid, guest_id: Uuid) -> ServiceResult<Guest> {
        self.owned_guest(user_id, guest_id)?;

        let images = self.guests.get_guest_images(guest_id)?;
        self.discard_images(&images);
        self.guests.remove_all_guest_images(guest_id)?;

        let deleted = self
            .guests
            .delete_guest(guest_id)?
            .ok_or_else(|| ServiceError::not_found("Guest"))?;
        info!(%guest_id, %user_id, "guest deleted");
        Ok(deleted)
    }

    pub fn add_guest_image(&self, guest_id: Uuid, image: ImageUpload) -> ServiceResult<GuestImage> {
        self.get_guest_by_id(guest_id)?;
        if image.is_empty() {
            return Err(ServiceError::validation("image cannot be empty"));
        }
        let url = self.storage.upload_image(&image, &image_folder(guest_id))?;
        Ok(self.guests.add_guest_image(guest_id, url)?)
    }

    /// Remove one image of `guest_id`. The stored object is deleted best-effort.
    pub fn remove_guest_image(&self, guest_id: Uuid, image_id: Uuid) -> ServiceResult<GuestImage> {
        self.get_guest_by_id(guest_id)?;
        if !self
            .guests
            .get_guest_images(guest_id)?
            .iter()
            .any(|image| image.id == image_id)
        {
            return Err(ServiceError::not_found("Image"));
        }

        let removed = self
            .guests
            .remove_guest_image(image_id)?
            .ok_or_else(|| ServiceError::not_found("Image"))?;
        self.discard_images(std::slice::from_ref(&removed));
        Ok(removed)
    }

    pub fn get_guest_images(&self, guest_id: Uuid) -> ServiceResult<Vec<GuestImage>> {
        self.get_guest_by_id(guest_id)?;
        Ok(self.guests.get_guest_images(guest_id)?)
    }

    /// Guests are only visible for modification to their owner.
    fn owned_guest(&self, user_id: Uuid, guest_id: Uuid) -> ServiceResult<Guest> {
        self.guests
            .get_guest_by_id(guest_id)?
            .filter(|guest| guest.user_id == user_id)
            .ok_or_else(|| ServiceError::not_found("Guest"))
    }

    fn discard_images(&self, images: &[GuestImage]) {
        for image in images {
            if let Err(err) = self.storage.delete_image(&image.image_url) {
                warn!(image_id = %image.id, error = %err, "failed to delete stored image");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryGuestRepository;
    use crate::storage::{MemoryImageStorage, StorageError};

    struct Fixture {
        storage: Arc<MemoryImageStorage>,
        service: GuestService,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryImageStorage::new("https://cdn.test", "bucket"));
        let service = GuestService::new(Arc::new(MemoryGuestRepository::new()), storage.clone());
        Fixture { storage, service }
    }

    fn new_guest(realname: &str) -> NewGuest {
        NewGuest {
            realname: realname.into(),
            nickname: Some(realname.to_lowercase()),
            ..Default::default()
        }
    }

    fn jpeg(name: &str) -> ImageUpload {
        ImageUpload::new(name, vec![0xFF, 0xD8, 0xFF]).with_content_type("image/jpeg")
    }

    #[test]
    fn create_guest_uploads_images_under_guest_folder() {
        let fx = fixture();
        let owner = Uuid::new_v4();

        let (guest, images) = fx
            .service
            .create_guest(owner, new_guest("Linh"), vec![jpeg("a.jpg"), jpeg("b.jpg")])
            .unwrap();

        assert_eq!(images.len(), 2);
        let folder = format!("/bucket/guest_images/{}/", guest.id);
        assert!(images.iter().all(|i| i.image_url.contains(&folder)));
        assert_eq!(fx.storage.object_count(), 2);
        assert_eq!(fx.service.get_guest_images(guest.id).unwrap().len(), 2);
    }

    #[test]
    fn create_guest_without_images() {
        let fx = fixture();
        let (guest, images) = fx
            .service
            .create_guest(Uuid::new_v4(), new_guest("Hoa"), Vec::new())
            .unwrap();
        assert!(images.is_empty());
        assert_eq!(fx.service.get_guest_by_nickname("hoa").unwrap().id, guest.id);
    }

    #[test]
    fn empty_image_rejects_whole_request() {
        let fx = fixture();
        let owner = Uuid::new_v4();

        let err = fx
            .service
            .create_guest(
                owner,
                new_guest("Linh"),
                vec![jpeg("a.jpg"), ImageUpload::new("b.jpg", Vec::new())],
            )
            .unwrap_err();

        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(fx.service.get_guests_by_user_id(owner).unwrap().is_empty());
        assert_eq!(fx.storage.object_count(), 0);
    }

    #[test]
    fn failed_upload_rolls_back_guest() {
        let fx = fixture();
        let owner = Uuid::new_v4();

        let err = fx
            .service
            .create_guest(
                owner,
                new_guest("Linh"),
                vec![jpeg("a.jpg"), jpeg("bad/name.jpg")],
            )
            .unwrap_err();

        assert!(matches!(err, ServiceError::Storage(StorageError::Upload(_))));
        assert!(fx.service.get_guests_by_user_id(owner).unwrap().is_empty());
        assert_eq!(fx.storage.object_count(), 0);
    }

    #[test]
    fn blank_realname_is_rejected() {
        let fx = fixture();
        let err = fx
            .service
            .create_guest(Uuid::new_v4(), new_guest("  "), Vec::new())
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn only_owner_can_update_or_delete() {
        let fx = fixture();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let (guest, _) = fx
            .service
            .create_guest(owner, new_guest("Linh"), Vec::new())
            .unwrap();

        let patch = GuestPatch {
            phone: Some("0987".into()),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.update_guest(stranger, guest.id, patch.clone()),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.delete_guest(stranger, guest.id),
            Err(ServiceError::NotFound(_))
        ));

        let updated = fx.service.update_guest(owner, guest.id, patch).unwrap();
        assert_eq!(updated.phone.as_deref(), Some("0987"));
    }

    #[test]
    fn delete_guest_removes_images_from_storage() {
        let fx = fixture();
        let owner = Uuid::new_v4();
        let (guest, _) = fx
            .service
            .create_guest(owner, new_guest("Linh"), vec![jpeg("a.jpg")])
            .unwrap();

        fx.service.delete_guest(owner, guest.id).unwrap();

        assert_eq!(fx.storage.object_count(), 0);
        assert!(matches!(
            fx.service.get_guest_by_id(guest.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn add_and_remove_single_image() {
        let fx = fixture();
        let (guest, _) = fx
            .service
            .create_guest(Uuid::new_v4(), new_guest("Linh"), Vec::new())
            .unwrap();

        let image = fx.service.add_guest_image(guest.id, jpeg("c.jpg")).unwrap();
        assert!(fx.storage.contains(&image.image_url));

        let removed = fx.service.remove_guest_image(guest.id, image.id).unwrap();
        assert_eq!(removed.id, image.id);
        assert!(!fx.storage.contains(&image.image_url));
        assert!(matches!(
            fx.service.remove_guest_image(guest.id, image.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn image_must_belong_to_guest() {
        let fx = fixture();
        let owner = Uuid::new_v4();
        let (first, _) = fx
            .service
            .create_guest(owner, new_guest("A"), vec![jpeg("a.jpg")])
            .unwrap();
        let (second, _) = fx
            .service
            .create_guest(owner, new_guest("B"), Vec::new())
            .unwrap();
        let image = fx.service.get_guest_images(first.id).unwrap().remove(0);

        assert!(matches!(
            fx.service.remove_guest_image(second.id, image.id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(fx.storage.contains(&image.image_url));
    }

    #[test]
    fn add_image_to_missing_guest_fails() {
        let fx = fixture();
        assert!(matches!(
            fx.service.add_guest_image(Uuid::new_v4(), jpeg("a.jpg")),
            Err(ServiceError::NotFound(_))
        ));
    }
}
