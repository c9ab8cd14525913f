use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::{required, ServiceError, ServiceResult};
use crate::container::capabilities;
use crate::domain::{ImageUpload, NewUser, User, UserPatch};
use crate::repository::UserRepository;
use crate::storage::ImageStorage;
use crate::{Registry, RegistryError};

const AVATAR_FOLDER: &str = "avatars";

/// Account management for invitation owners.
pub struct UserService {
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn ImageStorage>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, storage: Arc<dyn ImageStorage>) -> Self {
        Self { users, storage }
    }

    pub fn from_registry(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self::new(
            registry.resolve::<capabilities::UserRepository>()?,
            registry.resolve::<capabilities::ImageStorage>()?,
        ))
    }

    pub fn register_user(&self, user: NewUser) -> ServiceResult<User> {
        let username = valid_username(&user.username)?;
        let display_name = required("display_name", &user.display_name)?;

        let created = self.users.create_user(NewUser {
            username,
            display_name,
            email: user.email,
        })?;
        info!(user_id = %created.id, username = %created.username, "user registered");
        Ok(created)
    }

    pub fn get_user(&self, user_id: Uuid) -> ServiceResult<User> {
        self.users
            .get_user_by_id(user_id)?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    pub fn get_user_by_username(&self, username: &str) -> ServiceResult<User> {
        self.users
            .get_user_by_username(username)?
            .ok_or_else(|| ServiceError::not_found("User"))
    }

    /// Update profile fields and optionally replace the avatar.
    ///
    /// A new username follows the registration rules and must not be taken.
    /// The old avatar is deleted best-effort once the profile points at the new
    /// one; if the update fails the new upload is discarded.
    pub fn edit_user(
        &self,
        user_id: Uuid,
        patch: UserPatch,
        avatar: Option<ImageUpload>,
    ) -> ServiceResult<User> {
        let existing = self.get_user(user_id)?;
        let patch = UserPatch {
            username: patch
                .username
                .map(|name| valid_username(&name))
                .transpose()?,
            display_name: patch
                .display_name
                .map(|name| required("display_name", &name))
                .transpose()?,
            email: patch.email,
        };

        let uploaded = match avatar {
            Some(image) if image.is_empty() => {
                return Err(ServiceError::validation("image cannot be empty"))
            }
            Some(image) => Some(
                self.storage
                    .upload_image(&image, &format!("{AVATAR_FOLDER}/{user_id}"))?,
            ),
            None => None,
        };
        let avatar_url = uploaded.clone().or_else(|| existing.avatar.clone());

        let updated = match self.users.update_user(user_id, &patch, avatar_url) {
            Ok(Some(updated)) => updated,
            outcome => {
                if let Some(url) = &uploaded {
                    self.discard_avatar(url);
                }
                return match outcome {
                    Err(err) => Err(err.into()),
                    _ => Err(ServiceError::not_found("User")),
                };
            }
        };

        if let (Some(_), Some(old)) = (&uploaded, &existing.avatar) {
            self.discard_avatar(old);
        }
        info!(%user_id, username = %updated.username, "user updated");
        Ok(updated)
    }

    pub fn delete_user(&self, user_id: Uuid) -> ServiceResult<User> {
        let deleted = self
            .users
            .delete_user(user_id)?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        info!(user_id = %deleted.id, "user deleted");
        Ok(deleted)
    }

    fn discard_avatar(&self, url: &str) {
        if let Err(err) = self.storage.delete_image(url) {
            warn!(%url, error = %err, "failed to delete avatar");
        }
    }
}

fn valid_username(value: &str) -> ServiceResult<String> {
    let username = required("username", value)?;
    if username.chars().any(char::is_whitespace) {
        return Err(ServiceError::validation("username must not contain whitespace"));
    }
    Ok(username)
}
