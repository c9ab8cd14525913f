//! In-memory repositories backed by `DashMap`.

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

use super::{
    GuestBookRepository, GuestRepository, RepoResult, RepositoryError, TokenRepository,
    UserRepository,
};
use crate::domain::{
    Guest, GuestBookEntry, GuestBookPatch, GuestImage, GuestPatch, NewGuest, NewGuestBookEntry,
    NewUser, User, UserPatch,
};

fn sorted_by_creation<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| created_at(item));
    items
}

// -------------------------------------------------------------------------------------------------
// Users
// -------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryUserRepository {
    users: DashMap<Uuid, User>,
    usernames: DashMap<String, Uuid>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for MemoryUserRepository {
    fn get_user_by_id(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        Ok(self
            .users
            .get(&user_id)
            .filter(|u| !u.is_deleted)
            .map(|u| u.value().clone()))
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let Some(id) = self.usernames.get(username).map(|id| *id) else {
            return Ok(None);
        };
        self.get_user_by_id(id)
    }

    fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            display_name: user.display_name,
            email: user.email,
            avatar: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };

        match self.usernames.entry(record.username.clone()) {
            Entry::Occupied(_) => {
                return Err(RepositoryError::Conflict(format!(
                    "username {} is taken",
                    record.username
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(record.id);
            }
        }

        self.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_user(
        &self,
        user_id: Uuid,
        patch: &UserPatch,
        avatar: Option<String>,
    ) -> RepoResult<Option<User>> {
        let Some(current) = self.get_user_by_id(user_id)? else {
            return Ok(None);
        };

        if let Some(username) = patch.username.as_ref().filter(|u| **u != current.username) {
            match self.usernames.entry(username.clone()) {
                Entry::Occupied(_) => {
                    return Err(RepositoryError::Conflict(format!(
                        "username {username} is taken"
                    )))
                }
                Entry::Vacant(slot) => {
                    slot.insert(user_id);
                }
            }
            self.usernames.remove(&current.username);
        }

        let Some(mut user) = self.users.get_mut(&user_id).filter(|u| !u.is_deleted) else {
            return Ok(None);
        };
        if let Some(v) = &patch.username {
            user.username = v.clone();
        }
        if let Some(v) = &patch.display_name {
            user.display_name = v.clone();
        }
        if let Some(v) = &patch.email {
            user.email = Some(v.clone());
        }
        user.avatar = avatar;
        user.updated_at = Utc::now();
        Ok(Some(user.value().clone()))
    }

    fn delete_user(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        let deleted = {
            let Some(mut user) = self.users.get_mut(&user_id).filter(|u| !u.is_deleted) else {
                return Ok(None);
            };
            user.is_deleted = true;
            user.updated_at = Utc::now();
            user.value().clone()
        };
        // Free the username for re-registration
        self.usernames.remove(&deleted.username);
        Ok(Some(deleted))
    }
}

// -------------------------------------------------------------------------------------------------
// Guests
// -------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryGuestRepository {
    guests: DashMap<Uuid, Guest>,
    images: DashMap<Uuid, GuestImage>,
}

impl MemoryGuestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_guest<P>(&self, predicate: P) -> Option<Guest>
    where
        P: Fn(&Guest) -> bool,
    {
        self.guests
            .iter()
            .find(|g| !g.is_deleted && predicate(g.value()))
            .map(|g| g.value().clone())
    }
}

impl GuestRepository for MemoryGuestRepository {
    fn get_guest_by_id(&self, guest_id: Uuid) -> RepoResult<Option<Guest>> {
        Ok(self
            .guests
            .get(&guest_id)
            .filter(|g| !g.is_deleted)
            .map(|g| g.value().clone()))
    }

    fn get_guests_by_user_id(&self, user_id: Uuid) -> RepoResult<Vec<Guest>> {
        let guests: Vec<Guest> = self
            .guests
            .iter()
            .filter(|g| !g.is_deleted && g.user_id == user_id)
            .map(|g| g.value().clone())
            .collect();
        Ok(sorted_by_creation(guests, |g| g.created_at))
    }

    fn get_guest_by_nickname(&self, nickname: &str) -> RepoResult<Option<Guest>> {
        Ok(self.find_guest(|g| g.nickname.as_deref() == Some(nickname)))
    }

    fn get_guest_by_phone(&self, phone: &str) -> RepoResult<Option<Guest>> {
        Ok(self.find_guest(|g| g.phone.as_deref() == Some(phone)))
    }

    fn create_guest(&self, user_id: Uuid, guest: NewGuest) -> RepoResult<Guest> {
        let now = Utc::now();
        let record = Guest {
            id: Uuid::new_v4(),
            user_id,
            realname: guest.realname,
            nickname: guest.nickname,
            facebook: guest.facebook,
            email: guest.email,
            phone: guest.phone,
            content: guest.content,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        self.guests.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_guest(&self, guest_id: Uuid, patch: &GuestPatch) -> RepoResult<Option<Guest>> {
        let Some(mut guest) = self.guests.get_mut(&guest_id).filter(|g| !g.is_deleted) else {
            return Ok(None);
        };
        patch.apply(&mut guest);
        guest.updated_at = Utc::now();
        Ok(Some(guest.value().clone()))
    }

    fn delete_guest(&self, guest_id: Uuid) -> RepoResult<Option<Guest>> {
        let Some(mut guest) = self.guests.get_mut(&guest_id).filter(|g| !g.is_deleted) else {
            return Ok(None);
        };
        guest.is_deleted = true;
        guest.updated_at = Utc::now();
        Ok(Some(guest.value().clone()))
    }

    fn add_guest_image(&self, guest_id: Uuid, image_url: String) -> RepoResult<GuestImage> {
        let image = GuestImage {
            id: Uuid::new_v4(),
            guest_id,
            image_url,
            created_at: Utc::now(),
            is_deleted: false,
        };
        self.images.insert(image.id, image.clone());
        Ok(image)
    }

    fn remove_guest_image(&self, image_id: Uuid) -> RepoResult<Option<GuestImage>> {
        let Some(mut image) = self.images.get_mut(&image_id).filter(|i| !i.is_deleted) else {
            return Ok(None);
        };
        image.is_deleted = true;
        Ok(Some(image.value().clone()))
    }

    fn remove_all_guest_images(&self, guest_id: Uuid) -> RepoResult<usize> {
        let mut removed = 0;
        for mut image in self.images.iter_mut() {
            if image.guest_id == guest_id && !image.is_deleted {
                image.is_deleted = true;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn get_guest_images(&self, guest_id: Uuid) -> RepoResult<Vec<GuestImage>> {
        let images: Vec<GuestImage> = self
            .images
            .iter()
            .filter(|i| !i.is_deleted && i.guest_id == guest_id)
            .map(|i| i.value().clone())
            .collect();
        Ok(sorted_by_creation(images, |i| i.created_at))
    }
}

// -------------------------------------------------------------------------------------------------
// Guestbook
// -------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryGuestBookRepository {
    entries: DashMap<Uuid, GuestBookEntry>,
}

impl MemoryGuestBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GuestBookRepository for MemoryGuestBookRepository {
    fn get_guest_book_by_id(&self, entry_id: Uuid) -> RepoResult<Option<GuestBookEntry>> {
        Ok(self
            .entries
            .get(&entry_id)
            .filter(|e| !e.is_deleted)
            .map(|e| e.value().clone()))
    }

    fn get_guest_books_by_user_id(&self, user_id: Uuid) -> RepoResult<Vec<GuestBookEntry>> {
        let entries: Vec<GuestBookEntry> = self
            .entries
            .iter()
            .filter(|e| !e.is_deleted && e.user_id == user_id)
            .map(|e| e.value().clone())
            .collect();
        Ok(sorted_by_creation(entries, |e| e.created_at))
    }

    fn create_guest_book(
        &self,
        user_id: Uuid,
        entry: NewGuestBookEntry,
        image: Option<String>,
    ) -> RepoResult<GuestBookEntry> {
        let now = Utc::now();
        let record = GuestBookEntry {
            id: Uuid::new_v4(),
            user_id,
            guest_name: entry.guest_name,
            content: entry.content,
            image,
            created_at: now,
            updated_at: now,
            is_deleted: false,
        };
        self.entries.insert(record.id, record.clone());
        Ok(record)
    }

    fn update_guest_book(
        &self,
        entry_id: Uuid,
        patch: &GuestBookPatch,
        image: Option<String>,
    ) -> RepoResult<Option<GuestBookEntry>> {
        let Some(mut entry) = self.entries.get_mut(&entry_id).filter(|e| !e.is_deleted) else {
            return Ok(None);
        };
        if let Some(v) = &patch.guest_name {
            entry.guest_name = v.clone();
        }
        if let Some(v) = &patch.content {
            entry.content = v.clone();
        }
        entry.image = image;
        entry.updated_at = Utc::now();
        Ok(Some(entry.value().clone()))
    }

    fn delete_guest_book(&self, entry_id: Uuid) -> RepoResult<bool> {
        let Some(mut entry) = self.entries.get_mut(&entry_id).filter(|e| !e.is_deleted) else {
            return Ok(false);
        };
        entry.is_deleted = true;
        entry.updated_at = Utc::now();
        Ok(true)
    }
}

// -------------------------------------------------------------------------------------------------
// Tokens
// -------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryTokenRepository {
    refresh_tokens: DashMap<Uuid, String>,
    blacklist: DashMap<(Uuid, String), DateTime<Utc>>,
}

impl MemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }
}

impl TokenRepository for MemoryTokenRepository {
    fn save_refresh_token(&self, user_id: Uuid, token: String) -> RepoResult<()> {
        self.refresh_tokens.insert(user_id, token);
        Ok(())
    }

    fn get_refresh_token(&self, user_id: Uuid) -> RepoResult<Option<String>> {
        Ok(self.refresh_tokens.get(&user_id).map(|t| t.value().clone()))
    }

    fn delete_refresh_token(&self, user_id: Uuid) -> RepoResult<()> {
        self.refresh_tokens.remove(&user_id);
        Ok(())
    }

    fn to_blacklist(
        &self,
        user_id: Uuid,
        token: String,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.blacklist.insert((user_id, token), expires_at);
        Ok(())
    }

    fn is_token_blacklisted(&self, user_id: Uuid, token: &str) -> RepoResult<bool> {
        Ok(self.blacklist.contains_key(&(user_id, token.to_string())))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> RepoResult<usize> {
        let mut removed = 0;
        self.blacklist.retain(|_, expires_at| {
            let keep = *expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            display_name: "Anna".into(),
            email: None,
        }
    }

    #[test]
    fn usernames_are_unique_among_live_users() {
        let repo = MemoryUserRepository::new();
        let anna = repo.create_user(new_user("anna")).unwrap();

        assert!(matches!(
            repo.create_user(new_user("anna")),
            Err(RepositoryError::Conflict(_))
        ));

        repo.delete_user(anna.id).unwrap();
        assert!(repo.get_user_by_username("anna").unwrap().is_none());
        assert!(repo.create_user(new_user("anna")).is_ok());
    }

    #[test]
    fn username_change_moves_the_index() {
        let repo = MemoryUserRepository::new();
        let anna = repo.create_user(new_user("anna")).unwrap();
        repo.create_user(new_user("minh")).unwrap();

        let rename = |name: &str| UserPatch {
            username: Some(name.into()),
            ..Default::default()
        };

        assert!(matches!(
            repo.update_user(anna.id, &rename("minh"), None),
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(repo.get_user_by_username("anna").unwrap().unwrap().id, anna.id);

        let renamed = repo
            .update_user(anna.id, &rename("anna-minh"), Some("https://cdn/a.png".into()))
            .unwrap()
            .unwrap();
        assert_eq!(renamed.username, "anna-minh");
        assert_eq!(renamed.avatar.as_deref(), Some("https://cdn/a.png"));
        assert!(repo.get_user_by_username("anna").unwrap().is_none());
        assert_eq!(repo.get_user_by_username("anna-minh").unwrap().unwrap().id, anna.id);

        // The old name is free again; keeping the current name is not a conflict
        assert!(repo.create_user(new_user("anna")).is_ok());
        assert!(repo.update_user(anna.id, &rename("anna-minh"), None).is_ok());
    }

    #[test]
    fn soft_deleted_guest_is_invisible() {
        let repo = MemoryGuestRepository::new();
        let owner = Uuid::new_v4();
        let guest = repo
            .create_guest(
                owner,
                NewGuest {
                    realname: "Tran Thi B".into(),
                    nickname: Some("bee".into()),
                    phone: Some("0911".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(repo.get_guest_by_nickname("bee").unwrap().is_some());
        assert!(repo.get_guest_by_phone("0911").unwrap().is_some());

        let deleted = repo.delete_guest(guest.id).unwrap().unwrap();
        assert!(deleted.is_deleted);

        assert!(repo.get_guest_by_id(guest.id).unwrap().is_none());
        assert!(repo.get_guests_by_user_id(owner).unwrap().is_empty());
        assert!(repo.get_guest_by_nickname("bee").unwrap().is_none());
        // Deleting twice finds nothing
        assert!(repo.delete_guest(guest.id).unwrap().is_none());
    }

    #[test]
    fn update_guest_applies_patch() {
        let repo = MemoryGuestRepository::new();
        let guest = repo
            .create_guest(
                Uuid::new_v4(),
                NewGuest {
                    realname: "C".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = repo
            .update_guest(
                guest.id,
                &GuestPatch {
                    email: Some("c@example.com".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.realname, "C");
        assert_eq!(updated.email.as_deref(), Some("c@example.com"));
        assert!(updated.updated_at >= guest.updated_at);
    }

    #[test]
    fn guest_images_are_scoped_and_removable() {
        let repo = MemoryGuestRepository::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let first = repo.add_guest_image(a, "u1".into()).unwrap();
        repo.add_guest_image(a, "u2".into()).unwrap();
        repo.add_guest_image(b, "u3".into()).unwrap();

        assert_eq!(repo.get_guest_images(a).unwrap().len(), 2);

        repo.remove_guest_image(first.id).unwrap();
        assert_eq!(repo.get_guest_images(a).unwrap().len(), 1);

        assert_eq!(repo.remove_all_guest_images(a).unwrap(), 1);
        assert!(repo.get_guest_images(a).unwrap().is_empty());
        assert_eq!(repo.get_guest_images(b).unwrap().len(), 1);
    }

    #[test]
    fn guestbook_update_replaces_image_and_delete_is_soft() {
        let repo = MemoryGuestBookRepository::new();
        let owner = Uuid::new_v4();
        let entry = repo
            .create_guest_book(
                owner,
                NewGuestBookEntry {
                    guest_name: "D".into(),
                    content: "Congrats!".into(),
                },
                Some("old".into()),
            )
            .unwrap();

        let updated = repo
            .update_guest_book(entry.id, &GuestBookPatch::default(), Some("new".into()))
            .unwrap()
            .unwrap();
        assert_eq!(updated.image.as_deref(), Some("new"));
        assert_eq!(updated.content, "Congrats!");

        assert!(repo.delete_guest_book(entry.id).unwrap());
        assert!(!repo.delete_guest_book(entry.id).unwrap());
        assert!(repo.get_guest_books_by_user_id(owner).unwrap().is_empty());
    }

    #[test]
    fn purge_removes_only_expired_tokens() {
        let repo = MemoryTokenRepository::new();
        let user = Uuid::new_v4();
        let now = Utc::now();

        repo.to_blacklist(user, "old".into(), now - Duration::minutes(1)).unwrap();
        repo.to_blacklist(user, "fresh".into(), now + Duration::minutes(10)).unwrap();

        assert_eq!(repo.purge_expired(now).unwrap(), 1);
        assert!(!repo.is_token_blacklisted(user, "old").unwrap());
        assert!(repo.is_token_blacklisted(user, "fresh").unwrap());
        assert_eq!(repo.blacklist_len(), 1);
    }

    #[test]
    fn refresh_tokens_round_trip() {
        let repo = MemoryTokenRepository::new();
        let user = Uuid::new_v4();

        repo.save_refresh_token(user, "r1".into()).unwrap();
        repo.save_refresh_token(user, "r2".into()).unwrap();
        assert_eq!(repo.get_refresh_token(user).unwrap().as_deref(), Some("r2"));

        repo.delete_refresh_token(user).unwrap();
        assert!(repo.get_refresh_token(user).unwrap().is_none());
    }
}
