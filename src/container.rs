//! Application wiring: which provider fulfils which capability.
//!
//! ```
//! use invitation_container::container::{capabilities, setup_dependencies};
//! use invitation_container::{AppConfig, Registry};
//!
//! let registry = Registry::new();
//! assert!(setup_dependencies(&registry, &AppConfig::default()).unwrap());
//! // Second call is a no-op
//! assert!(!setup_dependencies(&registry, &AppConfig::default()).unwrap());
//!
//! let guests = registry.resolve::<capabilities::GuestService>().unwrap();
//! assert!(guests.get_guests_by_user_id(uuid::Uuid::new_v4()).unwrap().is_empty());
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::repository::memory::{
    MemoryGuestBookRepository, MemoryGuestRepository, MemoryTokenRepository, MemoryUserRepository,
};
use crate::service::{GuestBookService, GuestService, SessionService, UserService};
use crate::storage::MemoryImageStorage;
use crate::{CapabilityId, Registry, RegistryError};

pub mod capabilities {
    use crate::define_capability;

    define_capability! {
        /// Loaded application configuration.
        pub Settings => crate::config::AppConfig;

        pub UserRepository => dyn crate::repository::UserRepository;
        pub GuestRepository => dyn crate::repository::GuestRepository;
        pub GuestBookRepository => dyn crate::repository::GuestBookRepository;
        pub TokenRepository => dyn crate::repository::TokenRepository;

        /// Public object store for uploaded images.
        pub ImageStorage => dyn crate::storage::ImageStorage;

        pub UserService => crate::service::UserService;
        pub GuestService => crate::service::GuestService;
        pub GuestBookService => crate::service::GuestBookService;
        pub SessionService => crate::service::SessionService;
    }
}

/// Every capability the application expects after setup.
pub fn required_capabilities() -> Vec<CapabilityId> {
    use capabilities::*;

    vec![
        CapabilityId::of::<Settings>(),
        CapabilityId::of::<UserRepository>(),
        CapabilityId::of::<GuestRepository>(),
        CapabilityId::of::<GuestBookRepository>(),
        CapabilityId::of::<TokenRepository>(),
        CapabilityId::of::<ImageStorage>(),
        CapabilityId::of::<UserService>(),
        CapabilityId::of::<GuestService>(),
        CapabilityId::of::<GuestBookService>(),
        CapabilityId::of::<SessionService>(),
    ]
}

/// Register all dependencies in `registry`.
///
/// Runs once per registry; returns `Ok(false)` when the registry was already set up.
pub fn setup_dependencies(registry: &Registry, config: &AppConfig) -> Result<bool, RegistryError> {
    let config = Arc::new(config.clone());

    registry.setup(move |r| {
        r.register_instance::<capabilities::Settings>(config.clone());

        r.register::<capabilities::UserRepository, _>(|| Arc::new(MemoryUserRepository::new()));
        r.register::<capabilities::GuestRepository, _>(|| Arc::new(MemoryGuestRepository::new()));
        r.register::<capabilities::GuestBookRepository, _>(|| {
            Arc::new(MemoryGuestBookRepository::new())
        });
        r.register::<capabilities::TokenRepository, _>(|| Arc::new(MemoryTokenRepository::new()));

        let storage_config = config.clone();
        r.register::<capabilities::ImageStorage, _>(move || {
            Arc::new(MemoryImageStorage::new(
                storage_config.storage_base_url.clone(),
                storage_config.storage_bucket.clone(),
            ))
        });

        r.register_with::<capabilities::UserService, _>(|r| {
            UserService::from_registry(r).map(Arc::new)
        });
        r.register_with::<capabilities::GuestService, _>(|r| {
            GuestService::from_registry(r).map(Arc::new)
        });
        r.register_with::<capabilities::GuestBookService, _>(|r| {
            GuestBookService::from_registry(r).map(Arc::new)
        });
        r.register_with::<capabilities::SessionService, _>(|r| {
            SessionService::from_registry(r).map(Arc::new)
        });

        r.verify(&required_capabilities())?;
        info!(bucket = %config.storage_bucket, "dependencies registered");
        Ok(())
    })
}

/// Set up the process-wide registry and return it.
///
/// Call from the application's entry point; later calls return the same
/// registry without registering again.
pub fn init_di(config: &AppConfig) -> Result<&'static Registry, RegistryError> {
    let registry = Registry::global();
    setup_dependencies(registry, config)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::GuestRepository as _;

    #[test]
    fn setup_registers_every_required_capability() {
        let registry = Registry::new();
        assert!(setup_dependencies(&registry, &AppConfig::default()).unwrap());

        assert!(registry.verify(&required_capabilities()).is_ok());
        assert_eq!(registry.registered_names().len(), required_capabilities().len());
    }

    #[test]
    fn setup_twice_registers_once() {
        let registry = Registry::new();
        let events = Arc::new(std::sync::Mutex::new(0usize));
        let counter = events.clone();
        registry.set_trace_callback(move |e| {
            if matches!(e, crate::RegistryEvent::Register { .. }) {
                *counter.lock().unwrap() += 1;
            }
        });

        assert!(setup_dependencies(&registry, &AppConfig::default()).unwrap());
        assert!(!setup_dependencies(&registry, &AppConfig::default()).unwrap());

        assert_eq!(*events.lock().unwrap(), required_capabilities().len());
    }

    #[test]
    fn repositories_are_shared_between_services() {
        let registry = Registry::new();
        setup_dependencies(&registry, &AppConfig::default()).unwrap();

        let guests = registry.resolve::<capabilities::GuestService>().unwrap();
        let owner = uuid::Uuid::new_v4();
        let (guest, _) = guests
            .create_guest(
                owner,
                crate::domain::NewGuest {
                    realname: "Mai".into(),
                    ..Default::default()
                },
                Vec::new(),
            )
            .unwrap();

        // The repository resolved directly is the one behind the service
        let repo = registry.resolve::<capabilities::GuestRepository>().unwrap();
        assert_eq!(repo.get_guest_by_id(guest.id).unwrap().unwrap().realname, "Mai");
    }

    #[test]
    fn session_service_uses_configured_lifetime_and_shared_tokens() {
        let registry = Registry::new();
        let config = AppConfig {
            access_token_expire_sec: 120,
            ..AppConfig::default()
        };
        setup_dependencies(&registry, &config).unwrap();

        let user = registry
            .resolve::<capabilities::UserService>()
            .unwrap()
            .register_user(crate::domain::NewUser {
                username: "anna".into(),
                display_name: "Anna".into(),
                email: None,
            })
            .unwrap();
        let sessions = registry.resolve::<capabilities::SessionService>().unwrap();
        sessions.start_session(user.id, "refresh".into()).unwrap();
        let revoked = sessions.logout(user.id, "access").unwrap();

        let ttl = revoked.expires_at - chrono::Utc::now();
        assert!(ttl > chrono::Duration::seconds(110) && ttl <= chrono::Duration::seconds(120));

        let tokens = registry.resolve::<capabilities::TokenRepository>().unwrap();
        assert!(tokens.is_token_blacklisted(user.id, "access").unwrap());
    }

    #[test]
    fn settings_and_storage_follow_config() {
        let registry = Registry::new();
        let config = AppConfig {
            storage_bucket: "anna-minh".into(),
            ..AppConfig::default()
        };
        setup_dependencies(&registry, &config).unwrap();

        assert_eq!(*registry.resolve::<capabilities::Settings>().unwrap(), config);

        let storage = registry.resolve::<capabilities::ImageStorage>().unwrap();
        let url = storage
            .upload_image(&crate::domain::ImageUpload::new("a.png", vec![1]), "x")
            .unwrap();
        assert!(url.contains("/anna-minh/x/"));
    }
}
