use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::{required, ServiceError, ServiceResult};
use crate::config::AppConfig;
use crate::container::capabilities;
use crate::domain::{BlacklistedToken, Session};
use crate::repository::{TokenRepository, UserRepository};
use crate::{Registry, RegistryError};

/// Refresh-token bookkeeping and logout. Tokens are opaque strings issued by
/// the caller; lifetimes come from [`AppConfig`].
pub struct SessionService {
    tokens: Arc<dyn TokenRepository>,
    users: Arc<dyn UserRepository>,
    settings: Arc<AppConfig>,
}

impl SessionService {
    pub fn new(
        tokens: Arc<dyn TokenRepository>,
        users: Arc<dyn UserRepository>,
        settings: Arc<AppConfig>,
    ) -> Self {
        Self {
            tokens,
            users,
            settings,
        }
    }

    pub fn from_registry(registry: &Registry) -> Result<Self, RegistryError> {
        Ok(Self::new(
            registry.resolve::<capabilities::TokenRepository>()?,
            registry.resolve::<capabilities::UserRepository>()?,
            registry.resolve::<capabilities::Settings>()?,
        ))
    }

    /// Record `refresh_token` as the user's current one, replacing any previous token.
    pub fn start_session(&self, user_id: Uuid, refresh_token: String) -> ServiceResult<Session> {
        self.users
            .get_user_by_id(user_id)?
            .ok_or_else(|| ServiceError::not_found("User"))?;
        let refresh_token = required("refresh_token", &refresh_token)?;

        self.tokens.save_refresh_token(user_id, refresh_token.clone())?;
        info!(%user_id, "session started");
        self.session(user_id, refresh_token)
    }

    /// Swap the stored refresh token for `replacement`. `presented` must be the
    /// stored one.
    pub fn rotate_refresh_token(
        &self,
        user_id: Uuid,
        presented: &str,
        replacement: String,
    ) -> ServiceResult<Session> {
        let replacement = required("refresh_token", &replacement)?;
        match self.tokens.get_refresh_token(user_id)? {
            Some(stored) if stored == presented => {}
            _ => {
                debug!(%user_id, "refresh token rejected");
                return Err(ServiceError::Unauthorized("invalid refresh token".into()));
            }
        }

        self.tokens.save_refresh_token(user_id, replacement.clone())?;
        self.session(user_id, replacement)
    }

    /// Revoke `access_token` until it would have expired and forget the refresh token.
    pub fn logout(&self, user_id: Uuid, access_token: &str) -> ServiceResult<BlacklistedToken> {
        let token = required("access_token", access_token)?;
        let expires_at = expires_in(self.settings.access_token_ttl())?;

        self.tokens.to_blacklist(user_id, token.clone(), expires_at)?;
        self.tokens.delete_refresh_token(user_id)?;
        info!(%user_id, %expires_at, "user logged out");

        Ok(BlacklistedToken {
            user_id,
            token,
            expires_at,
        })
    }

    pub fn is_access_revoked(&self, user_id: Uuid, access_token: &str) -> ServiceResult<bool> {
        Ok(self.tokens.is_token_blacklisted(user_id, access_token)?)
    }

    fn session(&self, user_id: Uuid, refresh_token: String) -> ServiceResult<Session> {
        Ok(Session {
            user_id,
            refresh_token,
            access_expires_at: expires_in(self.settings.access_token_ttl())?,
            refresh_expires_at: expires_in(self.settings.refresh_token_ttl())?,
        })
    }
}

fn expires_in(ttl: Duration) -> ServiceResult<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|_| ServiceError::validation("token lifetime out of range"))?;
    Ok(Utc::now() + ttl)
}
