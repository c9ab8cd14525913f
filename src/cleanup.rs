//! Periodic purge of expired blacklisted tokens.

use std::ops::Deref;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::container::capabilities;
use crate::service::{ServiceError, ServiceResult};
use crate::{Registry, RegistryError};

/// Remove blacklist entries that have expired by now. Returns how many were removed.
pub fn cleanup_expired_tokens(registry: &Registry) -> ServiceResult<usize> {
    let tokens = registry
        .resolve::<capabilities::TokenRepository>()
        .map_err(ServiceError::from)?;
    let removed = tokens.purge_expired(Utc::now())?;
    if removed > 0 {
        info!(removed, "expired blacklisted tokens purged");
    } else {
        debug!("no expired blacklisted tokens");
    }
    Ok(removed)
}

/// Run [`cleanup_expired_tokens`] every `every` on the current tokio runtime.
///
/// `registry` is any owning handle: `Arc<Registry>` or the `&'static` global.
/// The first run happens immediately. Failures are logged and the job keeps
/// going; abort the returned handle to stop it.
pub fn spawn_cleanup_job<R>(registry: R, every: Duration) -> JoinHandle<()>
where
    R: Deref<Target = Registry> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = cleanup_expired_tokens(&registry) {
                error!(error = %err, "blacklist cleanup failed");
            }
        }
    })
}

/// Start the cleanup job at the interval configured in the registry's
/// [`Settings`](capabilities::Settings). Call once the registry is set up.
pub fn spawn_configured_cleanup_job<R>(registry: R) -> Result<JoinHandle<()>, RegistryError>
where
    R: Deref<Target = Registry> + Send + 'static,
{
    let every = registry
        .resolve::<capabilities::Settings>()?
        .cleanup_interval();
    info!(interval_secs = every.as_secs(), "scheduling blacklist cleanup");
    Ok(spawn_cleanup_job(registry, every))
}
