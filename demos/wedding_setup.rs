//! Wiring example for invitation-container.
//!
//! Demonstrates:
//! - Loading configuration from the environment (`.env`, `CONFIG_PATH`, overrides)
//! - One-time setup of the process-wide registry with `init_di`
//! - Resolving services and running a small invitation flow
//! - Refresh-token sessions and logout
//! - The background blacklist cleanup job on the configured interval
//!
//! Run with: `cargo run --example wedding_setup`
//! Set `RUST_LOG=trace` to see every registry operation, `LOG_FORMAT=json`
//! for structured output.

use chrono::{Duration as ChronoDuration, Utc};
use invitation_container::cleanup::spawn_configured_cleanup_job;
use invitation_container::container::{capabilities, init_di};
use invitation_container::domain::{ImageUpload, NewGuest, NewGuestBookEntry, NewUser, UserPatch};
use invitation_container::logging::{init_logging_default, init_logging_json};
use invitation_container::AppConfig;
use std::error::Error;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => init_logging_json(),
        _ => init_logging_default(),
    }
    println!("=== invitation-container: Wedding Setup ===\n");

    // -------------------------------------------------------------------------
    // 1. Configuration and registry
    // -------------------------------------------------------------------------
    let config = AppConfig::from_env()?;
    println!("1. Storage: {}/{}", config.storage_base_url, config.storage_bucket);

    let registry = init_di(&config)?;
    println!("   Registered: {:?}\n", registry.registered_names());

    // -------------------------------------------------------------------------
    // 2. Owner account
    // -------------------------------------------------------------------------
    let users = registry.resolve::<capabilities::UserService>()?;
    let owner = users.register_user(NewUser {
        username: "anna-minh".into(),
        display_name: "Anna & Minh".into(),
        email: Some("hello@anna-minh.test".into()),
    })?;
    let owner = users.edit_user(
        owner.id,
        UserPatch::default(),
        Some(ImageUpload::new("us.png", vec![0x89, 0x50, 0x4E, 0x47]).with_content_type("image/png")),
    )?;
    println!("2. Owner:\n{}\n", serde_json::to_string_pretty(&owner)?);

    // -------------------------------------------------------------------------
    // 3. Guests with photos
    // -------------------------------------------------------------------------
    let guests = registry.resolve::<capabilities::GuestService>()?;
    let (guest, images) = guests.create_guest(
        owner.id,
        NewGuest {
            realname: "Nguyen Lan".into(),
            nickname: Some("lan".into()),
            phone: Some("+84 90 000 0000".into()),
            ..Default::default()
        },
        vec![ImageUpload::new("lan.jpg", vec![0xFF, 0xD8, 0xFF]).with_content_type("image/jpeg")],
    )?;
    println!("3. Guest:\n{}", serde_json::to_string_pretty(&guest)?);
    for image in &images {
        println!("   image: {}", image.image_url);
    }
    println!();

    // -------------------------------------------------------------------------
    // 4. Guestbook, signed by the guest through the public username
    // -------------------------------------------------------------------------
    let book = registry.resolve::<capabilities::GuestBookService>()?;
    let entry = book.create_entry_guest_side(
        &owner.username,
        NewGuestBookEntry {
            guest_name: "Lan".into(),
            content: "Wishing you a lifetime of happiness!".into(),
        },
        None,
    )?;
    println!("4. Guestbook:\n{}\n", serde_json::to_string_pretty(&entry)?);

    // -------------------------------------------------------------------------
    // 5. Session and logout
    // -------------------------------------------------------------------------
    let sessions = registry.resolve::<capabilities::SessionService>()?;
    let session = sessions.start_session(owner.id, "refresh-1".into())?;
    println!("5. Session:\n{}", serde_json::to_string_pretty(&session)?);
    let revoked = sessions.logout(owner.id, "access-1")?;
    println!("   access token revoked until {}\n", revoked.expires_at);

    // -------------------------------------------------------------------------
    // 6. Blacklist cleanup, first run is immediate
    // -------------------------------------------------------------------------
    let tokens = registry.resolve::<capabilities::TokenRepository>()?;
    tokens.to_blacklist(owner.id, "expired-token".into(), Utc::now() - ChronoDuration::seconds(1))?;

    let job = spawn_configured_cleanup_job(registry)?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    job.abort();

    println!(
        "6. Cleanup every {}s; expired token still blacklisted: {}",
        config.blacklist_cleanup_interval_sec,
        tokens.is_token_blacklisted(owner.id, "expired-token")?
    );

    println!("\n=== Done ===");
    Ok(())
}
