//! Integration tests for capabilities backed by trait objects and closures.
//!
//! Services depend on `dyn Trait` capabilities so the implementation behind a
//! token can be swapped (in-memory for tests, a real backend in production)
//! without touching the consumers.

use invitation_container::{define_capability, Capability, Registry, RegistryError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Notifier: Send + Sync {
    fn notify(&self, to: &str) -> String;
}

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

struct SmsNotifier;

impl Notifier for SmsNotifier {
    fn notify(&self, to: &str) -> String {
        format!("sms:{to}")
    }
}

struct MailNotifier;

impl Notifier for MailNotifier {
    fn notify(&self, to: &str) -> String {
        format!("mail:{to}")
    }
}

/// Greets through whichever notifier is registered.
struct InvitationGreeter {
    notifier: Arc<dyn Notifier>,
}

impl Greeter for InvitationGreeter {
    fn greet(&self, name: &str) -> String {
        format!("You're invited, {name}! ({})", self.notifier.notify(name))
    }
}

define_capability! {
    NotifierCap => dyn Notifier;
    GreeterCap => dyn Greeter;
    VenueCap => String;
}

#[test]
fn trait_object_capability_resolves_to_implementation() {
    let registry = Registry::new();
    registry.register::<NotifierCap, _>(|| Arc::new(SmsNotifier));

    let notifier = registry.resolve::<NotifierCap>().unwrap();
    assert_eq!(notifier.notify("Lan"), "sms:Lan");
}

#[test]
fn dependent_provider_receives_registered_implementation() {
    let registry = Registry::new();
    registry.register::<NotifierCap, _>(|| Arc::new(MailNotifier));
    registry.register_with::<GreeterCap, _>(|r| {
        let notifier = r.resolve::<NotifierCap>()?;
        Ok(Arc::new(InvitationGreeter { notifier }))
    });

    let greeter = registry.resolve::<GreeterCap>().unwrap();
    assert_eq!(greeter.greet("Tuan"), "You're invited, Tuan! (mail:Tuan)");
}

#[test]
fn implementation_is_swapped_before_first_resolve() {
    let registry = Registry::new();
    registry.register::<NotifierCap, _>(|| Arc::new(SmsNotifier));
    registry.register::<NotifierCap, _>(|| Arc::new(MailNotifier));

    assert_eq!(registry.resolve::<NotifierCap>().unwrap().notify("x"), "mail:x");
}

#[test]
fn missing_dependency_surfaces_from_dependent_resolve() {
    let registry = Registry::new();
    registry.register_with::<GreeterCap, _>(|r| {
        let notifier = r.resolve::<NotifierCap>()?;
        Ok(Arc::new(InvitationGreeter { notifier }))
    });

    assert_eq!(
        registry.resolve::<GreeterCap>().err(),
        Some(RegistryError::NotRegistered {
            name: NotifierCap::NAME
        })
    );

    // Once the dependency appears the same binding succeeds
    registry.register::<NotifierCap, _>(|| Arc::new(SmsNotifier));
    assert!(registry.resolve::<GreeterCap>().is_ok());
}

#[test]
fn closure_provider_captures_state_and_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let venue = String::from("Riverside Garden");

    let registry = Registry::new();
    registry.register::<VenueCap, _>(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Arc::new(venue.clone())
    });

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    for _ in 0..5 {
        assert_eq!(&*registry.resolve::<VenueCap>().unwrap(), "Riverside Garden");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn function_pointer_provider() {
    fn build_notifier() -> Arc<dyn Notifier> {
        Arc::new(SmsNotifier)
    }

    let registry = Registry::new();
    registry.register::<NotifierCap, _>(build_notifier);
    assert_eq!(registry.resolve::<NotifierCap>().unwrap().notify("Mai"), "sms:Mai");
}

#[test]
fn registered_instance_is_shared_with_caller() {
    let notifier: Arc<dyn Notifier> = Arc::new(MailNotifier);

    let registry = Registry::new();
    registry.register_instance::<NotifierCap>(notifier.clone());

    let resolved = registry.resolve::<NotifierCap>().unwrap();
    assert!(Arc::ptr_eq(&resolved, &notifier));
}
