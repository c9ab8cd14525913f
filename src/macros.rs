//! Macros for declaring capability tokens.

/// Declares one or more capability tokens.
///
/// Each entry `Name => InstanceType` generates a zero-sized `Name` type that
/// implements [`Capability`](crate::Capability) with `Instance = InstanceType`
/// and `NAME = "Name"`. Attributes (doc comments included) and visibility are
/// carried over to the generated type.
///
/// # Examples
///
/// ```rust
/// use invitation_container::{define_capability, Capability, Registry};
/// use std::sync::Arc;
///
/// pub trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct Fixed;
/// impl Clock for Fixed {
///     fn now(&self) -> u64 { 42 }
/// }
///
/// define_capability! {
///     /// Wall clock used by services.
///     pub SystemClock => dyn Clock;
///     pub Greeting => String;
/// }
///
/// assert_eq!(SystemClock::NAME, "SystemClock");
///
/// let registry = Registry::new();
/// registry.register::<SystemClock, _>(|| Arc::new(Fixed) as Arc<dyn Clock>);
/// registry.register::<Greeting, _>(|| Arc::new("hello".to_string()));
///
/// assert_eq!(registry.resolve::<SystemClock>().unwrap().now(), 42);
/// assert_eq!(&*registry.resolve::<Greeting>().unwrap(), "hello");
/// ```
#[macro_export]
macro_rules! define_capability {
    ($($(#[$meta:meta])* $vis:vis $name:ident => $instance:ty);+ $(;)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
            $vis struct $name;

            impl $crate::Capability for $name {
                type Instance = $instance;

                const NAME: &'static str = stringify!($name);
            }
        )+
    };
}
