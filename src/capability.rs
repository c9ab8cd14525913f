//! Typed capability tokens.
//!
//! A capability is an abstract role ("UserRepository", "ImageStorage") that some
//! concrete provider fulfills. Each capability is a zero-sized token type; the
//! registry is keyed by the token's `TypeId`, so asking for a capability that
//! does not exist is a compile error rather than a failed string lookup.

use std::any::TypeId;
use std::fmt;

/// A capability that can be bound in a [`Registry`](crate::Registry).
///
/// `Instance` is what resolution hands out, usually a trait object such as
/// `dyn GuestRepository` or a concrete service type.
///
/// Tokens are normally declared with [`define_capability!`](crate::define_capability).
pub trait Capability: 'static {
    type Instance: ?Sized + Send + Sync + 'static;

    /// Human readable capability name, used in errors and trace events.
    const NAME: &'static str;
}

/// Value-level handle for a capability, used where a set of capabilities has to
/// be listed (e.g. [`Registry::verify`](crate::Registry::verify)).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityId {
    type_id: TypeId,
    name: &'static str,
}

impl CapabilityId {
    pub fn of<C: Capability>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: C::NAME,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn key(&self) -> TypeId {
        self.type_id
    }
}

impl fmt::Debug for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityId({})", self.name)
    }
}
