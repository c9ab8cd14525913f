use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Failed to acquire registry lock")]
    RegistryLock,

    #[error("Capability `{name}` is not registered")]
    NotRegistered { name: &'static str },

    #[error("Instance stored for `{name}` has an unexpected type")]
    TypeMismatch { name: &'static str },

    #[error("Circular dependency while resolving: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<&'static str> },

    #[error("Missing capabilities: {}", .0.join(", "))]
    MissingCapabilities(Vec<&'static str>),
}
