/// Events emitted by the registry during operations.
///
/// These events are passed to the tracing callback set via `set_trace_callback`
/// and are mirrored as `tracing` events under the `registry` target.
///
/// # Examples
///
/// ```rust
/// use invitation_container::RegistryEvent;
///
/// let event = RegistryEvent::Register { name: "GuestRepository", replaced: false };
/// assert_eq!(event.to_string(), "register { name: GuestRepository, replaced: false }");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A provider was bound to a capability.
    Register {
        /// Capability name (e.g. "GuestRepository")
        name: &'static str,
        /// Whether an earlier binding for the same capability was replaced
        replaced: bool,
    },

    /// A capability was resolved.
    Resolve {
        name: &'static str,
        /// Whether the capability was bound at all
        found: bool,
        /// Whether this call ran the provider (first resolution)
        constructed: bool,
    },

    /// A binding existence check was performed.
    Contains { name: &'static str, found: bool },

    /// The setup routine was requested.
    Setup {
        /// `false` when setup had already completed and the call was a no-op
        ran: bool,
    },

    /// The registry was cleared.
    Clear {},
}

impl std::fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEvent::Register { name, replaced } => {
                write!(f, "register {{ name: {name}, replaced: {replaced} }}")
            }
            RegistryEvent::Resolve {
                name,
                found,
                constructed,
            } => write!(
                f,
                "resolve {{ name: {name}, found: {found}, constructed: {constructed} }}"
            ),
            RegistryEvent::Contains { name, found } => {
                write!(f, "contains {{ name: {name}, found: {found} }}")
            }
            RegistryEvent::Setup { ran } => write!(f, "setup {{ ran: {ran} }}"),
            RegistryEvent::Clear {} => write!(f, "Clearing the Registry"),
        }
    }
}
