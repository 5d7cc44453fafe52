use std::fmt;
use std::sync::Arc;

/// Looks up the address an interface currently holds. Used for DHCP
/// interfaces, whose address is unknown until the client has run.
#[async_trait::async_trait]
pub trait IpResolver: Send + Sync {
    async fn primary_ipv4(&self, interface: &str) -> anyhow::Result<String>;
}

/// An interface paired with its address, either known at configuration
/// time (static) or looked up lazily at broadcast time (dynamic).
#[derive(Clone)]
pub enum InterfaceAddress {
    Known {
        interface: String,
        address: String,
    },
    Deferred {
        interface: String,
        resolver: Arc<dyn IpResolver>,
    },
}

impl InterfaceAddress {
    pub fn interface(&self) -> &str {
        match self {
            InterfaceAddress::Known { interface, .. } => interface,
            InterfaceAddress::Deferred { interface, .. } => interface,
        }
    }

    /// The address to announce. Deferred entries consult the resolver at
    /// the moment of the call, not at configuration time.
    pub async fn address(&self) -> anyhow::Result<String> {
        match self {
            InterfaceAddress::Known { address, .. } => Ok(address.clone()),
            InterfaceAddress::Deferred {
                interface,
                resolver,
            } => resolver.primary_ipv4(interface).await,
        }
    }
}

impl fmt::Debug for InterfaceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceAddress::Known { interface, address } => f
                .debug_struct("Known")
                .field("interface", interface)
                .field("address", address)
                .finish(),
            InterfaceAddress::Deferred { interface, .. } => f
                .debug_struct("Deferred")
                .field("interface", interface)
                .finish_non_exhaustive(),
        }
    }
}

lazy_static::lazy_static! {
    static ref VIRTUAL_ALIAS: regex::Regex =
        regex::Regex::new(r":\d+").expect("virtual alias pattern compiles");
}

/// Virtual interfaces (numeric alias suffix, e.g. `eth0:0`) intentionally
/// share another interface's address space and are skipped by
/// address-conflict validation.
pub fn is_virtual_interface(name: &str) -> bool {
    VIRTUAL_ALIAS.is_match(name)
}
