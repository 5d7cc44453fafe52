//! Collaborators the engine consumes but does not implement: discovery,
//! record creation, kernel toggling, validation, and broadcasting.

use std::collections::BTreeMap;

use network_config::{DhcpInterfaceConfig, Networks, StaticInterfaceConfig};

use crate::address::InterfaceAddress;

/// MAC-address-based interface discovery.
pub trait MacAddressDetector: Send + Sync {
    /// Map of MAC address to local interface name. An empty map is a valid
    /// result and yields zero interface records downstream.
    fn detect_mac_addresses(&self) -> anyhow::Result<BTreeMap<String, String>>;
}

/// Maps desired networks onto discovered interfaces, producing the
/// per-interface static and DHCP records the engine converges.
pub trait InterfaceConfigurationCreator: Send + Sync {
    fn create_interface_configurations(
        &self,
        networks: &Networks,
        interfaces_by_mac: &BTreeMap<String, String>,
    ) -> anyhow::Result<(Vec<StaticInterfaceConfig>, Vec<DhcpInterfaceConfig>)>;
}

/// Kernel-level IPv6 enablement. Blocks until enabled; cancellation is the
/// caller dropping (or selecting over) the future.
#[async_trait::async_trait]
pub trait KernelIpv6: Send + Sync {
    async fn enable(&self) -> anyhow::Result<()>;
}

/// Checks uniqueness/reachability constraints over configured addresses.
pub trait AddressValidator: Send + Sync {
    fn validate(&self, addresses: &[InterfaceAddress]) -> anyhow::Result<()>;
}

/// Checks that the DNS servers are valid and reachable.
pub trait DnsValidator: Send + Sync {
    fn validate(&self, dns_servers: &[String]) -> anyhow::Result<()>;
}

/// Announces configured addresses on the local link to flush out
/// conflicting holders. Runs detached; failures are observable only
/// through the broadcaster's own logging.
#[async_trait::async_trait]
pub trait AddressBroadcaster: Send + Sync {
    async fn broadcast(&self, addresses: Vec<InterfaceAddress>);
}
