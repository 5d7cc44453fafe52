//! Desired-state network settings and the rendering of OS-level
//! configuration artifacts (systemd-network interface units, dhclient
//! configuration, resolv.conf).
//!
//! Everything in this crate is pure: identical inputs always produce
//! byte-identical artifacts, which is the property the convergent file
//! writer in `network-manager` depends on.

pub mod interface;
pub mod render;
pub mod settings;

pub use interface::{
    has_version6, netmask_to_cidr, DhcpInterfaceConfig, NetmaskError, StaticInterfaceConfig,
};
pub use settings::{Ipv6Config, Network, NetworkType, Networks, Route};
