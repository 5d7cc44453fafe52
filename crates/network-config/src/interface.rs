use std::net::{Ipv4Addr, Ipv6Addr};

use crate::settings::Route;

/// One resolved static interface assignment, produced by the interface
/// configuration creator and consumed read-only by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticInterfaceConfig {
    pub name: String,
    pub address: String,
    pub netmask: String,
    pub broadcast: String,
    pub is_default_for_gateway: bool,
    pub gateway: String,
    pub is_version6: bool,
    pub post_up_routes: Vec<Route>,
}

impl StaticInterfaceConfig {
    /// Prefix width of the assignment's netmask.
    pub fn cidr(&self) -> Result<u8, NetmaskError> {
        netmask_to_cidr(&self.netmask, self.is_version6)
    }
}

/// One resolved dynamic (DHCP) interface assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DhcpInterfaceConfig {
    pub name: String,
    pub is_version6: bool,
    pub post_up_routes: Vec<Route>,
}

/// Whether any static assignment is IPv6, in which case kernel IPv6
/// support must be enabled before any interface unit is written.
pub fn has_version6(configs: &[StaticInterfaceConfig]) -> bool {
    configs.iter().any(|config| config.is_version6)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NetmaskError {
    #[error("netmask {0:?} is not a valid IPv4 address")]
    InvalidV4(String),
    #[error("netmask {0:?} is not a valid IPv6 address")]
    InvalidV6(String),
    #[error("netmask {0:?} is not a contiguous prefix")]
    NonContiguous(String),
}

/// Converts a dotted-quad (v4) or colon-hex (v6) netmask to its prefix
/// width. Non-contiguous masks are rejected.
pub fn netmask_to_cidr(netmask: &str, is_version6: bool) -> Result<u8, NetmaskError> {
    if is_version6 {
        let mask: Ipv6Addr = netmask
            .parse()
            .map_err(|_| NetmaskError::InvalidV6(netmask.to_string()))?;
        ipnetwork::ipv6_mask_to_prefix(mask)
            .map_err(|_| NetmaskError::NonContiguous(netmask.to_string()))
    } else {
        let mask: Ipv4Addr = netmask
            .parse()
            .map_err(|_| NetmaskError::InvalidV4(netmask.to_string()))?;
        ipnetwork::ipv4_mask_to_prefix(mask)
            .map_err(|_| NetmaskError::NonContiguous(netmask.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn v4_netmasks_convert_to_prefix_widths() {
        assert_eq!(netmask_to_cidr("255.255.255.0", false), Ok(24));
        assert_eq!(netmask_to_cidr("255.255.0.0", false), Ok(16));
        assert_eq!(netmask_to_cidr("255.255.255.255", false), Ok(32));
        assert_eq!(netmask_to_cidr("0.0.0.0", false), Ok(0));
    }

    #[test]
    fn v6_netmasks_convert_to_prefix_widths() {
        assert_eq!(netmask_to_cidr("ffff:ffff:ffff:ffff::", true), Ok(64));
        assert_eq!(
            netmask_to_cidr("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff", true),
            Ok(128),
        );
    }

    #[test]
    fn malformed_and_non_contiguous_masks_are_rejected() {
        assert_eq!(
            netmask_to_cidr("not-a-mask", false),
            Err(NetmaskError::InvalidV4("not-a-mask".to_string())),
        );
        assert_eq!(
            netmask_to_cidr("255.0.255.0", false),
            Err(NetmaskError::NonContiguous("255.0.255.0".to_string())),
        );
        assert_eq!(
            netmask_to_cidr("ffff:ffff:ffff:ffff::", false),
            Err(NetmaskError::InvalidV4("ffff:ffff:ffff:ffff::".to_string())),
        );
    }

    #[test]
    fn has_version6_scans_static_configs() {
        let v4 = StaticInterfaceConfig {
            name: "eth0".to_string(),
            ..StaticInterfaceConfig::default()
        };
        let v6 = StaticInterfaceConfig {
            name: "eth1".to_string(),
            is_version6: true,
            ..StaticInterfaceConfig::default()
        };

        assert!(!has_version6(&[v4.clone()]));
        assert!(has_version6(&[v4, v6]));
    }
}
