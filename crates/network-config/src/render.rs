//! Typed builders for the configuration artifacts the engine converges.
//!
//! Each artifact kind has one builder producing a structured representation
//! which a single deterministic serializer turns into bytes. Conditional
//! rules (no broadcast line for IPv6, gateway only on the default-route
//! interface, DNS lines only when servers are supplied) are explicit
//! branches here.

use crate::interface::{netmask_to_cidr, DhcpInterfaceConfig, NetmaskError, StaticInterfaceConfig};
use crate::settings::Route;

/// First line of every artifact this agent owns.
pub const GENERATED_BANNER: &str = "# Generated by net-agent";

/// A systemd-network unit: ordered sections of ordered key=value entries.
#[derive(Debug, Default)]
pub struct UnitFile {
    sections: Vec<Section>,
}

#[derive(Debug)]
struct Section {
    name: &'static str,
    entries: Vec<(&'static str, String)>,
}

impl UnitFile {
    fn section(&mut self, name: &'static str) -> &mut Section {
        self.sections.push(Section {
            name,
            entries: Vec::new(),
        });
        self.sections.last_mut().expect("section was just pushed")
    }

    fn render(&self) -> String {
        let mut out = String::from(GENERATED_BANNER);
        out.push('\n');
        for section in &self.sections {
            out.push('\n');
            out.push('[');
            out.push_str(section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }
}

impl Section {
    fn entry(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.entries.push((key, value.into()));
        self
    }
}

/// Interface unit for a static assignment.
pub fn static_interface_unit(
    config: &StaticInterfaceConfig,
    dns_servers: &[String],
) -> Result<String, NetmaskError> {
    let mut unit = UnitFile::default();

    unit.section("Match").entry("Name", config.name.clone());

    let address = unit.section("Address");
    address.entry("Address", format!("{}/{}", config.address, config.cidr()?));
    if config.is_default_for_gateway && !config.is_version6 {
        address.entry("Broadcast", config.broadcast.clone());
    }

    let network = unit.section("Network");
    if config.is_default_for_gateway {
        network.entry("Gateway", config.gateway.clone());
    }
    if config.is_version6 {
        network.entry("IPv6AcceptRA", "true");
    }
    for server in dns_servers {
        network.entry("DNS", server.clone());
    }

    push_route_sections(&mut unit, &config.post_up_routes, config.is_version6)?;

    Ok(unit.render())
}

/// Interface unit for a DHCP assignment. Same shape as the static unit but
/// declares DHCP instead of carrying an address section.
pub fn dynamic_interface_unit(
    config: &DhcpInterfaceConfig,
    dns_servers: &[String],
) -> Result<String, NetmaskError> {
    let mut unit = UnitFile::default();

    unit.section("Match").entry("Name", config.name.clone());

    let network = unit.section("Network");
    network.entry("DHCP", "yes");
    if config.is_version6 {
        network.entry("IPv6AcceptRA", "true");
    }
    for server in dns_servers {
        network.entry("DNS", server.clone());
    }

    push_route_sections(&mut unit, &config.post_up_routes, config.is_version6)?;

    Ok(unit.render())
}

fn push_route_sections(
    unit: &mut UnitFile,
    routes: &[Route],
    is_version6: bool,
) -> Result<(), NetmaskError> {
    for route in routes {
        let cidr = netmask_to_cidr(&route.netmask, is_version6)?;
        let section = unit.section("Route");
        section.entry("Destination", format!("{}/{}", route.destination, cidr));
        section.entry("Gateway", route.gateway.clone());
    }
    Ok(())
}

/// dhclient configuration. DNS servers are surfaced as a *single* prepend
/// directive because its priority is position-dependent; order is exactly
/// the order supplied by the network.
pub fn dhclient_conf(dns_servers: &[String]) -> String {
    let mut out = String::from(GENERATED_BANNER);
    out.push_str(
        "\n\n\
        option rfc3442-classless-static-routes code 121 = array of unsigned integer 8;\n\n\
        send host-name = gethostname();\n\n\
        request subnet-mask, broadcast-address, time-offset, routers,\n\
        \tdomain-name, domain-name-servers, domain-search, host-name,\n\
        \tnetbios-name-servers, netbios-scope, interface-mtu,\n\
        \trfc3442-classless-static-routes, ntp-servers;\n",
    );
    if !dns_servers.is_empty() {
        out.push('\n');
        out.push_str("prepend domain-name-servers ");
        out.push_str(&dns_servers.join(", "));
        out.push_str(";\n");
    }
    out
}

/// resolv.conf contents: one nameserver line per server, input order.
pub fn resolv_conf(dns_servers: &[String]) -> String {
    let mut out = String::from(GENERATED_BANNER);
    out.push('\n');
    for server in dns_servers {
        out.push_str("nameserver ");
        out.push_str(server);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn static_config() -> StaticInterfaceConfig {
        StaticInterfaceConfig {
            name: "eth0".to_string(),
            address: "10.0.0.5".to_string(),
            netmask: "255.255.255.0".to_string(),
            broadcast: "10.0.0.255".to_string(),
            is_default_for_gateway: true,
            gateway: "10.0.0.1".to_string(),
            is_version6: false,
            post_up_routes: vec![Route {
                destination: "172.16.0.0".to_string(),
                netmask: "255.240.0.0".to_string(),
                gateway: "10.0.0.1".to_string(),
            }],
        }
    }

    #[test]
    fn static_unit_for_default_gateway_interface() {
        let unit = static_interface_unit(&static_config(), &["8.8.8.8".to_string()]).unwrap();
        assert_eq!(
            unit,
            "# Generated by net-agent\n\
             \n\
             [Match]\n\
             Name=eth0\n\
             \n\
             [Address]\n\
             Address=10.0.0.5/24\n\
             Broadcast=10.0.0.255\n\
             \n\
             [Network]\n\
             Gateway=10.0.0.1\n\
             DNS=8.8.8.8\n\
             \n\
             [Route]\n\
             Destination=172.16.0.0/12\n\
             Gateway=10.0.0.1\n",
        );
    }

    #[test]
    fn static_unit_for_secondary_interface_omits_gateway_and_broadcast() {
        let config = StaticInterfaceConfig {
            is_default_for_gateway: false,
            post_up_routes: vec![],
            ..static_config()
        };
        let unit = static_interface_unit(&config, &[]).unwrap();
        assert_eq!(
            unit,
            "# Generated by net-agent\n\
             \n\
             [Match]\n\
             Name=eth0\n\
             \n\
             [Address]\n\
             Address=10.0.0.5/24\n\
             \n\
             [Network]\n",
        );
    }

    #[test]
    fn static_unit_for_version6_accepts_router_advertisements() {
        let config = StaticInterfaceConfig {
            name: "eth1".to_string(),
            address: "2001:db8::5".to_string(),
            netmask: "ffff:ffff:ffff:ffff::".to_string(),
            broadcast: String::new(),
            is_default_for_gateway: true,
            gateway: "2001:db8::1".to_string(),
            is_version6: true,
            post_up_routes: vec![],
        };
        let unit = static_interface_unit(&config, &[]).unwrap();
        assert_eq!(
            unit,
            "# Generated by net-agent\n\
             \n\
             [Match]\n\
             Name=eth1\n\
             \n\
             [Address]\n\
             Address=2001:db8::5/64\n\
             \n\
             [Network]\n\
             Gateway=2001:db8::1\n\
             IPv6AcceptRA=true\n",
        );
    }

    #[test]
    fn dynamic_unit_declares_dhcp_and_keeps_dns_order() {
        let config = DhcpInterfaceConfig {
            name: "eth0".to_string(),
            is_version6: false,
            post_up_routes: vec![],
        };
        let dns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let unit = dynamic_interface_unit(&config, &dns).unwrap();
        assert_eq!(
            unit,
            "# Generated by net-agent\n\
             \n\
             [Match]\n\
             Name=eth0\n\
             \n\
             [Network]\n\
             DHCP=yes\n\
             DNS=a\n\
             DNS=b\n\
             DNS=c\n",
        );
    }

    #[test]
    fn dhclient_conf_prepends_all_servers_in_one_directive() {
        let dns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let conf = dhclient_conf(&dns);
        assert!(conf.ends_with("prepend domain-name-servers a, b, c;\n"));
        assert_eq!(conf.matches("prepend").count(), 1);
    }

    #[test]
    fn dhclient_conf_without_servers_has_no_prepend() {
        let conf = dhclient_conf(&[]);
        assert_eq!(
            conf,
            "# Generated by net-agent\n\
             \n\
             option rfc3442-classless-static-routes code 121 = array of unsigned integer 8;\n\
             \n\
             send host-name = gethostname();\n\
             \n\
             request subnet-mask, broadcast-address, time-offset, routers,\n\
             \tdomain-name, domain-name-servers, domain-search, host-name,\n\
             \tnetbios-name-servers, netbios-scope, interface-mtu,\n\
             \trfc3442-classless-static-routes, ntp-servers;\n",
        );
    }

    #[test]
    fn resolv_conf_preserves_server_order() {
        let dns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(
            resolv_conf(&dns),
            "# Generated by net-agent\n\
             nameserver a\n\
             nameserver b\n\
             nameserver c\n",
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let dns = vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()];
        let first = static_interface_unit(&static_config(), &dns).unwrap();
        let second = static_interface_unit(&static_config(), &dns).unwrap();
        assert_eq!(first, second);
    }
}
