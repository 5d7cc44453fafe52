use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One named desired network, as supplied by the settings document.
/// Immutable input to a convergence run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    #[serde(rename = "type", default)]
    pub type_: NetworkType,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub dns: Vec<String>,
    /// Roles this network is the default for, e.g. "dns" or "gateway".
    #[serde(default)]
    pub default: Vec<String>,
    #[serde(default)]
    pub mac: Option<String>,
    /// The environment already configured this network externally.
    #[serde(default)]
    pub preconfigured: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Dynamic,
    #[default]
    Manual,
    Vip,
}

impl Network {
    pub fn is_dynamic(&self) -> bool {
        self.type_ == NetworkType::Dynamic
    }

    /// VIP networks reserve an address without binding it to a local
    /// interface; they never produce interface configuration.
    pub fn is_vip(&self) -> bool {
        self.type_ == NetworkType::Vip
    }

    pub fn is_default_for(&self, role: &str) -> bool {
        self.default.iter().any(|r| r == role)
    }
}

/// A route to establish once the owning interface is up.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub destination: String,
    pub netmask: String,
    pub gateway: String,
}

/// The full desired-network set, keyed by network name. A `BTreeMap` keeps
/// iteration order stable across runs, which keeps rendered artifacts (and
/// therefore the "changed" decision) deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Networks(pub BTreeMap<String, Network>);

impl Networks {
    pub fn parse_from_json_file(path: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(&std::fs::read(path)?)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Network)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The set with VIP entries removed.
    pub fn non_vip(&self) -> Networks {
        Networks(
            self.0
                .iter()
                .filter(|(_, network)| !network.is_vip())
                .map(|(name, network)| (name.clone(), network.clone()))
                .collect(),
        )
    }

    /// The network providing the given default role. A set with exactly one
    /// network is the default for every role.
    pub fn default_network_for(&self, role: &str) -> Option<&Network> {
        if self.0.len() == 1 {
            return self.0.values().next();
        }
        self.0.values().find(|network| network.is_default_for(role))
    }

    /// True when every declared network is externally preconfigured, in
    /// which case only the resolver configuration is managed.
    pub fn is_preconfigured(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|network| network.preconfigured)
    }
}

impl FromIterator<(String, Network)> for Networks {
    fn from_iter<T: IntoIterator<Item = (String, Network)>>(iter: T) -> Self {
        Networks(iter.into_iter().collect())
    }
}

/// Desired IPv6 kernel support, from the settings document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ipv6Config {
    #[serde(default)]
    pub enable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn network(type_: NetworkType) -> Network {
        Network {
            type_,
            ..Network::default()
        }
    }

    #[test]
    fn non_vip_drops_vip_entries() {
        let networks: Networks = [
            ("a".to_string(), network(NetworkType::Manual)),
            ("b".to_string(), network(NetworkType::Vip)),
            ("c".to_string(), network(NetworkType::Dynamic)),
        ]
        .into_iter()
        .collect();

        let filtered = networks.non_vip();
        let names: Vec<&String> = filtered.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn default_network_for_prefers_declared_role() {
        let mut dns_network = network(NetworkType::Manual);
        dns_network.default = vec!["dns".to_string()];
        dns_network.dns = vec!["8.8.8.8".to_string()];

        let networks: Networks = [
            ("a".to_string(), network(NetworkType::Manual)),
            ("b".to_string(), dns_network.clone()),
        ]
        .into_iter()
        .collect();

        assert_eq!(networks.default_network_for("dns"), Some(&dns_network));
        assert_eq!(networks.default_network_for("gateway"), None);
    }

    #[test]
    fn single_network_is_default_for_every_role() {
        let networks: Networks = [("only".to_string(), network(NetworkType::Dynamic))]
            .into_iter()
            .collect();

        assert!(networks.default_network_for("dns").is_some());
    }

    #[test]
    fn preconfigured_requires_every_network() {
        let mut preconfigured = network(NetworkType::Manual);
        preconfigured.preconfigured = true;

        let all: Networks = [("a".to_string(), preconfigured.clone())]
            .into_iter()
            .collect();
        assert!(all.is_preconfigured());

        let mixed: Networks = [
            ("a".to_string(), preconfigured),
            ("b".to_string(), network(NetworkType::Manual)),
        ]
        .into_iter()
        .collect();
        assert!(!mixed.is_preconfigured());

        assert!(!Networks::default().is_preconfigured());
    }

    #[test]
    fn network_type_parses_from_settings_json() {
        let parsed: Networks = serde_json::from_str(
            r#"{
                "private": {"type": "dynamic"},
                "public": {"type": "vip", "ip": "203.0.113.4"},
                "static": {"ip": "10.0.0.5", "netmask": "255.255.255.0"}
            }"#,
        )
        .unwrap();

        assert!(parsed.0["private"].is_dynamic());
        assert!(parsed.0["public"].is_vip());
        assert_eq!(parsed.0["static"].type_, NetworkType::Manual);
    }
}
