use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use network_config::{
    has_version6, render, DhcpInterfaceConfig, Ipv6Config, Networks, StaticInterfaceConfig,
};

use crate::address::{is_virtual_interface, InterfaceAddress, IpResolver};
use crate::error::Error;
use crate::exec::CommandRunner;
use crate::fs::FileSystem;
use crate::services::{
    AddressBroadcaster, AddressValidator, DnsValidator, InterfaceConfigurationCreator, KernelIpv6,
    MacAddressDetector,
};

pub const INTERFACE_UNIT_DIR: &str = "/etc/systemd/network";
pub const DHCLIENT_CONF_PATH: &str = "/etc/dhcp/dhclient.conf";
pub const RESOLV_CONF_PATH: &str = "/etc/resolv.conf";
pub const RESOLV_CONF_BASE_PATH: &str = "/etc/resolvconf/resolv.conf.d/base";
pub const RESOLV_CONF_MANAGED_PATH: &str = "/run/resolvconf/resolv.conf";
pub const RESTART_NETWORKING_COMMAND: &str = "/usr/sbin/restart-networking";

fn interface_unit_path(interface: &str) -> PathBuf {
    Path::new(INTERFACE_UNIT_DIR).join(format!("10_{interface}.network"))
}

/// Drives one convergence run: classify desired networks, converge the
/// on-disk artifacts, restart networking only when something changed, then
/// validate and broadcast.
///
/// Callers must serialize invocations of [`NetManager::setup_networking`]
/// on one host; the engine holds no internal locks and assumes it is the
/// only writer of the artifacts it manages.
pub struct NetManager {
    runner: Arc<dyn CommandRunner>,
    fs: Arc<dyn FileSystem>,
    ip_resolver: Arc<dyn IpResolver>,
    mac_detector: Arc<dyn MacAddressDetector>,
    config_creator: Arc<dyn InterfaceConfigurationCreator>,
    address_validator: Arc<dyn AddressValidator>,
    dns_validator: Arc<dyn DnsValidator>,
    broadcaster: Arc<dyn AddressBroadcaster>,
    kernel_ipv6: Arc<dyn KernelIpv6>,
}

impl NetManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        fs: Arc<dyn FileSystem>,
        ip_resolver: Arc<dyn IpResolver>,
        mac_detector: Arc<dyn MacAddressDetector>,
        config_creator: Arc<dyn InterfaceConfigurationCreator>,
        address_validator: Arc<dyn AddressValidator>,
        dns_validator: Arc<dyn DnsValidator>,
        broadcaster: Arc<dyn AddressBroadcaster>,
        kernel_ipv6: Arc<dyn KernelIpv6>,
    ) -> Self {
        NetManager {
            runner,
            fs,
            ip_resolver,
            mac_detector,
            config_creator,
            address_validator,
            dns_validator,
            broadcaster,
            kernel_ipv6,
        }
    }

    /// Splits the desired networks into static and DHCP interface records
    /// (VIP entries produce neither) and derives the DNS server list from
    /// the network that is the default for the "dns" role.
    pub fn compute_network_config(
        &self,
        networks: &Networks,
    ) -> Result<
        (
            Vec<StaticInterfaceConfig>,
            Vec<DhcpInterfaceConfig>,
            Vec<String>,
        ),
        Error,
    > {
        let non_vip = networks.non_vip();

        let (static_configs, dhcp_configs) = self
            .build_interfaces(&non_vip)
            .map_err(Error::ComputeConfig)?;

        let dns_servers = non_vip
            .default_network_for("dns")
            .map(|network| network.dns.clone())
            .unwrap_or_default();

        Ok((static_configs, dhcp_configs, dns_servers))
    }

    /// One full convergence run. See the crate docs for the sequence; the
    /// only work outliving this call is the detached address broadcast.
    pub async fn setup_networking(&self, networks: &Networks) -> Result<(), Error> {
        if networks.is_preconfigured() {
            // Networking is externally managed; only DNS is reconciled and
            // no addresses are broadcast.
            tracing::info!("networks are preconfigured; managing resolver configuration only");
            return self.write_resolv_conf(networks).await;
        }

        let (mut static_configs, mut dhcp_configs, dns_servers) =
            self.compute_network_config(networks)?;

        // Stable processing order keeps re-runs over unchanged input from
        // producing spurious diffs.
        static_configs.sort_by(|a, b| a.name.cmp(&b.name));
        dhcp_configs.sort_by(|a, b| a.name.cmp(&b.name));

        if has_version6(&static_configs) {
            self.kernel_ipv6
                .enable()
                .await
                .map_err(Error::EnableIpv6)?;
        }

        let changed = self
            .write_net_configs(&dhcp_configs, &static_configs, &dns_servers)
            .map_err(Error::WriteConfigs)?;

        if changed {
            self.remove_dhcp_dns_configuration().await;
            self.restart_networking()
                .await
                .map_err(Error::RestartNetworking)?;
        } else {
            tracing::debug!("network configuration already converged; skipping restart");
        }

        let (static_addresses, dynamic_addresses) =
            self.interface_addresses(&static_configs, &dhcp_configs);

        let static_without_virtual: Vec<InterfaceAddress> = static_addresses
            .iter()
            .filter(|address| !is_virtual_interface(address.interface()))
            .cloned()
            .collect();

        self.address_validator
            .validate(&static_without_virtual)
            .map_err(Error::ValidateAddresses)?;

        self.dns_validator
            .validate(&dns_servers)
            .map_err(Error::ValidateDns)?;

        // Fire and forget: no join handle is kept, and broadcast failures
        // are observable only through the broadcaster's own logging.
        let broadcaster = self.broadcaster.clone();
        let mut to_broadcast = static_addresses;
        to_broadcast.extend(dynamic_addresses);
        tokio::spawn(async move { broadcaster.broadcast(to_broadcast).await });

        Ok(())
    }

    /// Drives kernel IPv6 enablement, returning early if `stop` fires
    /// first. A stop is a clean return, not an error.
    pub async fn setup_ipv6<F>(&self, config: &Ipv6Config, stop: F) -> Result<(), Error>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        if !config.enable {
            return Ok(());
        }
        tokio::select! {
            result = self.kernel_ipv6.enable() => result.map_err(Error::EnableIpv6),
            () = stop => {
                tracing::info!("stopped while enabling IPv6");
                Ok(())
            }
        }
    }

    /// Discovered interfaces that actually exist on the host, probed via
    /// `ip link show`. Probe failures keep the interface (the probe is an
    /// existence check, not a health check).
    pub async fn configured_interfaces(&self) -> Result<Vec<String>, Error> {
        let interfaces_by_mac = self
            .mac_detector
            .detect_mac_addresses()
            .context("getting network interfaces")
            .map_err(Error::ComputeConfig)?;

        let mut interfaces = Vec::new();
        for interface in interfaces_by_mac.values() {
            match self.runner.output("ip", &["link", "show", interface]).await {
                Ok(output) => {
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    if !stderr.contains(&format!("Device \"{interface}\" does not exist")) {
                        interfaces.push(interface.clone());
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, %interface, "ignoring failure probing interface");
                    interfaces.push(interface.clone());
                }
            }
        }
        Ok(interfaces)
    }

    fn build_interfaces(
        &self,
        networks: &Networks,
    ) -> anyhow::Result<(Vec<StaticInterfaceConfig>, Vec<DhcpInterfaceConfig>)> {
        let interfaces_by_mac = self
            .mac_detector
            .detect_mac_addresses()
            .context("getting network interfaces")?;

        // An empty discovery result is valid and simply yields no records.
        self.config_creator
            .create_interface_configurations(networks, &interfaces_by_mac)
            .context("creating interface configurations")
    }

    /// Converges every artifact of the run in one fixed order (dynamic
    /// units, static units, then the dhclient config when any dynamic
    /// record exists), folding the per-artifact change flags with OR.
    fn write_net_configs(
        &self,
        dhcp_configs: &[DhcpInterfaceConfig],
        static_configs: &[StaticInterfaceConfig],
        dns_servers: &[String],
    ) -> anyhow::Result<bool> {
        let interfaces_changed = self
            .write_interface_units(dhcp_configs, static_configs, dns_servers)
            .context("writing network configuration")?;

        let dhclient_changed = if !dhcp_configs.is_empty() {
            self.write_dhclient_configuration(dns_servers)?
        } else {
            false
        };

        Ok(interfaces_changed || dhclient_changed)
    }

    fn write_interface_units(
        &self,
        dhcp_configs: &[DhcpInterfaceConfig],
        static_configs: &[StaticInterfaceConfig],
        dns_servers: &[String],
    ) -> anyhow::Result<bool> {
        let mut artifacts: Vec<(String, String)> = Vec::new();
        for config in dhcp_configs {
            let contents = render::dynamic_interface_unit(config, dns_servers)
                .with_context(|| format!("rendering configuration for {}", config.name))?;
            artifacts.push((config.name.clone(), contents));
        }
        for config in static_configs {
            let contents = render::static_interface_unit(config, dns_servers)
                .with_context(|| format!("rendering configuration for {}", config.name))?;
            artifacts.push((config.name.clone(), contents));
        }

        artifacts
            .into_iter()
            .try_fold(false, |changed, (interface, contents)| {
                let path = interface_unit_path(&interface);
                tracing::debug!(%interface, path = %path.display(), "converging interface unit");
                let wrote = self
                    .fs
                    .converge_file_contents(&path, contents.as_bytes())
                    .with_context(|| format!("updating network configuration for {interface}"))?;
                Ok(changed || wrote)
            })
    }

    fn write_dhclient_configuration(&self, dns_servers: &[String]) -> anyhow::Result<bool> {
        let contents = render::dhclient_conf(dns_servers);
        self.fs
            .converge_file_contents(Path::new(DHCLIENT_CONF_PATH), contents.as_bytes())
            .with_context(|| format!("writing to {DHCLIENT_CONF_PATH}"))
    }

    /// Best-effort teardown of stale DHCP state before a restart. Removing
    /// DHCP configuration and restarting does not stop a running dhclient,
    /// and resolvconf holds on to its old per-interface registrations, so
    /// both are cleared here. Every failure is logged and ignored.
    async fn remove_dhcp_dns_configuration(&self) {
        if let Err(error) = self.runner.run("pkill", &["dhclient"]).await {
            tracing::warn!(%error, "ignoring failure killing dhclient");
        }

        match self.mac_detector.detect_mac_addresses() {
            Ok(interfaces_by_mac) => {
                for interface in interfaces_by_mac.values() {
                    let registration = format!("{interface}.dhclient");
                    if let Err(error) = self.runner.run("resolvconf", &["-d", &registration]).await
                    {
                        tracing::warn!(
                            %error,
                            %interface,
                            "ignoring failure deleting resolvconf registration",
                        );
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "skipping resolvconf cleanup; interface discovery failed")
            }
        }
    }

    async fn restart_networking(&self) -> anyhow::Result<()> {
        tracing::info!("network configuration changed; restarting networking");
        self.runner.run(RESTART_NETWORKING_COMMAND, &[]).await?;
        Ok(())
    }

    fn interface_addresses(
        &self,
        static_configs: &[StaticInterfaceConfig],
        dhcp_configs: &[DhcpInterfaceConfig],
    ) -> (Vec<InterfaceAddress>, Vec<InterfaceAddress>) {
        let static_addresses = static_configs
            .iter()
            .map(|config| InterfaceAddress::Known {
                interface: config.name.clone(),
                address: config.address.clone(),
            })
            .collect();

        let dynamic_addresses = dhcp_configs
            .iter()
            .map(|config| InterfaceAddress::Deferred {
                interface: config.name.clone(),
                resolver: self.ip_resolver.clone(),
            })
            .collect();

        (static_addresses, dynamic_addresses)
    }

    /// The preconfigured path: reconcile the resolver base file, point
    /// /etc/resolv.conf at the resolvconf-managed output, and prod
    /// resolvconf to regenerate it. No interface artifacts are touched.
    async fn write_resolv_conf(&self, networks: &Networks) -> Result<(), Error> {
        self.write_resolv_conf_inner(networks)
            .await
            .map_err(Error::ResolvConf)
    }

    async fn write_resolv_conf_inner(&self, networks: &Networks) -> anyhow::Result<()> {
        let dns_servers = networks
            .default_network_for("dns")
            .map(|network| network.dns.clone())
            .unwrap_or_default();

        if !dns_servers.is_empty() {
            // Base file only; an external merging mechanism owns the head.
            let contents = render::resolv_conf(&dns_servers);
            self.fs
                .converge_file_contents(Path::new(RESOLV_CONF_BASE_PATH), contents.as_bytes())
                .with_context(|| format!("writing to {RESOLV_CONF_BASE_PATH}"))?;
        } else {
            // Before the symlink below first exists, inherit whatever
            // resolv.conf the image booted with.
            let target = self
                .fs
                .read_and_follow_link(Path::new(RESOLV_CONF_PATH))
                .context("reading /etc/resolv.conf symlink")?;
            if target == Path::new(RESOLV_CONF_PATH) {
                self.fs
                    .copy_file(
                        Path::new(RESOLV_CONF_PATH),
                        Path::new(RESOLV_CONF_BASE_PATH),
                    )
                    .context("copying /etc/resolv.conf for backwards compatibility")?;
            }
        }

        self.fs
            .symlink(
                Path::new(RESOLV_CONF_MANAGED_PATH),
                Path::new(RESOLV_CONF_PATH),
            )
            .context("setting up /etc/resolv.conf symlink")?;

        self.runner
            .run("resolvconf", &["-u"])
            .await
            .context("updating resolvconf")?;

        Ok(())
    }
}
