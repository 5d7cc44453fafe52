//! The convergence engine: brings a host's network interface configuration
//! in line with the declarative desired state in `network-config`, writing
//! only the artifacts whose contents actually differ and restarting
//! networking only when something changed.
//!
//! Discovery, interface-record creation, validation, kernel IPv6 toggling
//! and address broadcasting are consumed through the traits in
//! [`services`]; process execution and the convergent file writer live in
//! [`exec`] and [`fs`].

pub mod address;
pub mod error;
pub mod exec;
pub mod fs;
pub mod manager;
pub mod services;

pub use address::{is_virtual_interface, InterfaceAddress, IpResolver};
pub use error::Error;
pub use exec::{CommandRunner, SystemRunner};
pub use fs::{FileSystem, HostFs};
pub use manager::NetManager;
pub use services::{
    AddressBroadcaster, AddressValidator, DnsValidator, InterfaceConfigurationCreator, KernelIpv6,
    MacAddressDetector,
};
