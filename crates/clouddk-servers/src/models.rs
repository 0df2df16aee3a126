//! Wire models for the `/cloudservers` family of endpoints.
//!
//! Collections default to empty when the API omits them, so every decoded tree is
//! well formed for flattening.

use clouddk_core::id::{DiskId, FirewallRuleId, NetworkInterfaceId, ServerId};
use serde::{Deserialize, Serialize};

/// Representation of a cloud server as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Server {
    /// Server identifier.
    pub identifier: ServerId,
    /// Hostname.
    #[serde(default)]
    pub hostname: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Number of CPUs.
    #[serde(default)]
    pub cpus: i64,
    /// Memory in megabytes.
    #[serde(default)]
    pub memory: i64,
    /// Whether provisioning has finished and the server is running.
    #[serde(default)]
    pub booted: bool,
    /// Attached disks, in API order.
    #[serde(default)]
    pub disks: Vec<Disk>,
    /// Network interfaces, in API order.
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    /// Data center location.
    #[serde(default)]
    pub location: Reference,
    /// Sizing package.
    #[serde(default)]
    pub package: Reference,
    /// OS template.
    #[serde(default)]
    pub template: Reference,
}

/// Identifier/name pair embedded in a server (location, package, template).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    /// Reference identifier.
    #[serde(default)]
    pub identifier: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// A server disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Disk {
    /// Disk identifier.
    pub identifier: DiskId,
    /// Disk label.
    #[serde(default)]
    pub label: String,
    /// Size in gigabytes.
    #[serde(default)]
    pub size: i64,
    /// Whether this is the boot disk.
    #[serde(default)]
    pub primary: bool,
}

/// A network interface attached to a server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkInterface {
    /// Interface identifier.
    pub identifier: NetworkInterfaceId,
    /// Interface label.
    #[serde(default)]
    pub label: String,
    /// Rate limit in Mbit/s.
    #[serde(default)]
    pub rate_limit: i64,
    /// Policy applied when no firewall rule matches.
    #[serde(default)]
    pub default_firewall_rule: String,
    /// Whether this is the primary interface.
    #[serde(default)]
    pub primary: bool,
    /// Assigned IP addresses, in API order.
    #[serde(default, rename = "ipAddresses")]
    pub ip_addresses: Vec<IpAddress>,
    /// Firewall rules, in API order.
    #[serde(default)]
    pub firewall_rules: Vec<FirewallRule>,
}

/// An IP address assigned to a network interface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpAddress {
    /// Address.
    #[serde(default)]
    pub address: String,
    /// Network address.
    #[serde(default)]
    pub network: String,
    /// Netmask.
    #[serde(default)]
    pub netmask: String,
    /// Gateway.
    #[serde(default)]
    pub gateway: String,
}

/// A firewall rule on a network interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FirewallRule {
    /// Rule identifier.
    pub identifier: FirewallRuleId,
    /// Evaluation position.
    #[serde(default)]
    pub position: i64,
    /// Action, e.g. `ACCEPT` or `DROP`.
    #[serde(default)]
    pub command: String,
    /// Protocol, e.g. `TCP`.
    #[serde(default)]
    pub protocol: String,
    /// Network address of the source block.
    #[serde(default)]
    pub address: String,
    /// Prefix length of the source block.
    #[serde(default)]
    pub bits: u8,
    /// Port or port range.
    #[serde(default)]
    pub port: String,
}

impl FirewallRule {
    /// Source block in CIDR notation (`address/bits`).
    #[must_use]
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.bits)
    }
}

/// Reference data entry returned by the template and package listings.
pub type Template = Reference;

/// Sizing package entry.
pub type Package = Reference;

/// Request payload for `POST /cloudservers`.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct CreateServerRequest {
    /// Hostname.
    pub hostname: String,
    /// Display label.
    pub label: String,
    /// Root password for the first boot.
    pub initial_root_password: String,
    /// Package identifier.
    pub package: String,
    /// Template identifier.
    pub template: String,
    /// Location identifier.
    pub location: String,
}

impl std::fmt::Debug for CreateServerRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateServerRequest")
            .field("hostname", &self.hostname)
            .field("label", &self.label)
            .field("initial_root_password", &"[REDACTED]")
            .field("package", &self.package)
            .field("template", &self.template)
            .field("location", &self.location)
            .finish()
    }
}

/// Request payload for `PUT /cloudservers/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateServerRequest {
    /// Hostname.
    pub hostname: String,
    /// Display label.
    pub label: String,
}

/// Request payload for `POST .../network-interfaces/{id}/firewall-rules`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateFirewallRuleRequest {
    /// Network address of the source block.
    pub address: String,
    /// Prefix length of the source block.
    pub bits: u8,
    /// Action, e.g. `ACCEPT` or `DROP`.
    pub command: String,
    /// Port or port range.
    pub port: String,
    /// Protocol, e.g. `TCP`.
    pub protocol: String,
}

/// Request payload for `DELETE /cloudservers/{id}/ip-addresses`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoveIpAddressRequest {
    /// Address to release.
    pub address: String,
}
