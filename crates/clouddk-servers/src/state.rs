//! Declared state of a server resource and its mapping to and from the wire format.
//!
//! [`flatten`] walks a [`Server`] tree once and produces parallel lists whose
//! index `i` always refers to the same disk or interface, in the order the API
//! returned them. The reverse direction only ever projects the caller's inputs.

use crate::models::{
    CreateServerRequest, Disk, FirewallRule, NetworkInterface, Server, UpdateServerRequest,
};
use clouddk_core::id::ServerId;
use clouddk_core::{Error, Result};
use secrecy::{ExposeSecret, SecretString};

/// Caller-owned record for one server resource.
#[derive(Debug, Clone, Default)]
pub struct DeclaredState {
    /// Remote identity; `None` until the first successful create.
    pub id: Option<ServerId>,
    /// Hostname (mutable).
    pub hostname: String,
    /// Display label (mutable).
    pub label: String,
    /// Location identifier.
    pub location_id: String,
    /// Package identifier.
    pub package_id: String,
    /// Template identifier.
    pub template_id: String,
    /// Initial root password. Write-only: never populated from the API.
    pub root_password: Option<SecretString>,
    /// Whether the server has booted.
    pub booted: bool,
    /// CPU count.
    pub cpu_count: i64,
    /// Memory in megabytes.
    pub memory_mb: i64,
    /// Location display name.
    pub location_name: String,
    /// Package display name.
    pub package_name: String,
    /// Template display name.
    pub template_name: String,
    /// Disk attributes, one entry per disk.
    pub disks: DiskLists,
    /// Network interface attributes, one entry per interface.
    pub interfaces: InterfaceLists,
}

/// Parallel disk lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskLists {
    /// Disk identifiers.
    pub ids: Vec<String>,
    /// Disk labels.
    pub labels: Vec<String>,
    /// Primary flags.
    pub primary: Vec<bool>,
    /// Sizes in gigabytes.
    pub sizes: Vec<i64>,
}

impl DiskLists {
    /// Number of disks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if there are no disks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl From<&[Disk]> for DiskLists {
    fn from(disks: &[Disk]) -> Self {
        let mut lists = Self::default();
        for disk in disks {
            lists.ids.push(disk.identifier.to_string());
            lists.labels.push(disk.label.clone());
            lists.primary.push(disk.primary);
            lists.sizes.push(disk.size);
        }
        lists
    }
}

/// Parallel network interface lists. Outer index is the interface, inner index the
/// address or firewall rule within that interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceLists {
    /// Interface identifiers.
    pub ids: Vec<String>,
    /// Interface labels.
    pub labels: Vec<String>,
    /// Primary flags.
    pub primary: Vec<bool>,
    /// Rate limits.
    pub rate_limits: Vec<i64>,
    /// Default firewall policy per interface.
    pub default_firewall_rules: Vec<String>,
    /// IP addresses per interface.
    pub addresses: Vec<Vec<String>>,
    /// Netmasks per interface.
    pub netmasks: Vec<Vec<String>>,
    /// Gateways per interface.
    pub gateways: Vec<Vec<String>>,
    /// Networks per interface.
    pub networks: Vec<Vec<String>>,
    /// Firewall rule identifiers per interface.
    pub firewall_rule_ids: Vec<Vec<String>>,
    /// Firewall rule source blocks (`address/bits`) per interface.
    pub firewall_rule_addresses: Vec<Vec<String>>,
    /// Firewall rule commands per interface.
    pub firewall_rule_commands: Vec<Vec<String>>,
    /// Firewall rule ports per interface.
    pub firewall_rule_ports: Vec<Vec<String>>,
    /// Firewall rule protocols per interface.
    pub firewall_rule_protocols: Vec<Vec<String>>,
}

impl InterfaceLists {
    /// Number of interfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if there are no interfaces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn push(&mut self, nic: InterfaceAttributes) {
        self.ids.push(nic.id);
        self.labels.push(nic.label);
        self.primary.push(nic.primary);
        self.rate_limits.push(nic.rate_limit);
        self.default_firewall_rules.push(nic.default_firewall_rule);
        self.addresses.push(nic.addresses);
        self.netmasks.push(nic.netmasks);
        self.gateways.push(nic.gateways);
        self.networks.push(nic.networks);
        self.firewall_rule_ids.push(nic.firewall_rule_ids);
        self.firewall_rule_addresses.push(nic.firewall_rule_addresses);
        self.firewall_rule_commands.push(nic.firewall_rule_commands);
        self.firewall_rule_ports.push(nic.firewall_rule_ports);
        self.firewall_rule_protocols.push(nic.firewall_rule_protocols);
    }
}

/// One network interface with its address and firewall rule lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAttributes {
    /// Interface identifier
    pub id: String,
    /// Label
    pub label: String,
    /// Primary interface flag
    pub primary: bool,
    /// Rate limit
    pub rate_limit: i64,
    /// Policy when no rule matches
    pub default_firewall_rule: String,
    /// IP addresses
    pub addresses: Vec<String>,
    /// Netmasks
    pub netmasks: Vec<String>,
    /// Gateways
    pub gateways: Vec<String>,
    /// Networks
    pub networks: Vec<String>,
    /// Firewall rule identifiers
    pub firewall_rule_ids: Vec<String>,
    /// Firewall rule source blocks (`address/bits`)
    pub firewall_rule_addresses: Vec<String>,
    /// Firewall rule commands
    pub firewall_rule_commands: Vec<String>,
    /// Firewall rule ports
    pub firewall_rule_ports: Vec<String>,
    /// Firewall rule protocols
    pub firewall_rule_protocols: Vec<String>,
}

impl From<&NetworkInterface> for InterfaceAttributes {
    fn from(nic: &NetworkInterface) -> Self {
        let addresses = &nic.ip_addresses;
        let rules = &nic.firewall_rules;
        Self {
            id: nic.identifier.to_string(),
            label: nic.label.clone(),
            primary: nic.primary,
            rate_limit: nic.rate_limit,
            default_firewall_rule: nic.default_firewall_rule.clone(),
            addresses: addresses.iter().map(|a| a.address.clone()).collect(),
            netmasks: addresses.iter().map(|a| a.netmask.clone()).collect(),
            gateways: addresses.iter().map(|a| a.gateway.clone()).collect(),
            networks: addresses.iter().map(|a| a.network.clone()).collect(),
            firewall_rule_ids: rules.iter().map(|r| r.identifier.to_string()).collect(),
            firewall_rule_addresses: rules.iter().map(FirewallRule::cidr).collect(),
            firewall_rule_commands: rules.iter().map(|r| r.command.clone()).collect(),
            firewall_rule_ports: rules.iter().map(|r| r.port.clone()).collect(),
            firewall_rule_protocols: rules.iter().map(|r| r.protocol.clone()).collect(),
        }
    }
}

impl From<&[NetworkInterface]> for InterfaceLists {
    fn from(nics: &[NetworkInterface]) -> Self {
        let mut lists = Self::default();
        for nic in nics {
            lists.push(InterfaceAttributes::from(nic));
        }
        lists
    }
}

/// Flatten a remote server tree into a declared-state record.
///
/// The result never carries a root password.
#[must_use]
pub fn flatten(server: &Server) -> DeclaredState {
    DeclaredState {
        id: Some(server.identifier.clone()),
        hostname: server.hostname.clone(),
        label: server.label.clone(),
        location_id: server.location.identifier.clone(),
        package_id: server.package.identifier.clone(),
        template_id: server.template.identifier.clone(),
        root_password: None,
        booted: server.booted,
        cpu_count: server.cpus,
        memory_mb: server.memory,
        location_name: server.location.name.clone(),
        package_name: server.package.name.clone(),
        template_name: server.template.name.clone(),
        disks: DiskLists::from(server.disks.as_slice()),
        interfaces: InterfaceLists::from(server.network_interfaces.as_slice()),
    }
}

/// Project the six create inputs into the wire create request.
///
/// # Errors
///
/// Returns [`Error::ValidationError`] naming every empty required input.
pub fn build_create_payload(state: &DeclaredState) -> Result<CreateServerRequest> {
    let password = state
        .root_password
        .as_ref()
        .map(|p| p.expose_secret().to_string())
        .unwrap_or_default();

    let missing: Vec<&str> = [
        ("hostname", state.hostname.as_str()),
        ("label", state.label.as_str()),
        ("root_password", password.as_str()),
        ("package_id", state.package_id.as_str()),
        ("template_id", state.template_id.as_str()),
        ("location_id", state.location_id.as_str()),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if !missing.is_empty() {
        return Err(Error::ValidationError(format!(
            "missing required server inputs: {}",
            missing.join(", ")
        )));
    }

    Ok(CreateServerRequest {
        hostname: state.hostname.clone(),
        label: state.label.clone(),
        initial_root_password: password,
        package: state.package_id.clone(),
        template: state.template_id.clone(),
        location: state.location_id.clone(),
    })
}

/// Project the two mutable inputs into the wire update request.
#[must_use]
pub fn build_update_payload(state: &DeclaredState) -> UpdateServerRequest {
    UpdateServerRequest {
        hostname: state.hostname.clone(),
        label: state.label.clone(),
    }
}

impl DeclaredState {
    /// Create a record holding only the create inputs.
    #[must_use]
    pub fn new(
        hostname: impl Into<String>,
        label: impl Into<String>,
        location_id: impl Into<String>,
        package_id: impl Into<String>,
        template_id: impl Into<String>,
        root_password: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            label: label.into(),
            location_id: location_id.into(),
            package_id: package_id.into(),
            template_id: template_id.into(),
            root_password: Some(SecretString::from(root_password.into())),
            ..Self::default()
        }
    }

    /// Create an otherwise empty record tracking an existing server.
    #[must_use]
    pub fn with_id(id: ServerId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Replace every API-derived attribute with the flattened `server`.
    ///
    /// The write-only root password survives the refresh. An identity already
    /// held is kept; the response identifier is only adopted by a record that
    /// has none yet.
    pub fn refresh(&mut self, server: &Server) {
        let root_password = self.root_password.take();
        let id = self.id.take();
        *self = flatten(server);
        self.root_password = root_password;
        if id.is_some() {
            self.id = id;
        }
    }

    /// Drop the remote identity after the server is confirmed gone.
    pub fn clear_identity(&mut self) {
        self.id = None;
    }

    /// Human identifier used in log lines and error messages, e.g. `'web01' (id: 42)`.
    #[must_use]
    pub fn display_name(&self) -> String {
        let id = self.id.as_ref().map_or("-", ServerId::as_str);
        format!("'{}' (id: {id})", self.hostname)
    }
}

impl From<&Server> for DeclaredState {
    fn from(server: &Server) -> Self {
        flatten(server)
    }
}
