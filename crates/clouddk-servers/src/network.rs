//! Firewall rules and additional IP addresses on a server's network interfaces.
//!
//! Both resources are single round trips with no waiting. A 404 on read or
//! delete means the resource is already gone.

use crate::client::{ServerApi, ServersClient};
use crate::lifecycle::Presence;
use crate::models::{CreateFirewallRuleRequest, FirewallRule, IpAddress};
use crate::Result;
use clouddk_core::id::{FirewallRuleId, NetworkInterfaceId, ServerId};
use clouddk_core::Error;
use std::net::IpAddr;
use tracing::{debug, info};

/// Split an `address/bits` source block into its parts.
///
/// # Errors
///
/// Returns [`Error::ValidationError`] if the address is not an IP address or
/// the prefix is longer than the address family allows.
pub fn parse_cidr(block: &str) -> Result<(String, u8)> {
    let invalid = || Error::ValidationError(format!("'{block}' is not a valid CIDR block"));

    let (address, bits) = block.trim().split_once('/').ok_or_else(invalid)?;
    let ip: IpAddr = address.parse().map_err(|_| invalid())?;
    let bits: u8 = bits.parse().map_err(|_| invalid())?;
    let max = if ip.is_ipv4() { 32 } else { 128 };
    if bits > max {
        return Err(invalid());
    }
    Ok((ip.to_string(), bits))
}

/// Declared state of one firewall rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRuleState {
    /// Rule identifier, set once the API accepts the rule
    pub id: Option<FirewallRuleId>,
    /// Owning server
    pub server_id: ServerId,
    /// Owning network interface
    pub network_interface_id: NetworkInterfaceId,
    /// Source block (`address/bits`)
    pub address: String,
    /// Action
    pub command: String,
    /// Port or range
    pub port: String,
    /// Protocol
    pub protocol: String,
}

impl FirewallRuleState {
    /// Describe a rule that does not exist yet.
    #[must_use]
    pub fn new(
        server_id: ServerId,
        network_interface_id: NetworkInterfaceId,
        address: impl Into<String>,
        command: impl Into<String>,
        port: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            server_id,
            network_interface_id,
            address: address.into(),
            command: command.into(),
            port: port.into(),
            protocol: protocol.into(),
        }
    }

    /// Build the wire request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] for an invalid source block or any
    /// empty input.
    pub fn to_request(&self) -> Result<CreateFirewallRuleRequest> {
        let missing: Vec<&str> = [
            ("command", self.command.as_str()),
            ("port", self.port.as_str()),
            ("protocol", self.protocol.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(Error::ValidationError(format!(
                "missing required firewall rule inputs: {}",
                missing.join(", ")
            )));
        }

        let (address, bits) = parse_cidr(&self.address)?;
        Ok(CreateFirewallRuleRequest {
            address,
            bits,
            command: self.command.clone(),
            port: self.port.clone(),
            protocol: self.protocol.clone(),
        })
    }

    fn refresh(&mut self, rule: &FirewallRule) {
        if self.id.is_none() {
            self.id = Some(rule.identifier.clone());
        }
        self.address = rule.cidr();
        self.command.clone_from(&rule.command);
        self.port.clone_from(&rule.port);
        self.protocol.clone_from(&rule.protocol);
    }

    /// Human identifier used in error messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        let id = self.id.as_ref().map_or("-", FirewallRuleId::as_str);
        format!("the firewall rule (id: {id})")
    }

    fn require_id(&self, operation: &str) -> Result<FirewallRuleId> {
        self.id.clone().ok_or_else(|| {
            Error::InvalidRequest(format!(
                "cannot {operation} {} without an identifier",
                self.display_name()
            ))
        })
    }
}

/// Declared state of one additional IP address.
///
/// The address itself is the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpAddressState {
    /// Owning server
    pub server_id: Option<ServerId>,
    /// Assigned address, set once the API hands one out
    pub address: Option<String>,
    /// Interface that carries the address
    pub network_interface_id: String,
    /// Gateway
    pub gateway: String,
    /// Netmask
    pub netmask: String,
    /// Network address
    pub network: String,
}

impl IpAddressState {
    /// Describe an address to be assigned to `server_id`.
    #[must_use]
    pub fn new(server_id: ServerId) -> Self {
        Self {
            server_id: Some(server_id),
            ..Self::default()
        }
    }

    fn refresh(&mut self, interface: &NetworkInterfaceId, ip: &IpAddress) {
        self.address = Some(ip.address.clone());
        self.network_interface_id = interface.to_string();
        self.gateway.clone_from(&ip.gateway);
        self.netmask.clone_from(&ip.netmask);
        self.network.clone_from(&ip.network);
    }

    fn clear_identity(&mut self) {
        let server_id = self.server_id.take();
        *self = Self {
            server_id,
            ..Self::default()
        };
    }

    /// Human identifier used in error messages.
    #[must_use]
    pub fn display_name(&self) -> String {
        let address = self.address.as_deref().unwrap_or("-");
        format!("the IP address '{address}'")
    }

    fn require_server(&self, operation: &str) -> Result<ServerId> {
        self.server_id.clone().ok_or_else(|| {
            Error::InvalidRequest(format!(
                "cannot {operation} {} without a server identifier",
                self.display_name()
            ))
        })
    }

    fn require_address(&self, operation: &str) -> Result<String> {
        self.address.clone().ok_or_else(|| {
            Error::InvalidRequest(format!(
                "cannot {operation} an IP address that has not been assigned"
            ))
        })
    }
}

/// Create, read and delete for firewall rules and additional IP addresses.
#[derive(Debug, Clone)]
pub struct NetworkResources {
    client: ServersClient,
}

impl NetworkResources {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: ServersClient) -> Self {
        Self { client }
    }

    /// Add the rule described by `state` and record its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the rule already exists,
    /// [`Error::ValidationError`] for bad inputs, otherwise the wrapped API error.
    pub async fn create_firewall_rule(&self, state: &mut FirewallRuleState) -> Result<()> {
        if state.id.is_some() {
            return Err(Error::InvalidRequest(format!(
                "{} already exists",
                state.display_name()
            )));
        }
        let request = state.to_request()?;

        info!(
            server = %state.server_id,
            interface = %state.network_interface_id,
            address = %state.address,
            "creating firewall rule"
        );
        let rule = self
            .client
            .create_firewall_rule(&state.server_id, &state.network_interface_id, &request)
            .await
            .map_err(|err| err.during("create", state.display_name()))?;
        state.refresh(&rule);
        Ok(())
    }

    /// Refresh a firewall rule. A missing rule clears the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] without an identifier, otherwise the
    /// wrapped API error.
    pub async fn read_firewall_rule(&self, state: &mut FirewallRuleState) -> Result<Presence> {
        let id = state.require_id("read")?;
        debug!(id = %id, "reading firewall rule");

        match self
            .client
            .get_firewall_rule(&state.server_id, &state.network_interface_id, &id)
            .await
        {
            Ok(rule) => {
                state.refresh(&rule);
                Ok(Presence::Present)
            }
            Err(err) if err.is_not_found() => {
                info!(id = %id, "firewall rule no longer exists");
                state.id = None;
                Ok(Presence::Absent)
            }
            Err(err) => Err(err.during("read", state.display_name())),
        }
    }

    /// Remove a firewall rule. A rule that is already gone counts as removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] without an identifier, otherwise the
    /// wrapped API error. The identifier is kept on failure.
    pub async fn delete_firewall_rule(&self, state: &mut FirewallRuleState) -> Result<()> {
        let id = state.require_id("delete")?;
        info!(id = %id, "deleting firewall rule");

        match self
            .client
            .delete_firewall_rule(&state.server_id, &state.network_interface_id, &id)
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => debug!(id = %id, "firewall rule already gone"),
            Err(err) => return Err(err.during("delete", state.display_name())),
        }
        state.id = None;
        Ok(())
    }

    /// Assign a new address to the server and record it.
    ///
    /// The new address is the one on the returned interface that the server
    /// did not carry before the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if an address is already recorded,
    /// [`Error::Parse`] if the answer names no new address, otherwise the
    /// wrapped API error.
    pub async fn create_ip_address(&self, state: &mut IpAddressState) -> Result<()> {
        if let Some(address) = &state.address {
            return Err(Error::InvalidRequest(format!(
                "the IP address '{address}' is already assigned"
            )));
        }
        let server_id = state.require_server("create")?;
        let known: Vec<String> = self
            .client
            .get_server(&server_id)
            .await
            .map_err(|err| err.during("create", state.display_name()))?
            .network_interfaces
            .iter()
            .flat_map(|nic| nic.ip_addresses.iter().map(|ip| ip.address.clone()))
            .collect();

        info!(server = %server_id, "assigning IP address");
        let nic = self
            .client
            .add_ip_address(&server_id)
            .await
            .map_err(|err| err.during("create", state.display_name()))?;

        let added = nic
            .ip_addresses
            .iter()
            .rev()
            .find(|ip| !known.contains(&ip.address))
            .ok_or_else(|| {
                Error::Parse(format!(
                    "the API assigned no new IP address to the server (id: {server_id})"
                ))
            })?;
        state.refresh(&nic.identifier, added);
        Ok(())
    }

    /// Refresh an address from the server's interfaces.
    ///
    /// A missing server or address clears the identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] without an address, otherwise the
    /// wrapped API error.
    pub async fn read_ip_address(&self, state: &mut IpAddressState) -> Result<Presence> {
        let server_id = state.require_server("read")?;
        let address = state.require_address("read")?;
        debug!(server = %server_id, address = %address, "reading IP address");

        let server = match self.client.get_server(&server_id).await {
            Ok(server) => server,
            Err(err) if err.is_not_found() => {
                info!(server = %server_id, "server of IP address no longer exists");
                state.clear_identity();
                return Ok(Presence::Absent);
            }
            Err(err) => return Err(err.during("read", state.display_name())),
        };

        let found = server.network_interfaces.iter().find_map(|nic| {
            nic.ip_addresses
                .iter()
                .find(|ip| ip.address == address)
                .map(|ip| (nic.identifier.clone(), ip.clone()))
        });
        match found {
            Some((interface, ip)) => {
                state.refresh(&interface, &ip);
                Ok(Presence::Present)
            }
            None => {
                info!(address = %address, "IP address no longer assigned");
                state.clear_identity();
                Ok(Presence::Absent)
            }
        }
    }

    /// Release an address. An address or server that is already gone counts
    /// as released.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] without an address, otherwise the
    /// wrapped API error. The identity is kept on failure.
    pub async fn delete_ip_address(&self, state: &mut IpAddressState) -> Result<()> {
        let server_id = state.require_server("delete")?;
        let address = state.require_address("delete")?;
        info!(server = %server_id, address = %address, "releasing IP address");

        match self.client.remove_ip_address(&server_id, &address).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => debug!(address = %address, "IP address already gone"),
            Err(err) => return Err(err.during("delete", state.display_name())),
        }
        state.clear_identity();
        Ok(())
    }
}
