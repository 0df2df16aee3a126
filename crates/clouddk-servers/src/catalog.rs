//! Read-only lookups: server, template and package listings plus disk, network
//! interface and firewall rule reads.
//!
//! Each call is one GET flattened into parallel lists. None of these retry; a
//! non-2xx answer, 404 included, is an error.

use crate::client::ServersClient;
use crate::models::{Disk, FirewallRule, Reference, Server};
use crate::state::{DiskLists, InterfaceAttributes};
use crate::Result;
use clouddk_core::id::{DiskId, FirewallRuleId, NetworkInterfaceId, ServerId};

/// Flattened server listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerListing {
    /// Server identifiers
    pub ids: Vec<String>,
    /// Hostnames
    pub hostnames: Vec<String>,
    /// Labels
    pub labels: Vec<String>,
    /// Location identifiers
    pub locations: Vec<String>,
    /// Package identifiers
    pub packages: Vec<String>,
    /// Template identifiers
    pub templates: Vec<String>,
}

impl From<&[Server]> for ServerListing {
    fn from(servers: &[Server]) -> Self {
        let mut listing = Self::default();
        for server in servers {
            listing.ids.push(server.identifier.to_string());
            listing.hostnames.push(server.hostname.clone());
            listing.labels.push(server.label.clone());
            listing.locations.push(server.location.identifier.clone());
            listing.packages.push(server.package.identifier.clone());
            listing.templates.push(server.template.identifier.clone());
        }
        listing
    }
}

/// Flattened identifier/name listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceListing {
    /// Identifiers
    pub ids: Vec<String>,
    /// Display names
    pub names: Vec<String>,
}

impl From<&[Reference]> for ReferenceListing {
    fn from(entries: &[Reference]) -> Self {
        Self {
            ids: entries.iter().map(|e| e.identifier.clone()).collect(),
            names: entries.iter().map(|e| e.name.clone()).collect(),
        }
    }
}

/// Template listing.
pub type TemplateListing = ReferenceListing;

/// Package listing.
pub type PackageListing = ReferenceListing;

/// One disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskAttributes {
    /// Disk identifier
    pub id: String,
    /// Label
    pub label: String,
    /// Boot disk flag
    pub primary: bool,
    /// Size in gigabytes
    pub size: i64,
}

impl From<&Disk> for DiskAttributes {
    fn from(disk: &Disk) -> Self {
        Self {
            id: disk.identifier.to_string(),
            label: disk.label.clone(),
            primary: disk.primary,
            size: disk.size,
        }
    }
}

/// One firewall rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRuleAttributes {
    /// Rule identifier
    pub id: String,
    /// Source block (`address/bits`)
    pub address: String,
    /// Action
    pub command: String,
    /// Port or range
    pub port: String,
    /// Protocol
    pub protocol: String,
}

impl From<&FirewallRule> for FirewallRuleAttributes {
    fn from(rule: &FirewallRule) -> Self {
        Self {
            id: rule.identifier.to_string(),
            address: rule.cidr(),
            command: rule.command.clone(),
            port: rule.port.clone(),
            protocol: rule.protocol.clone(),
        }
    }
}

/// Flattening front end over [`ServersClient`] lookups.
#[derive(Debug, Clone)]
pub struct Catalog {
    client: ServersClient,
}

impl Catalog {
    /// Wrap a client.
    #[must_use]
    pub fn new(client: ServersClient) -> Self {
        Self { client }
    }

    /// Servers, optionally filtered by hostname.
    pub async fn servers(&self, hostname: Option<&str>) -> Result<ServerListing> {
        let servers = self
            .client
            .list_servers(hostname)
            .await
            .map_err(|err| err.during("list", "the servers"))?;
        Ok(ServerListing::from(servers.as_slice()))
    }

    /// OS templates, optionally filtered by name.
    pub async fn templates(&self, name: Option<&str>) -> Result<TemplateListing> {
        let templates = self
            .client
            .list_templates(name)
            .await
            .map_err(|err| err.during("list", "the templates"))?;
        Ok(ReferenceListing::from(templates.as_slice()))
    }

    /// Sizing packages.
    pub async fn packages(&self) -> Result<PackageListing> {
        let packages = self
            .client
            .list_packages()
            .await
            .map_err(|err| err.during("list", "the packages"))?;
        Ok(ReferenceListing::from(packages.as_slice()))
    }

    /// Every disk of a server.
    pub async fn disks(&self, server: &ServerId) -> Result<DiskLists> {
        let disks = self
            .client
            .list_disks(server)
            .await
            .map_err(|err| err.during("list the disks of", format!("the server (id: {server})")))?;
        Ok(DiskLists::from(disks.as_slice()))
    }

    /// One disk.
    pub async fn disk(&self, server: &ServerId, disk: &DiskId) -> Result<DiskAttributes> {
        let found = self
            .client
            .get_disk(server, disk)
            .await
            .map_err(|err| err.during("read", format!("the disk (id: {disk})")))?;
        Ok(DiskAttributes::from(&found))
    }

    /// One network interface.
    pub async fn network_interface(
        &self,
        server: &ServerId,
        interface: &NetworkInterfaceId,
    ) -> Result<InterfaceAttributes> {
        let found = self
            .client
            .get_network_interface(server, interface)
            .await
            .map_err(|err| err.during("read", format!("the network interface (id: {interface})")))?;
        Ok(InterfaceAttributes::from(&found))
    }

    /// One firewall rule.
    pub async fn firewall_rule(
        &self,
        server: &ServerId,
        interface: &NetworkInterfaceId,
        rule: &FirewallRuleId,
    ) -> Result<FirewallRuleAttributes> {
        let found = self
            .client
            .get_firewall_rule(server, interface, rule)
            .await
            .map_err(|err| err.during("read", format!("the firewall rule (id: {rule})")))?;
        Ok(FirewallRuleAttributes::from(&found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NetworkInterface;
    use clouddk_core::config::ClientSettings;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn catalog(server: &MockServer) -> Catalog {
        let settings = ClientSettings::new(server.uri()).unwrap().with_api_key("key");
        Catalog::new(ServersClient::new(settings).unwrap())
    }

    #[test]
    fn server_listing_keeps_order() {
        let servers: Vec<Server> = serde_json::from_value(json!([
            {"identifier": "s1", "hostname": "a", "label": "A",
             "location": {"identifier": "dk1"}, "package": {"identifier": "p1"}, "template": {"identifier": "t1"}},
            {"identifier": "s2", "hostname": "b", "label": "B"}
        ]))
        .unwrap();

        let listing = ServerListing::from(servers.as_slice());
        assert_eq!(listing.ids, vec!["s1", "s2"]);
        assert_eq!(listing.hostnames, vec!["a", "b"]);
        assert_eq!(listing.locations, vec!["dk1", ""]);
        assert_eq!(listing.templates.len(), 2);
    }

    #[test]
    fn interface_attributes_compose_cidr() {
        let nic: NetworkInterface = serde_json::from_value(json!({
            "identifier": "n1",
            "label": "public",
            "ipAddresses": [{"address": "192.0.2.10", "netmask": "255.255.255.0"}],
            "firewall_rules": [
                {"identifier": "r1", "address": "10.0.0.0", "bits": 24, "command": "ACCEPT"},
                {"identifier": "r2", "address": "0.0.0.0", "bits": 0, "command": "DROP"}
            ]
        }))
        .unwrap();

        let attributes = InterfaceAttributes::from(&nic);
        assert_eq!(attributes.addresses, vec!["192.0.2.10"]);
        assert_eq!(attributes.netmasks, vec!["255.255.255.0"]);
        assert_eq!(
            attributes.firewall_rule_addresses,
            vec!["10.0.0.0/24", "0.0.0.0/0"]
        );
        assert_eq!(attributes.firewall_rule_commands, vec!["ACCEPT", "DROP"]);
    }

    #[tokio::test]
    async fn templates_without_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/templates"))
            .and(query_param("per-page", "1000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"identifier": "t1", "name": "Debian 12"},
                {"identifier": "t2", "name": "Ubuntu 24.04"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let listing = catalog(&server).templates(None).await.unwrap();
        assert_eq!(listing.ids, vec!["t1", "t2"]);
        assert_eq!(listing.names, vec!["Debian 12", "Ubuntu 24.04"]);
    }

    #[tokio::test]
    async fn packages_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cloudservers/get-packages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"identifier": "pkg-s", "name": "Small"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let listing = catalog(&server).packages().await.unwrap();
        assert_eq!(listing.ids, vec!["pkg-s"]);
    }

    #[tokio::test]
    async fn disks_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cloudservers/s1/disks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"identifier": "d1", "label": "root", "size": 20, "primary": true},
                {"identifier": "d2", "label": "data", "size": 50, "primary": false}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let disks = catalog(&server)
            .disks(&ServerId::parse_str("s1").unwrap())
            .await
            .unwrap();
        assert_eq!(disks.ids, vec!["d1", "d2"]);
        assert_eq!(disks.sizes, vec![20, 50]);
    }

    #[tokio::test]
    async fn missing_firewall_rule_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cloudservers/s1/network-interfaces/n1/firewall-rules/r9"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = catalog(&server)
            .firewall_rule(
                &ServerId::parse_str("s1").unwrap(),
                &NetworkInterfaceId::parse_str("n1").unwrap(),
                &FirewallRuleId::parse_str("r9").unwrap(),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("Failed to read the firewall rule (id: r9)"));
    }

    #[tokio::test]
    async fn network_interface_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cloudservers/s1/network-interfaces/n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "n1",
                "label": "public",
                "rate_limit": 1000,
                "default_firewall_rule": "DROP",
                "primary": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let nic = catalog(&server)
            .network_interface(
                &ServerId::parse_str("s1").unwrap(),
                &NetworkInterfaceId::parse_str("n1").unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(nic.rate_limit, 1000);
        assert!(nic.addresses.is_empty());
        assert!(nic.firewall_rule_ids.is_empty());
    }

    #[tokio::test]
    async fn disk_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cloudservers/s1/disks/d1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "identifier": "d1", "label": "root", "size": 20, "primary": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let disk = catalog(&server)
            .disk(
                &ServerId::parse_str("s1").unwrap(),
                &DiskId::parse_str("d1").unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            disk,
            DiskAttributes {
                id: "d1".to_string(),
                label: "root".to_string(),
                primary: true,
                size: 20,
            }
        );
    }
}
