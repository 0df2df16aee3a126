//! Asynchronous cloud server client implementation.

use crate::models::{
    CreateFirewallRuleRequest, CreateServerRequest, Disk, FirewallRule, NetworkInterface, Package,
    RemoveIpAddressRequest, Server, Template, UpdateServerRequest,
};
use crate::Result;
use async_trait::async_trait;
use clouddk_core::client::{ApiClient, ApiClientBuilder};
use clouddk_core::config::ClientSettings;
use clouddk_core::id::{DiskId, FirewallRuleId, NetworkInterfaceId, ServerId};
use clouddk_core::query::QueryParams;
use reqwest::Method;
use url::Url;

const USER_AGENT: &str = concat!("clouddk-servers/", env!("CARGO_PKG_VERSION"));

/// Wire operations the server lifecycle depends on.
///
/// Each call is a single round trip; 404 surfaces as
/// [`clouddk_core::Error::NotFound`] and other non-2xx answers as
/// [`clouddk_core::Error::Api`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServerApi: Send + Sync {
    /// `POST /cloudservers`
    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server>;

    /// `GET /cloudservers/{id}`
    async fn get_server(&self, id: &ServerId) -> Result<Server>;

    /// `PUT /cloudservers/{id}`
    async fn update_server(&self, id: &ServerId, request: &UpdateServerRequest)
        -> Result<Server>;

    /// `DELETE /cloudservers/{id}`
    async fn delete_server(&self, id: &ServerId) -> Result<()>;
}

/// Builder for [`ServersClient`].
#[derive(Debug, Clone)]
pub struct ServersClientBuilder {
    inner: ApiClientBuilder,
}

impl ServersClientBuilder {
    /// Create a builder from client settings.
    #[must_use]
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            inner: ApiClientBuilder::new(settings).with_user_agent(USER_AGENT),
        }
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.inner = self.inner.with_user_agent(user_agent);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<ServersClient> {
        let inner = self.inner.build()?;
        Ok(ServersClient { inner })
    }
}

/// Asynchronous client for the cloud server endpoints.
#[derive(Debug, Clone)]
pub struct ServersClient {
    inner: ApiClient,
}

impl ServersClient {
    /// Construct a client directly from settings.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        ServersClientBuilder::new(settings).build()
    }

    /// Start a builder.
    #[must_use]
    pub fn builder(settings: ClientSettings) -> ServersClientBuilder {
        ServersClientBuilder::new(settings)
    }

    /// Return the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        self.inner.base_url()
    }

    /// List servers, optionally filtered by hostname.
    pub async fn list_servers(&self, hostname: Option<&str>) -> Result<Vec<Server>> {
        let mut params = QueryParams::paged();
        params.push_filter("hostname", hostname);
        self.inner
            .get_json("cloudservers", &params.into_pairs())
            .await
    }

    /// List OS templates, optionally filtered by name.
    pub async fn list_templates(&self, name: Option<&str>) -> Result<Vec<Template>> {
        let mut params = QueryParams::paged();
        params.push_filter("name", name);
        self.inner.get_json("templates", &params.into_pairs()).await
    }

    /// List sizing packages.
    pub async fn list_packages(&self) -> Result<Vec<Package>> {
        self.inner.get_json("cloudservers/get-packages", &[]).await
    }

    /// List the disks attached to a server.
    pub async fn list_disks(&self, server: &ServerId) -> Result<Vec<Disk>> {
        let path = format!("cloudservers/{server}/disks");
        self.inner.get_json(&path, &[]).await
    }

    /// Fetch a single disk.
    pub async fn get_disk(&self, server: &ServerId, disk: &DiskId) -> Result<Disk> {
        let path = format!("cloudservers/{server}/disks/{disk}");
        self.inner.get_json(&path, &[]).await
    }

    /// Fetch a single network interface.
    pub async fn get_network_interface(
        &self,
        server: &ServerId,
        interface: &NetworkInterfaceId,
    ) -> Result<NetworkInterface> {
        let path = format!("cloudservers/{server}/network-interfaces/{interface}");
        self.inner.get_json(&path, &[]).await
    }

    /// Fetch a single firewall rule.
    pub async fn get_firewall_rule(
        &self,
        server: &ServerId,
        interface: &NetworkInterfaceId,
        rule: &FirewallRuleId,
    ) -> Result<FirewallRule> {
        let path =
            format!("cloudservers/{server}/network-interfaces/{interface}/firewall-rules/{rule}");
        self.inner.get_json(&path, &[]).await
    }

    /// Add a firewall rule to a network interface.
    pub async fn create_firewall_rule(
        &self,
        server: &ServerId,
        interface: &NetworkInterfaceId,
        request: &CreateFirewallRuleRequest,
    ) -> Result<FirewallRule> {
        let path = format!("cloudservers/{server}/network-interfaces/{interface}/firewall-rules");
        self.inner
            .send_json(Method::POST, &path, Some(request), &[])
            .await
    }

    /// Remove a firewall rule.
    pub async fn delete_firewall_rule(
        &self,
        server: &ServerId,
        interface: &NetworkInterfaceId,
        rule: &FirewallRuleId,
    ) -> Result<()> {
        let path =
            format!("cloudservers/{server}/network-interfaces/{interface}/firewall-rules/{rule}");
        self.inner.send_empty(Method::DELETE, &path).await
    }

    /// Assign one more IP address to a server.
    ///
    /// The response is the interface that received the address.
    pub async fn add_ip_address(&self, server: &ServerId) -> Result<NetworkInterface> {
        let path = format!("cloudservers/{server}/ip-addresses");
        self.inner
            .send_json::<(), NetworkInterface>(Method::POST, &path, None, &[])
            .await
    }

    /// Release an IP address from a server.
    pub async fn remove_ip_address(&self, server: &ServerId, address: &str) -> Result<()> {
        let path = format!("cloudservers/{server}/ip-addresses");
        let body = RemoveIpAddressRequest {
            address: address.to_string(),
        };
        self.inner
            .execute(Method::DELETE, &path, &[], Some(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ServerApi for ServersClient {
    async fn create_server(&self, request: &CreateServerRequest) -> Result<Server> {
        self.inner
            .send_json(Method::POST, "cloudservers", Some(request), &[])
            .await
    }

    async fn get_server(&self, id: &ServerId) -> Result<Server> {
        let path = format!("cloudservers/{id}");
        self.inner.get_json(&path, &[]).await
    }

    async fn update_server(
        &self,
        id: &ServerId,
        request: &UpdateServerRequest,
    ) -> Result<Server> {
        let path = format!("cloudservers/{id}");
        self.inner
            .send_json(Method::PUT, &path, Some(request), &[])
            .await
    }

    async fn delete_server(&self, id: &ServerId) -> Result<()> {
        let path = format!("cloudservers/{id}");
        self.inner.send_empty(Method::DELETE, &path).await
    }
}
