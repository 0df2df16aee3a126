//! Cloud server resource for the cloud.dk provisioning API.
//!
//! Provides the wire models, an asynchronous client, the mapping between the
//! API's nested server tree and a flat declared state, and the lifecycle
//! operations that create, read, update and delete a server while riding out
//! the platform's asynchronous boot and deletion. Firewall rules and extra IP
//! addresses are managed as sub-resources of a server.

#![deny(missing_docs)]

pub mod catalog;
pub mod client;
pub mod lifecycle;
pub mod models;
pub mod network;
pub mod provision;
pub mod state;

pub use catalog::{
    Catalog, DiskAttributes, FirewallRuleAttributes, PackageListing, ReferenceListing,
    ServerListing, TemplateListing,
};
pub use client::{ServerApi, ServersClient, ServersClientBuilder};
pub use lifecycle::{Presence, ServerLifecycle};
pub use models::{
    CreateFirewallRuleRequest, CreateServerRequest, Disk, FirewallRule, IpAddress,
    NetworkInterface, Package, Reference, RemoveIpAddressRequest, Server, Template,
    UpdateServerRequest,
};
pub use network::{parse_cidr, FirewallRuleState, IpAddressState, NetworkResources};
pub use provision::{
    delete_until_gone, wait_for_boot, BootPoller, BootState, DeletionRetrier, DeletionState,
};
pub use state::{
    build_create_payload, build_update_payload, flatten, DeclaredState, DiskLists,
    InterfaceAttributes, InterfaceLists,
};

/// Convenient result alias that reuses the shared cloud.dk error type.
pub type Result<T> = clouddk_core::Result<T>;
