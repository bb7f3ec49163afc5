//! Wire model for the RIAAS instances API.
//!
//! Only `id`, `name`, `zone` and the primary interface address drive
//! behavior; the remaining fields mirror the response shape so a full
//! listing deserializes cleanly.

use serde::Deserialize;

/// Response of `GET /v1/instances`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceList {
    /// The instances visible to the caller.
    #[serde(default)]
    pub instances: Vec<Instance>,
    /// Page size.
    pub limit: Option<i64>,
    /// Total number of instances across pages.
    pub total_count: Option<i64>,
    /// Link to the first page.
    pub first: Option<HrefReference>,
    /// Link to the next page, if any.
    pub next: Option<HrefReference>,
}

/// A compute instance record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Instance {
    /// Unique instance identifier.
    #[serde(default)]
    pub id: String,
    /// Display name; workers created by the cluster carry the node name.
    #[serde(default)]
    pub name: String,
    /// Self link.
    pub href: Option<String>,
    /// Cloud resource name.
    pub crn: Option<String>,
    /// Lifecycle status, e.g. `running`.
    pub status: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<String>,
    /// Availability zone.
    pub zone: Option<Zone>,
    /// Primary network interface.
    pub primary_network_interface: Option<NetworkInterface>,
    /// Owning VPC.
    pub vpc: Option<ResourceReference>,
    /// Instance profile.
    pub profile: Option<ResourceReference>,
    /// Owning resource group.
    pub resource_group: Option<ResourceReference>,
}

/// Availability zone reference.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Zone {
    /// Zone name, e.g. `us-south-1`.
    #[serde(default)]
    pub name: String,
    /// Self link.
    pub href: Option<String>,
}

/// Network interface attached to an instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkInterface {
    /// Interface identifier.
    pub id: Option<String>,
    /// Interface name.
    pub name: Option<String>,
    /// Self link.
    pub href: Option<String>,
    /// Primary IPv4 address, the by-address match key.
    pub primary_ipv4_address: Option<String>,
    /// Subnet the interface lives in.
    pub subnet: Option<ResourceReference>,
}

/// Generic `{id, name, href, crn}` reference used across the schema.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceReference {
    /// Resource identifier.
    pub id: Option<String>,
    /// Resource name.
    pub name: Option<String>,
    /// Self link.
    pub href: Option<String>,
    /// Cloud resource name.
    pub crn: Option<String>,
}

/// Pagination link.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HrefReference {
    /// Target URL.
    pub href: Option<String>,
}
