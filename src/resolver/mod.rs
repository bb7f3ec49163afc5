//! Instance resolution against the VPC infrastructure API.
//!
//! A worker identifier is either the instance's display name or its primary
//! IPv4 address; the resolver dispatches on which one it received and
//! projects the matching instance record to the `(instance id, region,
//! zone)` triple the label reconciler needs.

mod fake;
mod models;
mod riaas;

pub use fake::FakeResolver;
pub use models::{HrefReference, Instance, InstanceList, NetworkInterface, ResourceReference, Zone};
pub use riaas::RiaasClient;

use async_trait::async_trait;

use crate::error::LabelerError;

/// Placement of a resolved instance, the minimal projection needed for
/// labeling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Cloud instance identifier.
    pub instance_id: String,
    /// Region derived from the zone name.
    pub region: String,
    /// Availability zone name, e.g. `us-south-1`.
    pub zone: String,
}

impl NodeInfo {
    pub(crate) fn from_instance(instance: &Instance) -> Result<Self, LabelerError> {
        let zone = instance
            .zone
            .as_ref()
            .map(|z| z.name.as_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| LabelerError::MissingField(instance.id.clone(), "zone"))?;

        Ok(Self {
            instance_id: instance.id.clone(),
            region: region_from_zone(zone)?,
            zone: zone.to_string(),
        })
    }
}

/// Derives the region from a zone name: everything before the last hyphen,
/// so `us-south-1` becomes `us-south`.
///
/// # Errors
/// A zone without a hyphen violates the naming contract and is rejected
/// rather than silently truncated.
pub fn region_from_zone(zone: &str) -> Result<String, LabelerError> {
    match zone.rfind('-') {
        Some(idx) => Ok(zone[..idx].to_string()),
        None => Err(LabelerError::MalformedZone(zone.to_string())),
    }
}

/// Resolves the current worker to its cloud instance placement.
#[async_trait]
pub trait InstanceResolver {
    /// Returns the placement triple for the instance matching `worker`.
    ///
    /// # Errors
    /// Fails when no instance matches, or when the matched record is missing
    /// the fields needed for labeling.
    async fn resolve(&self, worker: &str) -> Result<NodeInfo, LabelerError>;
}

/// Takes the first record of a name-filtered listing, verifying the filter
/// actually matched the requested worker.
pub(crate) fn first_matching_name<'a>(
    instances: &'a [Instance],
    worker: &str,
) -> Result<&'a Instance, LabelerError> {
    let first = instances.first().ok_or(LabelerError::EmptyInstanceList)?;
    if first.name == worker {
        Ok(first)
    } else {
        Err(LabelerError::NameMismatch {
            requested: worker.to_string(),
            returned: first.name.clone(),
        })
    }
}

/// Scans for the record whose primary network interface address equals
/// `worker`.
pub(crate) fn find_by_address<'a>(
    instances: &'a [Instance],
    worker: &str,
) -> Result<&'a Instance, LabelerError> {
    instances
        .iter()
        .find(|instance| {
            instance
                .primary_network_interface
                .as_ref()
                .and_then(|nic| nic.primary_ipv4_address.as_deref())
                == Some(worker)
        })
        .ok_or_else(|| LabelerError::WorkerNotFound(worker.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn instance(id: &str, name: &str, zone: &str, ipv4: &str) -> Instance {
        Instance {
            id: id.to_string(),
            name: name.to_string(),
            zone: Some(Zone {
                name: zone.to_string(),
                ..Zone::default()
            }),
            primary_network_interface: Some(NetworkInterface {
                primary_ipv4_address: Some(ipv4.to_string()),
                ..NetworkInterface::default()
            }),
            ..Instance::default()
        }
    }

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-south-1").unwrap(), "us-south");
        assert_eq!(region_from_zone("eu-de-2").unwrap(), "eu-de");
        assert_eq!(region_from_zone("jp-tok-3").unwrap(), "jp-tok");
    }

    #[test]
    fn test_zone_without_separator_fails_closed() {
        let err = region_from_zone("ussouth1").unwrap_err();
        assert!(matches!(err, LabelerError::MalformedZone(_)));
    }

    #[test]
    fn test_node_info_projection() {
        let inst = instance("0717-instance", "worker-1", "us-south-1", "10.240.0.5");
        let info = NodeInfo::from_instance(&inst).unwrap();
        assert_eq!(
            info,
            NodeInfo {
                instance_id: "0717-instance".to_string(),
                region: "us-south".to_string(),
                zone: "us-south-1".to_string(),
            }
        );
    }

    #[test]
    fn test_node_info_requires_zone() {
        let mut inst = instance("0717-instance", "worker-1", "us-south-1", "10.240.0.5");
        inst.zone = None;
        let err = NodeInfo::from_instance(&inst).unwrap_err();
        assert!(matches!(err, LabelerError::MissingField(_, "zone")));
    }

    #[test]
    fn test_first_matching_name_verifies_filter() {
        let instances = vec![instance("a", "worker-2", "us-south-1", "10.240.0.5")];
        let err = first_matching_name(&instances, "worker-1").unwrap_err();
        assert!(matches!(err, LabelerError::NameMismatch { .. }));
    }

    #[test]
    fn test_first_matching_name_empty_list() {
        let err = first_matching_name(&[], "worker-1").unwrap_err();
        assert!(matches!(err, LabelerError::EmptyInstanceList));
    }

    #[test]
    fn test_find_by_address() {
        let instances = vec![
            instance("a", "worker-1", "us-south-1", "10.240.0.4"),
            instance("b", "worker-2", "us-south-2", "10.240.0.5"),
        ];
        assert_eq!(find_by_address(&instances, "10.240.0.5").unwrap().id, "b");

        let err = find_by_address(&instances, "10.240.0.9").unwrap_err();
        assert!(matches!(err, LabelerError::WorkerNotFound(w) if w == "10.240.0.9"));
    }
}
