//! Deterministic resolver for tests and embedding without a live API.

use std::net::IpAddr;

use async_trait::async_trait;

use super::models::Instance;
use super::{find_by_address, first_matching_name, InstanceResolver, NodeInfo};
use crate::error::LabelerError;

/// In-memory resolver backed by a fixed instance list.
///
/// Applies the same dispatch, matching and derivation rules as the live
/// client, including the client-side equivalent of the server's `name`
/// filter.
#[derive(Debug, Default)]
pub struct FakeResolver {
    instances: Vec<Instance>,
}

impl FakeResolver {
    /// Creates a resolver over the given instance list.
    #[must_use]
    pub fn new(instances: Vec<Instance>) -> Self {
        Self { instances }
    }
}

#[async_trait]
impl InstanceResolver for FakeResolver {
    async fn resolve(&self, worker: &str) -> Result<NodeInfo, LabelerError> {
        if self.instances.is_empty() {
            return Err(LabelerError::EmptyInstanceList);
        }

        if worker.parse::<IpAddr>().is_ok() {
            NodeInfo::from_instance(find_by_address(&self.instances, worker)?)
        } else {
            let filtered: Vec<Instance> = self
                .instances
                .iter()
                .filter(|instance| instance.name == worker)
                .cloned()
                .collect();
            NodeInfo::from_instance(first_matching_name(&filtered, worker)?)
        }
    }
}
