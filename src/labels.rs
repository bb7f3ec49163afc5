//! Node label reconciliation.
//!
//! Derives the canonical topology label set from a resolved instance and
//! persists it onto the node object with a full replace. A sentinel label
//! marks nodes that have already been through the pipeline so reruns become
//! no-ops.

use std::collections::BTreeMap;
use std::str::FromStr;

use k8s_openapi::api::core::v1::Node;
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::{info, warn};

use crate::error::LabelerError;
use crate::resolver::NodeInfo;

/// Legacy worker id label, kept for environments that still depend on it.
pub const WORKER_ID_LABEL: &str = "ibm-cloud.kubernetes.io/worker-id";
/// VPC instance id label.
pub const INSTANCE_ID_LABEL: &str = "ibm-cloud.kubernetes.io/vpc-instance-id";
/// Legacy failure-domain region label.
pub const FAILURE_REGION_LABEL: &str = "failure-domain.beta.kubernetes.io/region";
/// Legacy failure-domain zone label.
pub const FAILURE_ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";
/// Topology region label consumed by schedulers and CSI drivers.
pub const TOPOLOGY_REGION_LABEL: &str = "topology.kubernetes.io/region";
/// Topology zone label consumed by schedulers and CSI drivers.
pub const TOPOLOGY_ZONE_LABEL: &str = "topology.kubernetes.io/zone";
/// Sentinel marking a node that already carries the full label set.
pub const LABELS_APPLIED_SENTINEL: &str = "vpc-block-csi-driver-labels";

/// Attempts when re-applying after a write conflict.
const REAPPLY_ATTEMPTS: u32 = 3;

/// True when the node already carries the canonical labels.
///
/// Both the sentinel and the instance id key must be present: releases up to
/// 4.2.2 wrote the instance id without the sentinel, and a node labeled by
/// one of those must still be brought up to date.
#[must_use]
pub fn required_labels_present(labels: &BTreeMap<String, String>) -> bool {
    labels.contains_key(LABELS_APPLIED_SENTINEL) && labels.contains_key(INSTANCE_ID_LABEL)
}

/// Merges the canonical label set into `labels`. Idempotent for a given
/// `NodeInfo`.
pub fn apply_labels(labels: &mut BTreeMap<String, String>, info: &NodeInfo) {
    labels.insert(WORKER_ID_LABEL.to_string(), info.instance_id.clone());
    labels.insert(INSTANCE_ID_LABEL.to_string(), info.instance_id.clone());
    labels.insert(FAILURE_REGION_LABEL.to_string(), info.region.clone());
    labels.insert(FAILURE_ZONE_LABEL.to_string(), info.zone.clone());
    labels.insert(TOPOLOGY_REGION_LABEL.to_string(), info.region.clone());
    labels.insert(TOPOLOGY_ZONE_LABEL.to_string(), info.zone.clone());
    labels.insert(LABELS_APPLIED_SENTINEL.to_string(), "true".to_string());
}

/// What to do when the node write loses an optimistic-concurrency race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Treat the conflict as success and leave the node to the other writer.
    #[default]
    Tolerate,
    /// Re-read the node and re-apply the labels, a bounded number of times.
    Reapply,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tolerate" => Ok(Self::Tolerate),
            "reapply" => Ok(Self::Reapply),
            other => Err(format!(
                "unknown conflict policy {other:?}, expected \"tolerate\" or \"reapply\""
            )),
        }
    }
}

/// Applies topology labels to a node and persists them via the cluster API.
pub struct LabelReconciler {
    nodes: Api<Node>,
    policy: ConflictPolicy,
}

impl LabelReconciler {
    /// Creates a reconciler over the cluster's node API.
    #[must_use]
    pub fn new(client: Client, policy: ConflictPolicy) -> Self {
        Self {
            nodes: Api::all(client),
            policy,
        }
    }

    /// Merges the canonical labels into `node` and submits a full update.
    ///
    /// A conflicting concurrent write is handled per the configured policy;
    /// every other update failure is propagated.
    ///
    /// # Errors
    /// Returns an error when the node has no name, when the update fails for
    /// a reason other than a conflict, or when the reapply policy runs out
    /// of attempts.
    pub async fn reconcile(&self, node: &mut Node, info: &NodeInfo) -> Result<(), LabelerError> {
        let name = node
            .metadata
            .name
            .clone()
            .ok_or_else(|| LabelerError::Config("node object has no name".to_string()))?;

        apply_labels(node.metadata.labels.get_or_insert_with(BTreeMap::new), info);

        match self.nodes.replace(&name, &PostParams::default(), node).await {
            Ok(_) => {
                info!(node = %name, "applied topology labels");
                Ok(())
            }
            Err(kube::Error::Api(resp)) if resp.code == 409 => {
                self.handle_conflict(&name, info).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_conflict(&self, name: &str, info: &NodeInfo) -> Result<(), LabelerError> {
        match self.policy {
            ConflictPolicy::Tolerate => {
                warn!(
                    node = name,
                    "node update conflicted with another writer, treating labels as applied"
                );
                Ok(())
            }
            ConflictPolicy::Reapply => {
                for attempt in 1..=REAPPLY_ATTEMPTS {
                    let mut node = self.nodes.get(name).await?;
                    apply_labels(node.metadata.labels.get_or_insert_with(BTreeMap::new), info);
                    match self.nodes.replace(name, &PostParams::default(), &node).await {
                        Ok(_) => {
                            info!(node = name, attempt, "applied topology labels after conflict");
                            return Ok(());
                        }
                        Err(kube::Error::Api(resp)) if resp.code == 409 => {
                            warn!(node = name, attempt, "node update conflicted again");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(LabelerError::Api {
                    status: 409,
                    message: format!(
                        "node {name} update kept conflicting after {REAPPLY_ATTEMPTS} attempts"
                    ),
                })
            }
        }
    }
}
