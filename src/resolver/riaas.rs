//! Live RIAAS-backed instance resolver.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use super::models::{Instance, InstanceList};
use super::{find_by_address, first_matching_name, InstanceResolver, NodeInfo};
use crate::config::StorageSecretConfig;
use crate::error::{classify_transport, LabelerError};
use crate::retry::{with_retry, RetryConfig};

/// Default timeout for instance list requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Resolver backed by the RIAAS instances endpoint.
pub struct RiaasClient {
    client: Client,
    instances_url: Url,
    access_token: String,
    retry: RetryConfig,
}

impl RiaasClient {
    /// Creates a resolver for the configured instances endpoint using a
    /// previously exchanged access token.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        config: &StorageSecretConfig,
        access_token: String,
        retry: RetryConfig,
    ) -> Result<Self, LabelerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            instances_url: config.riaas_instances_url.clone(),
            access_token,
            retry,
        })
    }

    /// Fetches the instance listing at `url`, retrying connection failures.
    async fn fetch_instances(&self, url: Url) -> Result<Vec<Instance>, LabelerError> {
        debug!(url = %url, "listing instances from the VPC provider");

        let response = with_retry(&self.retry, "list instances", || async {
            self.client
                .get(url.clone())
                .header(AUTHORIZATION, self.access_token.as_str())
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .send()
                .await
                .map_err(classify_transport)
        })
        .await?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(LabelerError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let list: InstanceList = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "failed to unmarshal instances response");
            LabelerError::Serialization(e)
        })?;
        if list.instances.is_empty() {
            return Err(LabelerError::EmptyInstanceList);
        }
        Ok(list.instances)
    }

    /// Name lookup: lets the API filter by `name` and verifies the first
    /// returned record actually matches.
    async fn resolve_by_name(&self, worker: &str) -> Result<NodeInfo, LabelerError> {
        let mut url = self.instances_url.clone();
        url.query_pairs_mut().append_pair("name", worker);

        let instances = self.fetch_instances(url).await?;
        NodeInfo::from_instance(first_matching_name(&instances, worker)?)
    }

    /// Address lookup: scans the unfiltered listing for the instance whose
    /// primary interface carries the worker's address.
    async fn resolve_by_address(&self, worker: &str) -> Result<NodeInfo, LabelerError> {
        let instances = self.fetch_instances(self.instances_url.clone()).await?;
        NodeInfo::from_instance(find_by_address(&instances, worker)?)
    }
}

#[async_trait]
impl InstanceResolver for RiaasClient {
    async fn resolve(&self, worker: &str) -> Result<NodeInfo, LabelerError> {
        let info = if worker.parse::<IpAddr>().is_ok() {
            info!(worker, "worker name is an IP literal, matching by address");
            self.resolve_by_address(worker).await?
        } else {
            info!(worker, "matching instance by name");
            self.resolve_by_name(worker).await?
        };

        info!(
            instance_id = %info.instance_id,
            region = %info.region,
            zone = %info.zone,
            "resolved instance placement"
        );
        Ok(info)
    }
}
