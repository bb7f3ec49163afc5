//! Init-time labeler that stamps VPC instance topology onto a Kubernetes node.
//!
//! Runs once per node: it resolves the cloud instance backing the current
//! worker (by name or by primary IPv4 address), derives its region and zone,
//! and merges the canonical topology labels into the node object so that
//! schedulers and storage drivers can rely on accurate placement metadata.
//!
//! # Example
//!
//! ```rust,ignore
//! use vpc_node_labeler::config::{SecretConfig, StorageSecretConfig};
//! use vpc_node_labeler::iam::TokenExchange;
//! use vpc_node_labeler::resolver::{InstanceResolver, RiaasClient};
//! use vpc_node_labeler::retry::RetryConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let secret = SecretConfig::load("/etc/storage_ibmc/slclient.toml".as_ref())?;
//! let config = StorageSecretConfig::from_secret(secret, false)?;
//!
//! let retry = RetryConfig::default();
//! let token = TokenExchange::new(config.clone())?.exchange(&retry).await?;
//!
//! let resolver = RiaasClient::new(&config, token, retry)?;
//! let info = resolver.resolve("10.240.0.5").await?;
//! println!("{} is in {}/{}", info.instance_id, info.region, info.zone);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod iam;
pub mod labels;
pub mod resolver;
pub mod retry;

pub use error::LabelerError;
pub use labels::{ConflictPolicy, LabelReconciler};
pub use resolver::{FakeResolver, InstanceResolver, NodeInfo, RiaasClient};
pub use retry::{with_retry, RetryConfig};
