//! Init binary that labels the current Kubernetes node with its VPC
//! instance topology.
//!
//! Runs once per node, typically as an init container: it looks up the node
//! object, skips already-labeled nodes, exchanges the stored API key for an
//! IAM token, resolves the backing VPC instance and writes the topology
//! labels back to the cluster. Any unrecoverable failure exits non-zero.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client, ResourceExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vpc_node_labeler::config::{
    satellite_cluster_from_env, SecretConfig, StorageSecretConfig, CONFIG_FILE_NAME,
};
use vpc_node_labeler::iam::TokenExchange;
use vpc_node_labeler::labels::{required_labels_present, ConflictPolicy, LabelReconciler};
use vpc_node_labeler::resolver::{InstanceResolver, RiaasClient};
use vpc_node_labeler::retry::{with_retry, RetryConfig};
use vpc_node_labeler::LabelerError;

/// VPC node labeler - stamps instance topology labels onto a cluster node.
#[derive(Parser)]
#[command(name = "vpc-node-labeler")]
#[command(about = "Label a Kubernetes node with its VPC instance topology")]
struct Cli {
    /// Name of the node this process labels (hostname or IPv4 address).
    #[arg(long, env = "NODE_NAME")]
    node_name: String,

    /// Directory holding the storage secret configuration.
    #[arg(long, env = "SECRET_CONFIG_PATH", default_value = "/etc/storage_ibmc")]
    config_dir: PathBuf,

    /// What to do when the node update loses a write race: "tolerate" or
    /// "reapply".
    #[arg(long, env = "LABEL_CONFLICT_POLICY", default_value = "tolerate")]
    on_conflict: ConflictPolicy,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!(node = %cli.node_name, "starting VPC node labeler");

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;
    let nodes: Api<Node> = Api::all(client.clone());

    let retry = RetryConfig::default();

    info!("fetching node details");
    let mut node = with_retry(&retry, "get node", || async {
        nodes.get(&cli.node_name).await.map_err(LabelerError::from)
    })
    .await
    .with_context(|| format!("failed to get node {}", cli.node_name))?;

    if required_labels_present(node.labels()) {
        info!(node = %cli.node_name, "required labels already present, nothing to do");
        return Ok(());
    }

    let secret = SecretConfig::load(&cli.config_dir.join(CONFIG_FILE_NAME))
        .context("failed to read storage secret configuration")?;
    let config = StorageSecretConfig::from_secret(secret, satellite_cluster_from_env())
        .context("failed to resolve storage secret configuration")?;

    let token = TokenExchange::new(config.clone())?
        .exchange(&retry)
        .await
        .context("failed to obtain IAM access token")?;

    let resolver = RiaasClient::new(&config, token, retry)?;
    let node_info = resolver
        .resolve(&cli.node_name)
        .await
        .with_context(|| format!("failed to resolve instance for node {}", cli.node_name))?;

    LabelReconciler::new(client, cli.on_conflict)
        .reconcile(&mut node, &node_info)
        .await
        .with_context(|| format!("failed to update labels on node {}", cli.node_name))?;

    info!(node = %cli.node_name, "node labeling complete");
    Ok(())
}
