//! Storage secret configuration.
//!
//! The cluster mounts a TOML secret (`slclient.toml`) holding the VPC API
//! key and the IAM / RIAAS endpoints. This module parses that document and
//! resolves it into the runtime settings the credential and resolver
//! components consume.

use std::path::Path;

use base64::Engine;
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::error::LabelerError;

/// File name of the secret TOML document mounted into the pod.
pub const CONFIG_FILE_NAME: &str = "slclient.toml";

/// Infrastructure API generation, fixed at compile time.
const VPC_GENERATION: &str = "2";

/// Infrastructure API version date, fixed at compile time.
const RIAAS_VERSION: &str = "2020-01-01";

/// Raw `slclient.toml` document.
#[derive(Debug, Deserialize)]
pub struct SecretConfig {
    /// The `[VPC]` table.
    #[serde(rename = "VPC")]
    pub vpc: VpcSecret,
}

/// `[VPC]` table of the secret document.
#[derive(Debug, Default, Deserialize)]
pub struct VpcSecret {
    /// IAM client id for the basic-auth half of the token exchange.
    #[serde(default)]
    pub iam_client_id: String,
    /// IAM client secret for the basic-auth half of the token exchange.
    #[serde(default)]
    pub iam_client_secret: String,
    /// VPC API key; base64-encoded on satellite clusters.
    #[serde(default)]
    pub g2_api_key: String,
    /// Base URL of the IAM token exchange service.
    #[serde(default)]
    pub g2_token_exchange_endpoint_url: String,
    /// Base URL of the RIAAS infrastructure API.
    #[serde(default)]
    pub g2_riaas_endpoint_url: String,
    /// Provider type marker, unused by the labeler but present in the secret.
    #[serde(default)]
    pub provider_type: Option<String>,
}

impl SecretConfig {
    /// Reads and parses the secret document at `path`.
    ///
    /// # Errors
    /// Returns a configuration error if the file cannot be read or is not
    /// valid TOML.
    pub fn load(path: &Path) -> Result<Self, LabelerError> {
        info!(path = %path.display(), "reading secret configuration");
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LabelerError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            LabelerError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }
}

/// True when running on an unmanaged (satellite) cluster, where the API key
/// in the secret is base64-encoded.
#[must_use]
pub fn satellite_cluster(iks_enabled: Option<&str>, is_satellite: Option<&str>) -> bool {
    iks_enabled != Some("True") && is_satellite == Some("True")
}

/// Reads the satellite detection flags from the environment.
#[must_use]
pub fn satellite_cluster_from_env() -> bool {
    satellite_cluster(
        std::env::var("IKS_ENABLED").ok().as_deref(),
        std::env::var("IS_SATELLITE").ok().as_deref(),
    )
}

/// Rewrites a plain `http://` endpoint to `https://`. Endpoints already on
/// `https://`, or with any other scheme, pass through unchanged.
#[must_use]
pub fn correct_endpoint(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        warn!(url, "endpoint is plain http, correcting to https");
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}

/// Resolved runtime settings derived from the secret document.
#[derive(Debug, Clone)]
pub struct StorageSecretConfig {
    /// Decoded VPC API key.
    pub api_key: String,
    /// Full IAM token exchange URL (`<base>/oidc/token`).
    pub iam_token_exchange_url: Url,
    /// Full RIAAS instances URL with generation and version query parameters.
    pub riaas_instances_url: Url,
    /// IAM basic-auth client id.
    pub iam_client_id: String,
    /// IAM basic-auth client secret.
    pub iam_client_secret: String,
}

impl StorageSecretConfig {
    /// Resolves the raw secret into runtime settings, decoding the API key
    /// on satellite clusters and validating both endpoints.
    ///
    /// # Errors
    /// Returns a configuration error if the API key is not valid base64 on a
    /// satellite cluster, or if either endpoint is not a well-formed URL with
    /// a scheme.
    pub fn from_secret(conf: SecretConfig, satellite: bool) -> Result<Self, LabelerError> {
        let vpc = conf.vpc;

        let api_key = if satellite {
            info!("decoding API key for satellite cluster");
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(vpc.g2_api_key.trim())
                .map_err(|e| LabelerError::Config(format!("API key is not valid base64: {e}")))?;
            String::from_utf8(decoded)
                .map_err(|e| LabelerError::Config(format!("decoded API key is not UTF-8: {e}")))?
        } else {
            vpc.g2_api_key
        };

        let riaas_base = correct_endpoint(&vpc.g2_riaas_endpoint_url);
        let token_base = correct_endpoint(&vpc.g2_token_exchange_endpoint_url);

        let riaas_instances_url = Url::parse(&format!(
            "{riaas_base}/v1/instances?generation={VPC_GENERATION}&version={RIAAS_VERSION}"
        ))
        .map_err(|e| {
            LabelerError::Config(format!("invalid RIAAS endpoint {riaas_base:?}: {e}"))
        })?;

        let iam_token_exchange_url =
            Url::parse(&format!("{token_base}/oidc/token")).map_err(|e| {
                LabelerError::Config(format!("invalid token exchange endpoint {token_base:?}: {e}"))
            })?;

        Ok(Self {
            api_key,
            iam_token_exchange_url,
            riaas_instances_url,
            iam_client_id: vpc.iam_client_id,
            iam_client_secret: vpc.iam_client_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SECRET_TOML: &str = r#"
[VPC]
iam_client_id = "bx"
iam_client_secret = "bx"
g2_api_key = "xxx-api-key"
g2_token_exchange_endpoint_url = "https://iam.cloud.ibm.com"
g2_riaas_endpoint_url = "https://us-south.iaas.cloud.ibm.com"
provider_type = "g2"
"#;

    #[test]
    fn test_load_secret_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SECRET_TOML.as_bytes()).unwrap();

        let conf = SecretConfig::load(file.path()).unwrap();
        assert_eq!(conf.vpc.g2_api_key, "xxx-api-key");
        assert_eq!(conf.vpc.iam_client_id, "bx");
        assert_eq!(conf.vpc.provider_type.as_deref(), Some("g2"));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = SecretConfig::load(Path::new("/nonexistent/slclient.toml")).unwrap_err();
        assert!(matches!(err, LabelerError::Config(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_resolved_urls() {
        let conf: SecretConfig = toml::from_str(SECRET_TOML).unwrap();
        let resolved = StorageSecretConfig::from_secret(conf, false).unwrap();

        assert_eq!(
            resolved.riaas_instances_url.as_str(),
            "https://us-south.iaas.cloud.ibm.com/v1/instances?generation=2&version=2020-01-01"
        );
        assert_eq!(
            resolved.iam_token_exchange_url.as_str(),
            "https://iam.cloud.ibm.com/oidc/token"
        );
        assert_eq!(resolved.api_key, "xxx-api-key");
    }

    #[test]
    fn test_empty_endpoint_is_terminal() {
        let conf: SecretConfig = toml::from_str("[VPC]\ng2_api_key = \"k\"\n").unwrap();
        let err = StorageSecretConfig::from_secret(conf, false).unwrap_err();
        assert!(matches!(err, LabelerError::Config(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_satellite_api_key_decoding() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("plain-key");
        let toml_doc = format!(
            "[VPC]\ng2_api_key = \"{encoded}\"\n\
             g2_token_exchange_endpoint_url = \"https://iam.cloud.ibm.com\"\n\
             g2_riaas_endpoint_url = \"https://us-south.iaas.cloud.ibm.com\"\n"
        );
        let conf: SecretConfig = toml::from_str(&toml_doc).unwrap();
        let resolved = StorageSecretConfig::from_secret(conf, true).unwrap();
        assert_eq!(resolved.api_key, "plain-key");
    }

    #[test]
    fn test_satellite_invalid_base64_is_config_error() {
        let conf: SecretConfig = toml::from_str(
            "[VPC]\ng2_api_key = \"not base64!!\"\n\
             g2_token_exchange_endpoint_url = \"https://iam.cloud.ibm.com\"\n\
             g2_riaas_endpoint_url = \"https://us-south.iaas.cloud.ibm.com\"\n",
        )
        .unwrap();
        let err = StorageSecretConfig::from_secret(conf, true).unwrap_err();
        assert!(matches!(err, LabelerError::Config(_)));
    }

    #[test]
    fn test_satellite_detection() {
        assert!(satellite_cluster(None, Some("True")));
        assert!(satellite_cluster(Some("False"), Some("True")));
        assert!(!satellite_cluster(Some("True"), Some("True")));
        assert!(!satellite_cluster(None, Some("False")));
        assert!(!satellite_cluster(None, None));
    }

    #[test]
    fn test_endpoint_correction() {
        assert_eq!(
            correct_endpoint("http://us-south.iaas.cloud.ibm.com"),
            "https://us-south.iaas.cloud.ibm.com"
        );
        assert_eq!(
            correct_endpoint("https://us-south.iaas.cloud.ibm.com"),
            "https://us-south.iaas.cloud.ibm.com"
        );
        assert_eq!(correct_endpoint("ftp://host"), "ftp://host");
        assert_eq!(correct_endpoint(""), "");
    }
}
