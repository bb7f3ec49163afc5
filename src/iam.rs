//! IAM token exchange.
//!
//! Turns the stored VPC API key into a short-lived bearer token by POSTing
//! a form-encoded grant to the IAM token endpoint with basic-auth client
//! credentials.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::StorageSecretConfig;
use crate::error::{classify_transport, LabelerError};
use crate::retry::{with_retry, RetryConfig};

/// OAuth grant type for API-key token exchange.
const GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Default timeout for token exchange requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Token endpoint response. Only `access_token` drives behavior; the expiry
/// metadata is kept for completeness.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    /// The bearer token.
    pub access_token: String,
    /// Refresh token, unused by the one-shot labeler.
    pub refresh_token: Option<String>,
    /// Token type, normally `Bearer`.
    pub token_type: Option<String>,
    /// Seconds until expiry.
    pub expires_in: Option<i64>,
    /// Absolute expiry as a unix timestamp.
    pub expiration: Option<i64>,
}

/// Client for the IAM token exchange endpoint.
pub struct TokenExchange {
    client: Client,
    config: StorageSecretConfig,
}

impl TokenExchange {
    /// Creates a token exchange client for the configured endpoint.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: StorageSecretConfig) -> Result<Self, LabelerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    /// Exchanges the stored API key for a bearer access token.
    ///
    /// Connection failures are retried per `retry`; a non-200 status or an
    /// undecodable body is terminal.
    ///
    /// # Errors
    /// Returns an API error carrying the status code when the exchange is
    /// rejected, or a serialization error when the response body is not the
    /// expected JSON.
    pub async fn exchange(&self, retry: &RetryConfig) -> Result<String, LabelerError> {
        let form = [
            ("grant_type", GRANT_TYPE),
            ("apikey", self.config.api_key.as_str()),
        ];

        let response = with_retry(retry, "iam token exchange", || async {
            self.client
                .post(self.config.iam_token_exchange_url.clone())
                .basic_auth(&self.config.iam_client_id, Some(&self.config.iam_client_secret))
                .header(ACCEPT, "application/json")
                .form(&form)
                .send()
                .await
                .map_err(classify_transport)
        })
        .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LabelerError::Api {
                status: status.as_u16(),
                message: "token exchange rejected, check the provided API key".to_string(),
            });
        }

        let body = response.text().await.map_err(classify_transport)?;
        let token: AccessTokenResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "failed to decode access token response");
            LabelerError::Serialization(e)
        })?;

        info!("obtained IAM access token in exchange for the API key");
        Ok(token.access_token)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_config(token_url: &str) -> StorageSecretConfig {
        StorageSecretConfig {
            api_key: "test-api-key".to_string(),
            iam_token_exchange_url: Url::parse(token_url).unwrap(),
            riaas_instances_url: Url::parse(
                "https://us-south.iaas.cloud.ibm.com/v1/instances?generation=2&version=2020-01-01",
            )
            .unwrap(),
            iam_client_id: "bx".to_string(),
            iam_client_secret: "bx".to_string(),
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            interval: std::time::Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_exchange_returns_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oidc/token"))
            .and(header("accept", "application/json"))
            .and(body_string_contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"))
            .and(body_string_contains("apikey=test-api-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"access_token":"tok-123","token_type":"Bearer","expires_in":3600}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let exchange =
            TokenExchange::new(test_config(&format!("{}/oidc/token", server.uri()))).unwrap();
        let token = exchange.exchange(&fast_retry()).await.unwrap();
        assert_eq!(token, "tok-123");
    }

    #[tokio::test]
    async fn test_exchange_sends_basic_auth() {
        let server = MockServer::start().await;
        // base64("bx:bx")
        Mock::given(method("POST"))
            .and(path("/oidc/token"))
            .and(header("authorization", "Basic Yng6Yng="))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"access_token":"tok-123"}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let exchange =
            TokenExchange::new(test_config(&format!("{}/oidc/token", server.uri()))).unwrap();
        assert!(exchange.exchange(&fast_retry()).await.is_ok());
    }

    #[tokio::test]
    async fn test_non_200_is_terminal_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oidc/token"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let exchange =
            TokenExchange::new(test_config(&format!("{}/oidc/token", server.uri()))).unwrap();
        let err = exchange.exchange(&fast_retry()).await.unwrap_err();
        assert!(matches!(err, LabelerError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oidc/token"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("not json", "application/json"))
            .mount(&server)
            .await;

        let exchange =
            TokenExchange::new(test_config(&format!("{}/oidc/token", server.uri()))).unwrap();
        let err = exchange.exchange(&fast_retry()).await.unwrap_err();
        assert!(matches!(err, LabelerError::Serialization(_)));
    }
}
