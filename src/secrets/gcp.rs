//! GCP Secret Manager store.
//!
//! Authenticates against the instance metadata server, so it works
//! unmodified on GCE, GKE and Cloud Run workloads with a service account
//! attached. The project comes from the connection parameters, the
//! `GOOGLE_CLOUD_PROJECT` environment variable, or the metadata server, in
//! that order.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::engine::error::SecretError;
use crate::secrets::{CloudProvider, SecretStore};

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const METADATA_PROJECT_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/project/project-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

#[derive(Deserialize)]
struct AccessSecretVersion {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    /// Base64-encoded secret bytes, per the Secret Manager REST API.
    data: String,
}

pub struct GcpSecretManager {
    http: reqwest::Client,
    project: Option<String>,
}

impl GcpSecretManager {
    pub fn new(project: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            project,
        }
    }

    async fn project(&self) -> Result<String, SecretError> {
        if let Some(project) = &self.project {
            return Ok(project.clone());
        }
        if let Ok(project) = std::env::var("GOOGLE_CLOUD_PROJECT") {
            if !project.trim().is_empty() {
                return Ok(project.trim().to_string());
            }
        }
        let project = self
            .http
            .get(METADATA_PROJECT_URL)
            .header("Metadata-Flavor", "Google")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                SecretError::fetch(CloudProvider::Gcp, format!("project lookup failed: {e}"))
            })?
            .text()
            .await
            .map_err(|e| {
                SecretError::fetch(CloudProvider::Gcp, format!("project lookup failed: {e}"))
            })?;
        Ok(project.trim().to_string())
    }

    async fn access_token(&self) -> Result<String, SecretError> {
        let token: MetadataToken = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                SecretError::fetch(CloudProvider::Gcp, format!("token lookup failed: {e}"))
            })?
            .json()
            .await
            .map_err(|e| {
                SecretError::fetch(CloudProvider::Gcp, format!("token lookup failed: {e}"))
            })?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for GcpSecretManager {
    #[instrument(skip(self))]
    async fn fetch(&self, secret_id: &str) -> Result<String, SecretError> {
        let project = self.project().await?;
        let token = self.access_token().await?;
        let url = format!(
            "https://secretmanager.googleapis.com/v1/projects/{project}/secrets/{secret_id}/versions/latest:access"
        );

        let version: AccessSecretVersion = self
            .http
            .get(&url)
            .bearer_auth(&token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SecretError::fetch(CloudProvider::Gcp, e.to_string()))?
            .json()
            .await
            .map_err(|e| {
                SecretError::parse(CloudProvider::Gcp, format!("unexpected access response: {e}"))
            })?;

        let bytes = STANDARD.decode(version.payload.data.as_bytes()).map_err(|e| {
            SecretError::parse(CloudProvider::Gcp, format!("payload is not valid base64: {e}"))
        })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            SecretError::parse(CloudProvider::Gcp, format!("payload is not UTF-8: {e}"))
        })?;
        debug!("resolved secret version payload");
        Ok(text)
    }
}
