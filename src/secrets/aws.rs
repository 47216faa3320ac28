//! AWS Secrets Manager store.
//!
//! Credentials come from the ambient AWS chain (environment, shared
//! profile, instance role); only the region is taken from connection
//! parameters.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use tracing::{debug, instrument};

use crate::engine::error::SecretError;
use crate::secrets::{CloudProvider, SecretStore};

/// Region used when the connection parameters leave it unset.
pub const DEFAULT_REGION: &str = "us-east-1";

pub struct AwsSecretsManager {
    region: String,
}

impl AwsSecretsManager {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

#[async_trait]
impl SecretStore for AwsSecretsManager {
    #[instrument(skip(self), fields(region = %self.region))]
    async fn fetch(&self, secret_id: &str) -> Result<String, SecretError> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .load()
            .await;
        let client = Client::new(&config);

        let output = client
            .get_secret_value()
            .secret_id(secret_id)
            .send()
            .await
            .map_err(|e| {
                SecretError::fetch(CloudProvider::Aws, DisplayErrorContext(&e).to_string())
            })?;

        if let Some(text) = output.secret_string() {
            debug!("resolved SecretString payload");
            return Ok(text.to_string());
        }
        // The SDK hands SecretBinary over already base64-decoded.
        if let Some(blob) = output.secret_binary() {
            debug!("resolved SecretBinary payload");
            return String::from_utf8(blob.clone().into_inner()).map_err(|e| {
                SecretError::parse(CloudProvider::Aws, format!("binary secret is not UTF-8: {e}"))
            });
        }
        Err(SecretError::fetch(
            CloudProvider::Aws,
            "secret has neither a string nor a binary payload",
        ))
    }
}
