//! Cloud secret resolution.
//!
//! A connection build may name a secret held in AWS Secrets Manager or GCP
//! Secret Manager. The secret payload is a JSON object whose fields replace
//! the directly supplied connection parameters. Stores implement the
//! [`SecretStore`] capability so descriptor building stays independent of
//! any one cloud SDK, and tests can substitute an in-memory store.

pub mod aws;
pub mod gcp;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::engine::error::SecretError;

pub use aws::AwsSecretsManager;
pub use gcp::GcpSecretManager;

/// Clouds a secret can be fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Aws,
    Gcp,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProvider {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "gcp" => Ok(CloudProvider::Gcp),
            other => Err(SecretError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Fetches the raw secret payload for a secret id.
///
/// One method on purpose: each store authenticates however its cloud does
/// and returns the payload text; parsing is shared in [`resolve`].
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, secret_id: &str) -> Result<String, SecretError>;
}

/// Credential fields recognized inside a secret payload.
///
/// Absent keys stay `None` and leave the directly supplied parameter
/// untouched during the merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedCredential {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub schema: Option<String>,
    pub snowflake_role: Option<String>,
    pub snowflake_warehouse: Option<String>,
    pub snowflake_account: Option<String>,
}

/// Builds the store for a provider tag. `region` applies to AWS only;
/// `project` applies to GCP only.
pub fn store_for(
    provider: CloudProvider,
    region: &str,
    project: Option<&str>,
) -> Box<dyn SecretStore> {
    match provider {
        CloudProvider::Aws => Box::new(AwsSecretsManager::new(region)),
        CloudProvider::Gcp => Box::new(GcpSecretManager::new(project.map(str::to_string))),
    }
}

/// Fetches a secret and parses its payload into credential fields.
pub async fn resolve(
    store: &dyn SecretStore,
    provider: CloudProvider,
    secret_id: &str,
) -> Result<ResolvedCredential, SecretError> {
    let secret_id = secret_id.trim();
    if secret_id.is_empty() {
        return Err(SecretError::EmptySecretId);
    }
    let payload = store.fetch(secret_id).await?;
    parse_payload(provider, &payload)
}

/// Parses a secret payload. The payload must be a JSON object; key lookup
/// is case-insensitive because providers and humans disagree on casing.
pub fn parse_payload(
    provider: CloudProvider,
    payload: &str,
) -> Result<ResolvedCredential, SecretError> {
    let json: JsonValue = serde_json::from_str(payload)
        .map_err(|e| SecretError::parse(provider, format!("payload is not valid JSON: {e}")))?;
    let object = json
        .as_object()
        .ok_or_else(|| SecretError::parse(provider, "payload is not a JSON object"))?;

    let mut fields: HashMap<String, &JsonValue> = HashMap::new();
    for (key, value) in object {
        fields.insert(key.to_ascii_lowercase(), value);
    }

    let port = match fields.get("port") {
        None | Some(JsonValue::Null) => None,
        Some(value) => Some(parse_port(provider, value)?),
    };

    Ok(ResolvedCredential {
        username: text_field(&fields, "username"),
        password: text_field(&fields, "password"),
        host: text_field(&fields, "host"),
        port,
        schema: text_field(&fields, "schema"),
        snowflake_role: text_field(&fields, "snowflake_role"),
        snowflake_warehouse: text_field(&fields, "snowflake_warehouse"),
        snowflake_account: text_field(&fields, "snowflake_account"),
    })
}

fn text_field(fields: &HashMap<String, &JsonValue>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_port(provider: CloudProvider, value: &JsonValue) -> Result<u16, SecretError> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        JsonValue::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| SecretError::parse(provider, format!("port is not a valid u16: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticStore(String);

    #[async_trait]
    impl SecretStore for StaticStore {
        async fn fetch(&self, _secret_id: &str) -> Result<String, SecretError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn provider_parses_known_tags_case_insensitively() {
        assert_eq!("aws".parse::<CloudProvider>().ok(), Some(CloudProvider::Aws));
        assert_eq!("GCP".parse::<CloudProvider>().ok(), Some(CloudProvider::Gcp));
    }

    #[test]
    fn provider_rejects_unknown_clouds_without_touching_the_network() {
        let err = "azure".parse::<CloudProvider>().unwrap_err();
        assert_eq!(err, SecretError::UnsupportedProvider("azure".into()));
    }

    #[test]
    fn payload_keys_are_case_insensitive() {
        let payload = r#"{"USERNAME":"svc","Password":"pw","HOST":"db.internal","PORT":5432}"#;
        let resolved = parse_payload(CloudProvider::Aws, payload).expect("should parse");
        assert_eq!(resolved.username.as_deref(), Some("svc"));
        assert_eq!(resolved.password.as_deref(), Some("pw"));
        assert_eq!(resolved.host.as_deref(), Some("db.internal"));
        assert_eq!(resolved.port, Some(5432));
    }

    #[test]
    fn port_accepts_both_number_and_string() {
        let as_number = parse_payload(CloudProvider::Aws, r#"{"port":3306}"#).expect("number");
        assert_eq!(as_number.port, Some(3306));
        let as_string = parse_payload(CloudProvider::Aws, r#"{"port":"3306"}"#).expect("string");
        assert_eq!(as_string.port, Some(3306));
    }

    #[test]
    fn invalid_port_is_a_parse_error() {
        let err = parse_payload(CloudProvider::Gcp, r#"{"port":"not-a-port"}"#).unwrap_err();
        assert!(matches!(
            err,
            SecretError::Parse {
                provider: CloudProvider::Gcp,
                ..
            }
        ));
    }

    #[test]
    fn non_object_payload_is_a_parse_error() {
        assert!(parse_payload(CloudProvider::Aws, r#"["a","b"]"#).is_err());
        assert!(parse_payload(CloudProvider::Aws, "not json at all").is_err());
    }

    #[test]
    fn unrecognized_payload_keys_are_ignored() {
        let payload = r#"{"password":"pw","engine":"postgres","dbClusterIdentifier":"x"}"#;
        let resolved = parse_payload(CloudProvider::Aws, payload).expect("should parse");
        assert_eq!(resolved.password.as_deref(), Some("pw"));
        assert_eq!(resolved.username, None);
    }

    #[tokio::test]
    async fn resolve_rejects_an_empty_secret_id() {
        let store = StaticStore(r#"{"password":"pw"}"#.into());
        let err = resolve(&store, CloudProvider::Aws, "   ").await.unwrap_err();
        assert_eq!(err, SecretError::EmptySecretId);
    }

    #[tokio::test]
    async fn resolve_parses_the_store_payload() {
        let store = StaticStore(r#"{"username":"svc","snowflake_role":"LOADER"}"#.into());
        let resolved = resolve(&store, CloudProvider::Gcp, "shared/db")
            .await
            .expect("should resolve");
        assert_eq!(resolved.username.as_deref(), Some("svc"));
        assert_eq!(resolved.snowflake_role.as_deref(), Some("LOADER"));
        assert_eq!(resolved.password, None);
    }
}
