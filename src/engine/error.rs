//! Error taxonomy for the connection facade.
//!
//! Failures are staged: configuration problems surface before any secret
//! lookup, secret problems before any connection attempt, and connection
//! problems before any statement runs. Each stage has its own enum so
//! callers can match on the stage without parsing messages.

use thiserror::Error;

use crate::engine::types::EngineType;
use crate::secrets::CloudProvider;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("secret resolution error: {0}")]
    Secret(#[from] SecretError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

/// Raised while turning named parameters into a connection descriptor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required parameters are absent or blank for the requested engine.
    /// Every missing key is listed so the caller can fix the whole set in
    /// one pass.
    #[error("missing required parameters for {engine}: {}", .fields.join(", "))]
    MissingFields {
        engine: EngineType,
        fields: Vec<String>,
    },

    #[error("unknown engine type: {0:?}")]
    UnknownEngine(String),
}

/// Raised while resolving credentials from a cloud secret manager.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    /// The provider tag named a cloud this crate does not speak to.
    /// Checked before any network traffic.
    #[error("unsupported secret manager cloud: {0:?} (expected \"aws\" or \"gcp\")")]
    UnsupportedProvider(String),

    #[error("secret id is empty")]
    EmptySecretId,

    #[error("failed to fetch secret from {provider}: {message}")]
    Fetch {
        provider: CloudProvider,
        message: String,
    },

    #[error("failed to parse secret payload from {provider}: {message}")]
    Parse {
        provider: CloudProvider,
        message: String,
    },
}

impl SecretError {
    pub fn fetch(provider: CloudProvider, message: impl Into<String>) -> Self {
        Self::Fetch {
            provider,
            message: message.into(),
        }
    }

    pub fn parse(provider: CloudProvider, message: impl Into<String>) -> Self {
        Self::Parse {
            provider,
            message: message.into(),
        }
    }
}

/// Raised while opening a session or when the link underneath one is gone.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {engine}: {message}")]
    Failed {
        engine: EngineType,
        message: String,
    },

    /// The engine's descriptor and DSN are fully supported but no wire
    /// driver is compiled in. Raised before any network I/O.
    #[error("no driver available for {0}")]
    DriverUnavailable(EngineType),

    /// The connection was lost underneath an open session.
    #[error("connection dropped: {0}")]
    Dropped(String),

    #[error("session is closed")]
    SessionClosed,
}

impl ConnectionError {
    pub fn failed(engine: EngineType, message: impl Into<String>) -> Self {
        Self::Failed {
            engine,
            message: message.into(),
        }
    }
}

/// Raised by statement execution and dataframe writes.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The engine rejected or aborted the statement. Carries the driver's
    /// native message untranslated.
    #[error("statement failed: {0}")]
    Statement(String),

    #[error("unsupported write mode: {0:?} (only \"replace\" is implemented)")]
    UnsupportedMode(String),

    #[error("dataframe has no columns")]
    EmptyDataFrame,

    #[error("column {column:?} has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}
