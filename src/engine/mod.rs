// Engine module
// Connection descriptors, sessions and the per-engine drivers

pub mod config;
pub mod drivers;
pub mod error;
pub mod session;
pub mod types;

pub use config::{ConnectionDescriptor, ConnectionParams};
pub use error::{ConfigError, ConnectionError, Error, ExecutionError, Result, SecretError};
pub use session::Session;
pub use types::*;
