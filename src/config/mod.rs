//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the Runner, borrowed by every factory
//! ```
//!
//! # Design Decisions
//! - Config is an immutable snapshot; the only startup rewrite is the RPC dialer
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApolloConfig, AppConfig, BroadcastConfig, DisconnectQueueConfig, GatewayConfig, JwtConfig,
    LoggingConfig, MetricsConfig, RpcConfig, ServerConfig, StreamRouteConfig, TlsConfig,
    WsRpcConfig,
};
pub use validation::{validate_config, ValidationError};
