//! Layered, validated runtime configuration for the STT gateway.
//!
//! Supports loading configuration from:
//! - TOML files (`config/default.toml`, `config/{env}.toml`)
//! - Environment variables (`STT_GATEWAY_` prefix, `__` for nesting)
//! - In-process overrides for tests

pub mod constants;
pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{
    load_settings, ObservabilityConfig, PersistenceConfig, RuntimeEnvironment, ServerConfig,
    Settings, SttConfig,
};
