//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ChannelsConfig (validated, immutable)
//!     → ChannelSpec / LifecycleConfig / RetryPolicy per service
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All sections have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_str, ConfigError};
pub use schema::{
    ChannelsConfig, LifecycleConfig, LogFormat, ObservabilityConfig, RetryConfig, ServiceConfig,
};
pub use validation::{validate_config, ValidationError};
