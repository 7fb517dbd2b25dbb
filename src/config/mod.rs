//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BreakerSettings (validated, immutable)
//!     → BreakerRegistry (defaults + per-breaker overrides)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → registry.apply_settings() retunes live breakers
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Failure classifiers are code, not config; reloads keep them

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BreakerOverride, BreakerSettings, BreakerTuning, HealthConfig, ObservabilityConfig,
    StoreBackend, StoreConfig,
};
pub use validation::ValidationError;
