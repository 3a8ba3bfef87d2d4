//! Common utilities and shared types for relgraph.
//!
//! This crate provides foundational components used across all relgraph crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Telemetry**: `tracing` subscriber installation
//!
//! # Example
//!
//! ```no_run
//! use relgraph_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     relgraph_common::telemetry::init_tracing(&config.logging)?;
//!     let id = IdGenerator::new().generate();
//!     tracing::info!(id = %id, "Generated ID");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod telemetry;

pub use config::{
    Config, DatabaseConfig, FederationConfig, FollowingConfig, LoggingConfig, RedisConfig,
    ServerConfig,
};
pub use error::{AppError, AppResult, BlockKind};
pub use id::IdGenerator;
