//! Shared types, error model, and configuration for contribmerge.
//!
//! This crate is the foundation depended on by all other contribmerge crates.
//! It provides:
//! - [`ContribMergeError`]: the unified error type
//! - Domain types ([`Entry`], [`CategoryBatch`], [`MergeDecision`])
//! - Configuration ([`AppConfig`], [`Credentials`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CategoryRule, Credentials, DocumentConfig, GithubConfig, ModelsConfig,
    config_dir, config_file_path, init_config, init_config_at, load_config, load_config_from,
    resolve_credentials, resolve_credentials_with,
};
pub use error::{ContribMergeError, Result};
pub use types::{CategoryBatch, DecisionKind, Entry, MergeDecision};
