#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # Sentinel in Rust
//!
//! Sentinel takes "flow" as its breakthrough point, and works across
//! **flow control**, **concurrency isolation**, **circuit breaking** and
//! **system adaptive protection**, to guarantee reliability and resilience
//! for services.
//!
//! Sentinel adopts the Chain-of-Responsibility pattern: user-defined rules
//! are automatically checked via slots chained in `base::SlotChain`.
//! Generally, there are several steps when using Sentinel:
//! 1. Initialize Sentinel's configuration.
//! 2. Define a resource to be protected and build a Sentinel entry.
//! 3. Load the rules defined for each resource.
//! 4. Write code at the entry and exit points.
//!
//! ## Add Dependency
//!
//! Add the dependency in `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sentinel-rs = "0.1.0"
//! ```
//!
//! Optional features:
//! - logger_env: Use `env_logger` to initialize logging.
//! - logger_log4rs: Use `log4rs` to initialize logging.
//!
//! ## General Configuration and Initialization
//!
//! Sentinel needs to be initialized before loading rules. The `api` module
//! provides three ways to do so:
//!
//! - `init_default()`: Load configuration from environment variables, falling
//!   back to default values for anything undefined.
//! - `init_with_config_file(config_path: &mut String)`: Load configuration
//!   from a YAML file.
//! - `init_with_config(config_entity: ConfigEntity)`: Use a hand-crafted
//!   `ConfigEntity` to initialize Sentinel.
//!
//! Example:
//!
//! ```rust
//! use sentinel_rs::{init_default, logging};
//! init_default().unwrap_or_else(|err| logging::error!("{:?}", err));
//! ```
//!
//! ## Resource Definition
//!
//! A snippet of code is regarded as a resource in Sentinel, which can be
//! protected by defining its entry.
//!
//! By constructing `EntryBuilder` and calling `build()`, an `Entry` is
//! created. If the call is blocked, `build()` returns an error.
//!
//! ```rust
//! use sentinel_rs::base;
//! use sentinel_rs::EntryBuilder;
//! let entry_builder = EntryBuilder::new(res_name.clone())
//!     .with_traffic_type(base::TrafficType::Inbound);
//! if let Ok(entry) = entry_builder.build() {
//!     // The request is allowed to be processed.
//!     // After finishing the logic, exit the entry.
//!     entry.exit()
//! } else {
//!     // The request is blocked; there is no need to call `exit()`.
//! }
//! ```
//!
//! ## Load Sentinel Rules
//!
//! Sentinel supports loading hand-crafted rules. `load_rules()` overwrites
//! all previously-defined rules for the affected resources; `append_rules()`
//! appends incrementally. For example:
//!
//! ```rust
//! flow::load_rules(vec![Arc::new(flow::Rule {
//!     resource: "example".into(),
//!     threshold: 10.0,
//!     calculate_strategy: flow::CalculateStrategy::Direct,
//!     control_strategy: flow::ControlStrategy::Reject,
//!     ..Default::default()
//! })]);
//! ```

/// Sentinel API
pub mod api;
/// Core implementations of Sentinel, including the statistic structures
/// (the sliding window and its underlying leap array), the rule managers for
/// flow control, isolation, circuit breaking and system adaptive protection,
/// and supporting configuration utilities.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
/// Utility functions for Sentinel.
pub mod utils;

// re-export precludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
