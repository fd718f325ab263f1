//! mod `api` provides the topmost fundamental APIs for users of this crate.
//! Sentinel must be initialized before loading rules, via one of three ways:
//!
//!  1. `init_default()`, using default config to initialize.
//!  2. `init_with_config(config_entity: config::ConfigEntity)`, using a customized config entity.
//!  3. `init_with_config_file(config_path: &mut String)`, using a YAML file.

mod api;
mod init;
mod slot_chain;

pub use api::*;
pub use init::*;
pub use slot_chain::*;
