//! Graft Config assembles the options of a resolution batch from layered sources.
//!
//! Graft Config is split into two major parts:
//! 1. ResolverConfig: The final, flat set of options handed to the resolver
//! 2. ConfigProvider: Used to stack defaults, JSON documents and `GRAFT_*` variables
//!
//! # Examples
//!
//! ```rust
//! use graft_config::provider::ConfigProvider;
//!
//! fn setup_config() -> Result<(), graft_config::errors::ConfigError> {
//!     let mut provider = ConfigProvider::initialize();
//!     provider
//!         .add_json("graft.json", r#"{ "parallel": true }"#)?
//!         .add_env_vars([("GRAFT_TIMEOUT_MS", "1500")])?;
//!
//!     let config = provider.resolve();
//!     assert!(config.parallel);
//!     assert_eq!(config.timeout_ms, Some(1500));
//!     Ok(())
//! }
//! # setup_config().unwrap();
//! ```

pub mod config;
pub mod errors;
pub mod provider;
