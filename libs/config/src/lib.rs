//! # Clocklink Configuration
//!
//! Proxy configuration loading and the constants shared by proxy and
//! clients.
//!
//! ## Features
//!
//! - **Proxy configuration**: queue settings and the time-base table, loaded
//!   from JSON or TOML with `CLOCKLINK__` environment overrides
//! - **Constants**: queue names and depths, protocol timeouts
//!
//! ## Usage
//!
//! ```rust,no_run
//! use config::{constants, ProxyConfig};
//! use std::path::Path;
//!
//! let mut cfg = ProxyConfig::load(Path::new("/etc/clocklink/proxy.json"))?;
//! cfg.apply_transport_specific(1);
//! for tb in cfg.time_base_table() {
//!     println!("{tb}");
//! }
//! assert_eq!(constants::queues::DEFAULT_PROXY_QUEUE, "/clocklink");
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod constants;
pub mod proxy_config;

pub use proxy_config::{
    ChronySettings, ConfigError, Ptp4lSettings, ProxyConfig, ProxySettings, TimeBaseEntry,
};
