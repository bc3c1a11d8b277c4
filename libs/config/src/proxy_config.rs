//! Proxy Configuration Module
//!
//! Loads the proxy's queue settings and time-base table from a JSON or TOML
//! file, with `CLOCKLINK__`-prefixed environment variables layered on top
//! (`CLOCKLINK__PROXY__MAXCLIENTS=16`).
//!
//! The `config` crate lowercases every key it merges, except inside arrays.
//! Each multi-word field therefore accepts its camelCase name and the
//! lowercased form.

use crate::constants::{proxy, queues};
use anyhow::{Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use types::timebase::check_width;
use types::{TimeBaseCfg, TimeBaseError, MAX_TIME_BASES};

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "CLOCKLINK";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Time base {position}: {source}")]
    TimeBase {
        position: usize,
        #[source]
        source: TimeBaseError,
    },

    #[error("Duplicate time base name '{name}'")]
    DuplicateTimeBase { name: String },

    #[error("{count} time bases configured, at most {max} fit in a connect reply")]
    TooManyTimeBases { count: usize, max: usize },

    #[error("maxClients must be at least 1")]
    NoClients,

    #[error("Queue name '{name}' must start with '/'")]
    QueueName { name: String },
}

/// Complete proxy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    pub proxy: ProxySettings,
    #[serde(alias = "timebases")]
    pub time_bases: Vec<TimeBaseEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxySettings {
    #[serde(alias = "queuename")]
    pub queue_name: String,
    #[serde(alias = "maxclients")]
    pub max_clients: usize,
    /// Default for ptp4l entries that do not set their own
    #[serde(alias = "transportspecific")]
    pub transport_specific: u8,
    #[serde(alias = "notifypollms")]
    pub notify_poll_ms: u64,
    #[serde(alias = "maxsendfailures")]
    pub max_send_failures: u32,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            queue_name: queues::DEFAULT_PROXY_QUEUE.to_string(),
            max_clients: queues::PROXY_QUEUE_DEPTH,
            transport_specific: 0,
            notify_poll_ms: proxy::NOTIFY_POLL_MS,
            max_send_failures: proxy::MAX_SEND_FAILURES,
        }
    }
}

/// One monitored clock domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeBaseEntry {
    #[serde(alias = "timebasename")]
    pub time_base_name: String,
    pub ptp4l: Ptp4lSettings,
    pub chrony: ChronySettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ptp4lSettings {
    #[serde(alias = "interfacename")]
    pub interface_name: String,
    #[serde(alias = "udsaddr")]
    pub uds_addr: String,
    #[serde(alias = "domainnumber")]
    pub domain_number: u8,
    /// Falls back to the proxy-wide value when unset
    #[serde(alias = "transportspecific", skip_serializing_if = "Option::is_none")]
    pub transport_specific: Option<u8>,
}

impl Default for Ptp4lSettings {
    fn default() -> Self {
        Self {
            interface_name: String::new(),
            uds_addr: proxy::PTP4L_UDS_ADDR.to_string(),
            domain_number: 0,
            transport_specific: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChronySettings {
    #[serde(alias = "udsaddr")]
    pub uds_addr: String,
}

impl Default for ChronySettings {
    fn default() -> Self {
        Self {
            uds_addr: proxy::CHRONY_UDS_ADDR.to_string(),
        }
    }
}

impl Default for ProxyConfig {
    /// A single time base on the default interface
    fn default() -> Self {
        Self {
            proxy: ProxySettings::default(),
            time_bases: vec![TimeBaseEntry {
                time_base_name: proxy::DEFAULT_TIME_BASE_NAME.to_string(),
                ptp4l: Ptp4lSettings {
                    interface_name: proxy::DEFAULT_INTERFACE.to_string(),
                    ..Ptp4lSettings::default()
                },
                chrony: ChronySettings::default(),
            }],
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a file with environment overrides.
    ///
    /// The format follows the file extension (`.json`, `.toml`).
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading proxy config: {:?}", path);
        let builder = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        let parsed: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        parsed.validate()?;
        debug!(
            "Loaded {} time base(s), queue {}",
            parsed.time_bases.len(),
            parsed.proxy.queue_name
        );
        Ok(parsed)
    }

    /// [`load`](Self::load) when a path is given, the defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                info!("No config file given, using the default time base");
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.proxy.queue_name.starts_with('/') {
            return Err(ConfigError::QueueName {
                name: self.proxy.queue_name.clone(),
            });
        }
        if self.proxy.max_clients == 0 {
            return Err(ConfigError::NoClients);
        }
        if self.time_bases.len() > MAX_TIME_BASES {
            return Err(ConfigError::TooManyTimeBases {
                count: self.time_bases.len(),
                max: MAX_TIME_BASES,
            });
        }

        let mut seen = HashSet::new();
        for (position, entry) in self.time_bases.iter().enumerate() {
            let wrap = |source| ConfigError::TimeBase {
                position: position + 1,
                source,
            };
            if entry.time_base_name.is_empty() {
                return Err(wrap(TimeBaseError::Empty {
                    field: "timeBaseName",
                }));
            }
            check_width("timeBaseName", &entry.time_base_name).map_err(wrap)?;
            check_width("interfaceName", &entry.ptp4l.interface_name).map_err(wrap)?;
            check_width("ptp4l.udsAddr", &entry.ptp4l.uds_addr).map_err(wrap)?;
            check_width("chrony.udsAddr", &entry.chrony.uds_addr).map_err(wrap)?;
            if !seen.insert(entry.time_base_name.as_str()) {
                return Err(ConfigError::DuplicateTimeBase {
                    name: entry.time_base_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Overrides the transport-specific tag of every ptp4l entry.
    pub fn apply_transport_specific(&mut self, value: u8) {
        self.proxy.transport_specific = value;
        for entry in &mut self.time_bases {
            entry.ptp4l.transport_specific = Some(value);
        }
    }

    /// Wire descriptors, indexed from 1 in file order
    pub fn time_base_table(&self) -> Vec<TimeBaseCfg> {
        self.time_bases
            .iter()
            .zip(1..)
            .map(|(entry, index)| TimeBaseCfg {
                index,
                name: entry.time_base_name.clone(),
                interface_name: entry.ptp4l.interface_name.clone(),
                transport_specific: entry
                    .ptp4l
                    .transport_specific
                    .unwrap_or(self.proxy.transport_specific),
                domain_number: entry.ptp4l.domain_number,
            })
            .collect()
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to render configuration as JSON")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration as TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_one_time_base() {
        let cfg = ProxyConfig::default();
        cfg.validate().unwrap();
        let table = cfg.time_base_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].index, 1);
        assert_eq!(table[0].name, "default");
        assert_eq!(table[0].interface_name, "eth0");
    }

    #[test]
    fn validation_rules() {
        let mut cfg = ProxyConfig::default();
        cfg.proxy.queue_name = "clocklink".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::QueueName { .. })));

        let mut cfg = ProxyConfig::default();
        cfg.proxy.max_clients = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::NoClients));

        let mut cfg = ProxyConfig::default();
        cfg.time_bases.push(cfg.time_bases[0].clone());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DuplicateTimeBase { .. })
        ));

        let mut cfg = ProxyConfig::default();
        cfg.time_bases[0].time_base_name.clear();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TimeBase {
                position: 1,
                source: TimeBaseError::Empty { .. }
            })
        ));

        let mut cfg = ProxyConfig::default();
        cfg.time_bases[0].chrony.uds_addr = "/".repeat(64);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TimeBase {
                source: TimeBaseError::TooLong { .. },
                ..
            })
        ));

        let mut cfg = ProxyConfig::default();
        cfg.time_bases = (0..=MAX_TIME_BASES)
            .map(|i| TimeBaseEntry {
                time_base_name: format!("tb{i}"),
                ..TimeBaseEntry::default()
            })
            .collect();
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooManyTimeBases { count: 17, .. })
        ));
    }

    #[test]
    fn transport_specific_override_wins() {
        let mut cfg = ProxyConfig::default();
        cfg.proxy.transport_specific = 2;
        assert_eq!(cfg.time_base_table()[0].transport_specific, 2);

        cfg.time_bases[0].ptp4l.transport_specific = Some(3);
        assert_eq!(cfg.time_base_table()[0].transport_specific, 3);

        cfg.apply_transport_specific(1);
        assert_eq!(cfg.time_base_table()[0].transport_specific, 1);
    }
}
