//! Time base descriptors
//!
//! A time base names one monitored clock domain. The proxy advertises its
//! table on connect and clients pick an index when they subscribe.

use crate::protocol::STRING_SIZE_MAX;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeBaseError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} is {len} bytes, limit is {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBaseCfg {
    /// One-based position in the proxy's table
    pub index: i32,
    pub name: String,
    pub interface_name: String,
    pub transport_specific: u8,
    pub domain_number: u8,
}

impl TimeBaseCfg {
    /// Checks the string fields fit their fixed wire width, leaving room for the terminator.
    pub fn validate(&self) -> Result<(), TimeBaseError> {
        if self.name.is_empty() {
            return Err(TimeBaseError::Empty { field: "name" });
        }
        check_width("name", &self.name)?;
        check_width("interface_name", &self.interface_name)
    }
}

pub fn check_width(field: &'static str, value: &str) -> Result<(), TimeBaseError> {
    if value.len() >= STRING_SIZE_MAX {
        return Err(TimeBaseError::TooLong {
            field,
            len: value.len(),
            max: STRING_SIZE_MAX - 1,
        });
    }
    Ok(())
}

impl fmt::Display for TimeBaseCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} '{}' if={} domain={} transport_specific={}",
            self.index, self.name, self.interface_name, self.domain_number, self.transport_specific
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_wide_names() {
        let mut cfg = TimeBaseCfg {
            index: 1,
            name: "Global Clock".into(),
            interface_name: "eth0".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());

        cfg.name = "x".repeat(STRING_SIZE_MAX);
        assert!(matches!(
            cfg.validate(),
            Err(TimeBaseError::TooLong { field: "name", .. })
        ));

        cfg.name.clear();
        assert_eq!(cfg.validate(), Err(TimeBaseError::Empty { field: "name" }));
    }
}
