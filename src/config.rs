//! Environment configuration.

use std::env;
use std::str::FromStr;

use crate::charset::Charset;

/// How writes to the read-reserved keys `size` and `attributes` are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservedWritePolicy {
    /// Store the attribute even though property reads will shadow it.
    #[default]
    Allow,
    /// Store it and log a warning.
    Warn,
    /// Refuse with `ScriptError::ReservedAttribute`.
    Reject,
}

impl FromStr for ReservedWritePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown reserved write policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub log_filter: Option<String>,
    pub default_charset: Charset,
    pub reserved_writes: ReservedWritePolicy,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            default_charset: Charset::utf8(),
            reserved_writes: ReservedWritePolicy::Allow,
        }
    }
}

impl EnvConfig {
    pub fn from_env() -> Self {
        let default_charset = match env_string_opt("FLOWFILE_SCRIPT_DEFAULT_CHARSET") {
            Some(label) => Charset::for_label(&label).unwrap_or_else(|err| {
                tracing::warn!("invalid FLOWFILE_SCRIPT_DEFAULT_CHARSET, ignoring: {err}");
                Charset::utf8()
            }),
            None => Charset::utf8(),
        };

        let reserved_writes = match env_string_opt("FLOWFILE_SCRIPT_RESERVED_WRITES") {
            Some(value) => value.parse().unwrap_or_else(|err| {
                tracing::warn!("invalid FLOWFILE_SCRIPT_RESERVED_WRITES, ignoring: {err}");
                ReservedWritePolicy::Allow
            }),
            None => ReservedWritePolicy::Allow,
        };

        Self {
            log_filter: env_string_opt("FLOWFILE_SCRIPT_LOG"),
            default_charset,
            reserved_writes,
        }
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
