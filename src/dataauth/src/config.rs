//! Data authorization cache configuration
//!
//! Environment variables:
//! - `DATAAUTH_KEY_SCHEME` - `escaped` (default) or `legacy`
//! - `DATAAUTH_ON_INVALID_RULE` - `skip` (default) or `abort`
//! - `DATAAUTH_PRUNE_STALE` - remove orphaned entries on rebuild (default: false)
//! - `DATAAUTH_CACHE_CAPACITY` - in-memory cache capacity hint (default: 10000)

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{DataAuthError, Result};
use crate::key::KeyScheme;

/// What a rebuild does with an association whose rule cannot be materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the association, record it in the build report and continue
    #[default]
    Skip,
    /// Fail the whole rebuild
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = DataAuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(FailurePolicy::Skip),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(DataAuthError::Config(format!("unknown failure policy '{}'", other))),
        }
    }
}

/// Data authorization cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataAuthConfig {
    /// Cache key naming scheme
    pub key_scheme: KeyScheme,

    /// Handling of malformed rules and dangling references during rebuild
    pub failure_policy: FailurePolicy,

    /// Remove cached entries that the rebuild did not refresh
    pub prune_stale: bool,

    /// Capacity hint for the in-memory rule cache
    pub cache_capacity: usize,
}

impl Default for DataAuthConfig {
    fn default() -> Self {
        Self {
            key_scheme: KeyScheme::Escaped,
            failure_policy: FailurePolicy::Skip,
            prune_stale: false,
            cache_capacity: 10_000,
        }
    }
}

impl DataAuthConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("DATAAUTH_KEY_SCHEME") {
            config.key_scheme = value.parse()?;
        }
        if let Some(value) = lookup("DATAAUTH_ON_INVALID_RULE") {
            config.failure_policy = value.parse()?;
        }
        if let Some(value) = lookup("DATAAUTH_PRUNE_STALE") {
            config.prune_stale = parse_bool(&value)?;
        }
        if let Some(value) = lookup("DATAAUTH_CACHE_CAPACITY") {
            config.cache_capacity = value.trim().parse().map_err(|_| {
                DataAuthError::Config(format!("DATAAUTH_CACHE_CAPACITY must be an integer, got '{}'", value))
            })?;
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DataAuthError::Config(format!("expected a boolean, got '{}'", other))),
    }
}
