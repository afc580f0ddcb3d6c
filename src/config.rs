//! Bridge configuration.

use std::env;
use std::fmt;
use thiserror::Error;

pub const RELEASE_POLICY_ENV: &str = "CFISH_RELEASE_POLICY";
pub const FLUSH_THRESHOLD_ENV: &str = "CFISH_DEFERRED_FLUSH_THRESHOLD";
pub const MAX_STRING_BYTES_ENV: &str = "CFISH_MAX_STRING_BYTES";

const DEFAULT_MAX_STRING_BYTES: usize = 64 * 1024 * 1024;

/// When a dropped wrapper gives its count unit back to the object system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Decrement inside `Drop`.
    #[default]
    Immediate,
    /// Queue the handle and decrement on the next `Runtime::collect`.
    Deferred,
}

impl ReleasePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "immediate" | "eager" => Some(Self::Immediate),
            "deferred" | "lazy" => Some(Self::Deferred),
            _ => None,
        }
    }
}

impl fmt::Display for ReleasePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReleasePolicy::Immediate => "immediate",
            ReleasePolicy::Deferred => "deferred",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid bridge configuration: {0}")]
    Invalid(&'static str),
    #[error("unrecognised value {value:?} for {key}")]
    BadEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub release_policy: ReleasePolicy,
    /// Pending deferred releases that force an inline collect.
    pub deferred_flush_threshold: usize,
    /// Largest text, in UTF-8 bytes, copied into a native string.
    pub max_string_bytes: usize,
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deferred_flush_threshold == 0 {
            return Err(ConfigError::Invalid(
                "deferred_flush_threshold must be greater than zero",
            ));
        }
        if self.max_string_bytes == 0 {
            return Err(ConfigError::Invalid("max_string_bytes must be greater than zero"));
        }
        Ok(())
    }

    /// Defaults overridden by `CFISH_RELEASE_POLICY`,
    /// `CFISH_DEFERRED_FLUSH_THRESHOLD` and `CFISH_MAX_STRING_BYTES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let overrides = EnvOverrides {
            policy: env::var(RELEASE_POLICY_ENV).ok(),
            threshold: env::var(FLUSH_THRESHOLD_ENV).ok(),
            max_string_bytes: env::var(MAX_STRING_BYTES_ENV).ok(),
        };
        apply_env_overrides(Self::default(), &overrides)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            release_policy: ReleasePolicy::Immediate,
            deferred_flush_threshold: 4_096,
            max_string_bytes: DEFAULT_MAX_STRING_BYTES,
        }
    }
}

#[derive(Debug, Default)]
struct EnvOverrides {
    policy: Option<String>,
    threshold: Option<String>,
    max_string_bytes: Option<String>,
}

fn parse_count(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::BadEnv {
        key,
        value: value.to_string(),
    })
}

fn apply_env_overrides(
    mut config: BridgeConfig,
    overrides: &EnvOverrides,
) -> Result<BridgeConfig, ConfigError> {
    if let Some(value) = overrides.policy.as_deref() {
        config.release_policy = ReleasePolicy::parse(value).ok_or_else(|| ConfigError::BadEnv {
            key: RELEASE_POLICY_ENV,
            value: value.to_string(),
        })?;
    }
    if let Some(value) = overrides.threshold.as_deref() {
        config.deferred_flush_threshold = parse_count(FLUSH_THRESHOLD_ENV, value)?;
    }
    if let Some(value) = overrides.max_string_bytes.as_deref() {
        config.max_string_bytes = parse_count(MAX_STRING_BYTES_ENV, value)?;
    }
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct BridgeConfigBuilder {
    inner: BridgeConfig,
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeConfigBuilder {
    pub fn new() -> Self {
        Self {
            inner: BridgeConfig::default(),
        }
    }

    pub fn release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.inner.release_policy = policy;
        self
    }

    pub fn deferred_flush_threshold(mut self, pending: usize) -> Self {
        self.inner.deferred_flush_threshold = pending;
        self
    }

    pub fn max_string_bytes(mut self, bytes: usize) -> Self {
        self.inner.max_string_bytes = bytes;
        self
    }

    pub fn build(self) -> Result<BridgeConfig, ConfigError> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}
