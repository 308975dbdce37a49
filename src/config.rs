//! # Configuration Module
//!
//! File and environment configuration for the API layer.
//!
//! ## Sources
//!
//! [`ApiConfig::load`] reads a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
//! Every field is optional and defaulted. [`ApiConfig::apply_env`] then
//! overrides individual fields from `VND_API_*` variables:
//!
//! | Variable | Field |
//! |---|---|
//! | `VND_API_STANDARDS_TREE` | `standards_tree` |
//! | `VND_API_SUBTYPE` | `subtype` |
//! | `VND_API_VERSION` | `default_version` |
//! | `VND_API_DEFAULT_FORMAT` | `default_format` |
//! | `VND_API_PREFIX` | `prefix` |
//! | `VND_API_DOMAIN` | `domain` |
//! | `VND_API_STRICT` | `strict` |
//! | `VND_API_DEBUG` | `debug` |
//! | `VND_API_CONDITIONAL_REQUESTS` | `conditional_requests` |
//! | `VND_API_JSONP_CALLBACK` | `jsonp_callback` |
//! | `VND_API_RATE_LIMIT_PREFIX` | `rate_limit.key_prefix` |
//!
//! ## Example
//!
//! ```yaml
//! subtype: acme
//! default_version: v1
//! prefix: api
//! strict: false
//! rate_limit:
//!   throttles:
//!     - name: members
//!       limit: 100
//!       window_secs: 60
//!       applies_to: authenticated
//!     - name: guests
//!       limit: 10
//!       window_secs: 60
//!       applies_to: unauthenticated
//! ```

use std::collections::HashSet;
use std::env;
use std::path::Path;

use anyhow::{bail, Context};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static VERSION_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^v[0-9]+(\.[0-9]+)*$").ok());

/// Media-type trees accepted by [`ApiConfig::validate`].
pub const STANDARDS_TREES: [&str; 3] = ["vnd", "x", "prs"];

/// Which consumers a configured throttle governs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppliesTo {
    #[default]
    Always,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub name: String,
    pub limit: u64,
    pub window_secs: u64,
    #[serde(default)]
    pub applies_to: AppliesTo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub key_prefix: String,
    pub throttles: Vec<ThrottleConfig>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            key_prefix: "api".to_string(),
            throttles: Vec::new(),
        }
    }
}

/// Settings for negotiation, default collection scoping and rate limiting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub standards_tree: String,
    /// Vendor token of the media type (`application/vnd.<subtype>.v1+json`).
    pub subtype: String,
    pub default_version: String,
    pub default_format: String,
    /// Prefix for collections declaring neither prefix nor domain.
    pub prefix: Option<String>,
    /// Domain for collections declaring neither prefix nor domain.
    pub domain: Option<String>,
    /// Reject API requests without a valid vendor Accept header.
    pub strict: bool,
    /// Expose error details and the internal call stack in error bodies.
    pub debug: bool,
    pub conditional_requests: bool,
    pub jsonp_callback: String,
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            standards_tree: "vnd".to_string(),
            subtype: String::new(),
            default_version: "v1".to_string(),
            default_format: "json".to_string(),
            prefix: None,
            domain: None,
            strict: false,
            debug: false,
            conditional_requests: true,
            jsonp_callback: "callback".to_string(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ApiConfig {
    /// Load from a YAML or TOML file, chosen by extension.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match ext.as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&raw)
                .with_context(|| format!("invalid YAML in {}", path.display()))?,
            Some("toml") => {
                toml::from_str(&raw).with_context(|| format!("invalid TOML in {}", path.display()))?
            }
            other => bail!(
                "unsupported config extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ),
        };
        tracing::debug!(path = %path.display(), "Loaded API configuration");
        Ok(config)
    }

    /// Defaults overridden from `VND_API_*` variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `VND_API_*` variables.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_vars(|key| env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, var: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_fields: [(&str, &mut String); 6] = [
            ("VND_API_STANDARDS_TREE", &mut self.standards_tree),
            ("VND_API_SUBTYPE", &mut self.subtype),
            ("VND_API_VERSION", &mut self.default_version),
            ("VND_API_DEFAULT_FORMAT", &mut self.default_format),
            ("VND_API_JSONP_CALLBACK", &mut self.jsonp_callback),
            ("VND_API_RATE_LIMIT_PREFIX", &mut self.rate_limit.key_prefix),
        ];
        for (key, field) in string_fields {
            if let Some(value) = var(key) {
                *field = value;
            }
        }
        if let Some(prefix) = var("VND_API_PREFIX") {
            self.prefix = (!prefix.is_empty()).then_some(prefix);
        }
        if let Some(domain) = var("VND_API_DOMAIN") {
            self.domain = (!domain.is_empty()).then_some(domain);
        }

        let bool_fields: [(&str, &mut bool); 3] = [
            ("VND_API_STRICT", &mut self.strict),
            ("VND_API_DEBUG", &mut self.debug),
            ("VND_API_CONDITIONAL_REQUESTS", &mut self.conditional_requests),
        ];
        for (key, field) in bool_fields {
            if let Some(value) = var(key) {
                *field = parse_bool(&value).with_context(|| format!("invalid value for {key}"))?;
            }
        }
        Ok(())
    }

    /// Every semantic problem with this configuration. Empty means valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.subtype.trim().is_empty() {
            errors.push("subtype (vendor) must not be empty".to_string());
        }
        if !STANDARDS_TREES.contains(&self.standards_tree.as_str()) {
            errors.push(format!(
                "unknown standards tree '{}'; expected one of {}",
                self.standards_tree,
                STANDARDS_TREES.join(", ")
            ));
        }
        let version_ok = VERSION_PATTERN
            .as_ref()
            .is_some_and(|re| re.is_match(&self.default_version));
        if !version_ok {
            errors.push(format!(
                "default_version '{}' must look like v1 or v2.0.1",
                self.default_version
            ));
        }
        if self.default_format.trim().is_empty() {
            errors.push("default_format must not be empty".to_string());
        }
        if self.prefix.is_some() && self.domain.is_some() {
            errors.push("prefix and domain are mutually exclusive".to_string());
        }
        let mut seen = HashSet::new();
        for throttle in &self.rate_limit.throttles {
            if !seen.insert(throttle.name.as_str()) {
                errors.push(format!("duplicate throttle name '{}'", throttle.name));
            }
            if throttle.window_secs == 0 && throttle.limit > 0 {
                errors.push(format!("throttle '{}' needs a non-zero window", throttle.name));
            }
        }
        errors
    }
}

fn parse_bool(value: &str) -> anyhow::Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{other}'"),
    }
}
