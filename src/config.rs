//! Engine configuration
//!
//! Every field has a default matching the production tracker, so an empty TOML
//! document is a valid configuration:
//!
//! ```toml
//! min_emit_interval_ms = 1000
//! inactivity_window_ms = 2000
//! visibility_threshold_pct = 40
//! dwell_on_inactive = "discard"
//! modules = ["elapsed_time", "section_dwell"]
//!
//! [identity]
//! key = "interactid"
//! ttl_days = 90
//!
//! [collector]
//! app_key = "app-key"
//! production = true
//! ```

use crate::error::TelemetryError;
use crate::timer::Millis;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Measurement modules the engine can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    ElapsedTime,
    SectionDwell,
}

/// What the section tracker does with an open dwell span when the visitor
/// goes inactive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DwellOnInactive {
    /// Reset the tracking entry's accumulated time to zero
    #[default]
    Discard,
    /// Fold the open span into the entry's accumulated time, then stop
    Bank,
}

/// Visitor identity settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Storage key of the durable visitor identifier
    #[serde(default = "default_identity_key")]
    pub key: String,
    /// Lifetime of a freshly minted identifier
    #[serde(default = "default_identity_ttl_days")]
    pub ttl_days: u32,
}

/// Collector endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Application key embedded in the socket path
    #[serde(default)]
    pub app_key: String,
    /// Production collectors share the page's host and port
    #[serde(default = "default_true")]
    pub production: bool,
    /// Port of the development collector on the page's host
    #[serde(default = "default_dev_port")]
    pub dev_port: u16,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum spacing between interaction-triggered emissions
    #[serde(default = "default_min_emit_interval_ms")]
    pub min_emit_interval_ms: Millis,
    /// Quiet period after which the visitor counts as inactive
    #[serde(default = "default_inactivity_window_ms")]
    pub inactivity_window_ms: Millis,
    /// Period of the inactivity check
    #[serde(default = "default_poll_ms")]
    pub inactivity_poll_ms: Millis,
    /// Period of the section visibility scan
    #[serde(default = "default_poll_ms")]
    pub section_scan_ms: Millis,
    /// A section is tracked only when strictly more visible than this
    #[serde(default = "default_visibility_threshold_pct")]
    pub visibility_threshold_pct: u8,
    #[serde(default)]
    pub dwell_on_inactive: DwellOnInactive,
    /// Modules to run, in iteration order
    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleKind>,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
}

fn default_min_emit_interval_ms() -> Millis {
    1000
}
fn default_inactivity_window_ms() -> Millis {
    2000
}
fn default_poll_ms() -> Millis {
    100
}
fn default_visibility_threshold_pct() -> u8 {
    40
}
fn default_modules() -> Vec<ModuleKind> {
    vec![ModuleKind::ElapsedTime, ModuleKind::SectionDwell]
}
fn default_identity_key() -> String {
    "interactid".into()
}
fn default_identity_ttl_days() -> u32 {
    90
}

/// Longest identifier lifetime accepted, about a century
pub const MAX_IDENTITY_TTL_DAYS: u32 = 36_500;
fn default_true() -> bool {
    true
}
fn default_dev_port() -> u16 {
    6001
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key: default_identity_key(),
            ttl_days: default_identity_ttl_days(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            production: true,
            dev_port: default_dev_port(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_emit_interval_ms: default_min_emit_interval_ms(),
            inactivity_window_ms: default_inactivity_window_ms(),
            inactivity_poll_ms: default_poll_ms(),
            section_scan_ms: default_poll_ms(),
            visibility_threshold_pct: default_visibility_threshold_pct(),
            dwell_on_inactive: DwellOnInactive::default(),
            modules: default_modules(),
            identity: IdentityConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(toml_str: &str) -> Result<Self, TelemetryError> {
        let config: EngineConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self, TelemetryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, TelemetryError> {
        toml::to_string_pretty(self).map_err(|e| TelemetryError::ConfigError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        let periods = [
            ("inactivity_poll_ms", self.inactivity_poll_ms),
            ("section_scan_ms", self.section_scan_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(TelemetryError::ConfigError(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if self.visibility_threshold_pct > 100 {
            return Err(TelemetryError::ConfigError(format!(
                "visibility_threshold_pct must be at most 100, got {}",
                self.visibility_threshold_pct
            )));
        }

        if self.identity.key.trim().is_empty() {
            return Err(TelemetryError::ConfigError(
                "identity.key must not be empty".to_string(),
            ));
        }
        if self.identity.ttl_days == 0 {
            return Err(TelemetryError::ConfigError(
                "identity.ttl_days must be greater than zero".to_string(),
            ));
        }
        if self.identity.ttl_days > MAX_IDENTITY_TTL_DAYS {
            return Err(TelemetryError::ConfigError(format!(
                "identity.ttl_days must be at most {MAX_IDENTITY_TTL_DAYS}, got {}",
                self.identity.ttl_days
            )));
        }

        for (i, kind) in self.modules.iter().enumerate() {
            if self.modules[..i].contains(kind) {
                return Err(TelemetryError::ConfigError(format!(
                    "module {kind:?} is listed more than once"
                )));
            }
        }

        Ok(())
    }
}

impl CollectorConfig {
    /// Resolve the collector's WebSocket endpoint for a page.
    ///
    /// The collector lives on the page's own host: secure pages get `wss`,
    /// everything else `ws`. Development collectors listen on `dev_port`.
    pub fn endpoint(&self, page_url: &str) -> Result<Url, TelemetryError> {
        let page = Url::parse(page_url)?;
        let host = page.host_str().ok_or_else(|| {
            TelemetryError::ConfigError(format!("page URL has no host: {page_url}"))
        })?;
        let scheme = if page.scheme() == "https" { "wss" } else { "ws" };

        let authority = if self.production {
            match page.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            }
        } else {
            format!("{host}:{}", self.dev_port)
        };

        let endpoint = format!("{scheme}://{authority}/app/{}/v1/client/ws", self.app_key);
        Ok(Url::parse(&endpoint)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_toml_is_default() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.min_emit_interval_ms, 1000);
        assert_eq!(config.inactivity_window_ms, 2000);
        assert_eq!(config.visibility_threshold_pct, 40);
        assert_eq!(config.identity.key, "interactid");
        assert_eq!(config.identity.ttl_days, 90);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = EngineConfig::from_toml_str(
            r#"
            min_emit_interval_ms = 5000
            dwell_on_inactive = "bank"
            modules = ["section_dwell"]

            [collector]
            app_key = "abc123"
            production = false
            "#,
        )
        .unwrap();

        assert_eq!(config.min_emit_interval_ms, 5000);
        assert_eq!(config.dwell_on_inactive, DwellOnInactive::Bank);
        assert_eq!(config.modules, vec![ModuleKind::SectionDwell]);
        assert_eq!(config.collector.app_key, "abc123");
        assert!(!config.collector.production);
        assert_eq!(config.collector.dev_port, 6001);
        assert_eq!(config.inactivity_poll_ms, 100);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_poll = EngineConfig {
            inactivity_poll_ms: 0,
            ..Default::default()
        };
        assert!(matches!(zero_poll.validate(), Err(TelemetryError::ConfigError(_))));

        let threshold = EngineConfig {
            visibility_threshold_pct: 101,
            ..Default::default()
        };
        assert!(threshold.validate().is_err());

        let duplicate = EngineConfig {
            modules: vec![ModuleKind::ElapsedTime, ModuleKind::ElapsedTime],
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());

        let mut no_key = EngineConfig::default();
        no_key.identity.key = "  ".to_string();
        assert!(no_key.validate().is_err());
    }

    #[test]
    fn test_identity_lifetime_is_capped() {
        let result = EngineConfig::from_toml_str("[identity]\nttl_days = 4000000000");
        assert!(matches!(result, Err(TelemetryError::ConfigError(_))));

        let century = format!("[identity]\nttl_days = {MAX_IDENTITY_TTL_DAYS}");
        let config = EngineConfig::from_toml_str(&century).unwrap();
        assert_eq!(config.identity.ttl_days, MAX_IDENTITY_TTL_DAYS);
    }

    #[test]
    fn test_invalid_toml() {
        let result = EngineConfig::from_toml_str("min_emit_interval_ms = \"soon\"");
        assert!(matches!(result, Err(TelemetryError::TomlError(_))));
    }

    #[test]
    fn test_production_endpoint() {
        let collector = CollectorConfig {
            app_key: "key1".to_string(),
            ..Default::default()
        };

        let url = collector.endpoint("https://shop.example.com/products?id=4").unwrap();
        assert_eq!(url.as_str(), "wss://shop.example.com/app/key1/v1/client/ws");

        let url = collector.endpoint("http://localhost:8080/").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/app/key1/v1/client/ws");
    }

    #[test]
    fn test_development_endpoint() {
        let collector = CollectorConfig {
            app_key: "key1".to_string(),
            production: false,
            ..Default::default()
        };

        let url = collector.endpoint("http://localhost:8080/blog").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:6001/app/key1/v1/client/ws");
    }

    #[test]
    fn test_endpoint_requires_host() {
        let collector = CollectorConfig::default();
        assert!(collector.endpoint("not a url").is_err());
        assert!(collector.endpoint("data:text/plain,hello").is_err());
    }
}
