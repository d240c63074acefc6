//! Configuration loading.
//!
//! A configuration is a hierarchical YAML mapping. Multiple `-c` files
//! are deep-merged in order with [`cloudmarker_engine::merge::merge_dicts`]
//! (later files win), starting from the embedded base configuration so
//! a user file only has to override what it wants to change.

use anyhow::{Context, Result};
use cloudmarker_engine::graph::AuditDescriptor;
use cloudmarker_engine::loader::PluginDescriptor;
use cloudmarker_engine::merge::merge_dicts;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Embedded base configuration: registers the sample plugins under
/// well-known keys and a no-op `run` list, so `-p/--print-base-config`
/// always has something meaningful to print and an empty invocation
/// never panics on a missing key.
pub const BASE_CONFIG_YAML: &str = include_str!("baseconfig.yaml");

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPluginEntry {
    pub plugin: String,
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAudit {
    #[serde(default)]
    pub clouds: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub stores: Vec<String>,
    #[serde(default)]
    pub alerts: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub enum SmtpMode {
    #[serde(rename = "ssl")]
    Ssl,
    #[serde(rename = "starttls")]
    StartTls,
    #[serde(rename = "disable")]
    Disable,
}

impl Default for SmtpMode {
    fn default() -> Self {
        SmtpMode::Ssl
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    pub from_addr: String,
    pub to_addrs: Vec<String>,
    #[serde(default)]
    pub mode: SmtpMode,
    /// Per-plugin SMTP debug flag, not engine-level.
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub plugins: HashMap<String, RawPluginEntry>,
    #[serde(default)]
    pub audits: HashMap<String, RawAudit>,
    #[serde(default)]
    pub run: Vec<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub logger: LoggerConfig,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

/// Fully parsed configuration, ready to hand to the engine.
pub struct Config {
    pub plugins: HashMap<String, PluginDescriptor>,
    pub audits: HashMap<String, AuditDescriptor>,
    pub run: Vec<String>,
    pub schedule: Option<String>,
    pub logger: LoggerConfig,
    pub email: Option<EmailConfig>,
}

impl Config {
    /// Load and deep-merge `paths` on top of the embedded base
    /// configuration. Missing files are skipped with a warning, not a
    /// fatal error; an unparseable file is fatal.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut merged: Value =
            serde_yaml::from_str(BASE_CONFIG_YAML).context("embedded base configuration is not valid YAML")?;

        for path in paths {
            let path = path.as_ref();
            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping missing configuration file");
                    continue;
                }
            };
            let doc: Value = serde_yaml::from_str(&content)
                .with_context(|| format!("{} is not valid YAML", path.display()))?;
            merged = merge_dicts(&merged, &doc);
        }

        let raw: RawConfig = serde_json::from_value(merged).context("configuration does not match expected schema")?;
        Ok(Self::from_raw(raw))
    }

    /// The default search list used when no `-c` flag is given.
    pub fn default_search_paths() -> Vec<&'static str> {
        vec!["config.base.yaml", "config.yaml"]
    }

    fn from_raw(raw: RawConfig) -> Self {
        let plugins = raw
            .plugins
            .into_iter()
            .map(|(key, entry)| {
                (
                    key,
                    PluginDescriptor {
                        class: entry.plugin,
                        params: entry.params,
                    },
                )
            })
            .collect();

        let audits = raw
            .audits
            .into_iter()
            .map(|(key, a)| {
                (
                    key,
                    AuditDescriptor {
                        clouds: a.clouds,
                        events: a.events,
                        stores: a.stores,
                        alerts: a.alerts,
                    },
                )
            })
            .collect();

        Self {
            plugins,
            audits,
            run: raw.run,
            schedule: raw.schedule,
            logger: raw.logger,
            email: raw.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn base_config_alone_parses() {
        let config = Config::load::<&str>(&[]).unwrap();
        assert!(config.plugins.contains_key("mock_cloud"));
    }

    #[test]
    fn later_file_overrides_earlier() {
        let f1 = scratch_file("later-file-overrides-1", "run: [\"demo\"]\nschedule: \"06:00\"\n");
        let f2 = scratch_file("later-file-overrides-2", "schedule: \"07:30\"\n");
        let config = Config::load(&[&f1, &f2]).unwrap();
        assert_eq!(config.run, vec!["demo".to_string()]);
        assert_eq!(config.schedule.as_deref(), Some("07:30"));
        let _ = std::fs::remove_file(f1);
        let _ = std::fs::remove_file(f2);
    }

    #[test]
    fn missing_file_is_skipped_not_fatal() {
        let config = Config::load(&["/nonexistent/cloudmarker-config.yaml"]).unwrap();
        assert!(config.plugins.contains_key("mock_cloud"));
    }

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("cloudmarker-test-{name}-{}.yaml", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }
}
