//! Settings for a bootstrap run.
//!
//! Values are resolved through layers, highest priority first:
//! 1. Environment variables (`CERTGEN_*`)
//! 2. Programmatically set values
//! 3. Values loaded from a YAML file
//! 4. Default values
//!
//! ## Example
//!
//! ```no_run
//! use certgen_core::config::Settings;
//!
//! let settings = Settings::load("certgen.yml")?;
//! println!("{} IPs for {}", settings.master_ips().len(), settings.master.hostname);
//! # Ok::<(), certgen_types::CertgenError>(())
//! ```

use certgen_types::config::LogConfig;
use certgen_types::{CertgenError, Endpoint, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

/// Prefix of environment variables that override settings.
pub const ENV_PREFIX: &str = "CERTGEN_";

/// Environment variable to dotted key mapping.
const ENV_KEYS: &[(&str, &str, EnvKind)] = &[
    ("EXTERNAL_MASTER_HOSTNAME", "external_master_hostname", EnvKind::String),
    ("MASTER_HOSTNAME", "master.hostname", EnvKind::String),
    ("MASTER_PORT", "master.port", EnvKind::Number),
    ("FIRST_CONSECUTIVE_STATIC_IP", "master.first_consecutive_static_ip", EnvKind::String),
    ("MASTER_COUNT", "master.count", EnvKind::Number),
    ("OUTPUT_DIR", "output_dir", EnvKind::String),
    ("LOG_LEVEL", "log.level", EnvKind::String),
    ("LOG_FORMAT", "log.format", EnvKind::String),
];

#[derive(Debug, Clone, Copy)]
enum EnvKind {
    String,
    Number,
}

/// Configuration layer priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    /// Default values
    Default = 0,
    /// Values loaded from file
    Loaded = 1,
    /// Values set programmatically
    Set = 2,
    /// Values from environment variables
    Environment = 3,
}

impl ConfigLayer {
    const LOWEST_FIRST: [ConfigLayer; 4] = [
        ConfigLayer::Default,
        ConfigLayer::Loaded,
        ConfigLayer::Set,
        ConfigLayer::Environment,
    ];
}

/// Multi-layer configuration store.
///
/// This is the low-level type; [`Settings`] is the typed view of it.
#[derive(Clone, Debug, Default)]
pub struct Config {
    layers: HashMap<ConfigLayer, Value>,
    file_path: Option<PathBuf>,
}

impl Config {
    /// Create a configuration from a YAML file.
    ///
    /// If the file doesn't exist, the loaded layer is left empty.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self {
            file_path: Some(path.to_path_buf()),
            ..Self::default()
        };

        if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| CertgenError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;
            config.load_str(&content)?;
        }

        Ok(config)
    }

    /// Replace the loaded layer with the contents of a YAML document.
    pub fn load_str(&mut self, content: &str) -> Result<()> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| CertgenError::Config(format!("Failed to parse config: {}", e)))?;
        if !value.is_null() {
            self.layers.insert(ConfigLayer::Loaded, value);
        }
        Ok(())
    }

    /// Set the default layer.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        self.layers.insert(ConfigLayer::Default, defaults);
        self
    }

    /// Fill the environment layer from `CERTGEN_*` variables.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut layer = Value::Object(Default::default());

        for (key, raw) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let Some((_, path, kind)) = ENV_KEYS.iter().find(|(env, _, _)| *env == name) else {
                continue;
            };

            let raw = raw.as_ref();
            let value = match kind {
                EnvKind::String => Value::String(raw.to_string()),
                EnvKind::Number => raw
                    .trim()
                    .parse::<u64>()
                    .map(Value::from)
                    .map_err(|e| CertgenError::Config(format!("{}{}: {}", ENV_PREFIX, name, e)))?,
            };

            Self::set_value_at_path_impl(&mut layer, path, value)?;
        }

        self.layers.insert(ConfigLayer::Environment, layer);
        Ok(self)
    }

    /// Get a configuration value by dotted key, respecting layer priority.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        for layer in ConfigLayer::LOWEST_FIRST.iter().rev() {
            if let Some(layer_data) = self.layers.get(layer) {
                if let Some(value) = Self::get_value_at_path(layer_data, key) {
                    if let Ok(typed_value) = serde_json::from_value(value.clone()) {
                        return Some(typed_value);
                    }
                }
            }
        }

        None
    }

    /// Set a configuration value programmatically.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;

        let set_layer = self.layers.entry(ConfigLayer::Set).or_insert(Value::Object(Default::default()));
        Self::set_value_at_path_impl(set_layer, key, value)
    }

    /// Path the loaded layer came from, if any.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// All layers merged, higher priority winning key by key.
    pub fn merged_data(&self) -> Value {
        let mut merged = Value::Object(Default::default());

        for layer in &ConfigLayer::LOWEST_FIRST {
            if let Some(layer_data) = self.layers.get(layer) {
                merged = deep_merge(merged, layer_data.clone());
            }
        }

        merged
    }

    fn get_value_at_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
        path.split('.').try_fold(data, |current, part| current.get(part))
    }

    fn set_value_at_path_impl(data: &mut Value, path: &str, value: Value) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            return Err(CertgenError::Config("Empty path".to_string()));
        };

        let mut current = data;
        for part in parents {
            if !current.is_object() {
                *current = Value::Object(Default::default());
            }
            current = match current {
                Value::Object(map) => map
                    .entry(part.to_string())
                    .or_insert_with(|| Value::Object(Default::default())),
                _ => certgen_types::bug!("config node at '{}' is not an object", part),
            };
        }

        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        if let Value::Object(map) = current {
            map.insert(last.to_string(), value);
        }
        Ok(())
    }
}

/// Recursively merge objects, with overlay values taking precedence.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay_val) => overlay_val,
    }
}

/// Master node description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSettings {
    /// Internal hostname of the first master
    pub hostname: String,
    /// First of the consecutive static IPs assigned to masters
    pub first_consecutive_static_ip: Ipv4Addr,
    /// Number of consecutive IPs, starting at the first one
    #[serde(default = "default_master_count")]
    pub count: u8,
    /// API server port
    #[serde(default = "default_master_port")]
    pub port: u16,
}

fn default_master_count() -> u8 {
    1
}

fn default_master_port() -> u16 {
    8443
}

/// Typed settings for one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Hostname clients outside the cluster use to reach the API server
    pub external_master_hostname: String,
    /// Master node description
    pub master: MasterSettings,
    /// Directory the credential tree is written under
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("_output")
}

impl Settings {
    /// Load settings from a YAML file with `CERTGEN_*` overrides from the
    /// process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::load(path)?.with_env_vars(std::env::vars())?;
        Self::from_config(&config)
    }

    /// Build settings from an already-layered configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings: Settings = serde_json::from_value(config.merged_data()).map_err(|e| match config.file_path() {
            Some(path) => CertgenError::Config(format!("Failed to parse settings from {}: {}", path.display(), e)),
            None => CertgenError::Config(format!("Failed to parse settings: {}", e)),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !Endpoint::is_valid_host(&self.external_master_hostname) {
            certgen_types::bail!(Config, "invalid external master hostname '{}'", self.external_master_hostname);
        }
        if !Endpoint::is_valid_host(&self.master.hostname) {
            certgen_types::bail!(Config, "invalid master hostname '{}'", self.master.hostname);
        }
        if self.master.count == 0 {
            certgen_types::bail!(Config, "master count must be at least 1");
        }
        if u32::from(self.master.first_consecutive_static_ip)
            .checked_add(u32::from(self.master.count) - 1)
            .is_none()
        {
            certgen_types::bail!(
                Config,
                "{} consecutive addresses from {} overflow the IPv4 space",
                self.master.count,
                self.master.first_consecutive_static_ip
            );
        }
        Ok(())
    }

    /// The master's IPs: `count` consecutive addresses from the first one.
    pub fn master_ips(&self) -> Vec<IpAddr> {
        let first = u32::from(self.master.first_consecutive_static_ip);
        (0..u32::from(self.master.count))
            .filter_map(|offset| first.checked_add(offset))
            .map(|ip| IpAddr::V4(Ipv4Addr::from(ip)))
            .collect()
    }

    /// Output directory with `~` expanded.
    pub fn output_dir(&self) -> PathBuf {
        crate::fs::expand_path(&self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
external_master_hostname: master.example.com
master:
  hostname: test-master-test-0
  first_consecutive_static_ip: 10.0.0.5
  count: 3
"#;

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn test_config_layers() {
        let mut config = Config::default().with_defaults(serde_json::json!({"key": "default_value"}));
        config.load_str("key: loaded_value\n").unwrap();

        let value: String = config.get("key").unwrap();
        assert_eq!(value, "loaded_value");

        config.set("key", "set_value").unwrap();
        let value: String = config.get("key").unwrap();
        assert_eq!(value, "set_value");
    }

    #[test]
    fn test_settings_from_yaml() {
        let mut config = Config::default().with_env_vars(no_env()).unwrap();
        config.load_str(SAMPLE).unwrap();
        let settings = Settings::from_config(&config).unwrap();

        assert_eq!(settings.master.port, 8443);
        assert_eq!(settings.output_dir, PathBuf::from("_output"));
        let ips: Vec<String> = settings.master_ips().iter().map(|ip| ip.to_string()).collect();
        assert_eq!(ips, vec!["10.0.0.5", "10.0.0.6", "10.0.0.7"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default()
            .with_env_vars(vec![
                ("CERTGEN_MASTER_PORT", "6443"),
                ("CERTGEN_EXTERNAL_MASTER_HOSTNAME", "api.example.org"),
                ("UNRELATED", "ignored"),
            ])
            .unwrap();
        config.load_str(SAMPLE).unwrap();
        let settings = Settings::from_config(&config).unwrap();

        assert_eq!(settings.master.port, 6443);
        assert_eq!(settings.external_master_hostname, "api.example.org");
        assert_eq!(settings.master.hostname, "test-master-test-0");
    }

    #[test]
    fn test_bad_env_number() {
        let err = Config::default()
            .with_env_vars(vec![("CERTGEN_MASTER_COUNT", "three")])
            .unwrap_err();
        assert!(matches!(err, CertgenError::Config(_)));
    }

    #[test]
    fn test_zero_count_rejected() {
        let mut config = Config::default();
        config.load_str(SAMPLE).unwrap();
        config.set("master.count", 0).unwrap();
        assert!(Settings::from_config(&config).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_env_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.yml"))
            .unwrap()
            .with_env_vars(vec![
                ("CERTGEN_EXTERNAL_MASTER_HOSTNAME", "ext.example.com"),
                ("CERTGEN_MASTER_HOSTNAME", "master-0"),
                ("CERTGEN_FIRST_CONSECUTIVE_STATIC_IP", "10.1.0.4"),
            ])
            .unwrap();
        let settings = Settings::from_config(&config).unwrap();
        assert_eq!(settings.master_ips(), vec!["10.1.0.4".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_set_unserializable_value_is_json_error() {
        let mut config = Config::default();
        let mut value = std::collections::BTreeMap::new();
        value.insert(vec![1u8], 1u8);

        let err = config.set("master.extra", value).unwrap_err();
        assert!(matches!(err, CertgenError::Json(_)));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certgen.yml");
        fs::write(&path, "external_master_hostname: master.example.com\n").unwrap();

        let config = Config::load(&path).unwrap().with_env_vars(no_env()).unwrap();
        assert_eq!(config.file_path(), Some(path.as_path()));

        let err = Settings::from_config(&config).unwrap_err();
        assert!(matches!(err, CertgenError::Config(ref msg) if msg.contains("certgen.yml")));
    }
}
