use crate::platform;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub inventory_path: String,
    pub hosts_file: String,
    pub export_dir: String,
    pub workers: usize,
    pub probe: ProbeConfig,
    /// Program and arguments used to open a management session.
    /// `{host}` is replaced by the short name, `{fqdn}` by the FQDN.
    pub session_command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub reachability_port: u16,
    pub management_port: u16,
    pub timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            inventory_path: "inventory.json".to_string(),
            hosts_file: platform::default_hosts_path().to_string(),
            export_dir: "exports".to_string(),
            workers: 4,
            probe: ProbeConfig::default(),
            session_command: vec!["ssh".to_string(), "{host}".to_string()],
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            reachability_port: 445,
            management_port: 5985,
            timeout_ms: 3000,
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

impl AppConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.max(1)
    }
}

/// Load `Config.toml` (optional) overlaid with `FLEET__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from("Config")
}

pub fn load_configuration_from(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("FLEET")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("NoSuchConfig");
        let config = load_configuration_from(missing.to_str().unwrap()).unwrap();
        assert_eq!(config.inventory_path, "inventory.json");
        assert_eq!(config.probe.management_port, 5985);
        assert_eq!(config.worker_count(), 4);
        assert_eq!(config.hosts_file, platform::default_hosts_path());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Fleet.toml");
        fs::write(
            &path,
            "workers = 0\nexport_dir = \"out\"\n\n[probe]\ntimeout_ms = 500\n",
        )
        .unwrap();
        let base = dir.path().join("Fleet");
        let config = load_configuration_from(base.to_str().unwrap()).unwrap();
        assert_eq!(config.export_dir, "out");
        assert_eq!(config.worker_count(), 1);
        assert_eq!(config.probe.timeout(), Duration::from_millis(500));
        assert_eq!(config.probe.reachability_port, 445);
    }
}
