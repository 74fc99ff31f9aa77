//! Configuration file parsing and merging
//!
//! This module handles parsing of `rdeploy.toml` and `rdeploy.local.toml`
//! files. The local file is merged over the base file so per-machine host
//! overrides never have to be committed.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::Result;
use crate::deploy::{DEFAULT_HOST, DEFAULT_PORT};

/// Name of the shared configuration file
pub const CONFIG_FILE: &str = "rdeploy.toml";

/// Name of the machine-local override file
pub const LOCAL_CONFIG_FILE: &str = "rdeploy.local.toml";

/// Main configuration structure for rdeploy
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace settings
    pub workspace: WorkspaceConfig,

    /// Fallbacks for incomplete host specifiers
    pub defaults: DefaultsConfig,

    /// Deploy targets indexed by name
    pub deploy: BTreeMap<String, TargetConfig>,
}

/// Workspace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Deployment root, relative to the configuration directory (default: ".")
    pub root: Utf8PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: Utf8PathBuf::from("."),
        }
    }
}

/// Default host, port and timeout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Host used for specifiers like ":2222" (default: "127.0.0.1")
    pub host: String,

    /// Port used for specifiers without a usable port (default: 23979)
    pub port: u16,

    /// Connect and write timeout in milliseconds, 0 disables (default: 30000)
    pub timeout_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout_ms: 30_000,
        }
    }
}

impl DefaultsConfig {
    /// Per-step I/O timeout, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// A single host or a list of hosts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostList {
    One(String),
    Many(Vec<String>),
}

impl Default for HostList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// Deploy target as written in the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Host specifiers (`host` or `host:port`)
    pub hosts: HostList,
}

/// A named deploy target with its host specifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub hosts: Vec<String>,
}

impl Target {
    /// Create a target, dropping empty host specifiers
    pub fn new(name: impl Into<String>, hosts: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            hosts: hosts.into_iter().filter(|h| !h.is_empty()).collect(),
        }
    }

    /// Resolve a configured target
    pub fn from_config(name: impl Into<String>, config: &TargetConfig) -> Self {
        let hosts = match &config.hosts {
            HostList::One(host) => vec![host.clone()],
            HostList::Many(hosts) => hosts.clone(),
        };
        Self::new(name, hosts)
    }
}

impl Config {
    /// Load configuration from a workspace directory.
    ///
    /// This loads `rdeploy.toml` and merges `rdeploy.local.toml` over it if
    /// it exists. Missing files yield the defaults.
    pub fn load(workspace_root: &Utf8Path) -> Result<Self> {
        let config_path = workspace_root.join(CONFIG_FILE);
        let local_config_path = workspace_root.join(LOCAL_CONFIG_FILE);

        let base_config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<toml::Value>(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let local_config = if local_config_path.exists() {
            let content = std::fs::read_to_string(&local_config_path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        } else {
            None
        };

        let merged = if let Some(local) = local_config {
            merge_toml_values(base_config, local)
        } else {
            base_config
        };

        let config: Config = merged.try_into()?;

        Ok(config)
    }

    /// Load configuration from a string (for testing)
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Look up a deploy target by name
    pub fn target(&self, name: &str) -> Option<Target> {
        self.deploy
            .get(name)
            .map(|config| Target::from_config(name, config))
    }

    /// Names of all configured targets
    pub fn target_names(&self) -> Vec<&str> {
        self.deploy.keys().map(String::as_str).collect()
    }

    /// Deployment root resolved against the workspace directory
    pub fn deploy_root(&self, workspace_root: &Utf8Path) -> Utf8PathBuf {
        if self.workspace.root.is_absolute() {
            self.workspace.root.clone()
        } else {
            workspace_root.join(&self.workspace.root)
        }
    }
}

/// Merge two TOML values:
/// - Tables: recursively merged
/// - Arrays: local replaces base (not merged)
/// - Primitives: local overrides base
fn merge_toml_values(base: toml::Value, local: toml::Value) -> toml::Value {
    match (base, local) {
        (toml::Value::Table(mut base_table), toml::Value::Table(local_table)) => {
            for (key, local_value) in local_table {
                if let Some(base_value) = base_table.remove(&key) {
                    base_table.insert(key, merge_toml_values(base_value, local_value));
                } else {
                    base_table.insert(key, local_value);
                }
            }
            toml::Value::Table(base_table)
        }
        (_, local) => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.workspace.root, Utf8PathBuf::from("."));
        assert_eq!(config.defaults.host, "127.0.0.1");
        assert_eq!(config.defaults.port, 23979);
        assert_eq!(config.defaults.timeout(), Some(Duration::from_secs(30)));
        assert!(config.deploy.is_empty());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.workspace.root, Utf8PathBuf::from("."));
        assert!(config.target("anything").is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[workspace]
root = "site"

[defaults]
host = "deploy.local"
port = 9000
timeout_ms = 0

[deploy.staging]
hosts = ["web1:1000", "", "web2"]

[deploy.single]
hosts = "lonely:2000"
"#;

        let config = Config::parse(content).unwrap();

        assert_eq!(config.workspace.root, Utf8PathBuf::from("site"));
        assert_eq!(config.defaults.host, "deploy.local");
        assert_eq!(config.defaults.port, 9000);
        assert_eq!(config.defaults.timeout(), None);
        assert_eq!(config.target_names(), vec!["single", "staging"]);

        let staging = config.target("staging").unwrap();
        assert_eq!(staging.name, "staging");
        assert_eq!(staging.hosts, vec!["web1:1000", "web2"]);

        let single = config.target("single").unwrap();
        assert_eq!(single.hosts, vec!["lonely:2000"]);
    }

    #[test]
    fn test_target_without_hosts() {
        let config = Config::parse("[deploy.empty]\n").unwrap();
        assert!(config.target("empty").unwrap().hosts.is_empty());
    }

    #[test]
    fn test_deploy_root() {
        let config = Config::parse("[workspace]\nroot = \"public\"\n").unwrap();
        assert_eq!(
            config.deploy_root(Utf8Path::new("/ws")),
            Utf8PathBuf::from("/ws/public")
        );

        let config = Config::parse("[workspace]\nroot = \"/srv/www\"\n").unwrap();
        assert_eq!(
            config.deploy_root(Utf8Path::new("/ws")),
            Utf8PathBuf::from("/srv/www")
        );
    }

    #[test]
    fn test_merge_configs_via_toml_value() {
        let base = r#"
[defaults]
port = 9000

[deploy.prod]
hosts = ["a:1", "b:2"]

[deploy.qa]
hosts = ["qa"]
"#;

        let local = r#"
[defaults]
host = "10.0.0.1"

[deploy.prod]
hosts = ["c:3"]
"#;

        let base_value: toml::Value = toml::from_str(base).unwrap();
        let local_value: toml::Value = toml::from_str(local).unwrap();
        let merged: Config = merge_toml_values(base_value, local_value)
            .try_into()
            .unwrap();

        assert_eq!(merged.defaults.port, 9000);
        assert_eq!(merged.defaults.host, "10.0.0.1");

        // hosts is an array, so local replaces base completely
        assert_eq!(merged.target("prod").unwrap().hosts, vec!["c:3"]);
        assert_eq!(merged.target("qa").unwrap().hosts, vec!["qa"]);
    }

    #[test]
    fn test_load_from_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace_root = Utf8Path::from_path(temp_dir.path()).unwrap();

        std::fs::write(
            workspace_root.join(CONFIG_FILE),
            "[deploy.web]\nhosts = [\"web1\"]\n\n[defaults]\nport = 4000\n",
        )
        .unwrap();
        std::fs::write(
            workspace_root.join(LOCAL_CONFIG_FILE),
            "[defaults]\nport = 5000\n",
        )
        .unwrap();

        let config = Config::load(workspace_root).unwrap();

        assert_eq!(config.defaults.port, 5000);
        assert_eq!(config.target("web").unwrap().hosts, vec!["web1"]);
    }

    #[test]
    fn test_load_missing_config_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let workspace_root = Utf8Path::from_path(temp_dir.path()).unwrap();

        let config = Config::load(workspace_root).unwrap();

        assert_eq!(config.defaults.port, DEFAULT_PORT);
        assert!(config.deploy.is_empty());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = Config::parse("[deploy.web\nhosts = 1").unwrap_err();
        assert!(matches!(err, crate::Error::TomlParse(_)));
    }
}
