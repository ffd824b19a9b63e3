use crate::error::{ConsensusError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variables override file values, e.g. `POOLRAFT_CONSENSUS__ENABLED=false`
pub const ENV_PREFIX: &str = "POOLRAFT";

/// Pool configuration consumed by the consensus layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Watchdog enabled; consensus mode is only possible with a watchdog
    pub use_watchdog: bool,

    pub consensus: ConsensusSettings,

    /// Credentials used for the consensus connection and backend probes
    pub credentials: Credentials,

    /// Backends in configuration order (index = backend id)
    pub backends: Vec<BackendDescriptor>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            use_watchdog: false,
            consensus: ConsensusSettings::default(),
            credentials: Credentials::default(),
            backends: Vec::new(),
        }
    }
}

/// Where and how to reach the consensus service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusSettings {
    /// Consensus flag: `true` selects pgraft, `false` the heuristic strategy
    pub enabled: bool,

    pub cluster_id: String,

    /// This pool node's id within the consensus cluster
    pub node_id: i32,

    pub address: String,
    pub port: u16,

    pub connect_timeout_secs: u64,

    /// Bound for each backend probe while resolving the leader backend
    pub probe_timeout_secs: u64,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            cluster_id: String::new(),
            node_id: -1,
            address: "127.0.0.1".to_string(),
            port: 5432,
            connect_timeout_secs: 10,
            probe_timeout_secs: 5,
        }
    }
}

impl ConsensusSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub user: String,
    pub password: Option<String>,
    pub database: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            user: "postgres".to_string(),
            password: None,
            database: "postgres".to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .finish()
    }
}

/// A routable database endpoint as configured in the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub hostname: String,
    pub port: u16,
    #[serde(default = "default_valid")]
    pub valid: bool,
}

fn default_valid() -> bool {
    true
}

impl BackendDescriptor {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            valid: true,
        }
    }

    pub fn invalid(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            valid: false,
            ..Self::new(hostname, port)
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

impl PoolSettings {
    /// Load settings from an optional file, then apply `POOLRAFT_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            tracing::info!("Loading pool settings from: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: PoolSettings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.user.trim().is_empty() {
            return Err(config_error("credentials.user must not be empty"));
        }
        if self.consensus.connect_timeout_secs == 0 {
            return Err(config_error("consensus.connect_timeout_secs must be greater than 0"));
        }
        if self.consensus.probe_timeout_secs == 0 {
            return Err(config_error("consensus.probe_timeout_secs must be greater than 0"));
        }
        if self.consensus.enabled {
            if self.consensus.cluster_id.trim().is_empty() {
                return Err(config_error("consensus.cluster_id is required when consensus is enabled"));
            }
            if self.consensus.address.trim().is_empty() {
                return Err(config_error("consensus.address is required when consensus is enabled"));
            }
        }
        Ok(())
    }
}

fn config_error(message: &str) -> ConsensusError {
    ConsensusError::Config {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_heuristic_friendly() {
        let settings = PoolSettings::default();
        assert!(!settings.use_watchdog);
        assert!(!settings.consensus.enabled);
        assert_eq!(settings.consensus.probe_timeout(), Duration::from_secs(5));
        assert_eq!(settings.credentials.database, "postgres");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = write_settings(
            r#"
use_watchdog = true

[consensus]
enabled = true
cluster_id = "pool-a"
node_id = 2
address = "10.0.0.5"
port = 5433
probe_timeout_secs = 3

[credentials]
user = "repl_check"
password = "secret"

[[backends]]
hostname = "10.0.0.11"
port = 5432

[[backends]]
hostname = "10.0.0.12"
port = 5432
valid = false
"#,
        );

        let settings = PoolSettings::load(Some(file.path())).unwrap();
        assert!(settings.use_watchdog);
        assert!(settings.consensus.enabled);
        assert_eq!(settings.consensus.cluster_id, "pool-a");
        assert_eq!(settings.consensus.node_id, 2);
        assert_eq!(settings.consensus.port, 5433);
        assert_eq!(settings.consensus.connect_timeout_secs, 10);
        assert_eq!(settings.consensus.probe_timeout(), Duration::from_secs(3));
        assert_eq!(settings.credentials.user, "repl_check");
        assert_eq!(settings.credentials.database, "postgres");
        assert_eq!(settings.backends.len(), 2);
        assert!(settings.backends[0].valid);
        assert!(!settings.backends[1].valid);
        assert_eq!(settings.backends[1].endpoint(), "10.0.0.12:5432");
    }

    #[test]
    fn test_enabled_consensus_requires_cluster_id() {
        let file = write_settings(
            r#"
use_watchdog = true

[consensus]
enabled = true
"#,
        );

        let err = PoolSettings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConsensusError::Config { .. }));
    }

    #[test]
    fn test_zero_probe_timeout_rejected() {
        let mut settings = PoolSettings::default();
        settings.consensus.probe_timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials {
            password: Some("hunter2".to_string()),
            ..Credentials::default()
        };
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
