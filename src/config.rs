use std::fs::File;
use std::io::Read;

use failure::ResultExt;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::ErrorKind;
use super::Result;

/// Controller configuration options, loaded once at startup and never mutated.
///
/// Mirrors the flat key/value document described by the original tool, with a handful of
/// additional defaulted knobs (timeouts, tick interval) in the style of the teacher crate's own
/// `ZookeeperConfig`/`CleanupConfig` records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Non-empty list of `host:port` endpoints for the ZooKeeper ensemble.
    pub zk_hosts: Vec<String>,

    /// Absolute znode path prefix under which services are registered (e.g. `/services`).
    pub zk_path_service: String,

    /// Service identifier; the membership directory is `{zk_path_service}/{srv_name}`.
    pub srv_name: String,

    /// This node's authoritative address; also the leaf znode name.
    pub srv_auth_ip: String,

    /// Ordered list of secondary addresses the service as a whole may host.
    #[serde(default)]
    pub srv_non_auth_ips: Vec<String>,

    /// Shell command used as the health probe.
    pub local_check: String,

    /// ZooKeeper session timeout, in seconds.
    #[serde(default = "Config::default_zk_session_timeout_secs")]
    pub zk_session_timeout_secs: u64,

    /// Hard deadline for the health probe, in milliseconds.
    #[serde(default = "Config::default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Short poll interval used while waiting for flags to be raised, in milliseconds.
    #[serde(default = "Config::default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Maximum time to wait for a flag before re-emitting the current table anyway, in seconds.
    #[serde(default = "Config::default_long_sleep_secs")]
    pub long_sleep_secs: u64,
}

impl Config {
    fn default_zk_session_timeout_secs() -> u64 {
        10
    }

    fn default_probe_timeout_ms() -> u64 {
        1000
    }

    fn default_tick_interval_ms() -> u64 {
        100
    }

    fn default_long_sleep_secs() -> u64 {
        10
    }

    /// Load configuration from a YAML document at the given path.
    pub fn from_file(path: &str) -> Result<Config> {
        let mut file = File::open(path)
            .with_context(|_| ErrorKind::ConfigLoad(path.to_string()))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .with_context(|_| ErrorKind::ConfigLoad(path.to_string()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|_| ErrorKind::ConfigLoad(path.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The znode path of the service's membership directory.
    pub fn service_path(&self) -> String {
        format!("{}/{}", self.zk_path_service, self.srv_name)
    }

    /// The full path of this node's ephemeral membership marker.
    pub fn membership_path(&self) -> String {
        format!("{}/{}", self.service_path(), self.srv_auth_ip)
    }

    /// Validate that all mandatory fields were supplied and are well formed.
    fn validate(&self) -> Result<()> {
        if self.zk_hosts.is_empty() {
            return Err(ErrorKind::ConfigInvalid("zk_hosts must not be empty".into()).into());
        }
        if !self.zk_path_service.starts_with('/') {
            return Err(
                ErrorKind::ConfigInvalid("zk_path_service must be an absolute path".into()).into()
            );
        }
        if self.srv_name.is_empty() {
            return Err(ErrorKind::ConfigInvalid("srv_name must not be empty".into()).into());
        }
        if self.srv_auth_ip.is_empty() {
            return Err(ErrorKind::ConfigInvalid("srv_auth_ip must not be empty".into()).into());
        }
        if self.local_check.is_empty() {
            return Err(ErrorKind::ConfigInvalid("local_check must not be empty".into()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::Config;

    fn sample_yaml() -> &'static str {
        r#"
zk_hosts:
  - "zk1:2181"
  - "zk2:2181"
zk_path_service: "/services"
srv_name: "web"
srv_auth_ip: "10.0.0.1"
srv_non_auth_ips:
  - "10.0.0.2"
  - "10.0.0.3"
local_check: "/usr/bin/check.sh"
"#
    }

    #[test]
    fn loads_mandatory_fields_and_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.zk_hosts, vec!["zk1:2181", "zk2:2181"]);
        assert_eq!(config.srv_auth_ip, "10.0.0.1");
        assert_eq!(config.srv_non_auth_ips, vec!["10.0.0.2", "10.0.0.3"]);
        assert_eq!(config.zk_session_timeout_secs, 10);
        assert_eq!(config.probe_timeout_ms, 1000);
        assert_eq!(config.tick_interval_ms, 100);
        assert_eq!(config.long_sleep_secs, 10);
    }

    #[test]
    fn membership_path_matches_invariant() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.service_path(), "/services/web");
        assert_eq!(config.membership_path(), "/services/web/10.0.0.1");
    }

    #[test]
    fn rejects_empty_zk_hosts() {
        let yaml = r#"
zk_hosts: []
zk_path_service: "/services"
srv_name: "web"
srv_auth_ip: "10.0.0.1"
local_check: "/usr/bin/check.sh"
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    /// Invariant 4: loading a document and re-serializing it yields the same canonical form,
    /// field for field.
    #[test]
    fn round_trips_through_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();
        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

        let serialized = serde_yaml::to_string(&config).unwrap();
        let reloaded: Config = serde_yaml::from_str(&serialized).unwrap();

        assert_eq!(reloaded.zk_hosts, config.zk_hosts);
        assert_eq!(reloaded.zk_path_service, config.zk_path_service);
        assert_eq!(reloaded.srv_name, config.srv_name);
        assert_eq!(reloaded.srv_auth_ip, config.srv_auth_ip);
        assert_eq!(reloaded.srv_non_auth_ips, config.srv_non_auth_ips);
        assert_eq!(reloaded.local_check, config.local_check);
        assert_eq!(reloaded.zk_session_timeout_secs, config.zk_session_timeout_secs);
        assert_eq!(reloaded.probe_timeout_ms, config.probe_timeout_ms);
        assert_eq!(reloaded.tick_interval_ms, config.tick_interval_ms);
        assert_eq!(reloaded.long_sleep_secs, config.long_sleep_secs);
    }

    #[test]
    fn rejects_relative_service_path() {
        let yaml = r#"
zk_hosts: ["zk1:2181"]
zk_path_service: "services"
srv_name: "web"
srv_auth_ip: "10.0.0.1"
local_check: "/usr/bin/check.sh"
"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let result = Config::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }
}
