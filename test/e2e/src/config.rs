//! Suite configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `satrig.toml` in the working directory, or the file named by
//!    `SATRIG_SETTINGS` (optional)
//! 3. environment variables such as `SATRIG__SERVER__HOSTNAME`

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use satrig_poll::{Backoff, PollConfig};
use satrig_remote::HttpRemoteConfig;
use serde::Deserialize;

/// Environment variable naming an alternative settings file.
pub const SETTINGS_PATH_ENV: &str = "SATRIG_SETTINGS";
const DEFAULT_SETTINGS_PATH: &str = "satrig.toml";
const ENV_PREFIX: &str = "SATRIG";

/// All suite settings, loaded once.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub poll: PollSettings,
    pub rh_cloud: RhCloudSettings,
    pub sync_plan: SyncPlanSettings,
    pub subscription: SubscriptionSettings,
    pub backup: BackupSettings,
    pub fam: FamSettings,
}

/// The system under test.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub hostname: String,
    pub scheme: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
    pub verify_ssl: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            scheme: "https".to_string(),
            port: None,
            username: "admin".to_string(),
            password: "changeme".to_string(),
            verify_ssl: true,
        }
    }
}

impl ServerSettings {
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.hostname, port),
            None => format!("{}://{}", self.scheme, self.hostname),
        }
    }

    pub fn http_config(&self) -> HttpRemoteConfig {
        HttpRemoteConfig {
            base_url: self.base_url(),
            username: self.username.clone(),
            password: self.password.clone(),
            verify_ssl: self.verify_ssl,
        }
    }
}

/// Default polling behavior for remote tasks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    pub max_attempts: u32,
    pub max_interval_secs: u64,
    /// 1 keeps the interval fixed.
    pub backoff_multiplier: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_attempts: 10,
            max_interval_secs: 60,
            backoff_multiplier: 1,
        }
    }
}

impl PollSettings {
    pub fn to_config(&self) -> PollConfig {
        let backoff = if self.backoff_multiplier > 1 {
            Backoff::Exponential {
                multiplier: self.backoff_multiplier,
            }
        } else {
            Backoff::Fixed
        };
        PollConfig::fixed(Duration::from_secs(self.interval_secs), self.max_attempts)
            .with_backoff(backoff)
            .with_max_interval(Duration::from_secs(self.max_interval_secs))
    }
}

/// Insights (Red Hat cloud) integration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RhCloudSettings {
    /// Use hosted Insights rather than a local advisor engine.
    pub hosted_insights: bool,
    pub iop_advisor_image: String,
    /// Newline-separated commands run after installing the advisor engine.
    pub iop_setup_script: String,
}

impl Default for RhCloudSettings {
    fn default() -> Self {
        Self {
            hosted_insights: true,
            iop_advisor_image: String::new(),
            iop_setup_script: String::new(),
        }
    }
}

impl RhCloudSettings {
    pub fn setup_commands(&self) -> impl Iterator<Item = &str> {
        self.iop_setup_script
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}

/// Timing of schedule-driven sync plan tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncPlanSettings {
    /// Custom cron plans fire on every multiple of this many minutes.
    pub cron_multiple_minutes: u32,
    /// Minimum time to keep before the next cron boundary.
    pub guard_secs: u64,
}

impl Default for SyncPlanSettings {
    fn default() -> Self {
        Self {
            cron_multiple_minutes: 5,
            guard_secs: 180,
        }
    }
}

impl SyncPlanSettings {
    pub fn cron_expression(&self) -> String {
        format!("*/{} * * * *", self.cron_multiple_minutes)
    }

    pub fn guard(&self) -> Duration {
        Duration::from_secs(self.guard_secs)
    }
}

/// Subscription manifests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubscriptionSettings {
    /// Manifest file on the server, imported with `hammer subscription upload`.
    pub manifest_path: String,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            manifest_path: "/root/manifest.zip".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Parent directory for `satellite-maintain backup`.
    pub dir: String,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            dir: "/var/backup".to_string(),
        }
    }
}

/// The Ansible collection's live tests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FamSettings {
    pub python_command: String,
    pub pytest_command: String,
}

impl Default for FamSettings {
    fn default() -> Self {
        Self {
            python_command: "python3".to_string(),
            pytest_command: "pytest-3.12".to_string(),
        }
    }
}

impl Settings {
    /// Load from the default file location and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
        Self::load_from(&path)
    }

    /// Load from `path` (if it exists) and the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse settings from a TOML string, without the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.base_url(), "https://localhost");
        assert!(settings.rh_cloud.hosted_insights);
        assert_eq!(settings.sync_plan.cron_expression(), "*/5 * * * *");
        assert_eq!(settings.poll.to_config().max_attempts, 10);
        assert_eq!(settings.backup.dir, "/var/backup");
        assert_eq!(settings.fam.pytest_command, "pytest-3.12");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [server]
            hostname = "sat.example.com"
            port = 8443

            [poll]
            interval_secs = 2
            backoff_multiplier = 2
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.base_url(), "https://sat.example.com:8443");
        assert_eq!(settings.server.username, "admin");

        let poll = settings.poll.to_config();
        assert_eq!(poll.interval, Duration::from_secs(2));
        assert_eq!(poll.backoff, Backoff::Exponential { multiplier: 2 });
        assert_eq!(poll.delay_after(2), Duration::from_secs(4));
    }

    #[test]
    fn test_content_host_sections_from_toml() {
        let settings = Settings::from_toml(
            r#"
            [subscription]
            manifest_path = "/tmp/manifest_sca.zip"

            [fam]
            pytest_command = "pytest"
            "#,
        )
        .unwrap();

        assert_eq!(settings.subscription.manifest_path, "/tmp/manifest_sca.zip");
        assert_eq!(settings.fam.pytest_command, "pytest");
        assert_eq!(settings.fam.python_command, "python3");
        assert_eq!(settings.backup.dir, "/var/backup");
    }

    #[test]
    fn test_setup_commands_skip_blank_lines() {
        let rh_cloud = RhCloudSettings {
            iop_setup_script: "foreman-rake rules:generate\n\n  systemctl restart x  \n".into(),
            ..Default::default()
        };
        let commands: Vec<_> = rh_cloud.setup_commands().collect();
        assert_eq!(commands, vec!["foreman-rake rules:generate", "systemctl restart x"]);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let settings = Settings::load_from(Path::new("/nonexistent/satrig.toml")).unwrap();
        assert_eq!(settings.sync_plan.guard_secs, 180);
    }
}
