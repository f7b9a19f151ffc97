use crate::{ConfigError, CoreError};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_SETTINGS_FILE: &str = "trendcaster.toml";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const X_API_BASE_URL: &str = "https://api.twitter.com";

/// API credentials, read from the environment once at startup
#[derive(Clone)]
pub struct Credentials {
    pub gemini_key: String,
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_secret: String,
    pub bearer_token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Credentials {
    pub const REQUIRED: [&'static str; 6] = [
        "GEMINI_KEY",
        "TWITTER_API_KEY",
        "TWITTER_API_SECRET",
        "TWITTER_ACCESS_TOKEN",
        "TWITTER_ACCESS_SECRET",
        "BEARER_TOKEN",
    ];

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build credentials from an arbitrary key lookup, failing on the first
    /// required variable that is missing or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &str| {
            optional(key).ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: key.to_string(),
            })
        };

        Ok(Self {
            gemini_key: required("GEMINI_KEY")?,
            api_key: required("TWITTER_API_KEY")?,
            api_secret: required("TWITTER_API_SECRET")?,
            access_token: required("TWITTER_ACCESS_TOKEN")?,
            access_secret: required("TWITTER_ACCESS_SECRET")?,
            bearer_token: required("BEARER_TOKEN")?,
            client_id: optional("CLIENT_ID"),
            client_secret: optional("CLIENT_SECRET"),
        })
    }
}

/// A single required variable, for commands that need only part of the credentials
pub fn required_env(var_name: &str) -> Result<String, ConfigError> {
    std::env::var(var_name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
            var_name: var_name.to_string(),
        })
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_key", &"<redacted>")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .field("bearer_token", &"<redacted>")
            .field("client_id", &self.client_id.as_ref().map(|_| "<redacted>"))
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Tunables, loaded from an optional TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_posts_per_cycle: usize,
    pub cooldown_minutes: u64,
    /// Minimum likes for a post to count as successful
    pub engagement_threshold: u64,
    pub engagement_wait_minutes: u64,
    /// Local trigger times, `HH:MM`
    pub schedule: Vec<String>,
    pub results_dir: PathBuf,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub x_api_base_url: String,
    pub request_timeout_secs: u64,
    pub simulate_on_publish_failure: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_posts_per_cycle: 10,
            cooldown_minutes: 30,
            engagement_threshold: 5,
            engagement_wait_minutes: 5,
            schedule: vec![
                "09:00".to_string(),
                "14:00".to_string(),
                "19:00".to_string(),
            ],
            results_dir: PathBuf::from("results"),
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_base_url: GEMINI_BASE_URL.to_string(),
            x_api_base_url: X_API_BASE_URL.to_string(),
            request_timeout_secs: 30,
            simulate_on_publish_failure: true,
        }
    }
}

impl Settings {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                CoreError::Io(e)
            }
        })?;
        debug!("Loaded settings from {}", path.display());
        Ok(Self::from_toml_str(&contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_posts_per_cycle == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_posts_per_cycle".to_string(),
                value: "0".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }
        self.schedule_times()?;
        Ok(())
    }

    /// Parsed trigger times, sorted and deduplicated
    pub fn schedule_times(&self) -> Result<Vec<NaiveTime>, ConfigError> {
        if self.schedule.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "schedule".to_string(),
                value: "[]".to_string(),
            });
        }

        let mut times = self
            .schedule
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| {
                    ConfigError::InvalidValue {
                        field: "schedule".to_string(),
                        value: raw.clone(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        times.sort();
        times.dedup();
        Ok(times)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes * 60)
    }

    pub fn engagement_wait(&self) -> Duration {
        Duration::from_secs(self.engagement_wait_minutes * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub credentials: Credentials,
    pub settings: Settings,
}

impl AppConfig {
    /// Load settings and credentials. Without an explicit path the default
    /// settings file is used when present, otherwise built-in defaults apply.
    pub fn load(settings_path: Option<&Path>) -> Result<Self, CoreError> {
        let settings = load_settings(settings_path)?;
        let credentials = Credentials::from_env()?;
        info!("Configuration loaded");
        Ok(Self {
            credentials,
            settings,
        })
    }
}

/// Resolve settings the same way `AppConfig::load` does, without touching credentials
pub fn load_settings(settings_path: Option<&Path>) -> Result<Settings, CoreError> {
    match settings_path {
        Some(path) => Settings::load(path),
        None => {
            let default_path = Path::new(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                Settings::load(default_path)
            } else {
                debug!("No settings file found, using defaults");
                Ok(Settings::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("GEMINI_KEY", "gemini"),
            ("TWITTER_API_KEY", "key"),
            ("TWITTER_API_SECRET", "secret"),
            ("TWITTER_ACCESS_TOKEN", "token"),
            ("TWITTER_ACCESS_SECRET", "token-secret"),
            ("BEARER_TOKEN", "bearer"),
        ])
    }

    #[test]
    fn test_credentials_from_complete_env() {
        let env = full_env();
        let creds = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(creds.gemini_key, "gemini");
        assert_eq!(creds.bearer_token, "bearer");
        assert_eq!(creds.client_id, None);
    }

    #[test]
    fn test_missing_credential_fails_fast() {
        let mut env = full_env();
        env.remove("BEARER_TOKEN");
        let err = Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        match err {
            ConfigError::MissingEnvironmentVariable { var_name } => {
                assert_eq!(var_name, "BEARER_TOKEN")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let mut env = full_env();
        env.insert("GEMINI_KEY", "   ");
        assert!(Credentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).is_err());
    }

    #[test]
    fn test_required_env_reports_name() {
        let err = required_env("TRENDCASTER_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(err.to_string().contains("TRENDCASTER_TEST_UNSET_VARIABLE"));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let secrets = HashMap::from([
            ("GEMINI_KEY", "s3cr3t-gemini-value"),
            ("TWITTER_API_KEY", "s3cr3t-api-key-value"),
            ("TWITTER_API_SECRET", "s3cr3t-api-secret-value"),
            ("TWITTER_ACCESS_TOKEN", "s3cr3t-access-token-value"),
            ("TWITTER_ACCESS_SECRET", "s3cr3t-access-secret-value"),
            ("BEARER_TOKEN", "s3cr3t-bearer-value"),
            ("CLIENT_ID", "s3cr3t-client-id-value"),
            ("CLIENT_SECRET", "s3cr3t-client-secret-value"),
        ]);
        let creds = Credentials::from_lookup(|k| secrets.get(k).map(|v| v.to_string())).unwrap();
        let debug = format!("{:?}", creds);

        for value in secrets.values() {
            assert!(!debug.contains(value), "{} leaked into {}", value, debug);
        }
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.max_posts_per_cycle, 10);
        assert_eq!(settings.cooldown(), Duration::from_secs(30 * 60));
        assert_eq!(settings.engagement_threshold, 5);
        assert_eq!(settings.schedule_times().unwrap().len(), 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings = Settings::from_toml_str("cooldown_minutes = 0\nschedule = [\"08:30\"]").unwrap();
        assert_eq!(settings.cooldown_minutes, 0);
        assert_eq!(settings.engagement_wait_minutes, 5);
        assert_eq!(
            settings.schedule_times().unwrap(),
            vec![NaiveTime::from_hms_opt(8, 30, 0).unwrap()]
        );
    }

    #[test]
    fn test_invalid_schedule_is_rejected() {
        let err = Settings::from_toml_str("schedule = [\"25:99\"]").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = Settings::from_toml_str("schedule = []").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = Settings::from_toml_str("cooldown_minutes = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_schedule_times_are_sorted() {
        let settings = Settings {
            schedule: vec!["19:00".into(), "09:00".into(), "09:00".into()],
            ..Default::default()
        };
        let times = settings.schedule_times().unwrap();
        assert_eq!(times.len(), 2);
        assert!(times[0] < times[1]);
    }

    #[test]
    fn test_missing_settings_file() {
        let err = Settings::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
