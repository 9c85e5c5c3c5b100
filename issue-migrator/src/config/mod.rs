//! Settings loading.
//!
//! Settings come from a kebab-case TOML file, then environment variables,
//! then whatever the caller overrides explicitly. [`MigrationSettings::validate`]
//! runs last.

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{
    DestinationSettings, MigrationOptions, MigrationSettings, SourceSettings,
    DEFAULT_PLACEHOLDER_PASSWORD,
};

use std::path::Path;
use tracing::debug;
use url::Url;

/// Overrides `[source] url`.
pub const JIRA_URL_ENV: &str = "JIRA_URL";
/// Overrides `[source] username`.
pub const JIRA_USERNAME_ENV: &str = "JIRA_USERNAME";
/// Overrides `[source] password`.
pub const JIRA_PASSWORD_ENV: &str = "JIRA_PASSWORD";
/// Overrides `[destination] url`.
pub const GITLAB_URL_ENV: &str = "GITLAB_URL";
/// Overrides `[destination] token`.
pub const GITLAB_TOKEN_ENV: &str = "GITLAB_TOKEN";

/// Origin reported for validation errors, which apply to the merged settings.
const MERGED_SETTINGS: &str = "<settings>";

impl MigrationSettings {
    /// Reads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if `path` does not exist, or an
    /// I/O or parse error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading settings");

        if !path.exists() {
            return Err(ConfigError::MissingFile {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::TomlError {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Loads `path` if given, otherwise starts from defaults.
    ///
    /// # Errors
    ///
    /// See [`MigrationSettings::load`].
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Replaces connection settings with any set environment variables.
    pub fn apply_env(&mut self) {
        let overrides = [
            (JIRA_URL_ENV, &mut self.source.url),
            (JIRA_USERNAME_ENV, &mut self.source.username),
            (JIRA_PASSWORD_ENV, &mut self.source.password),
            (GITLAB_URL_ENV, &mut self.destination.url),
            (GITLAB_TOKEN_ENV, &mut self.destination.token),
        ];

        for (name, target) in overrides {
            if let Ok(value) = std::env::var(name) {
                if !value.is_empty() {
                    debug!(variable = name, "Using setting from environment");
                    *target = value;
                }
            }
        }
    }

    /// Checks that the settings describe a runnable migration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::ValidationError {
            path: MERGED_SETTINGS.to_string(),
            message,
        };

        for (name, value) in [
            ("source.url", &self.source.url),
            ("destination.url", &self.destination.url),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{name} is required")));
            }
            if Url::parse(value).is_err() {
                return Err(invalid(format!("{name} is not a valid URL: {value}")));
            }
        }

        for (name, value) in [
            ("source.username", &self.source.username),
            ("source.password", &self.source.password),
            ("destination.token", &self.destination.token),
        ] {
            if value.is_empty() {
                return Err(invalid(format!("{name} is required")));
            }
        }

        if self.migration.page_size == 0 {
            return Err(invalid("migration.page-size must be greater than 0".to_string()));
        }

        if self.migration.retry_attempts == 0 {
            return Err(invalid(
                "migration.retry-attempts must be greater than 0".to_string(),
            ));
        }

        if self.migration.placeholder_password.is_empty() {
            return Err(invalid(
                "migration.placeholder-password must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    const ALL_ENV: [&str; 5] = [
        JIRA_URL_ENV,
        JIRA_USERNAME_ENV,
        JIRA_PASSWORD_ENV,
        GITLAB_URL_ENV,
        GITLAB_TOKEN_ENV,
    ];

    fn write_settings(temp: &TempDir, contents: &str) -> PathBuf {
        let path = temp.path().join("issue-migrator.toml");
        fs::write(&path, contents).unwrap();
        path
    }

    fn complete() -> MigrationSettings {
        let mut settings = MigrationSettings::default();
        settings.source = SourceSettings {
            url: "https://jira.example.com/".to_string(),
            username: "migrator".to_string(),
            password: "secret".to_string(),
        };
        settings.destination.url = "https://gitlab.example.com/".to_string();
        settings.destination.token = "glpat-token".to_string();
        settings
    }

    #[test]
    fn test_load_full_settings() {
        let temp = TempDir::new().unwrap();
        let path = write_settings(
            &temp,
            r#"
[source]
url = "https://jira.example.com/"
username = "migrator"
password = "secret"

[destination]
url = "https://gitlab.example.com/"
token = "glpat-token"
project-id = 42
project-visibility = "private"

[migration]
staging-dir = "/var/tmp/stage"
limit = 25
retry-delay-secs = 0
"#,
        );

        let settings = MigrationSettings::load(&path).unwrap();

        assert_eq!(settings.source.username, "migrator");
        assert_eq!(settings.destination.project_id, Some(42));
        assert_eq!(settings.destination.project_visibility, "private");
        assert_eq!(settings.migration.staging_dir, PathBuf::from("/var/tmp/stage"));
        assert_eq!(settings.migration.quarantine_dir, PathBuf::from("./quarantine"));
        assert_eq!(settings.migration.page_size, 1000);
        assert_eq!(settings.migration.snapshot_options().limit, Some(25));
        assert_eq!(settings.migration.replay_options().retry.delay, Duration::ZERO);
        assert_eq!(settings.migration.replay_options().retry.attempts, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let options = MigrationOptions::default();
        assert_eq!(options.snapshot_options().limit, None);
        assert_eq!(options.default_label, "To Do");
        assert_eq!(options.default_assignee_id, 1);
        assert_eq!(options.replay_options().retry.delay, Duration::from_secs(5));
        assert_eq!(
            DestinationSettings::default().project_visibility,
            "public"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = MigrationSettings::load(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::MissingFile { .. })));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_settings(&temp, "[migration]\nadmin-username = \"root\"\n");

        let result = MigrationSettings::load(&path);
        assert!(matches!(result, Err(ConfigError::TomlError { .. })));
    }

    #[test]
    fn test_validation_requires_credentials() {
        let mut settings = complete();
        settings.destination.token.clear();

        let result = settings.validate();
        assert!(
            matches!(result, Err(ConfigError::ValidationError { ref message, .. }) if message.contains("destination.token"))
        );
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut settings = complete();
        settings.source.url = "not a url".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validation_zero_page_size() {
        let mut settings = complete();
        settings.migration.page_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        temp_env::with_vars_unset(ALL_ENV, || {
            temp_env::with_vars(
                [
                    (JIRA_URL_ENV, Some("https://other-jira.example.com/")),
                    (GITLAB_TOKEN_ENV, Some("from-env")),
                ],
                || {
                    let mut settings = complete();
                    settings.apply_env();
                    assert_eq!(settings.source.url, "https://other-jira.example.com/");
                    assert_eq!(settings.destination.token, "from-env");
                    assert_eq!(settings.source.username, "migrator");
                },
            );
        });
    }

    #[test]
    fn test_empty_env_value_is_ignored() {
        temp_env::with_vars_unset(ALL_ENV, || {
            temp_env::with_var(JIRA_PASSWORD_ENV, Some(""), || {
                let mut settings = complete();
                settings.apply_env();
                assert_eq!(settings.source.password, "secret");
            });
        });
    }
}
