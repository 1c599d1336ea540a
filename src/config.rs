use serde::Deserialize;
use std::path::Path;

use crate::error::AppError;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub database: DbConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ScrapeConfig {
    /// Timetable page URL with a `{date}` placeholder (ISO date is substituted).
    pub url_template: String,
    /// Class label looked up as a substring of the section header row.
    pub class_name: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PollConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Webhook URL normally comes from the WEBHOOK_URL env var; the file keys are
/// a fallback for local runs.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub content: Option<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_interval_secs() -> u64 {
    60
}
fn default_db_path() -> String {
    "zastepstwa.db".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {:?}: {}", path, e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !self.scrape.url_template.contains("{date}") {
            return Err(AppError::Config(
                "scrape.url_template must contain a {date} placeholder".into(),
            ));
        }
        if self.scrape.class_name.trim().is_empty() {
            return Err(AppError::Config("scrape.class_name must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
[scrape]
url_template = "https://plan.szkola.example.pl/zastepstwa/{date}"
class_name = "3A"

[poll]
interval_secs = 120

[database]
path = "test.db"

[webhook]
url = "https://discord.com/api/webhooks/1/abc"
content = "@everyone"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.scrape.class_name, "3A");
        assert_eq!(config.scrape.timeout_secs, 15);
        assert_eq!(config.poll.interval_secs, 120);
        assert_eq!(config.database.path, "test.db");
        assert_eq!(config.webhook.content.as_deref(), Some("@everyone"));
    }

    #[test]
    fn test_defaults_for_missing_sections() {
        let toml_str = r#"
[scrape]
url_template = "https://plan.szkola.example.pl/{date}"
class_name = "2B"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.database.path, "zastepstwa.db");
        assert!(config.webhook.url.is_none());
    }

    #[test]
    fn test_rejects_template_without_date() {
        let toml_str = r#"
[scrape]
url_template = "https://plan.szkola.example.pl/dzisiaj"
class_name = "3A"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }
}
