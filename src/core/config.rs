use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://www.cbr.ru/scripts/XML_daily.asp";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection string; takes precedence over the individual parts.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: None,
            host: "db".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "exchange_rates_db".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn database_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgresql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub api_timeout_secs: u64,
    pub fetch_interval_minutes: u64,
    pub database: DatabaseConfig,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_url: DEFAULT_API_URL.to_string(),
            api_timeout_secs: 10,
            fetch_interval_minutes: 5,
            database: DatabaseConfig::default(),
            log_file: Some(PathBuf::from("logs/error.log")),
        }
    }
}

impl AppConfig {
    /// Builds the effective configuration: defaults, then the YAML file
    /// (explicit path or the default one if present), then `.env` and the
    /// process environment.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let default_path = Self::default_config_path()?;
                if default_path.exists() {
                    Self::load_from_path(&default_path)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };

        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {e}");
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fxfeed", "fxfeed")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Overrides fields from environment-style variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("API_URL") {
            self.api_url = url;
        }
        if let Some(v) = lookup("API_TIMEOUT") {
            self.api_timeout_secs = parse_number("API_TIMEOUT", &v)?;
        }
        if let Some(v) = lookup("FETCH_INTERVAL") {
            self.fetch_interval_minutes = parse_number("FETCH_INTERVAL", &v)?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(host) = lookup("DB_HOST") {
            self.database.host = host;
        }
        if let Some(v) = lookup("DB_PORT") {
            self.database.port = parse_number("DB_PORT", &v)?;
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = name;
        }
        if let Some(path) = lookup("LOG_FILE") {
            self.log_file = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            bail!("api_url must not be empty");
        }
        if self.api_timeout_secs == 0 {
            bail!("api_timeout_secs must be greater than zero");
        }
        if self.fetch_interval_minutes == 0 {
            bail!("fetch_interval_minutes must be greater than zero");
        }
        Ok(())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_secs(self.fetch_interval_minutes * 60)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: '{value}'"))
}
