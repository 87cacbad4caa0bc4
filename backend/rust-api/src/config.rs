use serde::Deserialize;
use std::{env, str::FromStr, time::Duration};

use crate::game::DriverTiming;
use crate::models::{email::EmailSettings, GameConfig};
use crate::services::session_service::SessionLimits;

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub game: GameSettings,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub email: EmailConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub rules: GameConfig,
    /// Name recorded with results submitted from hosted sessions.
    pub player_name: String,
    pub question_bank_path: Option<String>,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            rules: GameConfig::default(),
            player_name: "Dave".to_string(),
            question_bank_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_interval_ms: u64,
    pub advance_delay_ms: u64,
    pub max_active: usize,
    /// Sessions nobody has read or driven for this long are dropped.
    pub idle_timeout_secs: u64,
    /// Finished sessions waiting for a reward are dropped sooner.
    pub finished_grace_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            advance_delay_ms: 2500,
            max_active: 1000,
            idle_timeout_secs: 1800,
            finished_grace_secs: 600,
            sweep_interval_secs: 60,
        }
    }
}

impl SessionConfig {
    pub fn timing(&self) -> DriverTiming {
        DriverTiming {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            advance_delay: Duration::from_millis(self.advance_delay_ms),
        }
    }

    pub fn limits(&self) -> SessionLimits {
        SessionLimits {
            max_active: self.max_active,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            finished_grace: Duration::from_secs(self.finished_grace_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Mongo,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "mongo" | "mongodb" => Ok(StorageBackend::Mongo),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            mongo_database: "birthday_challenge".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub settings: EmailSettings,
    /// Always addressed; the player's email, when known, goes on Cc.
    pub recipients: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            settings: EmailSettings {
                server: "smtp.gmail.com".to_string(),
                port: 587,
                login: String::new(),
                password: String::new(),
                from_email: "noreply@birthdaychallenge.com".to_string(),
                from_name: "Birthday Challenge".to_string(),
                use_tls: false,
            },
            recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    /// When set, SMTP credentials are fetched from this endpoint instead of `email.*`.
    pub connector_url: Option<String>,
    pub connector_token: Option<String>,
    pub ttl_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            connector_url: None,
            connector_token: None,
            ttl_secs: 3600,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &config::Config) -> Result<Self, config::ConfigError> {
        let defaults = Config::default();

        let server = ServerConfig {
            host: string_or(settings, "server.host", "HOST", &defaults.server.host),
            port: parse_or(settings, "server.port", "PORT", defaults.server.port)?,
        };

        let rules = match settings.get::<GameConfig>("game") {
            Ok(rules) => rules,
            Err(config::ConfigError::NotFound(_)) => GameConfig::default(),
            Err(e) => return Err(e),
        };
        let game = GameSettings {
            rules,
            player_name: string_or(
                settings,
                "game.player_name",
                "PLAYER_NAME",
                &defaults.game.player_name,
            ),
            question_bank_path: opt_string(settings, "game.question_bank_path", "QUESTION_BANK_PATH"),
        };

        let session = SessionConfig {
            tick_interval_ms: positive(
                "session.tick_interval_ms",
                parse_or(
                    settings,
                    "session.tick_interval_ms",
                    "SESSION_TICK_INTERVAL_MS",
                    defaults.session.tick_interval_ms,
                )?,
            )?,
            advance_delay_ms: parse_or(
                settings,
                "session.advance_delay_ms",
                "SESSION_ADVANCE_DELAY_MS",
                defaults.session.advance_delay_ms,
            )?,
            max_active: parse_or(
                settings,
                "session.max_active",
                "SESSION_MAX_ACTIVE",
                defaults.session.max_active,
            )?,
            idle_timeout_secs: positive(
                "session.idle_timeout_secs",
                parse_or(
                    settings,
                    "session.idle_timeout_secs",
                    "SESSION_IDLE_TIMEOUT_SECS",
                    defaults.session.idle_timeout_secs,
                )?,
            )?,
            finished_grace_secs: parse_or(
                settings,
                "session.finished_grace_secs",
                "SESSION_FINISHED_GRACE_SECS",
                defaults.session.finished_grace_secs,
            )?,
            sweep_interval_secs: positive(
                "session.sweep_interval_secs",
                parse_or(
                    settings,
                    "session.sweep_interval_secs",
                    "SESSION_SWEEP_INTERVAL_SECS",
                    defaults.session.sweep_interval_secs,
                )?,
            )?,
        };

        let storage = StorageConfig {
            backend: parse_or(
                settings,
                "storage.backend",
                "STORAGE_BACKEND",
                defaults.storage.backend,
            )?,
            mongo_uri: string_or(
                settings,
                "storage.mongo_uri",
                "MONGO_URI",
                &defaults.storage.mongo_uri,
            ),
            mongo_database: string_or(
                settings,
                "storage.mongo_database",
                "MONGO_DATABASE",
                &defaults.storage.mongo_database,
            ),
        };

        let credentials = CredentialsConfig {
            connector_url: opt_string(settings, "credentials.connector_url", "SMTP_CONNECTOR_URL"),
            connector_token: opt_string(
                settings,
                "credentials.connector_token",
                "SMTP_CONNECTOR_TOKEN",
            ),
            ttl_secs: parse_or(
                settings,
                "credentials.ttl_secs",
                "SMTP_CREDENTIALS_TTL_SECS",
                defaults.credentials.ttl_secs,
            )?,
        };

        // SMTP_* names are kept for compatibility with existing deployments
        let default_email = &defaults.email.settings;
        let login = string_or(settings, "email.login", "SMTP_USER", &default_email.login);
        let from_email = opt_string(settings, "email.from_email", "SMTP_FROM")
            .or_else(|| (!login.is_empty()).then(|| login.clone()))
            .unwrap_or_else(|| default_email.from_email.clone());
        let email_settings = EmailSettings {
            server: string_or(settings, "email.server", "SMTP_HOST", &default_email.server),
            port: parse_or(settings, "email.port", "SMTP_PORT", default_email.port)?,
            password: string_or(settings, "email.password", "SMTP_PASS", &default_email.password),
            from_email,
            from_name: string_or(
                settings,
                "email.from_name",
                "SMTP_FROM_NAME",
                &default_email.from_name,
            ),
            use_tls: parse_or(settings, "email.use_tls", "SMTP_SECURE", default_email.use_tls)?,
            login,
        };
        let enabled_by_default =
            !email_settings.login.is_empty() || credentials.connector_url.is_some();
        let email = EmailConfig {
            enabled: parse_or(settings, "email.enabled", "EMAIL_ENABLED", enabled_by_default)?,
            recipients: recipients(settings),
            settings: email_settings,
        };

        Ok(Config {
            server,
            game,
            session,
            storage,
            email,
            credentials,
        })
    }
}

fn opt_string(settings: &config::Config, key: &str, env_key: &str) -> Option<String> {
    settings
        .get_string(key)
        .or_else(|_| env::var(env_key))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn string_or(settings: &config::Config, key: &str, env_key: &str, default: &str) -> String {
    opt_string(settings, key, env_key).unwrap_or_else(|| default.to_string())
}

fn parse_or<T>(
    settings: &config::Config,
    key: &str,
    env_key: &str,
    default: T,
) -> Result<T, config::ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match opt_string(settings, key, env_key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| config::ConfigError::Message(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

/// Rejects zero for settings used as timer periods.
fn positive(key: &str, value: u64) -> Result<u64, config::ConfigError> {
    if value == 0 {
        return Err(config::ConfigError::Message(format!(
            "Invalid {}: must be greater than zero",
            key
        )));
    }
    Ok(value)
}

fn recipients(settings: &config::Config) -> Vec<String> {
    if let Ok(list) = settings.get::<Vec<String>>("notify.recipients") {
        return list;
    }
    opt_string(settings, "notify.recipients", "NOTIFY_RECIPIENTS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
