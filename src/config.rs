use std::env;
use std::time::Duration;

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const DEFAULT_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_DATABASE_URL: &str = "sqlite:data/gcal-mcp.db?mode=rwc";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not valid: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Google OAuth client registration and endpoints.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub calendar_api_base: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub mcp_port: u16,
    pub database_url: String,
    pub base_url: String,
    pub google: GoogleConfig,
    pub max_duration: Duration,
    pub default_timezone: Option<String>,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Just the database location, for CLI commands that never talk to Google.
    pub fn database_url_from_env() -> String {
        env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
    }

    /// Load configuration through an arbitrary variable lookup, applying defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mcp_port = parse_or(&var, "MCP_PORT", 5233u16)?;
        let max_duration_secs = parse_or(&var, "MCP_MAX_DURATION_SECS", 60u64)?;

        let base_url = var("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{mcp_port}"))
            .trim_end_matches('/')
            .to_string();

        let google = GoogleConfig {
            client_id: var("GOOGLE_CLIENT_ID").ok_or(ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            client_secret: var("GOOGLE_CLIENT_SECRET")
                .ok_or(ConfigError::Missing("GOOGLE_CLIENT_SECRET"))?,
            redirect_uri: var("GOOGLE_REDIRECT_URI")
                .unwrap_or_else(|| format!("{base_url}/api/auth/callback/google")),
            auth_url: var("GOOGLE_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            token_url: var("GOOGLE_TOKEN_URL").unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            userinfo_url: var("GOOGLE_USERINFO_URL")
                .unwrap_or_else(|| DEFAULT_USERINFO_URL.to_string()),
            calendar_api_base: var("GOOGLE_CALENDAR_API_BASE")
                .unwrap_or_else(|| DEFAULT_CALENDAR_API_BASE.to_string()),
        };

        Ok(Self {
            mcp_port,
            database_url: var("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            base_url,
            google,
            max_duration: Duration::from_secs(max_duration_secs),
            default_timezone: var("DEFAULT_TIMEZONE"),
        })
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
