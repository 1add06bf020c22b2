use std::env;
use std::path::PathBuf;

use anyhow::Context;
use url::Url;

pub fn init_logging() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
}

pub const OLLAMA_API_URL: &str = "http://localhost:11434/v1/chat/completions";
pub const MODEL_NAME: &str = "llama3";

pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
pub const GMAIL_SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

const TOKEN_CACHE_FILE: &str = "tokencache.json";
const CLIENT_SECRET_FILE: &str = "./cfg/client_secret.json";
const STATIC_DIR: &str = "./static";

const BIND_HOST: &str = "127.0.0.1";
const BIND_PORT: u16 = 8080;

/// Everything the server needs at startup. Defaults come from the constants
/// above; each one can be overridden with a `MAILAGENT_*` variable, either
/// in the environment or in a `.env` file.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ollama_url: String,
    pub model: String,
    pub gmail_send_url: String,
    pub token_cache_path: PathBuf,
    pub client_secret_path: PathBuf,
    pub static_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            ollama_url: OLLAMA_API_URL.to_string(),
            model: MODEL_NAME.to_string(),
            gmail_send_url: GMAIL_SEND_URL.to_string(),
            token_cache_path: PathBuf::from(TOKEN_CACHE_FILE),
            client_secret_path: PathBuf::from(CLIENT_SECRET_FILE),
            static_dir: PathBuf::from(STATIC_DIR),
            host: BIND_HOST.to_string(),
            port: BIND_PORT,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env file is the normal case.
        dotenv::dotenv().ok();

        let defaults = AppConfig::default();
        let port = match env::var("MAILAGENT_PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("MAILAGENT_PORT is not a valid port: {}", raw))?,
            Err(_) => defaults.port,
        };

        let config = AppConfig {
            ollama_url: env_or("MAILAGENT_OLLAMA_URL", defaults.ollama_url),
            model: env_or("MAILAGENT_MODEL", defaults.model),
            gmail_send_url: env_or("MAILAGENT_GMAIL_SEND_URL", defaults.gmail_send_url),
            token_cache_path: env_or_path("MAILAGENT_TOKEN_CACHE", defaults.token_cache_path),
            client_secret_path: env_or_path("MAILAGENT_CLIENT_SECRET", defaults.client_secret_path),
            static_dir: env_or_path("MAILAGENT_STATIC_DIR", defaults.static_dir),
            host: env_or("MAILAGENT_HOST", defaults.host),
            port,
        };

        Url::parse(&config.ollama_url)
            .with_context(|| format!("Invalid Ollama URL: {}", config.ollama_url))?;
        Url::parse(&config.gmail_send_url)
            .with_context(|| format!("Invalid Gmail send URL: {}", config.gmail_send_url))?;

        Ok(config)
    }

    /// Where Google redirects back to after the consent screen.
    pub fn oauth_redirect_url(&self) -> String {
        format!("http://{}:{}/oauth/callback", self.redirect_host(), self.port)
    }

    fn redirect_host(&self) -> &str {
        // Google only accepts loopback redirects for "localhost", not 127.0.0.1 or 0.0.0.0.
        match self.host.as_str() {
            "127.0.0.1" | "0.0.0.0" => "localhost",
            other => other,
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_or_path(key: &str, default: PathBuf) -> PathBuf {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}
