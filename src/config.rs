use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};

pub const DEFAULT_PORTAL_URL: &str = "https://webprosindia.com/vignanit";

fn default_portal_url() -> String {
    DEFAULT_PORTAL_URL.to_string()
}

fn default_wait_timeout_secs() -> u64 {
    15
}

fn default_session_file() -> PathBuf {
    PathBuf::from("bot_session.json")
}

fn default_poll_timeout_secs() -> u64 {
    30
}

/// The env vars the bot reads at startup.
#[derive(Debug, Deserialize)]
pub struct BotEnv {
    /// Telegram bot token.
    pub token: String,
    #[serde(default = "default_portal_url")]
    pub ecap_url: String,
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

pub struct BotConfig {
    pub telegram_token: String,
    pub portal_url: String,
    pub chrome_path: Option<PathBuf>,
    pub wait_timeout: Duration,
    pub session_file: PathBuf,
    pub poll_timeout_secs: u64,
    pub log_file: Option<PathBuf>,
}

impl BotConfig {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::from(BotEnv::load_from_env()?))
    }
}

impl From<BotEnv> for BotConfig {
    fn from(env: BotEnv) -> Self {
        Self {
            telegram_token: env.token,
            portal_url: env.ecap_url,
            chrome_path: env.chrome_path,
            wait_timeout: Duration::from_secs(env.wait_timeout_secs),
            session_file: env.session_file,
            poll_timeout_secs: env.poll_timeout_secs,
            log_file: env.log_file,
        }
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> anyhow::Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        let config =
            envy::from_env::<Self>().context("failed to load env variables into config struct")?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}
