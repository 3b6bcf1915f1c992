//! Configuration for the whisper relay
//!
//! All settings come from the environment; the CLI can override the port.

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::{Error, Result};

/// Default listen port
pub const DEFAULT_PORT: u16 = 5000;

/// Default Telegram Bot API base URL (token is appended)
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org/bot";

/// Default keep-alive ping interval (10 minutes)
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 600;

/// Whisper relay configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub bot_token: String,

    /// Bot API base URL, without the token segment
    pub api_base: String,

    /// Public URL registered with Telegram for webhook delivery
    pub webhook_url: Option<String>,

    /// HTTP listen port
    pub port: u16,

    /// Data directory (history database lives here)
    pub data_dir: PathBuf,

    /// Keep-alive pinger configuration
    pub keep_alive: KeepAliveConfig,
}

/// Keep-alive pinger configuration
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// URLs pinged every interval
    pub urls: Vec<String>,

    /// Seconds between ping rounds
    pub interval_secs: u64,
}

impl Config {
    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns error if `WHISPER_BOT_TOKEN` is unset or the data directory
    /// cannot be determined.
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("WHISPER_BOT_TOKEN")
            .map_err(|_| Error::Config("WHISPER_BOT_TOKEN is not set".to_string()))?;

        let api_base = std::env::var("WHISPER_API_BASE")
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let webhook_url = std::env::var("WHISPER_WEBHOOK_URL").ok();

        let port = std::env::var("WHISPER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let data_dir = match std::env::var("WHISPER_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => default_data_dir()?,
        };

        let interval_secs = std::env::var("WHISPER_KEEP_ALIVE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_KEEP_ALIVE_SECS);

        let keep_alive = KeepAliveConfig {
            urls: keep_alive_urls(webhook_url.as_deref()),
            interval_secs,
        };

        Ok(Self {
            bot_token,
            api_base,
            webhook_url,
            port,
            data_dir,
            keep_alive,
        })
    }

    /// Path to the history database file
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("history.db")
    }
}

/// Resolve the platform data directory
fn default_data_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", "whisper-relay")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| Error::Config("could not determine data directory".to_string()))
}

/// Build the default keep-alive URL list: the webhook's own origin (so the
/// hosting platform sees traffic) plus the Bot API host.
fn keep_alive_urls(webhook_url: Option<&str>) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(origin) = webhook_url.and_then(base_origin) {
        urls.push(origin);
    }
    urls.push("https://api.telegram.org".to_string());
    urls
}

/// Extract `scheme://host` from a URL, dropping any path
fn base_origin(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let rest = &url[scheme_end + 3..];
    if rest.is_empty() {
        return None;
    }
    let host_end = rest.find('/').map_or(url.len(), |i| scheme_end + 3 + i);
    Some(url[..host_end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_origin_strips_path() {
        assert_eq!(
            base_origin("https://example.onrender.com/webhook"),
            Some("https://example.onrender.com".to_string())
        );
    }

    #[test]
    fn base_origin_keeps_bare_origin() {
        assert_eq!(
            base_origin("https://example.onrender.com"),
            Some("https://example.onrender.com".to_string())
        );
    }

    #[test]
    fn base_origin_rejects_schemeless() {
        assert_eq!(base_origin("example.com/webhook"), None);
        assert_eq!(base_origin("https://"), None);
    }

    #[test]
    fn keep_alive_includes_webhook_origin_and_api() {
        let urls = keep_alive_urls(Some("https://app.example.com/webhook"));
        assert_eq!(
            urls,
            vec![
                "https://app.example.com".to_string(),
                "https://api.telegram.org".to_string()
            ]
        );
    }

    #[test]
    fn keep_alive_without_webhook_pings_api_only() {
        assert_eq!(
            keep_alive_urls(None),
            vec!["https://api.telegram.org".to_string()]
        );
    }
}
