//! Telegram Bot API client
//!
//! Receives updates over the webhook endpoint and sends through the Bot API.

mod api;
pub mod format;
pub mod types;

use reqwest::Client;

pub use api::EditTarget;

/// Telegram Bot API client
///
/// Cheap to clone; all calls share one underlying HTTP client.
#[derive(Clone)]
pub struct TelegramClient {
    token: String,
    api_base: String,
    client: Client,
}

impl TelegramClient {
    /// Create a new client for `token` against `api_base`
    /// (e.g. `https://api.telegram.org/bot`)
    #[must_use]
    pub fn new(token: String, api_base: String) -> Self {
        Self {
            token,
            api_base,
            client: Client::new(),
        }
    }

    /// Full URL for a Bot API method
    fn endpoint(&self, method: &str) -> String {
        format!("{}{}/{method}", self.api_base, self.token)
    }
}
