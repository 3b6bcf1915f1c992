//! Keep-alive pinger
//!
//! Hosting platforms idle out processes that receive no traffic. This loop
//! pings the configured URLs on an interval so the process stays warm; ping
//! failures are logged and never fatal.

use std::time::Duration;

use reqwest::Client;

use crate::config::KeepAliveConfig;

/// Spawn the pinger as a long-lived background task
pub fn spawn(config: KeepAliveConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = Client::new();
        let secs = config.interval_secs.max(1);
        let mut interval = tokio::time::interval(Duration::from_secs(secs));
        // Skip the first immediate tick
        interval.tick().await;

        tracing::info!(
            interval_secs = secs,
            url_count = config.urls.len(),
            "keep-alive started"
        );

        loop {
            interval.tick().await;
            for url in &config.urls {
                ping(&client, url).await;
            }
        }
    })
}

async fn ping(client: &Client, url: &str) {
    match client.get(url).send().await {
        Ok(response) if response.status().is_success() => {
            tracing::debug!(url, "keep-alive ping ok");
        }
        Ok(response) => {
            tracing::warn!(url, status = %response.status(), "keep-alive ping got error status");
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "keep-alive ping failed");
        }
    }
}
