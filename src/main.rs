use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use whisper_relay::api::ApiServer;
use whisper_relay::cache::{InlineQueryCache, ProfilePhotoCache};
use whisper_relay::processor::WhisperProcessor;
use whisper_relay::{Config, HistoryStore, TelegramClient, db, keep_alive};

/// Whisper relay - Telegram whisper bot backend
#[derive(Parser)]
#[command(name = "whisperd", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "WHISPER_PORT", default_value = "5000")]
    port: u16,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Register the webhook URL with Telegram
    SetWebhook {
        /// Webhook URL; defaults to `WHISPER_WEBHOOK_URL`
        url: Option<String>,
    },
    /// Delete the registered webhook
    DeleteWebhook,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,whisper_relay=info",
        1 => "info,whisper_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    config.port = cli.port;

    let telegram = TelegramClient::new(config.bot_token.clone(), config.api_base.clone());

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::SetWebhook { url } => set_webhook(&telegram, &config, url).await,
            Command::DeleteWebhook => Ok(telegram.delete_webhook().await?),
        };
    }

    tracing::info!(port = config.port, "starting whisper relay");

    std::fs::create_dir_all(&config.data_dir)?;
    let pool = db::init(config.database_path())?;

    let history = Arc::new(HistoryStore::new(pool.clone()));
    history.load()?;

    let processor = Arc::new(WhisperProcessor::new(
        telegram.clone(),
        history,
        InlineQueryCache::new(),
        Arc::new(ProfilePhotoCache::new()),
    ));

    keep_alive::spawn(config.keep_alive.clone());

    // Register the webhook in the background; failure degrades, never aborts
    if let Some(webhook_url) = config.webhook_url.clone() {
        let registrar = telegram.clone();
        tokio::spawn(async move {
            if let Err(e) = registrar.set_webhook(&webhook_url).await {
                tracing::warn!(error = %e, "webhook registration failed");
            }
        });
    } else {
        tracing::warn!("WHISPER_WEBHOOK_URL not set; updates will not be delivered");
    }

    ApiServer::new(pool, processor, config.port).run().await?;
    Ok(())
}

async fn set_webhook(
    telegram: &TelegramClient,
    config: &Config,
    url: Option<String>,
) -> anyhow::Result<()> {
    telegram.get_me().await?;

    let url = url
        .or_else(|| config.webhook_url.clone())
        .ok_or_else(|| anyhow::anyhow!("no webhook URL: pass one or set WHISPER_WEBHOOK_URL"))?;

    telegram.set_webhook(&url).await?;
    Ok(())
}
