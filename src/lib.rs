//! Whisper relay - Telegram whisper bot backend
//!
//! Relays whisper (private-reveal) messages between users:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Telegram                     │
//! └──────────────┬───────────────▲───────────────┘
//!     webhook    │               │  Bot API calls
//! ┌──────────────▼───────────────┴───────────────┐
//! │                Whisper Relay                  │
//! │  Webhook  │  Processor  │  Caches  │ History │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Inline queries compose whispers, callback queries reveal them; the
//! inline query cache, profile photo cache, and history store back the
//! suggestion flow.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod keep_alive;
pub mod processor;
pub mod telegram;

pub use cache::{InlineQueryCache, PhotoLookup, ProfilePhotoCache};
pub use config::Config;
pub use db::{DbConn, DbPool, HistoryRecord, HistoryStore};
pub use error::{Error, Result};
pub use processor::{UpdateProcessor, WhisperProcessor};
pub use telegram::{EditTarget, TelegramClient};
