//! Update processing: whisper composition, reveal, and view tracking
//!
//! The webhook receiver hands every update to an [`UpdateProcessor`] on its
//! own task. [`WhisperProcessor`] is the production implementation: inline
//! queries compose whispers (served from the inline cache when fresh),
//! callback queries reveal them to the addressed receiver and track everyone
//! else as curious.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::cache::{InlineQueryCache, ProfilePhotoCache};
use crate::db::{HistoryRecord, HistoryStore};
use crate::telegram::format::{ViewStatus, escape_markdown, format_view_status};
use crate::telegram::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, InlineQuery, Update, User,
};
use crate::telegram::{EditTarget, TelegramClient};
use crate::Result;

/// Callback data prefix on whisper reveal buttons
const VIEW_PREFIX: &str = "view:";

/// Maximum pending whispers held in memory; oldest evicted beyond this
const MAX_PENDING_WHISPERS: usize = 2048;

/// Handles updates dispatched by the webhook receiver
#[async_trait]
pub trait UpdateProcessor: Send + Sync {
    /// Process one update to completion
    async fn process(&self, update: Update);
}

/// A whisper and its view-tracking state
#[derive(Debug, Clone)]
struct Whisper {
    sender_id: i64,
    /// Receiver's user ID, or `@username` until the receiver first opens it
    receiver_id: String,
    receiver_display_name: String,
    text: String,
    receiver_views: Vec<i64>,
    curious_users: Vec<String>,
    created: Instant,
}

/// What a callback press amounts to, decided under the whisper lock
enum CallbackOutcome {
    /// The addressed receiver opened the whisper
    Reveal {
        text: String,
        status: ViewStatus,
        history: Option<(String, HistoryRecord)>,
    },
    /// The sender peeked at their own whisper
    SenderPeek { text: String },
    /// Someone else tried; they are now on the curious list
    Curious { status: ViewStatus },
    /// No such whisper (evicted or from a previous process lifetime)
    Unknown,
}

/// Production update processor for the whisper relay
pub struct WhisperProcessor {
    telegram: TelegramClient,
    history: Arc<HistoryStore>,
    inline_cache: InlineQueryCache,
    photo_cache: Arc<ProfilePhotoCache>,
    whispers: Mutex<HashMap<String, Whisper>>,
}

#[async_trait]
impl UpdateProcessor for WhisperProcessor {
    async fn process(&self, update: Update) {
        let update_id = update.update_id;

        let result = if let Some(query) = update.inline_query {
            self.handle_inline_query(query).await
        } else if let Some(callback) = update.callback_query {
            self.handle_callback_query(callback).await
        } else {
            tracing::debug!(update_id, "ignoring update without inline or callback query");
            Ok(())
        };

        if let Err(e) = result {
            tracing::warn!(update_id, error = %e, "update processing failed");
        }
    }
}

impl WhisperProcessor {
    /// Create a processor over the shared caches and history store
    #[must_use]
    pub fn new(
        telegram: TelegramClient,
        history: Arc<HistoryStore>,
        inline_cache: InlineQueryCache,
        photo_cache: Arc<ProfilePhotoCache>,
    ) -> Self {
        Self {
            telegram,
            history,
            inline_cache,
            photo_cache,
            whispers: Mutex::new(HashMap::new()),
        }
    }

    /// Answer an inline query with whisper suggestions
    ///
    /// Fresh cache entries are replayed as-is; otherwise one suggestion per
    /// explicit `@username` target plus the sender's recent receivers.
    async fn handle_inline_query(&self, query: InlineQuery) -> Result<()> {
        let sender_id = query.from.id.to_string();

        if let Some(cached) = self.inline_cache.get(&sender_id, &query.query) {
            tracing::debug!(sender = %sender_id, "serving inline query from cache");
            return self.telegram.answer_inline_query(&query.id, &cached).await;
        }

        let (text, target) = parse_whisper(&query.query);
        if text.is_empty() {
            return self.telegram.answer_inline_query(&query.id, &[]).await;
        }

        let results = self.build_results(&query.from, &text, target.as_deref());

        self.telegram.answer_inline_query(&query.id, &results).await?;
        self.inline_cache.put(&sender_id, &query.query, results);
        Ok(())
    }

    /// Build inline results, registering one pending whisper per suggestion
    fn build_results(&self, sender: &User, text: &str, target: Option<&str>) -> Vec<Value> {
        let mut results = Vec::new();

        if let Some(username) = target {
            let record = HistoryRecord {
                receiver_id: format!("@{username}"),
                display_name: format!("@{username}"),
                first_name: username.to_string(),
                profile_photo_url: None,
            };
            results.push(self.whisper_result(sender, &record, text));
        }

        for record in self.history.recent(&sender.id.to_string()) {
            let duplicate = target.is_some_and(|u| record.receiver_id == format!("@{u}"));
            if !duplicate {
                results.push(self.whisper_result(sender, &record, text));
            }
        }

        results
    }

    /// One article suggestion addressed to `receiver`, backed by a pending
    /// whisper
    fn whisper_result(&self, sender: &User, receiver: &HistoryRecord, text: &str) -> Value {
        let whisper_id = Uuid::new_v4().simple().to_string();

        self.register(
            whisper_id.clone(),
            Whisper {
                sender_id: sender.id,
                receiver_id: receiver.receiver_id.clone(),
                receiver_display_name: receiver.display_name.clone(),
                text: text.to_string(),
                receiver_views: Vec::new(),
                curious_users: Vec::new(),
                created: Instant::now(),
            },
        );

        let mut result = json!({
            "type": "article",
            "id": whisper_id,
            "title": format!("\u{1f512} Whisper to {}", receiver.display_name),
            "description": text,
            "input_message_content": {
                "message_text": format!(
                    "\u{1f512} A whisper for {}",
                    receiver.display_name
                ),
            },
            "reply_markup": {
                "inline_keyboard": [[{
                    "text": "\u{1f512} Show whisper",
                    "callback_data": format!("{VIEW_PREFIX}{whisper_id}"),
                }]],
            },
        });

        if let (Some(photo), Some(map)) = (&receiver.profile_photo_url, result.as_object_mut()) {
            map.insert("thumbnail_url".to_string(), json!(photo));
        }

        result
    }

    /// Handle a reveal button press
    async fn handle_callback_query(&self, callback: CallbackQuery) -> Result<()> {
        let Some(whisper_id) = callback
            .data
            .as_deref()
            .and_then(|d| d.strip_prefix(VIEW_PREFIX))
        else {
            tracing::debug!(callback_id = %callback.id, "callback without whisper data");
            return Ok(());
        };

        let outcome = self.apply_view(whisper_id, &callback.from);

        match outcome {
            CallbackOutcome::Unknown => {
                self.telegram
                    .answer_callback_query(&callback.id, Some("This whisper has expired."), true)
                    .await
            }
            CallbackOutcome::SenderPeek { text } => {
                self.telegram
                    .answer_callback_query(&callback.id, Some(&text), true)
                    .await
            }
            CallbackOutcome::Reveal {
                text,
                status,
                history,
            } => {
                if let Some((sender_id, mut record)) = history {
                    record.profile_photo_url = self.fetch_photo(callback.from.id).await;
                    if let Err(e) = self.history.save(&sender_id, record) {
                        tracing::warn!(sender = %sender_id, error = %e, "history save failed");
                    }
                }

                self.telegram
                    .answer_callback_query(&callback.id, Some(&text), true)
                    .await?;
                self.refresh_tracking_message(&callback, &status).await;
                Ok(())
            }
            CallbackOutcome::Curious { status } => {
                self.telegram
                    .answer_callback_query(
                        &callback.id,
                        Some("\u{1f512} This whisper is not for you."),
                        false,
                    )
                    .await?;
                self.refresh_tracking_message(&callback, &status).await;
                Ok(())
            }
        }
    }

    /// Decide and record the effect of a button press, without awaiting
    fn apply_view(&self, whisper_id: &str, viewer: &User) -> CallbackOutcome {
        let mut whispers = self.lock();
        let Some(whisper) = whispers.get_mut(whisper_id) else {
            return CallbackOutcome::Unknown;
        };

        if viewer.id == whisper.sender_id {
            return CallbackOutcome::SenderPeek {
                text: whisper.text.clone(),
            };
        }

        if is_receiver(&whisper.receiver_id, viewer) {
            whisper.receiver_views.push(Utc::now().timestamp());
            // First open pins down the receiver's real identity
            let history = if whisper.receiver_views.len() == 1 {
                whisper.receiver_id = viewer.id.to_string();
                whisper.receiver_display_name = viewer.full_name();
                Some((
                    whisper.sender_id.to_string(),
                    HistoryRecord {
                        receiver_id: viewer.id.to_string(),
                        display_name: viewer.full_name(),
                        first_name: viewer.first_name.clone(),
                        profile_photo_url: None,
                    },
                ))
            } else {
                None
            };

            return CallbackOutcome::Reveal {
                text: whisper.text.clone(),
                status: view_status(whisper),
                history,
            };
        }

        let name = viewer.mention_or_name();
        if !whisper.curious_users.contains(&name) {
            whisper.curious_users.push(name);
        }
        CallbackOutcome::Curious {
            status: view_status(whisper),
        }
    }

    /// Look up the viewer's profile photo, degrading to `None` on failure
    async fn fetch_photo(&self, user_id: i64) -> Option<String> {
        let telegram = &self.telegram;
        match self
            .photo_cache
            .get_or_fetch(user_id, || telegram.user_profile_photo(user_id))
            .await
        {
            Ok(photo) => photo,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "profile photo lookup failed");
                None
            }
        }
    }

    /// Rewrite the whisper message with the current view-tracking block
    ///
    /// The reveal button is re-attached so the whisper stays openable after
    /// every edit.
    async fn refresh_tracking_message(&self, callback: &CallbackQuery, status: &ViewStatus) {
        let target = EditTarget::from_parts(
            callback.message.as_ref().map(|m| m.chat.id),
            callback.message.as_ref().map(|m| m.message_id),
            callback.inline_message_id.clone(),
        );

        let target = match target {
            Ok(target) => target,
            Err(e) => {
                tracing::debug!(callback_id = %callback.id, error = %e, "no editable message");
                return;
            }
        };

        let text = format!(
            "\u{1f512} A whisper for {}\n```\n{}\n```",
            escape_markdown(&status.receiver_display_name),
            format_view_status(status),
        );

        let markup = callback.data.clone().map(|data| InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton::callback(
                "\u{1f512} Show whisper",
                data,
            )]],
        });

        if let Err(e) = self.telegram.edit_message_text(&target, &text, markup).await {
            tracing::warn!(callback_id = %callback.id, error = %e, "tracking message edit failed");
        }
    }

    /// Register a pending whisper, evicting the oldest beyond the cap
    fn register(&self, whisper_id: String, whisper: Whisper) {
        let mut whispers = self.lock();

        if whispers.len() >= MAX_PENDING_WHISPERS {
            if let Some(oldest) = whispers
                .iter()
                .min_by_key(|(_, w)| w.created)
                .map(|(id, _)| id.clone())
            {
                whispers.remove(&oldest);
            }
        }

        whispers.insert(whisper_id, whisper);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Whisper>> {
        self.whispers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Snapshot a whisper's view-tracking state for rendering
fn view_status(whisper: &Whisper) -> ViewStatus {
    ViewStatus {
        receiver_display_name: whisper.receiver_display_name.clone(),
        receiver_views: whisper.receiver_views.clone(),
        curious_users: whisper.curious_users.clone(),
    }
}

/// Whether `viewer` is the user a whisper is addressed to
///
/// Whispers composed for `@username` match on username until the first open
/// replaces the placeholder with the real user ID.
fn is_receiver(receiver_id: &str, viewer: &User) -> bool {
    receiver_id == viewer.id.to_string()
        || viewer
            .username
            .as_ref()
            .is_some_and(|u| receiver_id == format!("@{u}"))
}

/// Split an inline query into whisper text and an optional trailing
/// `@username` target
fn parse_whisper(query: &str) -> (String, Option<String>) {
    let trimmed = query.trim();

    match trimmed.rsplit_once(char::is_whitespace) {
        Some((text, target)) if target.len() > 1 && target.starts_with('@') => {
            (text.trim().to_string(), Some(target[1..].to_string()))
        }
        _ => (trimmed.to_string(), None),
    }
}
