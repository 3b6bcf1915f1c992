//! Raw Telegram Bot API calls

use serde_json::Value;

use super::types::{
    AnswerCallbackQueryRequest, AnswerInlineQueryRequest, ApiResponse, EditMessageTextRequest,
    GetUserProfilePhotosRequest, InlineKeyboardMarkup, SetWebhookRequest, UserProfilePhotos,
};
use crate::{Error, Result};

/// Where an edited message lives: a chat message or an inline-sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditTarget {
    /// A regular message addressed by chat and message ID
    Chat { chat_id: i64, message_id: i64 },
    /// A message sent via inline mode, addressed by its inline message ID
    Inline { inline_message_id: String },
}

impl EditTarget {
    /// Build a target from optional parts
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] unless either both `chat_id` and
    /// `message_id` or `inline_message_id` are given.
    pub fn from_parts(
        chat_id: Option<i64>,
        message_id: Option<i64>,
        inline_message_id: Option<String>,
    ) -> Result<Self> {
        match (chat_id, message_id, inline_message_id) {
            (Some(chat_id), Some(message_id), _) => Ok(Self::Chat {
                chat_id,
                message_id,
            }),
            (_, _, Some(inline_message_id)) => Ok(Self::Inline { inline_message_id }),
            _ => Err(Error::InvalidArgument(
                "either (chat_id and message_id) or inline_message_id must be provided".to_string(),
            )),
        }
    }
}

impl super::TelegramClient {
    /// Answer an inline query with the given result records
    ///
    /// Sent with `cache_time: 0` and `is_personal: true` so Telegram never
    /// serves one sender's results to another.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn answer_inline_query(
        &self,
        inline_query_id: &str,
        results: &[Value],
    ) -> Result<()> {
        let url = self.endpoint("answerInlineQuery");

        let request = AnswerInlineQueryRequest {
            inline_query_id: inline_query_id.to_string(),
            results: results.to_vec(),
            cache_time: 0,
            is_personal: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Api(format!("answerInlineQuery error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "answerInlineQuery error: {status} - {body}"
            )));
        }

        tracing::debug!(inline_query_id, "inline query answered");
        Ok(())
    }

    /// Answer a callback query, dismissing the button's loading spinner
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let url = self.endpoint("answerCallbackQuery");

        let request = AnswerCallbackQueryRequest {
            callback_query_id: callback_query_id.to_string(),
            text: text.map(String::from),
            show_alert,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Api(format!("answerCallbackQuery error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "answerCallbackQuery error: {status} - {body}"
            )));
        }

        tracing::debug!(callback_query_id, "callback query answered");
        Ok(())
    }

    /// Edit a message's text (MarkdownV2 parse mode)
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn edit_message_text(
        &self,
        target: &EditTarget,
        text: &str,
        reply_markup: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        let url = self.endpoint("editMessageText");

        let (chat_id, message_id, inline_message_id) = match target {
            EditTarget::Chat {
                chat_id,
                message_id,
            } => (Some(*chat_id), Some(*message_id), None),
            EditTarget::Inline { inline_message_id } => {
                (None, None, Some(inline_message_id.clone()))
            }
        };

        let request = EditMessageTextRequest {
            chat_id,
            message_id,
            inline_message_id,
            text: text.to_string(),
            parse_mode: Some("MarkdownV2".to_string()),
            reply_markup,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Api(format!("editMessageText error: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();

            // An edit that changes nothing is not a failure
            if body.to_lowercase().contains("message is not modified") {
                return Ok(());
            }

            return Err(Error::Api(format!("editMessageText error: {body}")));
        }

        tracing::debug!(?target, "message text edited");
        Ok(())
    }

    /// Fetch the file reference of a user's current profile photo
    ///
    /// Returns `None` when the user has no profile photo.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or the response cannot be
    /// parsed
    pub async fn user_profile_photo(&self, user_id: i64) -> Result<Option<String>> {
        let url = self.endpoint("getUserProfilePhotos");

        let request = GetUserProfilePhotosRequest { user_id, limit: 1 };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Api(format!("getUserProfilePhotos error: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::Api(format!("getUserProfilePhotos read error: {e}")))?;

        let parsed: ApiResponse<UserProfilePhotos> = serde_json::from_str(&body)
            .map_err(|e| Error::Api(format!("getUserProfilePhotos parse error: {e}")))?;

        if !parsed.ok {
            return Err(Error::Api(format!(
                "getUserProfilePhotos error: {}",
                parsed.description.unwrap_or_default()
            )));
        }

        let photo = parsed.result.and_then(|photos| {
            if photos.total_count == 0 {
                return None;
            }
            photos
                .photos
                .first()
                .and_then(|sizes| sizes.first())
                .map(|size| size.file_id.clone())
        });

        Ok(photo)
    }

    /// Register the webhook URL for receiving updates
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        let api_url = self.endpoint("setWebhook");

        let request = SetWebhookRequest {
            url: url.to_string(),
            allowed_updates: Some(vec![
                "message".to_string(),
                "inline_query".to_string(),
                "callback_query".to_string(),
            ]),
        };

        let response = self
            .client
            .post(&api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Api(format!("setWebhook error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("setWebhook error: {status} - {body}")));
        }

        tracing::info!(url, "webhook set");
        Ok(())
    }

    /// Delete the registered webhook
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        let url = self.endpoint("deleteWebhook");

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::Api(format!("deleteWebhook error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!(
                "deleteWebhook error: {status} - {body}"
            )));
        }

        tracing::info!("webhook deleted");
        Ok(())
    }

    /// Validate the bot token by calling `getMe`
    ///
    /// # Errors
    ///
    /// Returns error if the token is invalid
    pub async fn get_me(&self) -> Result<()> {
        let url = self.endpoint("getMe");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Api(format!("getMe error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Api("invalid bot token".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- EditTarget -----------------------------------------------------------

    #[test]
    fn from_parts_accepts_chat_and_message_id() {
        let target = EditTarget::from_parts(Some(1), Some(2), None).unwrap();
        assert_eq!(
            target,
            EditTarget::Chat {
                chat_id: 1,
                message_id: 2
            }
        );
    }

    #[test]
    fn from_parts_accepts_inline_message_id() {
        let target = EditTarget::from_parts(None, None, Some("im1".to_string())).unwrap();
        assert_eq!(
            target,
            EditTarget::Inline {
                inline_message_id: "im1".to_string()
            }
        );
    }

    #[test]
    fn from_parts_prefers_chat_addressing_when_both_given() {
        let target = EditTarget::from_parts(Some(1), Some(2), Some("im1".to_string())).unwrap();
        assert!(matches!(target, EditTarget::Chat { .. }));
    }

    #[test]
    fn from_parts_rejects_missing_target() {
        assert!(matches!(
            EditTarget::from_parts(None, None, None),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_parts_rejects_partial_chat_target() {
        assert!(EditTarget::from_parts(Some(1), None, None).is_err());
        assert!(EditTarget::from_parts(None, Some(2), None).is_err());
    }
}
