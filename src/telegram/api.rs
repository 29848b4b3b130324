//! Raw HTTP calls to the Telegram Bot API.
//!
//! Wraps reqwest for `getUpdates`, `sendMessage`, `editMessageText` and
//! `answerCallbackQuery`.

use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

use super::types::{ApiResponse, InlineKeyboardMarkup, SentMessage, Update};

pub const PARSE_MODE_MARKDOWN: &str = "Markdown";

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("telegram API error in {method}: {description}")]
    Api { method: String, description: String },
}

/// Low-level Telegram Bot API client.
pub struct TelegramApi {
    client: Client,
    base_url: String,
}

impl TelegramApi {
    pub fn new(bot_token: &str) -> Self {
        Self::with_base_url(bot_token, "https://api.telegram.org")
    }

    /// Custom base URL, for a local Bot API server.
    pub fn with_base_url(bot_token: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", base_url.trim_end_matches('/'), bot_token),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<Option<T>, TelegramError> {
        let mut request = self.client.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let api_resp: ApiResponse<T> = request.send().await?.json().await?;
        if !api_resp.ok {
            let description = api_resp.description.unwrap_or_default();
            warn!("{method} failed: {description}");
            return Err(TelegramError::Api {
                method: method.to_string(),
                description,
            });
        }
        Ok(api_resp.result)
    }

    /// Long-poll for new updates.
    ///
    /// `offset` should be `last_update_id + 1` to acknowledge earlier updates.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(off) = offset {
            body["offset"] = json!(off);
        }
        // Leave the HTTP request some headroom over the server-side long poll.
        let http_timeout = Duration::from_secs(timeout_secs + 10);
        Ok(self
            .call("getUpdates", &body, Some(http_timeout))
            .await?
            .unwrap_or_default())
    }

    /// Returns the sent message's id.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<&str>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<i64, TelegramError> {
        let body = message_body(json!({ "chat_id": chat_id }), text, parse_mode, reply_markup);
        debug!("sendMessage to chat_id={chat_id}");
        let sent: Option<SentMessage> = self.call("sendMessage", &body, None).await?;
        sent_message_id(sent)
    }

    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<&str>,
        reply_markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let body = message_body(
            json!({ "chat_id": chat_id, "message_id": message_id }),
            text,
            parse_mode,
            reply_markup,
        );
        debug!("editMessageText chat_id={chat_id} message_id={message_id}");
        self.call::<Value>("editMessageText", &body, None).await?;
        Ok(())
    }

    /// Acknowledges a button press; `show_alert` pops a dialog instead of a toast.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), TelegramError> {
        let mut body = json!({ "callback_query_id": callback_query_id });
        if let Some(t) = text {
            body["text"] = json!(t);
        }
        if show_alert {
            body["show_alert"] = json!(true);
        }
        self.call::<bool>("answerCallbackQuery", &body, None).await?;
        Ok(())
    }
}

fn sent_message_id(sent: Option<SentMessage>) -> Result<i64, TelegramError> {
    sent.map(|m| m.message_id).ok_or_else(|| TelegramError::Api {
        method: "sendMessage".to_string(),
        description: "response carried no message".to_string(),
    })
}

fn message_body(
    mut body: Value,
    text: &str,
    parse_mode: Option<&str>,
    reply_markup: Option<&InlineKeyboardMarkup>,
) -> Value {
    body["text"] = json!(text);
    if let Some(mode) = parse_mode {
        body["parse_mode"] = json!(mode);
    }
    if let Some(markup) = reply_markup {
        body["reply_markup"] = json!(markup);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::RefreshAction;

    #[test]
    fn method_urls_include_token() {
        let api = TelegramApi::with_base_url("123:abc", "http://localhost:8081/");
        assert_eq!(
            api.method_url("getUpdates"),
            "http://localhost:8081/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn message_body_with_markup() {
        let markup = InlineKeyboardMarkup::from(&RefreshAction::current());
        let body = message_body(
            json!({ "chat_id": 5 }),
            "*hi*",
            Some(PARSE_MODE_MARKDOWN),
            Some(&markup),
        );
        assert_eq!(body["chat_id"], 5);
        assert_eq!(body["text"], "*hi*");
        assert_eq!(body["parse_mode"], "Markdown");
        assert_eq!(
            body["reply_markup"]["inline_keyboard"][0][0]["callback_data"],
            "refresh_v2"
        );
    }

    #[test]
    fn plain_message_body() {
        let body = message_body(json!({ "chat_id": 5 }), "plain", None, None);
        assert!(body.get("parse_mode").is_none());
        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn sent_message_id_requires_result() {
        assert_eq!(sent_message_id(Some(SentMessage { message_id: 42 })).unwrap(), 42);
        match sent_message_id(None) {
            Err(TelegramError::Api { method, .. }) => assert_eq!(method, "sendMessage"),
            other => panic!("expected an API error, got {other:?}"),
        }
    }
}
