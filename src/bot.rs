//! Chat front end: `/start`, `/login <id> <secret>` and the refresh button.
//!
//! Every update is handled on its own task, so a slow extraction never
//! holds up the poll loop or other users.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveTime};
use log::{debug, error, info, warn};

use crate::credential_store::Credentials;
use crate::error::ExtractionError;
use crate::projection::{RefreshAction, project};
use crate::scraping_context::ScrapingContext;
use crate::snapshot::AttendanceSnapshot;
use crate::telegram::types::{CallbackQuery, InlineKeyboardMarkup, Message, Update};
use crate::telegram::{PARSE_MODE_MARKDOWN, TelegramError};
use crate::text_manipulators::redact_identifier;

pub const WELCOME_TEXT: &str = "👋 Hello! Welcome to your VIIT Attendance Bot.\nUse `/login username password` to get your status.";
pub const LOGIN_USAGE_TEXT: &str = "❌ Please use the format: `/login <username> <password>`";
pub const NAVIGATING_TEXT: &str = "⏳ Navigating to Academic Register... This may take up to 30 seconds.";
pub const LOGIN_FAILED_TEXT: &str = "❌ Login failed or table not found. Ensure your credentials are correct.";
pub const REFRESH_FAILED_TEXT: &str = "❌ Update failed. Could not fetch data.";
pub const SESSION_EXPIRED_TEXT: &str = "❌ Session expired. Please /login again.";
pub const EXPIRED_BUTTON_TEXT: &str = "⚠️ This button is expired. Please /login again.";
pub const REFRESHING_TEXT: &str = "Refreshing data...";

const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Login { username: String, password: String },
    LoginUsage,
    Unknown(String),
}

pub fn parse_command(text: &str) -> Command {
    let mut words = text.split_whitespace();
    let head = words.next().unwrap_or_default();
    // Strip bot mention suffix (e.g., "/login@my_bot")
    let cmd = head.split('@').next().unwrap_or(head);

    match cmd.to_lowercase().as_str() {
        "/start" => Command::Start,
        "/login" => match (words.next(), words.next()) {
            (Some(username), Some(password)) => Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            },
            _ => Command::LoginUsage,
        },
        _ => Command::Unknown(cmd.to_string()),
    }
}

/// What started an extraction; decides the failure wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Login,
    Refresh,
}

impl Trigger {
    fn failure_text(self) -> &'static str {
        match self {
            Trigger::Login => LOGIN_FAILED_TEXT,
            Trigger::Refresh => REFRESH_FAILED_TEXT,
        }
    }
}

/// A message ready to be sent or edited in.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<&'static str>,
    pub markup: Option<InlineKeyboardMarkup>,
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parse_mode: None,
            markup: None,
        }
    }
}

/// Turns an extraction outcome into the message the user sees.
pub fn render_outcome(
    trigger: Trigger,
    outcome: &Result<AttendanceSnapshot, ExtractionError>,
    username: &str,
    fetched_at: NaiveTime,
) -> Reply {
    match outcome {
        Ok(snapshot) => match project(snapshot, username, fetched_at) {
            Ok(report) => Reply {
                text: report.text,
                parse_mode: Some(PARSE_MODE_MARKDOWN),
                markup: Some(InlineKeyboardMarkup::from(&report.action)),
            },
            Err(no_data) => Reply::plain(no_data.to_string()),
        },
        Err(_) => Reply::plain(trigger.failure_text()),
    }
}

/// Long-polls Telegram forever, spawning a task per update.
pub async fn run(ctx: Arc<ScrapingContext>) {
    let mut offset: Option<i64> = None;
    let mut backoff_secs = 1u64;

    info!("bot is polling for updates");

    loop {
        match ctx.telegram.get_updates(offset, ctx.poll_timeout_secs).await {
            Ok(updates) => {
                backoff_secs = 1;
                for update in updates {
                    offset = Some(update.update_id + 1);
                    debug!("raw update received: {update:?}");
                    tokio::spawn(handle_update(Arc::clone(&ctx), update));
                }
            }
            Err(e) => {
                warn!("getUpdates failed, backing off {backoff_secs}s: {e}");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(MAX_BACKOFF_SECS);
            }
        }
    }
}

async fn handle_update(ctx: Arc<ScrapingContext>, update: Update) {
    let result = if let Some(message) = update.message {
        handle_message(&ctx, message).await
    } else if let Some(callback) = update.callback_query {
        handle_callback(&ctx, callback).await
    } else {
        Ok(())
    };
    if let Err(e) = result {
        error!("failed to handle update {}: {e}", update.update_id);
    }
}

async fn handle_message(ctx: &ScrapingContext, message: Message) -> Result<(), TelegramError> {
    let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
        return Ok(());
    };
    let chat_id = message.chat.id;

    match parse_command(text) {
        Command::Start => {
            ctx.telegram
                .send_message(chat_id, WELCOME_TEXT, Some(PARSE_MODE_MARKDOWN), None)
                .await?;
        }
        Command::LoginUsage => {
            ctx.telegram
                .send_message(chat_id, LOGIN_USAGE_TEXT, None, None)
                .await?;
        }
        Command::Login { username, password } => {
            let credentials = Credentials { username, password };
            handle_login(ctx, chat_id, from.id, credentials).await?;
        }
        Command::Unknown(cmd) => debug!("ignoring message starting with {cmd:?}"),
    }
    Ok(())
}

async fn handle_login(
    ctx: &ScrapingContext,
    chat_id: i64,
    user_id: i64,
    credentials: Credentials,
) -> Result<(), TelegramError> {
    info!("user {} logged in", redact_identifier(&credentials.username));
    if let Err(e) = ctx.credentials.remember(user_id, credentials.clone()).await {
        error!("failed to persist credentials: {e}");
    }

    let status_id = ctx
        .telegram
        .send_message(chat_id, NAVIGATING_TEXT, None, None)
        .await?;

    let outcome = ctx
        .scraper
        .extract(&credentials.username, &credentials.password)
        .await;
    let reply = render_outcome(Trigger::Login, &outcome, &credentials.username, Local::now().time());
    deliver(ctx, chat_id, status_id, reply).await
}

async fn handle_callback(ctx: &ScrapingContext, callback: CallbackQuery) -> Result<(), TelegramError> {
    let data = callback.data.as_deref().unwrap_or_default();
    debug!("processing callback {data:?}");

    if !RefreshAction::is_current(data) {
        return ctx
            .telegram
            .answer_callback_query(&callback.id, Some(EXPIRED_BUTTON_TEXT), true)
            .await;
    }
    ctx.telegram
        .answer_callback_query(&callback.id, Some(REFRESHING_TEXT), false)
        .await?;

    let Some(message) = callback.message else {
        return Ok(());
    };
    let chat_id = message.chat.id;

    let Some(credentials) = ctx.credentials.get(callback.from.id).await else {
        warn!("refresh for user {} without saved credentials", callback.from.id);
        return ctx
            .telegram
            .edit_message_text(chat_id, message.message_id, SESSION_EXPIRED_TEXT, None, None)
            .await;
    };

    // The previous report stays visible while the refresh runs.
    let pending = format!(
        "{}\n\n⏳ {REFRESHING_TEXT}",
        message.text.as_deref().unwrap_or_default()
    );
    if let Err(e) = ctx
        .telegram
        .edit_message_text(chat_id, message.message_id, &pending, None, None)
        .await
    {
        debug!("could not mark message as refreshing: {e}");
    }

    let outcome = ctx
        .scraper
        .extract(&credentials.username, &credentials.password)
        .await;
    let reply = render_outcome(Trigger::Refresh, &outcome, &credentials.username, Local::now().time());
    deliver(ctx, chat_id, message.message_id, reply).await?;
    info!("refresh delivered for user {}", callback.from.id);
    Ok(())
}

/// Edits `message_id` into `reply`, falling back to a plain error message.
async fn deliver(
    ctx: &ScrapingContext,
    chat_id: i64,
    message_id: i64,
    reply: Reply,
) -> Result<(), TelegramError> {
    let edited = ctx
        .telegram
        .edit_message_text(
            chat_id,
            message_id,
            &reply.text,
            reply.parse_mode,
            reply.markup.as_ref(),
        )
        .await;
    match edited {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("failed to deliver report: {e}");
            let text = format!("❌ An error occurred: {e}");
            ctx.telegram
                .edit_message_text(chat_id, message_id, &text, None, None)
                .await
        }
    }
}
