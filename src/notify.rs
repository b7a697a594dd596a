/// Message delivery.
///
/// The pipeline hands a finished `Payload` to a `Notifier`. The only real
/// transport is the Telegram Bot API; tests substitute a recorder.

use std::cell::RefCell;

use reqwest::blocking::Client;
use serde::Serialize;

use crate::error::NotifyError;
use crate::format::RenderMode;
use crate::logging::{self, DataSource};

pub const TELEGRAM_BASE_URL: &str = "https://api.telegram.org";

/// Longest API error body kept in a `NotifyError`.
const MAX_ERROR_BODY: usize = 500;

/// A rendered message plus the mode it was rendered in.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub text: String,
    pub mode: RenderMode,
}

impl Payload {
    pub fn new(text: String, mode: RenderMode) -> Self {
        Self { text, mode }
    }

    /// True when reserved characters in `text` were escaped.
    pub fn is_escaped(&self) -> bool {
        self.mode.is_escaped()
    }
}

/// A delivery channel.
pub trait Notifier {
    fn send(&self, payload: &Payload) -> Result<(), NotifyError>;

    /// Channel name for logs.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// Sends through the Telegram Bot API `sendMessage` method.
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, base_url: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, payload: &Payload) -> Result<(), NotifyError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &payload.text,
            parse_mode: payload.mode.parse_mode(),
        };

        let response = self.client.post(self.endpoint()).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(NotifyError::Api {
                service: "telegram",
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        logging::debug(
            DataSource::Telegram,
            None,
            &format!("message sent ({} chars)", payload.text.chars().count()),
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Keeps every payload instead of sending it. Used by `--dry-run` and tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RefCell<Vec<Payload>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Payload> {
        self.sent.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, payload: &Payload) -> Result<(), NotifyError> {
        self.sent.borrow_mut().push(payload.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recorder"
    }
}
