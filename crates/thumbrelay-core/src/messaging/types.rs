use crate::domain::{ChatId, ContentHandle, MessageRef, UserId};

/// Cross-messenger incoming update model.
///
/// Telegram-specific fields stay in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
    Photo(PhotoMessage),
    Media(MediaMessage),
    Callback(CallbackQuery),
}

impl IncomingUpdate {
    pub fn user_id(&self) -> UserId {
        match self {
            IncomingUpdate::Command(c) => c.user_id,
            IncomingUpdate::Text(t) => t.user_id,
            IncomingUpdate::Photo(p) => p.user_id,
            IncomingUpdate::Media(m) => m.user_id,
            IncomingUpdate::Callback(q) => q.user_id,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            IncomingUpdate::Command(c) => c.chat_id,
            IncomingUpdate::Text(t) => t.chat_id,
            IncomingUpdate::Photo(p) => p.chat_id,
            IncomingUpdate::Media(m) => m.chat_id,
            IncomingUpdate::Callback(q) => q.chat_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IncomingUpdate::Command(_) => "command",
            IncomingUpdate::Text(_) => "text",
            IncomingUpdate::Photo(_) => "photo",
            IncomingUpdate::Media(_) => "media",
            IncomingUpdate::Callback(_) => "callback",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: String,
    pub args: String,
}

impl Command {
    /// Parse `/cmd@botname arg1 ...` into a lowercase command name and the raw argument tail.
    pub fn parse(chat_id: ChatId, user_id: UserId, username: Option<String>, text: &str) -> Self {
        let mut parts = text.trim().splitn(2, char::is_whitespace);
        let first = parts.next().unwrap_or("").trim();
        let args = parts.next().unwrap_or("").trim().to_string();

        let name = first
            .trim_start_matches('/')
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();

        Self {
            chat_id,
            user_id,
            username,
            name,
            args,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct PhotoMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    /// Handle of the largest available size.
    pub file_id: ContentHandle,
}

/// A message that may carry a video and/or a generic document attachment.
#[derive(Clone, Debug)]
pub struct MediaMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub video: Option<ContentHandle>,
    pub document: Option<ContentHandle>,
    pub caption: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub callback_id: String,
    pub data: String,
    pub message: Option<MessageRef>,
}

/// Inline keyboard (buttons) attached to menu messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub buttons: Vec<InlineButton>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    pub fn new(buttons: Vec<InlineButton>) -> Self {
        Self { buttons }
    }

    /// Convenience for "one button per row" layouts from `(label, callback_data)` pairs.
    pub fn one_per_row(items: &[(&str, &str)]) -> Self {
        let buttons = items
            .iter()
            .map(|(label, data)| InlineButton {
                label: (*label).to_string(),
                callback_data: (*data).to_string(),
            })
            .collect();
        Self { buttons }
    }
}
