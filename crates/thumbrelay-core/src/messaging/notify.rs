use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::warn;

use crate::{
    domain::{ChatId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

/// Bounded, best-effort wrapper around a [`MessagingPort`].
///
/// Status and menu messages never fail the caller: each call is capped by the
/// reply timeout, and failures are logged and swallowed.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn MessagingPort>,
    reply_timeout: Duration,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn MessagingPort>, reply_timeout: Duration) -> Self {
        Self {
            messenger,
            reply_timeout,
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match timeout(self.reply_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(self.reply_timeout)),
        }
    }

    /// Send and surface the error (used where the caller counts deliveries).
    pub async fn try_send(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.bounded(self.messenger.send_html(chat_id, html)).await
    }

    pub async fn send(&self, chat_id: ChatId, html: &str) -> Option<MessageRef> {
        match self.try_send(chat_id, html).await {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "failed to send message");
                None
            }
        }
    }

    pub async fn edit(&self, msg: MessageRef, html: &str) -> bool {
        match self.bounded(self.messenger.edit_html(msg, html)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id = msg.chat_id.0, error = %e, "failed to edit message");
                false
            }
        }
    }

    pub async fn delete(&self, msg: MessageRef) -> bool {
        match self.bounded(self.messenger.delete_message(msg)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id = msg.chat_id.0, error = %e, "failed to delete message");
                false
            }
        }
    }

    /// Replace a status message's text, or post a fresh one if there is none.
    pub async fn replace_or_send(&self, chat_id: ChatId, status: Option<MessageRef>, html: &str) {
        if let Some(msg) = status {
            if self.edit(msg, html).await {
                return;
            }
        }
        let _ = self.send(chat_id, html).await;
    }

    pub async fn send_menu(&self, chat_id: ChatId, html: &str, keyboard: InlineKeyboard) {
        if let Err(e) = self
            .bounded(self.messenger.send_inline_keyboard(chat_id, html, keyboard))
            .await
        {
            warn!(chat_id = chat_id.0, error = %e, "failed to send menu");
        }
    }

    pub async fn answer_callback(&self, callback_id: &str, text: Option<&str>) {
        if let Err(e) = self
            .bounded(self.messenger.answer_callback_query(callback_id, text))
            .await
        {
            warn!(error = %e, "failed to answer callback query");
        }
    }
}
