//! Telegram adapter (teloxide).
//!
//! Implements the `thumbrelay-core` MessagingPort and RemotePlatform over the Telegram Bot API.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    net::Download,
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode},
    DownloadError, RequestError,
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use thumbrelay_core::{
    domain::{ChatId, ContentHandle, MediaKind, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    platform::{RemoteError, RemotePlatform, RepublishCall},
    thumbnail::ThumbnailArgument,
    Result,
};

/// Build a bot whose HTTP client will wait at least `timeout` for any request.
///
/// teloxide's default client gives up after a few seconds, far below what a
/// re-publish of a multi-gigabyte file can take on Telegram's side.
pub fn build_bot(token: &str, timeout: Duration) -> anyhow::Result<Bot> {
    let client: reqwest::Client = teloxide::net::default_reqwest_settings()
        .timeout(timeout)
        .build()?;
    Ok(Bot::with_client(token, client))
}

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// Plain chat traffic only; re-publish calls are never retried.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

fn remote_err(e: RequestError) -> RemoteError {
    match &e {
        RequestError::Network(inner) if inner.is_timeout() => RemoteError::Timeout,
        RequestError::Api(_) | RequestError::MigrateToChatId(_) => {
            RemoteError::Rejected(e.to_string())
        }
        _ => RemoteError::Transport(e.to_string()),
    }
}

fn download_err(e: DownloadError) -> RemoteError {
    match &e {
        DownloadError::Network(inner) if inner.is_timeout() => RemoteError::Timeout,
        _ => RemoteError::Transport(e.to_string()),
    }
}

fn thumbnail_input(arg: ThumbnailArgument) -> InputFile {
    match arg {
        ThumbnailArgument::Reference(handle) => InputFile::file_id(handle.0),
        ThumbnailArgument::Bytes(bytes) => InputFile::memory(bytes).file_name("thumbnail.jpg"),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .edit_message_text(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                    html.to_string(),
                )
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await?;
        Ok(())
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
            .buttons
            .into_iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label, b.callback_data)])
            .collect();
        let markup = InlineKeyboardMarkup::new(rows);

        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), text.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(markup.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string());
            }
            req
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RemotePlatform for TelegramMessenger {
    fn accepts_thumbnail_reference(&self, _kind: MediaKind) -> bool {
        // Bot API: thumbnails "can't be reused and can be only uploaded as a new file".
        false
    }

    async fn republish(&self, call: RepublishCall) -> std::result::Result<(), RemoteError> {
        let RepublishCall {
            chat_id,
            kind,
            media,
            thumbnail,
            caption,
        } = call;
        let chat = Self::tg_chat(chat_id);
        let media = InputFile::file_id(media.0);
        let thumb = thumbnail_input(thumbnail);

        let res = match kind {
            MediaKind::Video => {
                let mut req = self
                    .bot
                    .send_video(chat, media)
                    .thumb(thumb)
                    .supports_streaming(true);
                if !caption.is_empty() {
                    req = req.caption(caption);
                }
                req.await
            }
            MediaKind::Document => {
                let mut req = self.bot.send_document(chat, media).thumb(thumb);
                if !caption.is_empty() {
                    req = req.caption(caption);
                }
                req.await
            }
        };

        res.map(|_| ()).map_err(remote_err)
    }

    async fn fetch_bytes(
        &self,
        handle: &ContentHandle,
    ) -> std::result::Result<Vec<u8>, RemoteError> {
        let file = self
            .bot
            .get_file(handle.0.clone())
            .await
            .map_err(remote_err)?;

        let mut buf: Vec<u8> = Vec::new();
        self.bot
            .download_file(&file.path, &mut buf)
            .await
            .map_err(download_err)?;
        Ok(buf)
    }
}
