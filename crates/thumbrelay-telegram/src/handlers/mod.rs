//! Telegram update handlers.
//!
//! Each handler converts a teloxide update into the core `IncomingUpdate` model
//! and hands it to `RelayService`. No relay logic lives here.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::debug;

use thumbrelay_core::{
    domain::{ChatId, ContentHandle, UserId},
    messaging::types::{Command, IncomingUpdate, MediaMessage, PhotoMessage, TextMessage},
};

use crate::router::AppState;

mod callback;

pub async fn handle_callback(
    _bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = to_update(&msg) else {
        return Ok(());
    };

    let outcome = match &update {
        // Thumbnail changes and re-publishes of one user never interleave.
        IncomingUpdate::Photo(_) | IncomingUpdate::Media(_) => {
            let _guard = state.user_locks.lock_user(update.user_id().0).await;
            state.service.handle(update).await
        }
        _ => state.service.handle(update).await,
    };
    debug!(chat_id = msg.chat.id.0, ?outcome, "message handled");
    Ok(())
}

fn to_update(msg: &Message) -> Option<IncomingUpdate> {
    let user = msg.from()?;
    let user_id = UserId(user.id.0 as i64);
    let chat_id = ChatId(msg.chat.id.0);
    let username = user.username.clone();

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return Some(IncomingUpdate::Command(Command::parse(
                chat_id, user_id, username, text,
            )));
        }
        return Some(IncomingUpdate::Text(TextMessage {
            chat_id,
            user_id,
            username,
            text: text.to_string(),
        }));
    }

    // Telegram lists photo sizes smallest first.
    if let Some(best) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some(IncomingUpdate::Photo(PhotoMessage {
            chat_id,
            user_id,
            username,
            file_id: ContentHandle::new(best.file.id.clone()),
        }));
    }

    let video = msg.video().map(|v| ContentHandle::new(v.file.id.clone()));
    let document = msg.document().map(|d| ContentHandle::new(d.file.id.clone()));
    if video.is_some() || document.is_some() {
        return Some(IncomingUpdate::Media(MediaMessage {
            chat_id,
            user_id,
            username,
            video,
            document,
            caption: msg.caption().map(str::to_string),
        }));
    }

    None
}
