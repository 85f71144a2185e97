use std::sync::Arc;

use teloxide::prelude::*;
use tracing::debug;

use thumbrelay_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{CallbackQuery as CoreCallbackQuery, IncomingUpdate},
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let message = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });
    // Buttons pressed on inline-mode messages have no chat; answer in the user's private chat.
    let chat_id = message
        .map(|m| m.chat_id)
        .unwrap_or(ChatId(q.from.id.0 as i64));

    let update = IncomingUpdate::Callback(CoreCallbackQuery {
        chat_id,
        user_id: UserId(q.from.id.0 as i64),
        username: q.from.username.clone(),
        callback_id: q.id.clone(),
        data: q.data.clone().unwrap_or_default(),
        message,
    });

    let outcome = state.service.handle(update).await;
    debug!(callback_id = %q.id, ?outcome, "callback handled");
    Ok(())
}
