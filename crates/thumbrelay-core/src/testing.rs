//! Hand-rolled fakes shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, ContentHandle, MediaKind, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingPort, types::InlineKeyboard},
    platform::{RemoteError, RemotePlatform, RepublishCall},
    Result,
};

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    pub sends: Mutex<Vec<(ChatId, String)>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub deletes: Mutex<Vec<MessageRef>>,
    pub menus: Mutex<Vec<(ChatId, InlineKeyboard)>>,
    pub answered: Mutex<Vec<(String, Option<String>)>>,
    /// Chats that reject every send (e.g. the user blocked the bot).
    pub blocked: Mutex<HashSet<i64>>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    pub fn block(&self, chat_id: i64) {
        self.blocked.lock().unwrap().insert(chat_id);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn edit_texts(&self) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        if self.blocked.lock().unwrap().contains(&chat_id.0) {
            return Err(Error::External("Forbidden: bot was blocked by the user".into()));
        }
        self.sends.lock().unwrap().push((chat_id, html.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.edits.lock().unwrap().push((msg, html.to_string()));
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.deletes.lock().unwrap().push(msg);
        Ok(())
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.sends.lock().unwrap().push((chat_id, html.to_string()));
        self.menus.lock().unwrap().push((chat_id, keyboard));
        Ok(self.alloc(chat_id))
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.answered
            .lock()
            .unwrap()
            .push((callback_id.to_string(), text.map(str::to_string)));
        Ok(())
    }
}

pub struct FakePlatform {
    pub accepts_reference: bool,
    pub publish_result: Mutex<std::result::Result<(), RemoteError>>,
    pub publish_delay: Duration,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub republished: Mutex<Vec<RepublishCall>>,
    pub fetched: Mutex<Vec<ContentHandle>>,
}

impl FakePlatform {
    pub fn new(accepts_reference: bool) -> Self {
        Self {
            accepts_reference,
            publish_result: Mutex::new(Ok(())),
            publish_delay: Duration::ZERO,
            files: Mutex::new(HashMap::new()),
            republished: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_file(self, id: &str, bytes: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(id.to_string(), bytes.to_vec());
        self
    }

    pub fn failing_with(self, err: RemoteError) -> Self {
        *self.publish_result.lock().unwrap() = Err(err);
        self
    }

    pub fn calls(&self) -> Vec<RepublishCall> {
        self.republished.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemotePlatform for FakePlatform {
    fn accepts_thumbnail_reference(&self, _kind: MediaKind) -> bool {
        self.accepts_reference
    }

    async fn republish(&self, call: RepublishCall) -> std::result::Result<(), RemoteError> {
        self.republished.lock().unwrap().push(call);
        if !self.publish_delay.is_zero() {
            tokio::time::sleep(self.publish_delay).await;
        }
        self.publish_result.lock().unwrap().clone()
    }

    async fn fetch_bytes(
        &self,
        handle: &ContentHandle,
    ) -> std::result::Result<Vec<u8>, RemoteError> {
        self.fetched.lock().unwrap().push(handle.clone());
        self.files
            .lock()
            .unwrap()
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| RemoteError::Rejected("Bad Request: invalid file_id".into()))
    }
}
