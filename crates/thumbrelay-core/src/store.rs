//! Per-user state: pending thumbnail handle and mode flags.
//!
//! Process-local memory is authoritative; everything here is lost on restart.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{ContentHandle, UserId};

/// Whether the inbound caption is carried through to the re-published message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptionMode {
    #[default]
    Keep,
    Strip,
}

impl CaptionMode {
    pub fn toggled(self) -> Self {
        match self {
            CaptionMode::Keep => CaptionMode::Strip,
            CaptionMode::Strip => CaptionMode::Keep,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CaptionMode::Keep => "keep original caption",
            CaptionMode::Strip => "strip caption",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserState {
    /// At most one pending thumbnail; a new photo overwrites the previous one.
    pub pending_thumbnail: Option<ContentHandle>,
    pub banned: bool,
    pub joined_at: DateTime<Utc>,
    pub caption_mode: CaptionMode,
}

impl UserState {
    fn fresh() -> Self {
        Self {
            pending_thumbnail: None,
            banned: false,
            joined_at: Utc::now(),
            caption_mode: CaptionMode::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub total_users: usize,
    pub with_thumbnail: usize,
    pub banned: usize,
}

/// Store seam between the pipeline and wherever user state lives.
///
/// Each operation is atomic with respect to a single user's record.
#[async_trait]
pub trait ContentHandleStore: Send + Sync {
    /// Snapshot of the user's state, creating a default record on first sight.
    async fn get(&self, user: UserId) -> UserState;

    async fn set_thumbnail(&self, user: UserId, handle: ContentHandle);

    /// Returns whether a thumbnail was present.
    async fn clear_thumbnail(&self, user: UserId) -> bool;

    /// Clear only if the stored handle still equals `expected`.
    async fn clear_thumbnail_if(&self, user: UserId, expected: &ContentHandle) -> bool;

    /// Unknown users are never banned; this does not create a record.
    async fn is_banned(&self, user: UserId) -> bool;

    async fn set_banned(&self, user: UserId, banned: bool);

    /// Flip the caption mode and return the new value.
    async fn toggle_caption_mode(&self, user: UserId) -> CaptionMode;

    /// Every known user, in ascending id order.
    async fn user_ids(&self) -> Vec<UserId>;

    async fn counts(&self) -> StoreCounts;
}

/// In-memory store: an outer map of per-user records, each behind its own lock.
///
/// The outer lock is only held to find or insert a record, so independent users
/// never wait on each other's record.
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<UserId, Arc<Mutex<UserState>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn record(&self, user: UserId) -> Arc<Mutex<UserState>> {
        let mut map = self.records.lock().await;
        map.entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(UserState::fresh())))
            .clone()
    }

    async fn existing(&self, user: UserId) -> Option<Arc<Mutex<UserState>>> {
        self.records.lock().await.get(&user).cloned()
    }

    async fn all_records(&self) -> Vec<Arc<Mutex<UserState>>> {
        self.records.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl ContentHandleStore for InMemoryStore {
    async fn get(&self, user: UserId) -> UserState {
        let rec = self.record(user).await;
        let st = rec.lock().await;
        st.clone()
    }

    async fn set_thumbnail(&self, user: UserId, handle: ContentHandle) {
        let rec = self.record(user).await;
        rec.lock().await.pending_thumbnail = Some(handle);
    }

    async fn clear_thumbnail(&self, user: UserId) -> bool {
        let rec = self.record(user).await;
        let mut st = rec.lock().await;
        st.pending_thumbnail.take().is_some()
    }

    async fn clear_thumbnail_if(&self, user: UserId, expected: &ContentHandle) -> bool {
        let Some(rec) = self.existing(user).await else {
            return false;
        };
        let mut st = rec.lock().await;
        if st.pending_thumbnail.as_ref() == Some(expected) {
            st.pending_thumbnail = None;
            return true;
        }
        false
    }

    async fn is_banned(&self, user: UserId) -> bool {
        match self.existing(user).await {
            Some(rec) => rec.lock().await.banned,
            None => false,
        }
    }

    async fn set_banned(&self, user: UserId, banned: bool) {
        let rec = self.record(user).await;
        rec.lock().await.banned = banned;
    }

    async fn toggle_caption_mode(&self, user: UserId) -> CaptionMode {
        let rec = self.record(user).await;
        let mut st = rec.lock().await;
        st.caption_mode = st.caption_mode.toggled();
        st.caption_mode
    }

    async fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.records.lock().await.keys().copied().collect();
        ids.sort();
        ids
    }

    async fn counts(&self) -> StoreCounts {
        let mut counts = StoreCounts::default();
        for rec in self.all_records().await {
            let st = rec.lock().await;
            counts.total_users += 1;
            if st.pending_thumbnail.is_some() {
                counts.with_thumbnail += 1;
            }
            if st.banned {
                counts.banned += 1;
            }
        }
        counts
    }
}
