//! Re-publish pipeline: `Validating → Resolving → Publishing → Done`, or `Failed(kind)`.
//!
//! Side effects per run: at most one thumbnail fetch, at most one re-publish call,
//! and status messages to the originating chat (a "processing" acknowledgment that
//! is deleted on success or rewritten on failure).

use std::{fmt, sync::Arc};

use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::{
    config::Config,
    domain::{ChatId, ContentHandle, MediaKind, MessageRef, UserId},
    formatting::{escape_html, truncate_chars},
    media::classify,
    messaging::{notify::Notifier, types::MediaMessage},
    platform::{RemoteError, RemotePlatform, RepublishCall},
    stats::GlobalStats,
    store::{CaptionMode, ContentHandleStore},
    thumbnail::ThumbnailResolver,
};

const PROCESSING_TEXT: &str = "⚡ <b>Processing...</b>";
const MAX_DETAIL_CHARS: usize = 300;

/// Per-request failure taxonomy.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RepublishError {
    #[error("message carries neither a video nor a file")]
    NoMediaPresent,

    #[error("no thumbnail set")]
    NoThumbnailSet,

    #[error("thumbnail fetch failed: {0}")]
    ThumbnailFetchFailed(String),

    #[error("remote rejected re-publish: {0}")]
    RemoteRejected(String),

    #[error("re-publish not confirmed in time")]
    RemoteTimeout,
}

impl RepublishError {
    /// Text shown to the user, or `None` for failures that are silently ignored.
    pub fn user_message(&self) -> Option<String> {
        let msg = match self {
            RepublishError::NoMediaPresent => return None,
            RepublishError::NoThumbnailSet => {
                "❌ <b>No thumbnail set.</b>\nSend a photo first, then resend your video or file."
                    .to_string()
            }
            RepublishError::ThumbnailFetchFailed(detail) => format!(
                "❌ <b>Could not fetch your thumbnail.</b>\n<code>{}</code>\n\nSend the photo again, then resend the media.",
                escape_html(&truncate_chars(detail, MAX_DETAIL_CHARS))
            ),
            RepublishError::RemoteRejected(detail) => format!(
                "❌ <b>Telegram refused the request.</b>\n<code>{}</code>\n\nThe thumbnail may be in an unsupported format or the file reference may have expired. Send a new photo or resend the media.",
                escape_html(&truncate_chars(detail, MAX_DETAIL_CHARS))
            ),
            RepublishError::RemoteTimeout => {
                "⚠️ <b>Telegram is still processing.</b>\nNo confirmation arrived in time; the file may still show up shortly. Resend it if it does not."
                    .to_string()
            }
        };
        Some(msg)
    }
}

/// Pipeline stage, used for logging where a run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Resolving,
    Publishing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Validating => "validating",
            Stage::Resolving => "resolving",
            Stage::Publishing => "publishing",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// Ephemeral value built per inbound media message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepublishRequest {
    pub media_handle: ContentHandle,
    pub media_kind: MediaKind,
    pub caption: String,
    pub thumbnail_handle: ContentHandle,
}

/// Successful run summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepublishReceipt {
    /// Operation actually used (differs from the media kind under `force_document`).
    pub operation: MediaKind,
    pub files_processed: u64,
    pub thumbnail_consumed: bool,
}

pub struct RepublishPipeline {
    cfg: Arc<Config>,
    store: Arc<dyn ContentHandleStore>,
    platform: Arc<dyn RemotePlatform>,
    notifier: Notifier,
    stats: Arc<GlobalStats>,
    resolver: ThumbnailResolver,
}

impl RepublishPipeline {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn ContentHandleStore>,
        platform: Arc<dyn RemotePlatform>,
        notifier: Notifier,
        stats: Arc<GlobalStats>,
    ) -> Self {
        let resolver = ThumbnailResolver::new(cfg.thumbnail_policy, cfg.fetch_timeout);
        Self {
            cfg,
            store,
            platform,
            notifier,
            stats,
            resolver,
        }
    }

    /// Run the pipeline for one inbound media message.
    ///
    /// Every failure has already been reported to the chat and logged when this returns.
    pub async fn run(&self, msg: &MediaMessage) -> Result<RepublishReceipt, RepublishError> {
        let media = classify(msg)?;
        let chat_id = msg.chat_id;
        let user_id = msg.user_id;

        // Validating
        let state = self.store.get(user_id).await;
        let Some(thumbnail_handle) = state.pending_thumbnail else {
            self.fail(chat_id, user_id, None, Stage::Validating, RepublishError::NoThumbnailSet)
                .await;
            return Err(RepublishError::NoThumbnailSet);
        };

        let request = RepublishRequest {
            media_handle: media.handle,
            media_kind: media.kind,
            caption: self.compose_caption(&media.caption, state.caption_mode),
            thumbnail_handle,
        };

        let status = self.notifier.send(chat_id, PROCESSING_TEXT).await;

        let operation = self.operation_for(request.media_kind);
        if let Err((stage, e)) = self.execute(chat_id, operation, &request).await {
            self.fail(chat_id, user_id, status, stage, e.clone()).await;
            return Err(e);
        }

        // Done
        let files_processed = self.stats.record_processed();
        let thumbnail_consumed = self.cfg.consume_on_use
            && self
                .store
                .clear_thumbnail_if(user_id, &request.thumbnail_handle)
                .await;

        if let Some(st) = status {
            let _ = self.notifier.delete(st).await;
        }

        info!(
            user_id = user_id.0,
            chat_id = chat_id.0,
            media_kind = request.media_kind.label(),
            operation = operation.label(),
            thumbnail_consumed,
            files_processed,
            stage = %Stage::Done,
            "re-published media with new thumbnail"
        );

        Ok(RepublishReceipt {
            operation,
            files_processed,
            thumbnail_consumed,
        })
    }

    fn operation_for(&self, kind: MediaKind) -> MediaKind {
        if self.cfg.force_document {
            MediaKind::Document
        } else {
            kind
        }
    }

    fn compose_caption(&self, inbound: &str, mode: CaptionMode) -> String {
        let caption = match mode {
            CaptionMode::Keep => inbound.to_string(),
            CaptionMode::Strip => String::new(),
        };
        if caption.trim().is_empty() {
            return self.cfg.default_caption.clone().unwrap_or_default();
        }
        caption
    }

    async fn execute(
        &self,
        chat_id: ChatId,
        operation: MediaKind,
        request: &RepublishRequest,
    ) -> Result<(), (Stage, RepublishError)> {
        // Resolving
        let thumbnail = self
            .resolver
            .resolve(self.platform.as_ref(), &request.thumbnail_handle, operation)
            .await
            .map_err(|e| (Stage::Resolving, e))?;

        // Publishing
        let call = RepublishCall {
            chat_id,
            kind: operation,
            media: request.media_handle.clone(),
            thumbnail,
            caption: request.caption.clone(),
        };
        match timeout(self.cfg.publish_timeout, self.platform.republish(call)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(RemoteError::Timeout)) | Err(_) => {
                Err((Stage::Publishing, RepublishError::RemoteTimeout))
            }
            Ok(Err(RemoteError::Rejected(detail))) | Ok(Err(RemoteError::Transport(detail))) => {
                Err((Stage::Publishing, RepublishError::RemoteRejected(detail)))
            }
        }
    }

    async fn fail(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        status: Option<MessageRef>,
        stage: Stage,
        e: RepublishError,
    ) {
        match &e {
            RepublishError::NoMediaPresent | RepublishError::NoThumbnailSet => {
                info!(user_id = user_id.0, %stage, "re-publish skipped: {e}");
            }
            RepublishError::RemoteTimeout => {
                warn!(user_id = user_id.0, chat_id = chat_id.0, %stage, "re-publish: {e}");
            }
            RepublishError::ThumbnailFetchFailed(_) | RepublishError::RemoteRejected(_) => {
                error!(user_id = user_id.0, chat_id = chat_id.0, %stage, "re-publish failed: {e}");
            }
        }

        if let Some(text) = e.user_message() {
            self.notifier.replace_or_send(chat_id, status, &text).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        store::InMemoryStore,
        testing::{FakeMessenger, FakePlatform},
        thumbnail::{ThumbnailArgument, ThumbnailPolicy, ThumbnailStrategy},
    };

    struct Harness {
        store: Arc<InMemoryStore>,
        platform: Arc<FakePlatform>,
        messenger: Arc<FakeMessenger>,
        stats: Arc<GlobalStats>,
        pipeline: RepublishPipeline,
    }

    fn harness(cfg: Config, platform: FakePlatform) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let platform = Arc::new(platform);
        let messenger = Arc::new(FakeMessenger::new());
        let stats = Arc::new(GlobalStats::new());
        let pipeline = RepublishPipeline::new(
            Arc::new(cfg),
            store.clone(),
            platform.clone(),
            Notifier::new(messenger.clone(), Duration::from_secs(1)),
            stats.clone(),
        );
        Harness {
            store,
            platform,
            messenger,
            stats,
            pipeline,
        }
    }

    fn video(user: i64, handle: &str, caption: Option<&str>) -> MediaMessage {
        MediaMessage {
            chat_id: ChatId(user),
            user_id: UserId(user),
            username: None,
            video: Some(ContentHandle::new(handle)),
            document: None,
            caption: caption.map(str::to_string),
        }
    }

    fn document(user: i64, handle: &str) -> MediaMessage {
        MediaMessage {
            video: None,
            document: Some(ContentHandle::new(handle)),
            ..video(user, "unused", None)
        }
    }

    #[tokio::test]
    async fn no_thumbnail_means_no_remote_call() {
        let h = harness(Config::for_tests(), FakePlatform::new(true));
        let err = h.pipeline.run(&video(1, "v1", None)).await.unwrap_err();

        assert_eq!(err, RepublishError::NoThumbnailSet);
        assert!(h.platform.calls().is_empty());
        assert!(h.platform.fetched.lock().unwrap().is_empty());
        assert_eq!(h.stats.files_processed(), 0);
        let sent = h.messenger.sent_texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("No thumbnail set"));
    }

    #[tokio::test]
    async fn photo_then_video_with_reference_strategy() {
        let h = harness(Config::for_tests(), FakePlatform::new(true));
        h.store.set_thumbnail(UserId(1), ContentHandle::new("ph1")).await;

        let receipt = h.pipeline.run(&video(1, "v1", Some("hi"))).await.unwrap();

        assert_eq!(receipt.operation, MediaKind::Video);
        assert_eq!(receipt.files_processed, 1);
        assert_eq!(
            h.platform.calls(),
            vec![RepublishCall {
                chat_id: ChatId(1),
                kind: MediaKind::Video,
                media: ContentHandle::new("v1"),
                thumbnail: ThumbnailArgument::Reference(ContentHandle::new("ph1")),
                caption: "hi".to_string(),
            }]
        );
        assert!(h.platform.fetched.lock().unwrap().is_empty());
        assert_eq!(h.stats.files_processed(), 1);

        // Acknowledgment sent then removed.
        assert_eq!(h.messenger.sent_texts(), vec![PROCESSING_TEXT.to_string()]);
        assert_eq!(h.messenger.deletes.lock().unwrap().len(), 1);
        // Not consumed by default.
        assert_eq!(
            h.store.get(UserId(1)).await.pending_thumbnail,
            Some(ContentHandle::new("ph1"))
        );
    }

    #[tokio::test]
    async fn photo_then_video_with_byte_fetch_strategy() {
        let mut cfg = Config::for_tests();
        cfg.thumbnail_policy = ThumbnailPolicy::uniform(ThumbnailStrategy::FetchBytes);
        let h = harness(cfg, FakePlatform::new(true).with_file("ph1", b"jpeg"));
        h.store.set_thumbnail(UserId(1), ContentHandle::new("ph1")).await;

        h.pipeline.run(&video(1, "v1", Some("hi"))).await.unwrap();

        let calls = h.platform.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].thumbnail, ThumbnailArgument::Bytes(b"jpeg".to_vec()));
        assert_eq!(
            *h.platform.fetched.lock().unwrap(),
            vec![ContentHandle::new("ph1")]
        );
    }

    #[tokio::test]
    async fn fetch_failure_skips_publish() {
        let mut cfg = Config::for_tests();
        cfg.thumbnail_policy = ThumbnailPolicy::uniform(ThumbnailStrategy::FetchBytes);
        let h = harness(cfg, FakePlatform::new(false));
        h.store.set_thumbnail(UserId(1), ContentHandle::new("gone")).await;

        let err = h.pipeline.run(&video(1, "v1", None)).await.unwrap_err();

        assert!(matches!(err, RepublishError::ThumbnailFetchFailed(_)));
        assert!(h.platform.calls().is_empty());
        let edits = h.messenger.edit_texts();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].contains("Could not fetch your thumbnail"));
        assert!(h.messenger.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_is_reported_with_detail() {
        let h = harness(
            Config::for_tests(),
            FakePlatform::new(true)
                .failing_with(RemoteError::Rejected("Bad Request: wrong file type".into())),
        );
        h.store.set_thumbnail(UserId(1), ContentHandle::new("ph1")).await;

        let err = h.pipeline.run(&document(1, "d1")).await.unwrap_err();

        assert_eq!(
            err,
            RepublishError::RemoteRejected("Bad Request: wrong file type".into())
        );
        assert_eq!(h.platform.calls().len(), 1);
        assert_eq!(h.stats.files_processed(), 0);
        let edits = h.messenger.edit_texts();
        assert!(edits[0].contains("wrong file type"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_publish_becomes_timeout() {
        let mut platform = FakePlatform::new(true);
        platform.publish_delay = Duration::from_secs(600);
        let h = harness(Config::for_tests(), platform);
        h.store.set_thumbnail(UserId(1), ContentHandle::new("ph1")).await;

        let err = h.pipeline.run(&video(1, "v1", None)).await.unwrap_err();

        assert_eq!(err, RepublishError::RemoteTimeout);
        assert_eq!(h.platform.calls().len(), 1);
        assert!(h.messenger.edit_texts()[0].contains("still processing"));
    }

    #[tokio::test]
    async fn consume_on_use_clears_after_success() {
        let mut cfg = Config::for_tests();
        cfg.consume_on_use = true;
        let h = harness(cfg, FakePlatform::new(true));
        h.store.set_thumbnail(UserId(1), ContentHandle::new("ph1")).await;

        let receipt = h.pipeline.run(&video(1, "v1", None)).await.unwrap();
        assert!(receipt.thumbnail_consumed);
        assert_eq!(h.store.get(UserId(1)).await.pending_thumbnail, None);

        let err = h.pipeline.run(&video(1, "v2", None)).await.unwrap_err();
        assert_eq!(err, RepublishError::NoThumbnailSet);
        assert_eq!(h.platform.calls().len(), 1);
    }

    #[tokio::test]
    async fn force_document_routes_video_to_document_operation() {
        let mut cfg = Config::for_tests();
        cfg.force_document = true;
        let h = harness(cfg, FakePlatform::new(true));
        h.store.set_thumbnail(UserId(1), ContentHandle::new("ph1")).await;

        let receipt = h.pipeline.run(&video(1, "v1", None)).await.unwrap();
        assert_eq!(receipt.operation, MediaKind::Document);
        assert_eq!(h.platform.calls()[0].kind, MediaKind::Document);
    }

    #[tokio::test]
    async fn caption_mode_and_default_caption() {
        let mut cfg = Config::for_tests();
        cfg.default_caption = Some("via bot".to_string());
        let h = harness(cfg, FakePlatform::new(true));
        h.store.set_thumbnail(UserId(1), ContentHandle::new("ph1")).await;

        h.pipeline.run(&video(1, "v1", None)).await.unwrap();
        h.store.toggle_caption_mode(UserId(1)).await;
        h.pipeline.run(&video(1, "v2", Some("mine"))).await.unwrap();

        let captions: Vec<String> = h.platform.calls().into_iter().map(|c| c.caption).collect();
        assert_eq!(captions, vec!["via bot".to_string(), "via bot".to_string()]);
    }

    #[tokio::test]
    async fn message_without_media_is_ignored_silently() {
        let h = harness(Config::for_tests(), FakePlatform::new(true));
        let msg = MediaMessage {
            document: None,
            ..document(1, "d1")
        };

        assert_eq!(
            h.pipeline.run(&msg).await.unwrap_err(),
            RepublishError::NoMediaPresent
        );
        assert!(h.messenger.sent_texts().is_empty());
        assert!(h.store.user_ids().await.is_empty());
    }
}
