use async_trait::async_trait;

use crate::{
    domain::{ChatId, ContentHandle, MediaKind},
    thumbnail::ThumbnailArgument,
};

/// Error surfaced by the remote platform boundary.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The platform refused the request (bad thumbnail format, expired handle, ...).
    #[error("{0}")]
    Rejected(String),

    #[error("no confirmation before the deadline")]
    Timeout,

    /// Network or protocol failure before the platform gave an answer.
    #[error("{0}")]
    Transport(String),
}

/// One re-publish call: existing media plus a new cover image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepublishCall {
    pub chat_id: ChatId,
    /// Remote operation to use (may differ from the media's own kind).
    pub kind: MediaKind,
    pub media: ContentHandle,
    pub thumbnail: ThumbnailArgument,
    pub caption: String,
}

/// Remote capabilities the pipeline consumes.
#[async_trait]
pub trait RemotePlatform: Send + Sync {
    /// Whether the operation for `kind` accepts a bare reference as the thumbnail.
    fn accepts_thumbnail_reference(&self, kind: MediaKind) -> bool;

    async fn republish(&self, call: RepublishCall) -> Result<(), RemoteError>;

    /// Dereference a handle into raw bytes.
    async fn fetch_bytes(&self, handle: &ContentHandle) -> Result<Vec<u8>, RemoteError>;
}
