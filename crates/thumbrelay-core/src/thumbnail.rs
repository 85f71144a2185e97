//! Thumbnail resolution: pass the stored reference through, or dereference it to bytes.
//!
//! Telegram's send operations do not uniformly take a `file_id` for the thumbnail
//! slot; some only accept freshly uploaded bytes. Which one applies is a policy
//! decision made per target operation, never inferred silently.

use std::{fmt, str::FromStr, time::Duration};

use tokio::time::timeout;
use tracing::debug;

use crate::{
    domain::{ContentHandle, MediaKind},
    pipeline::RepublishError,
    platform::{RemoteError, RemotePlatform},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThumbnailStrategy {
    /// Pass the stored handle unchanged.
    Reference,
    /// Download the handle's bytes and upload them as the thumbnail.
    FetchBytes,
    /// Ask the platform whether the target operation accepts references.
    Auto,
}

impl FromStr for ThumbnailStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reference" | "ref" | "file_id" => Ok(Self::Reference),
            "bytes" | "fetch" | "fetch_bytes" | "upload" => Ok(Self::FetchBytes),
            "auto" => Ok(Self::Auto),
            other => Err(format!(
                "unknown thumbnail strategy {other:?} (expected reference, bytes or auto)"
            )),
        }
    }
}

impl fmt::Display for ThumbnailStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Reference => "reference",
            Self::FetchBytes => "bytes",
            Self::Auto => "auto",
        };
        f.write_str(s)
    }
}

/// Strategy per target operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThumbnailPolicy {
    pub video: ThumbnailStrategy,
    pub document: ThumbnailStrategy,
}

impl ThumbnailPolicy {
    pub fn uniform(strategy: ThumbnailStrategy) -> Self {
        Self {
            video: strategy,
            document: strategy,
        }
    }

    pub fn for_kind(&self, kind: MediaKind) -> ThumbnailStrategy {
        match kind {
            MediaKind::Video => self.video,
            MediaKind::Document => self.document,
        }
    }
}

/// Thumbnail value handed to the remote call.
#[derive(Clone, PartialEq, Eq)]
pub enum ThumbnailArgument {
    Reference(ContentHandle),
    Bytes(Vec<u8>),
}

impl fmt::Debug for ThumbnailArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference(h) => f.debug_tuple("Reference").field(h).finish(),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
        }
    }
}

pub struct ThumbnailResolver {
    policy: ThumbnailPolicy,
    fetch_timeout: Duration,
}

impl ThumbnailResolver {
    pub fn new(policy: ThumbnailPolicy, fetch_timeout: Duration) -> Self {
        Self {
            policy,
            fetch_timeout,
        }
    }

    /// The concrete strategy (never `Auto`) used for `kind` against `platform`.
    pub fn effective_strategy(
        &self,
        platform: &dyn RemotePlatform,
        kind: MediaKind,
    ) -> ThumbnailStrategy {
        match self.policy.for_kind(kind) {
            ThumbnailStrategy::Auto if platform.accepts_thumbnail_reference(kind) => {
                ThumbnailStrategy::Reference
            }
            ThumbnailStrategy::Auto => ThumbnailStrategy::FetchBytes,
            explicit => explicit,
        }
    }

    pub async fn resolve(
        &self,
        platform: &dyn RemotePlatform,
        handle: &ContentHandle,
        kind: MediaKind,
    ) -> Result<ThumbnailArgument, RepublishError> {
        let strategy = self.effective_strategy(platform, kind);
        debug!(%strategy, kind = kind.label(), "resolving thumbnail");

        if strategy == ThumbnailStrategy::Reference {
            return Ok(ThumbnailArgument::Reference(handle.clone()));
        }

        match timeout(self.fetch_timeout, platform.fetch_bytes(handle)).await {
            Ok(Ok(bytes)) if bytes.is_empty() => Err(RepublishError::ThumbnailFetchFailed(
                "downloaded thumbnail is empty".to_string(),
            )),
            Ok(Ok(bytes)) => Ok(ThumbnailArgument::Bytes(bytes)),
            Ok(Err(e)) => Err(RepublishError::ThumbnailFetchFailed(e.to_string())),
            Err(_) => Err(RepublishError::ThumbnailFetchFailed(
                RemoteError::Timeout.to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::RepublishCall;
    use async_trait::async_trait;

    struct StubPlatform {
        accepts_reference: bool,
        bytes: Result<Vec<u8>, RemoteError>,
        delay: Duration,
    }

    #[async_trait]
    impl RemotePlatform for StubPlatform {
        fn accepts_thumbnail_reference(&self, _kind: MediaKind) -> bool {
            self.accepts_reference
        }

        async fn republish(&self, _call: RepublishCall) -> Result<(), RemoteError> {
            Ok(())
        }

        async fn fetch_bytes(&self, _handle: &ContentHandle) -> Result<Vec<u8>, RemoteError> {
            tokio::time::sleep(self.delay).await;
            self.bytes.clone()
        }
    }

    fn stub(accepts_reference: bool, bytes: Result<Vec<u8>, RemoteError>) -> StubPlatform {
        StubPlatform {
            accepts_reference,
            bytes,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!(
            "Reference".parse::<ThumbnailStrategy>(),
            Ok(ThumbnailStrategy::Reference)
        );
        assert_eq!(
            " bytes ".parse::<ThumbnailStrategy>(),
            Ok(ThumbnailStrategy::FetchBytes)
        );
        assert_eq!("auto".parse::<ThumbnailStrategy>(), Ok(ThumbnailStrategy::Auto));
        assert!("mystery".parse::<ThumbnailStrategy>().is_err());
    }

    #[test]
    fn auto_follows_platform_capability() {
        let r = ThumbnailResolver::new(
            ThumbnailPolicy::uniform(ThumbnailStrategy::Auto),
            Duration::from_secs(1),
        );
        assert_eq!(
            r.effective_strategy(&stub(true, Ok(vec![])), MediaKind::Video),
            ThumbnailStrategy::Reference
        );
        assert_eq!(
            r.effective_strategy(&stub(false, Ok(vec![])), MediaKind::Video),
            ThumbnailStrategy::FetchBytes
        );
    }

    #[tokio::test]
    async fn reference_passes_handle_through() {
        let r = ThumbnailResolver::new(
            ThumbnailPolicy::uniform(ThumbnailStrategy::Reference),
            Duration::from_secs(1),
        );
        let arg = r
            .resolve(
                &stub(false, Err(RemoteError::Timeout)),
                &ContentHandle::new("ph1"),
                MediaKind::Document,
            )
            .await
            .unwrap();
        assert_eq!(arg, ThumbnailArgument::Reference(ContentHandle::new("ph1")));
    }

    #[tokio::test]
    async fn per_operation_policy_is_respected() {
        let r = ThumbnailResolver::new(
            ThumbnailPolicy {
                video: ThumbnailStrategy::FetchBytes,
                document: ThumbnailStrategy::Reference,
            },
            Duration::from_secs(1),
        );
        let p = stub(true, Ok(vec![1, 2, 3]));
        let h = ContentHandle::new("ph1");
        assert_eq!(
            r.resolve(&p, &h, MediaKind::Video).await.unwrap(),
            ThumbnailArgument::Bytes(vec![1, 2, 3])
        );
        assert_eq!(
            r.resolve(&p, &h, MediaKind::Document).await.unwrap(),
            ThumbnailArgument::Reference(h.clone())
        );
    }

    #[tokio::test]
    async fn fetch_errors_are_fetch_failures() {
        let r = ThumbnailResolver::new(
            ThumbnailPolicy::uniform(ThumbnailStrategy::FetchBytes),
            Duration::from_secs(1),
        );
        let err = r
            .resolve(
                &stub(false, Err(RemoteError::Rejected("file is too big".into()))),
                &ContentHandle::new("ph1"),
                MediaKind::Video,
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RepublishError::ThumbnailFetchFailed("file is too big".into())
        );

        let err = r
            .resolve(&stub(false, Ok(vec![])), &ContentHandle::new("ph1"), MediaKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, RepublishError::ThumbnailFetchFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_times_out() {
        let r = ThumbnailResolver::new(
            ThumbnailPolicy::uniform(ThumbnailStrategy::FetchBytes),
            Duration::from_secs(1),
        );
        let p = StubPlatform {
            accepts_reference: false,
            bytes: Ok(vec![1]),
            delay: Duration::from_secs(30),
        };
        let err = r
            .resolve(&p, &ContentHandle::new("ph1"), MediaKind::Video)
            .await
            .unwrap_err();
        assert!(matches!(err, RepublishError::ThumbnailFetchFailed(_)));
    }
}
