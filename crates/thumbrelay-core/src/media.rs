use crate::{
    domain::{ContentHandle, MediaKind},
    messaging::types::MediaMessage,
    pipeline::RepublishError,
};

/// Typed content reference extracted from an inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifiedMedia {
    pub handle: ContentHandle,
    pub kind: MediaKind,
    /// Inbound caption; empty when the message had none.
    pub caption: String,
}

/// Extract the media reference from a message.
///
/// Video takes precedence over document when both are attached.
pub fn classify(msg: &MediaMessage) -> Result<ClassifiedMedia, RepublishError> {
    let (handle, kind) = match (&msg.video, &msg.document) {
        (Some(v), _) => (v.clone(), MediaKind::Video),
        (None, Some(d)) => (d.clone(), MediaKind::Document),
        (None, None) => return Err(RepublishError::NoMediaPresent),
    };

    Ok(ClassifiedMedia {
        handle,
        kind,
        caption: msg.caption.clone().unwrap_or_default(),
    })
}
