/// Core error type.
///
/// Adapter crates map their specific errors into this type so startup and
/// plumbing failures are handled consistently. Per-request pipeline failures
/// use [`crate::pipeline::RepublishError`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
