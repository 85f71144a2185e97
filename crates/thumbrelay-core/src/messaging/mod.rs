//! Cross-messenger abstractions (Telegram today).

pub mod notify;
pub mod port;
pub mod types;
