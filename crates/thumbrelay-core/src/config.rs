use std::{env, fs, path::Path, time::Duration};

use crate::{
    errors::Error,
    thumbnail::{ThumbnailPolicy, ThumbnailStrategy},
    Result,
};

/// Typed configuration, loaded from the process environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub admin_ids: Vec<i64>,

    // Pipeline behavior
    pub thumbnail_policy: ThumbnailPolicy,
    pub consume_on_use: bool,
    pub force_document: bool,
    pub default_caption: Option<String>,

    // Timeouts
    pub publish_timeout: Duration,
    pub fetch_timeout: Duration,
    pub reply_timeout: Duration,

    // Admin fan-out
    pub broadcast_delay: Duration,

    // Plumbing
    pub keep_alive_port: u16,
    pub drop_pending_updates: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let bot_token = env_str("BOT_TOKEN")
            .and_then(non_empty)
            .or_else(|| env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty))
            .unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_ids = parse_csv_i64(env_str("ADMIN_IDS"));

        // Thumbnail strategy: one global knob plus per-operation overrides.
        let base = parse_strategy("THUMBNAIL_STRATEGY")?.unwrap_or(ThumbnailStrategy::Auto);
        let thumbnail_policy = ThumbnailPolicy {
            video: parse_strategy("THUMBNAIL_STRATEGY_VIDEO")?.unwrap_or(base),
            document: parse_strategy("THUMBNAIL_STRATEGY_DOCUMENT")?.unwrap_or(base),
        };

        let consume_on_use = env_bool("CONSUME_ON_USE").unwrap_or(false);
        let force_document = env_bool("FORCE_DOCUMENT").unwrap_or(false);
        let default_caption = env_str("DEFAULT_CAPTION").and_then(non_empty);

        let publish_timeout =
            Duration::from_secs(env_u64("PUBLISH_TIMEOUT_SECS").unwrap_or(120).max(1));
        let fetch_timeout = Duration::from_secs(env_u64("FETCH_TIMEOUT_SECS").unwrap_or(60).max(1));
        let reply_timeout = Duration::from_secs(env_u64("REPLY_TIMEOUT_SECS").unwrap_or(15).max(1));

        let broadcast_delay = Duration::from_millis(env_u64("BROADCAST_DELAY_MS").unwrap_or(50));

        let keep_alive_port = env_u16("PORT").unwrap_or(8080);
        let drop_pending_updates = env_bool("DROP_PENDING_UPDATES").unwrap_or(true);

        Ok(Self {
            bot_token,
            admin_ids,
            thumbnail_policy,
            consume_on_use,
            force_document,
            default_caption,
            publish_timeout,
            fetch_timeout,
            reply_timeout,
            broadcast_delay,
            keep_alive_port,
            drop_pending_updates,
        })
    }

    /// Longest window any single outbound request may need.
    pub fn transport_timeout(&self) -> Duration {
        self.publish_timeout
            .max(self.fetch_timeout)
            .max(self.reply_timeout)
            + Duration::from_secs(5)
    }

    /// Hand-rolled config for unit tests (avoids env dependence).
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            bot_token: "x".to_string(),
            admin_ids: vec![1],
            thumbnail_policy: ThumbnailPolicy::uniform(ThumbnailStrategy::Reference),
            consume_on_use: false,
            force_document: false,
            default_caption: None,
            publish_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(5),
            reply_timeout: Duration::from_secs(1),
            broadcast_delay: Duration::from_millis(0),
            keep_alive_port: 8080,
            drop_pending_updates: true,
        }
    }
}

fn parse_strategy(key: &str) -> Result<Option<ThumbnailStrategy>> {
    let Some(raw) = env_str(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.parse::<ThumbnailStrategy>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key}: {e}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    let quoted = val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')));
    if quoted {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
