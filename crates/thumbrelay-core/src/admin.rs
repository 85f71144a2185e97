//! Admin control plane: maintenance gate, broadcast fan-out, stats and bans.
//!
//! Every operation takes the caller's identity and is a silent no-op (`None`)
//! unless the caller is on the configured admin allow-list.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    domain::{ChatId, UserId},
    formatting::{escape_html, format_duration},
    messaging::notify::Notifier,
    stats::GlobalStats,
    store::ContentHandleStore,
};

pub fn is_admin(user_id: UserId, admin_ids: &[i64]) -> bool {
    if admin_ids.is_empty() {
        return false;
    }
    admin_ids.contains(&user_id.0)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub files_processed: u64,
    pub started_at: DateTime<Utc>,
    pub uptime: Duration,
    pub maintenance: bool,
    pub total_users: usize,
    pub users_with_thumbnail: usize,
    pub banned_users: usize,
}

impl StatsSnapshot {
    pub fn to_html(&self) -> String {
        format!(
            "📊 <b>Bot Stats</b>\n\n\
             Files processed: <code>{}</code>\n\
             Users: <code>{}</code> (with thumbnail: <code>{}</code>, banned: <code>{}</code>)\n\
             Uptime: <code>{}</code>\n\
             Started: <code>{}</code>\n\
             Maintenance: <code>{}</code>",
            self.files_processed,
            self.total_users,
            self.users_with_thumbnail,
            self.banned_users,
            format_duration(self.uptime),
            escape_html(&self.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            if self.maintenance { "on" } else { "off" },
        )
    }
}

pub struct AdminControlPlane {
    admin_ids: Vec<i64>,
    store: Arc<dyn ContentHandleStore>,
    stats: Arc<GlobalStats>,
    notifier: Notifier,
    broadcast_delay: Duration,
}

impl AdminControlPlane {
    pub fn new(
        admin_ids: Vec<i64>,
        store: Arc<dyn ContentHandleStore>,
        stats: Arc<GlobalStats>,
        notifier: Notifier,
        broadcast_delay: Duration,
    ) -> Self {
        Self {
            admin_ids,
            store,
            stats,
            notifier,
            broadcast_delay,
        }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        is_admin(user_id, &self.admin_ids)
    }

    pub fn maintenance(&self) -> bool {
        self.stats.maintenance()
    }

    /// Returns the previous mode.
    pub fn set_maintenance(&self, caller: UserId, on: bool) -> Option<bool> {
        if !self.is_admin(caller) {
            return None;
        }
        let previous = self.stats.set_maintenance(on);
        info!(admin = caller.0, on, previous, "maintenance mode changed");
        Some(previous)
    }

    /// Send `text` to every known user, one at a time with a fixed delay between sends.
    ///
    /// A failed recipient is logged and skipped; it never stops the fan-out.
    pub async fn broadcast(&self, caller: UserId, text: &str) -> Option<BroadcastReport> {
        if !self.is_admin(caller) {
            return None;
        }

        let html = format!("📢 {}", escape_html(text));
        let recipients = self.store.user_ids().await;
        let mut report = BroadcastReport::default();

        for (i, user) in recipients.iter().enumerate() {
            if i > 0 && !self.broadcast_delay.is_zero() {
                sleep(self.broadcast_delay).await;
            }
            report.attempted += 1;
            match self.notifier.try_send(ChatId::from(*user), &html).await {
                Ok(_) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(user_id = user.0, error = %e, "broadcast delivery failed");
                }
            }
        }

        info!(
            admin = caller.0,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "broadcast finished"
        );
        Some(report)
    }

    pub async fn stats(&self, caller: UserId) -> Option<StatsSnapshot> {
        if !self.is_admin(caller) {
            return None;
        }
        let counts = self.store.counts().await;
        Some(StatsSnapshot {
            files_processed: self.stats.files_processed(),
            started_at: self.stats.started_at(),
            uptime: self.stats.uptime(),
            maintenance: self.stats.maintenance(),
            total_users: counts.total_users,
            users_with_thumbnail: counts.with_thumbnail,
            banned_users: counts.banned,
        })
    }

    /// Ban or unban `target`. Admins cannot be banned; returns whether the flag was applied.
    pub async fn set_banned(&self, caller: UserId, target: UserId, banned: bool) -> Option<bool> {
        if !self.is_admin(caller) {
            return None;
        }
        if banned && self.is_admin(target) {
            return Some(false);
        }
        self.store.set_banned(target, banned).await;
        info!(admin = caller.0, target = target.0, banned, "ban flag changed");
        Some(true)
    }
}
