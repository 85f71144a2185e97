//! Update routing: gates (maintenance, bans) first, then commands, photos, media and buttons.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    admin::AdminControlPlane,
    config::Config,
    domain::{ChatId, UserId},
    formatting::escape_html,
    messaging::{
        notify::Notifier,
        port::MessagingPort,
        types::{CallbackQuery, Command, IncomingUpdate, InlineKeyboard, PhotoMessage},
    },
    pipeline::{RepublishError, RepublishPipeline, RepublishReceipt},
    platform::RemotePlatform,
    stats::GlobalStats,
    store::{ContentHandleStore, UserState},
};

const MAINTENANCE_TEXT: &str =
    "🛠️ <b>Maintenance in progress.</b>\nThe bot is temporarily unavailable, please try again later.";
const BANNED_TEXT: &str = "🚫 You are not allowed to use this bot.";

const CB_THUMB: &str = "menu:thumb";
const CB_CLEAR: &str = "menu:clear";
const CB_CAPTION: &str = "menu:caption";

/// What happened to one update (returned for logging and tests).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Short-circuited by maintenance mode.
    Maintenance,
    /// Short-circuited because the user is banned.
    Banned,
    ThumbnailSet,
    Republished(Result<RepublishReceipt, RepublishError>),
    Command(String),
    Callback(String),
    /// Nothing to do (admin command from a non-admin, unknown button, ...).
    Ignored,
}

pub struct RelayService {
    cfg: Arc<Config>,
    store: Arc<dyn ContentHandleStore>,
    notifier: Notifier,
    pipeline: RepublishPipeline,
    admin: AdminControlPlane,
}

impl RelayService {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn ContentHandleStore>,
        messenger: Arc<dyn MessagingPort>,
        platform: Arc<dyn RemotePlatform>,
    ) -> Self {
        let stats = Arc::new(GlobalStats::new());
        let notifier = Notifier::new(messenger, cfg.reply_timeout);
        let pipeline = RepublishPipeline::new(
            cfg.clone(),
            store.clone(),
            platform,
            notifier.clone(),
            stats.clone(),
        );
        let admin = AdminControlPlane::new(
            cfg.admin_ids.clone(),
            store.clone(),
            stats,
            notifier.clone(),
            cfg.broadcast_delay,
        );
        Self {
            cfg,
            store,
            notifier,
            pipeline,
            admin,
        }
    }

    pub fn admin(&self) -> &AdminControlPlane {
        &self.admin
    }

    pub async fn handle(&self, update: IncomingUpdate) -> Dispatch {
        let user_id = update.user_id();
        let chat_id = update.chat_id();
        let is_admin = self.admin.is_admin(user_id);

        // Maintenance gate runs before anything touches the store.
        if !is_admin && self.admin.maintenance() {
            debug!(user_id = user_id.0, kind = update.kind(), "blocked by maintenance mode");
            self.reject(&update, chat_id, MAINTENANCE_TEXT).await;
            return Dispatch::Maintenance;
        }

        if !is_admin && self.store.is_banned(user_id).await {
            debug!(user_id = user_id.0, kind = update.kind(), "dropped update from banned user");
            self.reject(&update, chat_id, BANNED_TEXT).await;
            return Dispatch::Banned;
        }

        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd, is_admin).await,
            IncomingUpdate::Text(t) => {
                self.store.get(t.user_id).await;
                let _ = self
                    .notifier
                    .send(
                        t.chat_id,
                        "Send a <b>photo</b> to set the thumbnail, then a <b>video or file</b>. /start for help.",
                    )
                    .await;
                Dispatch::Ignored
            }
            IncomingUpdate::Photo(p) => self.handle_photo(p).await,
            IncomingUpdate::Media(m) => Dispatch::Republished(self.pipeline.run(&m).await),
            IncomingUpdate::Callback(q) => self.handle_callback(q).await,
        }
    }

    async fn reject(&self, update: &IncomingUpdate, chat_id: ChatId, html: &str) {
        match update {
            IncomingUpdate::Callback(q) => {
                self.notifier
                    .answer_callback(&q.callback_id, Some(&strip_tags(html)))
                    .await;
            }
            _ => {
                let _ = self.notifier.send(chat_id, html).await;
            }
        }
    }

    async fn handle_photo(&self, p: PhotoMessage) -> Dispatch {
        self.store.set_thumbnail(p.user_id, p.file_id).await;
        info!(user_id = p.user_id.0, "thumbnail saved");
        let _ = self
            .notifier
            .send(
                p.chat_id,
                "🖼️ <b>Thumbnail saved!</b>\nNow send your video or file.",
            )
            .await;
        Dispatch::ThumbnailSet
    }

    async fn handle_command(&self, cmd: Command, is_admin: bool) -> Dispatch {
        let chat_id = cmd.chat_id;
        let user_id = cmd.user_id;

        match cmd.name.as_str() {
            "start" | "help" => {
                let state = self.store.get(user_id).await;
                self.notifier
                    .send_menu(chat_id, &self.usage_html(&state, is_admin), menu_keyboard())
                    .await;
            }
            "clear" | "clearthumb" | "clear_thumbnail" => {
                let text = self.clear_text(user_id).await;
                let _ = self.notifier.send(chat_id, text).await;
            }
            "thumb" | "thumbnail" => {
                let state = self.store.get(user_id).await;
                let _ = self.notifier.send(chat_id, &status_html(&state)).await;
            }
            "caption" => {
                let mode = self.store.toggle_caption_mode(user_id).await;
                let text = format!("✏️ Caption mode: <b>{}</b>", mode.label());
                let _ = self.notifier.send(chat_id, &text).await;
            }
            "stats" | "broadcast" | "maintenance" | "ban" | "unban" if !is_admin => {
                // Admin-only: silent for everyone else.
                return Dispatch::Ignored;
            }
            "stats" => {
                if let Some(snap) = self.admin.stats(user_id).await {
                    let _ = self.notifier.send(chat_id, &snap.to_html()).await;
                }
            }
            "broadcast" => self.handle_broadcast(chat_id, user_id, &cmd.args).await,
            "maintenance" => self.handle_maintenance(chat_id, user_id, &cmd.args).await,
            "ban" | "unban" => {
                self.handle_ban(chat_id, user_id, &cmd.args, cmd.name == "ban")
                    .await
            }
            other => {
                self.store.get(user_id).await;
                let text = format!(
                    "Unknown command: /{}\nSend /start for help.",
                    escape_html(other)
                );
                let _ = self.notifier.send(chat_id, &text).await;
            }
        }

        Dispatch::Command(cmd.name)
    }

    async fn clear_text(&self, user_id: UserId) -> &'static str {
        if self.store.clear_thumbnail(user_id).await {
            "🗑️ Thumbnail cleared."
        } else {
            "ℹ️ No thumbnail was set."
        }
    }

    async fn handle_broadcast(&self, chat_id: ChatId, admin: UserId, text: &str) {
        if text.trim().is_empty() {
            let _ = self
                .notifier
                .send(chat_id, "Usage: <code>/broadcast your message</code>")
                .await;
            return;
        }
        let status = self.notifier.send(chat_id, "📢 Broadcasting...").await;
        let Some(report) = self.admin.broadcast(admin, text.trim()).await else {
            return;
        };
        let summary = format!(
            "✅ <b>Broadcast finished</b>\nDelivered: <code>{}</code> / <code>{}</code> (failed: <code>{}</code>)",
            report.delivered, report.attempted, report.failed
        );
        self.notifier.replace_or_send(chat_id, status, &summary).await;
    }

    async fn handle_maintenance(&self, chat_id: ChatId, admin: UserId, args: &str) {
        let on = match args.trim().to_lowercase().as_str() {
            "on" | "1" | "true" | "enable" => true,
            "off" | "0" | "false" | "disable" => false,
            _ => {
                let current = if self.admin.maintenance() { "on" } else { "off" };
                let text = format!(
                    "Maintenance is <b>{current}</b>.\nUsage: <code>/maintenance on|off</code>"
                );
                let _ = self.notifier.send(chat_id, &text).await;
                return;
            }
        };
        if self.admin.set_maintenance(admin, on).is_some() {
            let text = if on {
                "🛠️ Maintenance mode <b>enabled</b>."
            } else {
                "✅ Maintenance mode <b>disabled</b>."
            };
            let _ = self.notifier.send(chat_id, text).await;
        }
    }

    async fn handle_ban(&self, chat_id: ChatId, admin: UserId, args: &str, ban: bool) {
        let Ok(target) = args.trim().parse::<i64>() else {
            let usage = if ban {
                "Usage: <code>/ban user_id</code>"
            } else {
                "Usage: <code>/unban user_id</code>"
            };
            let _ = self.notifier.send(chat_id, usage).await;
            return;
        };
        let text = match self.admin.set_banned(admin, UserId(target), ban).await {
            Some(true) if ban => format!("🚫 User <code>{target}</code> banned."),
            Some(true) => format!("✅ User <code>{target}</code> unbanned."),
            Some(false) => "Admins cannot be banned.".to_string(),
            None => return,
        };
        let _ = self.notifier.send(chat_id, &text).await;
    }

    async fn handle_callback(&self, q: CallbackQuery) -> Dispatch {
        let user_id = q.user_id;
        match q.data.as_str() {
            CB_THUMB => {
                let state = self.store.get(user_id).await;
                self.notifier.answer_callback(&q.callback_id, None).await;
                let _ = self.notifier.send(q.chat_id, &status_html(&state)).await;
            }
            CB_CLEAR => {
                let text = self.clear_text(user_id).await;
                self.notifier
                    .answer_callback(&q.callback_id, Some(text))
                    .await;
            }
            CB_CAPTION => {
                let mode = self.store.toggle_caption_mode(user_id).await;
                let text = format!("Caption mode: {}", mode.label());
                self.notifier
                    .answer_callback(&q.callback_id, Some(&text))
                    .await;
            }
            _ => {
                self.notifier.answer_callback(&q.callback_id, None).await;
                return Dispatch::Ignored;
            }
        }
        Dispatch::Callback(q.data)
    }

    fn usage_html(&self, state: &UserState, is_admin: bool) -> String {
        let mut out = String::from(
            "⚡ <b>Thumbnail Relay Bot</b>\n\n\
             1. Send a <b>photo</b> (sets the thumbnail)\n\
             2. Send a <b>video or file</b> (re-sent with your thumbnail, no re-upload)\n\n\
             /thumb show the current thumbnail status\n\
             /clear forget the thumbnail\n\
             /caption toggle caption handling",
        );
        if self.cfg.force_document {
            out.push_str("\n\n✅ <i>Mode: force document</i>");
        }
        if self.cfg.consume_on_use {
            out.push_str("\n🔁 <i>The thumbnail is used once, then cleared</i>");
        }
        out.push_str("\n\n");
        out.push_str(&status_html(state));
        if is_admin {
            out.push_str(
                "\n\n<b>Admin</b>\n/stats\n/broadcast text\n/maintenance on|off\n/ban id, /unban id",
            );
        }
        out
    }
}

fn status_html(state: &UserState) -> String {
    let thumb = if state.pending_thumbnail.is_some() {
        "✅ set"
    } else {
        "❌ not set"
    };
    format!(
        "Thumbnail: <b>{thumb}</b>\nCaption mode: <b>{}</b>",
        state.caption_mode.label()
    )
}

fn menu_keyboard() -> InlineKeyboard {
    InlineKeyboard::one_per_row(&[
        ("🖼️ Thumbnail status", CB_THUMB),
        ("🗑️ Clear thumbnail", CB_CLEAR),
        ("✏️ Toggle caption", CB_CAPTION),
    ])
}

/// Callback answers are plain text.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
