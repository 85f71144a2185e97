use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use thumbrelay_core::{
    config::Config,
    messaging::port::MessagingPort,
    platform::RemotePlatform,
    service::RelayService,
    store::{ContentHandleStore, InMemoryStore},
};

use crate::handlers;
use crate::{build_bot, TelegramMessenger};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RelayService>,
    pub user_locks: Arc<UserLocks>,
}

/// Serializes thumbnail updates and re-publishes of one user.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = build_bot(&cfg.bot_token, cfg.transport_timeout())?;

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "bot started"),
        Err(e) => warn!(error = %e, "getMe failed"),
    }
    info!(
        admins = cfg.admin_ids.len(),
        video_strategy = %cfg.thumbnail_policy.video,
        document_strategy = %cfg.thumbnail_policy.document,
        consume_on_use = cfg.consume_on_use,
        force_document = cfg.force_document,
        "configuration loaded"
    );

    if cfg.drop_pending_updates {
        if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
            warn!(error = %e, "failed to drop pending updates");
        }
    }

    let telegram = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = telegram.clone();
    let platform: Arc<dyn RemotePlatform> = telegram;
    let store: Arc<dyn ContentHandleStore> = Arc::new(InMemoryStore::new());

    let state = Arc::new(AppState {
        service: Arc::new(RelayService::new(cfg, store, messenger, platform)),
        user_locks: Arc::new(UserLocks::default()),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
