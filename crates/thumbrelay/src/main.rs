use std::{process::ExitCode, sync::Arc};

use tracing::error;

use thumbrelay_core::config::Config;

mod keep_alive;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = thumbrelay_core::logging::init("thumbrelay") {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // A failed bind is logged; the bot keeps polling.
    let port = cfg.keep_alive_port;
    tokio::spawn(async move {
        if let Err(e) = keep_alive::serve(port).await {
            error!(port, "keep-alive server stopped: {e:#}");
        }
    });

    if let Err(e) = thumbrelay_telegram::router::run_polling(cfg).await {
        error!("telegram bot failed: {e:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
