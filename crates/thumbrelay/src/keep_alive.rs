//! Keep-alive HTTP endpoint for hosts that expect the process to listen on `PORT`.

use std::net::SocketAddr;

use anyhow::Result;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Health {
    pub status: &'static str,
    pub service: &'static str,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> &'static str {
    "Thumbnail relay bot is running 🚀"
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        service: "thumbrelay",
    })
}

pub async fn serve(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(&addr).await?;
    info!("keep-alive server listening on {}", addr);
    axum::serve(listener, router()).await?;
    Ok(())
}
