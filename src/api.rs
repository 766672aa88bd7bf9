use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::core::SniperCore;
use crate::types::TokenRecord;

/// 상태 조회용 HTTP API
///
/// 파이프라인 통계와 레지스트리 스냅샷을 읽기 전용으로 노출한다.
#[derive(Clone)]
pub struct ApiServer {
    config: Arc<Config>,
    core: SniperCore,
}

impl ApiServer {
    pub fn new(config: Arc<Config>, core: SniperCore) -> Self {
        Self { config, core }
    }

    pub async fn start(&self) -> Result<()> {
        let core_status = self.core.clone();
        let core_tokens = self.core.clone();

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = Router::new()
            .route("/api/health", get(|| async { Json(json!({"ok": true})) }))
            .route("/api/status", get(move || get_status(core_status.clone())))
            .route("/api/tokens", get(move || get_tokens(core_tokens.clone())))
            .layer(cors);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.monitoring.api_port));
        info!("🛰️ API server listening on http://{}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::Server::bind(&addr).serve(app.into_make_service()).await {
                error!("❌ API 서버 오류: {}", e);
            }
        });

        Ok(())
    }
}

async fn get_status(core: SniperCore) -> Json<serde_json::Value> {
    let status = core.get_status().await;
    Json(json!({
        "is_running": status.is_running,
        "tracked_tokens": status.tracked_tokens,
        "uptime_seconds": status.uptime_seconds,
        "stats": status.stats,
    }))
}

async fn get_tokens(core: SniperCore) -> Json<Vec<TokenRecord>> {
    Json(core.registry().snapshot())
}
