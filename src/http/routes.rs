//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for `CLIENT_ORIGIN`: `*` allows any origin, otherwise a
/// comma-separated allow list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    players: usize,
    projectiles: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        players: state.arena.stats.players(),
        projectiles: state.arena.stats.projectiles(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::weapons::WeaponCatalog;
    use crate::game::{Arena, ArenaLoop};
    use crate::ws::SessionHub;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".to_string(),
            client_origin: "*".to_string(),
            weapon_catalog_path: None,
            spawn_points: Vec::new(),
            arena_seed: Some(1),
        };
        let hub = Arc::new(SessionHub::new());
        let arena = Arena::new(Arc::new(WeaponCatalog::default()), Vec::new(), 1);
        let (_arena_loop, handle) = ArenaLoop::new(arena, hub.clone());
        AppState::new(config, hub, handle)
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let router = build_router(test_state());
        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["players"], 0);
        assert_eq!(json["projectiles"], 0);
        assert!(json["uptimeSecs"].is_u64());
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let router = build_router(test_state());
        let response = router
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_cors_allow_list_echoes_known_origin() {
        let mut state = test_state();
        state.config = Arc::new(Config {
            client_origin: "http://localhost:5173, https://arena.example".to_string(),
            ..(*state.config).clone()
        });
        let router = build_router(state);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://arena.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&header::HeaderValue::from_static("https://arena.example"))
        );
    }
}
