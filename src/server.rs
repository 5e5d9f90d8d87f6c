//! 服务装配
//!
//! 共享状态、路由表与服务启动。模型目录与 token 提供者在这里作为
//! 显式持有的协作对象装配，生命周期随服务进程。

use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use crate::config::RelayConfig;
use crate::handlers;
use crate::models::ModelDirectory;
use crate::token::TokenProvider;

/// 各处理器共享的应用状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub http: Client,
    pub token: Arc<TokenProvider>,
    pub models: Arc<ModelDirectory>,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        let token = TokenProvider::new(http.clone(), &config);
        let models = ModelDirectory::new(http.clone(), token.clone(), &config);
        Self {
            config: Arc::new(config),
            http,
            token: Arc::new(token),
            models: Arc::new(models),
        }
    }
}

/// 构建路由表（含 OpenAI 兼容别名路径）
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root_redirect))
        .route("/healthz", get(handlers::health_check))
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route("/v1/completions", post(handlers::chat_completions))
        .route("/api/v1/models", get(handlers::list_models))
        .route("/api/v1/chat/completions", post(handlers::chat_completions))
        .route("/hf/v1/models", get(handlers::list_models))
        .route("/hf/v1/chat/completions", post(handlers::chat_completions))
        .layer(cors)
        .with_state(state)
}

/// 启动服务并阻塞运行
pub async fn serve(config: RelayConfig) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(config);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("[Relay] OpenAI兼容API服务器启动在 {addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
