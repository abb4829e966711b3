use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::{net::TcpListener, sync::oneshot};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::{
    chat::{ChatService, FrameStream},
    config::RelayConfig,
    error::RelayError,
    models::RawHistoryEntry,
};

const INVALID_CONTENTS: &str =
    "Invalid request format. Expected contents array with parts containing text.";

/**
 * \brief 各路由共享的状态；ChatService 在启动时构建一次。
 */
#[derive(Clone)]
pub struct AppState {
    /** \brief `/api/chat` */
    pub assistant: Arc<ChatService>,
    /** \brief `/api/gemini`、`/api/gemini/stream` */
    pub product: Arc<ChatService>,
}

impl AppState {
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let assistant =
            ChatService::from_profile(config.assistant.clone(), config.retry, config.replay_delay)?;
        let product =
            ChatService::from_profile(config.product.clone(), config.retry, config.replay_delay)?;
        Ok(Self {
            assistant: Arc::new(assistant),
            product: Arc::new(product),
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Server is running!" }))
        .route("/api", get(|| async { "Working!" }))
        .route("/api/health", get(health_check))
        .route("/api/chat", post(chat_stream).fallback(method_not_allowed))
        .route(
            "/api/gemini/stream",
            post(gemini_stream).fallback(method_not_allowed),
        )
        .route("/api/gemini", post(gemini_once).fallback(method_not_allowed))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/**
 * \brief 运行中的服务句柄：绑定地址与关闭触发器。
 */
pub struct ServeHandle {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<tokio::task::JoinHandle<std::io::Result<()>>>,
}

impl ServeHandle {
    /**
     * \brief 触发优雅关闭并等待服务退出。
     */
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            join.await??;
        }
        Ok(())
    }
}

/**
 * \brief 绑定地址并在后台任务中启动服务。
 * \param addr 监听地址，如 "127.0.0.1:5000"；端口为 0 时由系统分配
 */
pub async fn serve(state: AppState, addr: &str) -> Result<ServeHandle> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!("server listening on http://{}", local);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = router(state);
    let join = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("received shutdown signal");
            })
            .await
    });

    Ok(ServeHandle {
        addr: local,
        shutdown_tx: Some(shutdown_tx),
        join: Some(join),
    })
}

/**
 * \brief 按配置启动服务，直到收到 ctrl-c。
 */
pub async fn run(config: &RelayConfig) -> Result<()> {
    let state = AppState::from_config(config)?;
    let handle = serve(state, &config.addr).await?;
    info!("chat endpoint available at http://{}/api/chat", handle.addr);
    info!("gemini endpoint available at http://{}/api/gemini", handle.addr);
    tokio::signal::ctrl_c().await?;
    handle.shutdown().await
}

#[derive(Deserialize, Debug)]
struct ChatRequest {
    /** \brief 用户发送的消息 */
    #[serde(default)]
    message: Option<String>,
    /** \brief 客户端保存的历史记录，可缺省 */
    #[serde(default)]
    history: Vec<RawHistoryEntry>,
}

#[derive(Deserialize, Debug)]
struct GeminiRequest {
    #[serde(default)]
    contents: Vec<GeminiContent>,
}

#[derive(Deserialize, Debug)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize, Debug)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiRequest {
    /** \brief contents[0].parts[0].text */
    fn user_message(self) -> Option<String> {
        self.contents
            .into_iter()
            .next()?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.is_empty())
    }
}

/**
 * \brief 聊天 SSE 接口：POST /api/chat，结束标记为 `data: [DONE]`。
 */
async fn chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(req) = payload.map_err(|e| RelayError::Validation(e.body_text()))?;
    let message = req
        .message
        .filter(|m| !m.is_empty())
        .ok_or_else(|| RelayError::Validation("Message is required".to_string()))?;

    let reply = state
        .assistant
        .open_stream(&message, &req.history)
        .await
        .inspect_err(|e| error!(error = %e, "chat request failed"))?;
    Ok(sse_response(state.assistant.frames(reply)))
}

/**
 * \brief Gemini 形态的流式接口：POST /api/gemini/stream。
 */
async fn gemini_stream(
    State(state): State<AppState>,
    payload: Result<Json<GeminiRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let message = gemini_message(payload)?;
    let reply = state
        .product
        .open_stream(&message, &[])
        .await
        .inspect_err(|e| error!(error = %e, "streaming gemini request failed"))?;
    Ok(sse_response(state.product.frames(reply)))
}

/**
 * \brief Gemini 形态的非流式接口：POST /api/gemini。
 */
async fn gemini_once(
    State(state): State<AppState>,
    payload: Result<Json<GeminiRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, RelayError> {
    let message = gemini_message(payload)?;
    let reply = state
        .product
        .complete(&message, &[])
        .await
        .inspect_err(|e| error!(error = %e, "gemini request failed"))?;
    Ok(Json(json!({
        "candidates": [{
            "content": {
                "parts": [{ "text": reply.text }]
            }
        }]
    })))
}

fn gemini_message(payload: Result<Json<GeminiRequest>, JsonRejection>) -> Result<String, RelayError> {
    payload
        .ok()
        .and_then(|Json(req)| req.user_message())
        .ok_or_else(|| RelayError::Validation(INVALID_CONTENTS.to_string()))
}

fn sse_response(frames: FrameStream) -> Response {
    let events = frames.map(|frame| Ok::<_, Infallible>(frame.into_event()));
    (
        [(header::CONNECTION, "keep-alive")],
        Sse::new(events).keep_alive(KeepAlive::new()),
    )
        .into_response()
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

/**
 * \brief 健康检查：逐个 Provider 列出模型，全部成功才返回 200。
 */
async fn health_check(State(state): State<AppState>) -> Response {
    let mut healthy = true;
    let mut profiles = serde_json::Map::new();
    for service in [&state.assistant, &state.product] {
        let name = service.profile().name.clone();
        let entry = match service.provider().list_models().await {
            Ok(models) => json!({ "status": "healthy", "models": models.len() }),
            Err(e) => {
                warn!(profile = %name, error = %e, "health check failed");
                healthy = false;
                json!({
                    "status": "unhealthy",
                    "message": "Provider API is currently unavailable",
                    "error": e.to_string(),
                })
            }
        };
        profiles.insert(name, entry);
    }

    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (status, Json(json!({ "status": label, "profiles": profiles }))).into_response()
}
