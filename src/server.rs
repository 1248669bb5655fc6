use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};

use crate::models::{ChatRequest, ErrorBody};
use crate::service::{ChatService, error_response};

const CHAT_PAGE: &str = include_str!("../static/chat.html");

/// HTTP routes for the chat page, the chat API and the history API.
pub fn router(service: ChatService) -> Router {
    Router::new()
        .route("/", get(chat_page))
        .route("/chat", get(chat_page).post(chat))
        .route("/api/history", get(history))
        .route("/health", get(|| async { "ok" }))
        .with_state(service)
}

async fn chat_page() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

async fn chat(State(service): State<ChatService>, body: Bytes) -> Response {
    tracing::info!("[Main] Received POST request to /chat");

    // Parsed by hand so a missing or odd Content-Type still gets a JSON answer.
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("[Main] Error parsing request body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "Invalid request format. Please try again.".to_string(),
                }),
            )
                .into_response();
        }
    };

    match service.handle(&request.query).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            let (status, body) = error_response(&e);
            (status, Json(body)).into_response()
        }
    }
}

async fn history(State(service): State<ChatService>) -> Response {
    let entries = service.history().list().await;
    (StatusCode::OK, Json(entries)).into_response()
}
