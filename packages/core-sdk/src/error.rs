use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/** \brief 判定为可重试（瞬时）错误的消息片段。 */
const RETRYABLE_MARKERS: &[&str] = &[
    "503",
    "Service Unavailable",
    "overloaded",
    "429",
    "Too Many Requests",
];

const AUTH_MARKERS: &[&str] = &["API_KEY_INVALID", "invalid_api_key", "401 Unauthorized"];
const QUOTA_MARKERS: &[&str] = &["QUOTA_EXCEEDED", "insufficient_quota"];

/** \brief 过载时建议客户端等待的秒数。 */
pub const RETRY_AFTER_SECS: u64 = 30;

/**
 * \brief 判断错误消息是否属于瞬时错误。
 */
pub fn is_retryable_message(message: &str) -> bool {
    RETRYABLE_MARKERS.iter().any(|m| message.contains(m))
}

/**
 * \brief 可由重试策略判定的错误。
 */
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials: {0}")]
    Auth(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("blocked by safety filters: {0}")]
    SafetyBlock(String),

    #[error("provider unavailable: {0}")]
    Transient(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl RelayError {
    /**
     * \brief 根据 Provider 返回的错误文本归类。
     */
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_retryable_message(&message) {
            RelayError::Transient(message)
        } else if AUTH_MARKERS.iter().any(|m| message.contains(m)) {
            RelayError::Auth(message)
        } else if QUOTA_MARKERS.iter().any(|m| message.contains(m)) {
            RelayError::Quota(message)
        } else if message.contains("SAFETY") {
            RelayError::SafetyBlock(message)
        } else {
            RelayError::Provider(message)
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) | RelayError::SafetyBlock(_) => StatusCode::BAD_REQUEST,
            RelayError::Auth(_) => StatusCode::UNAUTHORIZED,
            RelayError::Quota(_) => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::Provider(_) | RelayError::Transport(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /**
     * \brief 面向客户端的 JSON 错误体。
     */
    pub fn body(&self) -> serde_json::Value {
        match self {
            RelayError::Validation(message) => json!({ "error": message }),
            RelayError::Auth(_) => json!({
                "error": "Invalid API key. Please check your API key configuration."
            }),
            RelayError::Quota(_) => json!({
                "error": "API quota exceeded. Please try again later."
            }),
            RelayError::SafetyBlock(_) => json!({
                "error": "Content blocked by safety filters. Please rephrase your message."
            }),
            RelayError::Transient(_) => json!({
                "error": "The AI provider is currently overloaded. Please try again in a few moments.",
                "retryAfter": RETRY_AFTER_SECS,
            }),
            other => json!({
                "error": "Internal server error. Please try again later.",
                "details": other.to_string(),
            }),
        }
    }
}

impl Retryable for RelayError {
    fn is_retryable(&self) -> bool {
        match self {
            RelayError::Transient(_) => true,
            other => is_retryable_message(&other.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_provider_messages() {
        assert!(matches!(
            RelayError::from_provider_message("request failed: 503 Service Unavailable -> {}"),
            RelayError::Transient(_)
        ));
        assert!(matches!(
            RelayError::from_provider_message("model is overloaded"),
            RelayError::Transient(_)
        ));
        assert!(matches!(
            RelayError::from_provider_message("400 -> API_KEY_INVALID"),
            RelayError::Auth(_)
        ));
        assert!(matches!(
            RelayError::from_provider_message("403 -> QUOTA_EXCEEDED"),
            RelayError::Quota(_)
        ));
        assert!(matches!(
            RelayError::from_provider_message("finishReason SAFETY"),
            RelayError::SafetyBlock(_)
        ));
        assert!(matches!(
            RelayError::from_provider_message("something odd"),
            RelayError::Provider(_)
        ));
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            RelayError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(RelayError::Auth("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            RelayError::Quota("x".into()).status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            RelayError::SafetyBlock("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RelayError::Transient("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            RelayError::Provider("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn overloaded_body_carries_retry_hint() {
        let body = RelayError::Transient("503".into()).body();
        assert_eq!(body["retryAfter"], 30);
        let body = RelayError::Provider("boom".into()).body();
        assert_eq!(body["details"], "provider error: boom");
    }

    #[test]
    fn retryability_uses_message_text() {
        assert!(RelayError::Transient("x".into()).is_retryable());
        assert!(RelayError::Provider("got 429 back".into()).is_retryable());
        assert!(!RelayError::Auth("API_KEY_INVALID".into()).is_retryable());
    }
}
