//! Notification endpoint handlers

use std::sync::Arc;

use axum::{
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{info, warn};

use crate::error::ErrorResponse;
use crate::notify::auth::TokenVerifier;
use crate::notify::types::{ApiResponse, Empty, NotificationRequest};

/// Shared state for the endpoint handlers
pub struct NotifyState {
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Health check endpoint - GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::<Empty>::success_with_message("ok"))
}

/// Notification dispatch - POST /api/v1/notify
///
/// Checks run in order: credential (401), body validation (400),
/// ownership (403). The body is taken raw so a malformed payload never
/// masks a missing credential.
pub async fn send_notification(
    AxumState(state): AxumState<Arc<NotifyState>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    let token = match bearer_token(&headers) {
        Some(token) => token,
        None => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("AUTH_ERROR", "Authentication required")),
            );
        }
    };

    let user = match state.verifier.verify(token).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Rejected notification credential: {}", e);
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error(
                    "AUTH_ERROR",
                    "Invalid authentication token",
                )),
            );
        }
    };

    let request: NotificationRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error(
                    "VALIDATION_ERROR",
                    &format!("Invalid request body: {}", e),
                )),
            );
        }
    };

    if let Err(e) = request.validate() {
        let response = ErrorResponse::from(e);
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(&response.code, &response.message)),
        );
    }

    if request.user_id != user.user_id {
        return (
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error(
                "FORBIDDEN",
                "You can only send notifications to yourself",
            )),
        );
    }

    // Delivery is stubbed; a real deployment hands this to a push/SMS/
    // email provider
    info!(
        "Dispatching {:?} notification to {}: {} - {}",
        request.notification_type, request.user_id, request.title, request.message
    );

    (
        StatusCode::OK,
        Json(ApiResponse::success_with_message(
            "Notification sent successfully",
        )),
    )
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::auth::StaticTokenVerifier;
    use crate::notify::types::NotificationType;
    use axum::extract::State as AxumState;

    fn test_state() -> Arc<NotifyState> {
        let digest = StaticTokenVerifier::digest("good-token");
        Arc::new(NotifyState {
            verifier: Arc::new(StaticTokenVerifier::new(&[("user-1".to_string(), digest)])),
        })
    }

    fn request_body(user_id: &str) -> String {
        serde_json::to_string(&NotificationRequest {
            user_id: user_id.to_string(),
            title: "Trade filled".to_string(),
            message: "Your AAPL order filled at 198.20".to_string(),
            notification_type: NotificationType::TradeConfirmation,
        })
        .unwrap()
    }

    fn auth_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", format!("Bearer {}", token).parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_missing_credential_is_401() {
        let (status, _) = send_notification(
            AxumState(test_state()),
            HeaderMap::new(),
            request_body("user-1"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_token_is_401() {
        let (status, body) = send_notification(
            AxumState(test_state()),
            auth_headers("bad-token"),
            request_body("user-1"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code.as_deref(), Some("AUTH_ERROR"));
    }

    #[tokio::test]
    async fn test_validation_failure_is_400() {
        let (status, body) = send_notification(
            AxumState(test_state()),
            auth_headers("good-token"),
            r#"{"user_id":"user-1","title":"","message":"m","type":"news"}"#.to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code.as_deref(), Some("VALIDATION_ERROR"));

        let (status, _) = send_notification(
            AxumState(test_state()),
            auth_headers("good-token"),
            "not json".to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_user_mismatch_is_403() {
        let (status, body) = send_notification(
            AxumState(test_state()),
            auth_headers("good-token"),
            request_body("someone-else"),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.code.as_deref(), Some("FORBIDDEN"));
    }

    #[tokio::test]
    async fn test_accepted_request_is_acknowledged() {
        let (status, body) = send_notification(
            AxumState(test_state()),
            auth_headers("good-token"),
            request_body("user-1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(
            body.message.as_deref(),
            Some("Notification sent successfully")
        );
    }

    #[tokio::test]
    async fn test_malformed_body_never_masks_401() {
        let (status, _) = send_notification(
            AxumState(test_state()),
            HeaderMap::new(),
            "not json".to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
