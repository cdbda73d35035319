//! Notification endpoint types

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const MAX_USER_ID_LEN: usize = 100;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Notification categories the dispatch endpoint accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PriceAlert,
    TradeConfirmation,
    PortfolioUpdate,
    News,
}

/// Body of `POST /api/v1/notify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
}

impl NotificationRequest {
    /// Field validation, applied before any dispatch. Limits count
    /// characters, not bytes, so multibyte text is not short-changed.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.is_empty() {
            return Err(AppError::Validation("user_id is required".to_string()));
        }
        if self.user_id.chars().count() > MAX_USER_ID_LEN {
            return Err(AppError::Validation("user_id too long".to_string()));
        }
        if self.title.is_empty() {
            return Err(AppError::Validation("title is required".to_string()));
        }
        if self.title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "title too long (max {} characters)",
                MAX_TITLE_LEN
            )));
        }
        if self.message.is_empty() {
            return Err(AppError::Validation("message is required".to_string()));
        }
        if self.message.chars().count() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation(format!(
                "message too long (max {} characters)",
                MAX_MESSAGE_LEN
            )));
        }
        Ok(())
    }
}

/// Uniform response envelope for the endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Marker for responses without a data payload
#[derive(Debug, Serialize)]
pub struct Empty;

impl<T: Serialize> ApiResponse<T> {
    pub fn success_with_message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            code: None,
            data: None,
        }
    }

    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            code: Some(code.to_string()),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NotificationRequest {
        NotificationRequest {
            user_id: "user-1".to_string(),
            title: "Price alert".to_string(),
            message: "AAPL crossed 200".to_string(),
            notification_type: NotificationType::PriceAlert,
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_field_limits() {
        let mut r = request();
        r.title = "t".repeat(MAX_TITLE_LEN + 1);
        assert!(r.validate().is_err());

        let mut r = request();
        r.message = "m".repeat(MAX_MESSAGE_LEN + 1);
        assert!(r.validate().is_err());

        let mut r = request();
        r.user_id = String::new();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_limits_count_characters_not_bytes() {
        // 150 characters, 450 bytes; within the 200-character title limit
        let mut r = request();
        r.title = "€".repeat(150);
        assert!(r.validate().is_ok());

        let mut r = request();
        r.title = "€".repeat(MAX_TITLE_LEN + 1);
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_type_wire_names() {
        let parsed: NotificationRequest = serde_json::from_str(
            r#"{"user_id":"u","title":"t","message":"m","type":"trade_confirmation"}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.notification_type,
            NotificationType::TradeConfirmation
        );

        assert!(serde_json::from_str::<NotificationRequest>(
            r#"{"user_id":"u","title":"t","message":"m","type":"spam"}"#,
        )
        .is_err());
    }
}
