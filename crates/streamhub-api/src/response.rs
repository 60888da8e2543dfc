//! Success envelope shared by every endpoint: `{success, message, code, data}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn with_status(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: status.as_u16(),
            data: Some(data),
        }
    }

    /// 200 with data.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    /// 201 with data.
    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, data)
    }
}

impl ApiResponse<()> {
    /// 200 without a data member.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            code: StatusCode::OK.as_u16(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_envelope_carries_status_in_body_and_response() {
        let envelope = ApiResponse::created("Artist created", serde_json::json!({"id": 1}));
        assert_eq!(envelope.code, 201);
        let body = serde_json::to_value(&envelope).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 1);

        let response = envelope.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn message_only_envelope_omits_data() {
        let body = serde_json::to_value(ApiResponse::message("Logged out")).unwrap();
        assert_eq!(body["code"], 200);
        assert!(body.get("data").is_none());
    }
}
