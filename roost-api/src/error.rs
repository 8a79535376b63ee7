use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roost_core::EngineError;
use serde_json::{json, Value};

/// HTTP-side wrapper for the engine taxonomy. Every variant maps to a
/// status code plus a machine-readable `kind` and enough structured detail
/// for the client to act without parsing the message.
#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Unauthorized(String),
    Internal(anyhow::Error),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn engine_detail(err: &EngineError) -> Value {
    match err {
        EngineError::CapacityExceeded {
            room_type_id,
            unavailable_dates,
        } => json!({
            "room_type_id": room_type_id,
            "unavailable_dates": unavailable_dates,
        }),
        EngineError::Expired {
            reservation_id,
            expired_at,
        } => json!({
            "reservation_id": reservation_id,
            "expired_at": expired_at,
        }),
        EngineError::Conflict(id) | EngineError::NotFound(id) => {
            json!({ "reservation_id": id })
        }
        EngineError::DiscountRejected { code, reason } => json!({
            "code": code,
            "reason": reason,
        }),
        EngineError::Forbidden(_)
        | EngineError::ValidationFailed(_)
        | EngineError::DownstreamUnavailable(_) => Value::Null,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message, detail) = match self {
            ApiError::Engine(err) => {
                let status = match &err {
                    EngineError::CapacityExceeded { .. } => StatusCode::CONFLICT,
                    EngineError::Expired { .. } => StatusCode::GONE,
                    EngineError::Conflict(_) => StatusCode::CONFLICT,
                    EngineError::DiscountRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                    EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
                    EngineError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
                    EngineError::DownstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (status, err.kind(), err.to_string(), engine_detail(&err))
            }
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, Value::Null)
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "Internal Server Error".to_string(),
                    Value::Null,
                )
            }
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
                "detail": detail,
            }
        }));

        (status, body).into_response()
    }
}
