//! Structured error types for store operations and HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Failures returned by the identity and task stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid input: title must not be empty")]
    EmptyTitle,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("user {user_id} does not own task {task_id}")]
    Forbidden { task_id: String, user_id: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("migration error: {0}")]
    Migration(#[from] refinery::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidDeviceId,
    InvalidRequest,
    InvalidStatus,

    // Authorization errors
    Unauthorized,
    Forbidden,

    // Not found errors
    DeviceNotFound,
    TaskNotFound,

    // Internal errors
    InternalError,
}

impl ErrorCode {
    /// HTTP status this code is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidDeviceId | ErrorCode::InvalidRequest | ErrorCode::InvalidStatus => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::DeviceNotFound | ErrorCode::TaskNotFound => StatusCode::NOT_FOUND,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error returned to HTTP clients.
///
/// Renders as `{"error": {"code": ..., "message": ...}}` with the status
/// implied by the code. Messages are localized for the client UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }

    // Convenience constructors

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "认证失败")
    }

    pub fn invalid_device_id() -> Self {
        Self::new(ErrorCode::InvalidDeviceId, "设备ID格式错误")
    }

    pub fn missing_device_id() -> Self {
        Self::new(ErrorCode::InvalidRequest, "设备ID不能为空")
    }

    pub fn missing_user_id() -> Self {
        Self::new(ErrorCode::InvalidRequest, "用户ID不能为空")
    }

    pub fn invalid_request() -> Self {
        Self::new(ErrorCode::InvalidRequest, "请求参数错误")
    }

    pub fn empty_title() -> Self {
        Self::new(ErrorCode::InvalidRequest, "标题不能为空")
    }

    pub fn invalid_status() -> Self {
        Self::new(ErrorCode::InvalidStatus, "无效的任务状态")
    }

    pub fn device_not_found() -> Self {
        Self::new(ErrorCode::DeviceNotFound, "设备不存在")
    }

    pub fn task_not_found() -> Self {
        Self::new(ErrorCode::TaskNotFound, "任务不存在")
    }

    pub fn forbidden() -> Self {
        Self::new(ErrorCode::Forbidden, "无权访问该任务")
    }

    pub fn internal() -> Self {
        Self::new(ErrorCode::InternalError, "服务器内部错误")
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidInput(reason) => {
                tracing::debug!(%reason, "Rejected invalid input");
                ApiError::invalid_request()
            }
            StoreError::EmptyTitle => ApiError::empty_title(),
            StoreError::DeviceNotFound(_) => ApiError::device_not_found(),
            StoreError::TaskNotFound(_) => ApiError::task_not_found(),
            StoreError::Forbidden { task_id, user_id } => {
                tracing::warn!(task_id = %task_id, user_id = %user_id, "Ownership check failed");
                ApiError::forbidden()
            }
            // Storage details stay in the log
            other => {
                tracing::error!(error = %other, "Store operation failed");
                ApiError::internal()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: ErrorCode,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Result type for HTTP handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
