// src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("File store error: {0}")]
    Io(#[from] std::io::Error),

    // 导入失败: 事务已回滚, 原因原样返回给调用方
    #[error("An error occurred during import: {0}")]
    Import(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(e) => {
                let unique = e
                    .as_database_error()
                    .map(|d| d.is_unique_violation())
                    .unwrap_or(false);
                if unique {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Io(_) | AppError::Import(_) | AppError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// 核心逻辑：将我们的错误转换为 HTTP 响应
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Database(ref e) => {
                // 后台记录详细错误, 对外只给概要
                tracing::error!("Database Error: {:?}", e);
                if status == StatusCode::CONFLICT {
                    "Record already exists".to_string()
                } else {
                    "Database operation failed".to_string()
                }
            }
            AppError::Io(ref e) => {
                tracing::error!("File store error: {:?}", e);
                "Failed to store uploaded file".to_string()
            }
            AppError::Import(ref cause) => {
                tracing::error!("Import rolled back: {}", cause);
                format!("An error occurred during import: {}", cause)
            }
            AppError::Auth(msg) | AppError::Conflict(msg) | AppError::BadRequest(msg) => msg,
            AppError::ValidationError(ref e) => format!("Invalid input: {}", e),
            AppError::Internal => "Internal server error".to_string(),
        };

        let body = Json(json!({
            "status": "error",
            "message": message,
        }));

        (status, body).into_response()
    }
}
