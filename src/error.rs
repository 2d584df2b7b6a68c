use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::fmt;

// 错误码字符串统一为 "<资源>/<类别>" 形式，客户端按码分支
#[derive(Debug)]
pub enum AppError {
    Validation(&'static str),
    Unauthorized(&'static str),
    Forbidden(&'static str),
    NotFound(&'static str),
    Duplicate(&'static str),
    CapacityExceeded(&'static str),
    UpstreamUnavailable(&'static str),
    Internal(&'static str),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(code)
            | AppError::Unauthorized(code)
            | AppError::Forbidden(code)
            | AppError::NotFound(code)
            | AppError::Duplicate(code)
            | AppError::CapacityExceeded(code)
            | AppError::UpstreamUnavailable(code)
            | AppError::Internal(code) => code,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::CapacityExceeded(_) => StatusCode::CONFLICT,
            AppError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 数据库错误统一降级为对应资源的 processing-error 码
    pub fn db(code: &'static str, err: sqlx::Error) -> Self {
        tracing::error!("database error ({}): {}", code, err);
        AppError::Internal(code)
    }

    /// 文档存储不可达时的降级（仅用于聊天群组的读写接口）
    pub fn doc_store(code: &'static str, err: redis::RedisError) -> Self {
        tracing::error!("document store error ({}): {}", code, err);
        AppError::UpstreamUnavailable(code)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody { error: self.code() });
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_error_kind() {
        assert_eq!(
            AppError::Validation("trips/validation-error").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Forbidden("trips/forbidden").status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::NotFound("markers/not-found").status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Duplicate("markers/duplicate-request").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::CapacityExceeded("markers/capacity-exceeded").status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::UpstreamUnavailable("auth/provider-unreachable").status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn code_is_carried_through() {
        let err = AppError::Forbidden("trips/forbidden");
        assert_eq!(err.code(), "trips/forbidden");
        assert_eq!(err.to_string(), "trips/forbidden");
    }
}
