use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::utils::success_to_api_response;

#[derive(Serialize)]
pub struct PingResponse {
    pub status: String,
    pub timestamp: i64,
}

/// 健康检查接口
pub async fn ping() -> impl IntoResponse {
    let now = chrono::Utc::now();

    (
        StatusCode::OK,
        success_to_api_response(PingResponse {
            status: "ok".to_string(),
            timestamp: now.timestamp(),
        }),
    )
}
