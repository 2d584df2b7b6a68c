use axum::Json;
use serde::Serialize;

// 成功响应统一包在 data 键下
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { data })
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn message_to_api_response(message: &'static str) -> Json<MessageResponse> {
    Json(MessageResponse { message })
}
