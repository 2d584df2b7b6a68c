use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;
use crate::chat::ChatGroupOperations;
use crate::error::AppError;
use crate::utils::{message_to_api_response, success_to_api_response};

#[derive(Debug, Deserialize)]
pub struct AddMembersRequest {
    pub member_uids: Vec<String>,
}

#[axum::debug_handler]
pub async fn list_groups(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let groups = ChatGroupOperations::new(state.redis.clone())
        .list_groups()
        .await
        .map_err(|e| AppError::doc_store("groups/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}

#[axum::debug_handler]
pub async fn get_trip_group(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let group = ChatGroupOperations::new(state.redis.clone())
        .find_by_trip(trip_id)
        .await
        .map_err(|e| AppError::doc_store("groups/processing-error", e))?
        .ok_or(AppError::NotFound("groups/not-found"))?;
    Ok((StatusCode::OK, success_to_api_response(group)))
}

/// 群组成员由外部追加，不跟随乘客确认自动变化
#[axum::debug_handler]
pub async fn add_members(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(req): Json<AddMembersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let found = ChatGroupOperations::new(state.redis.clone())
        .add_members(&group_id, &req.member_uids)
        .await
        .map_err(|e| AppError::doc_store("groups/processing-error", e))?;

    if !found {
        return Err(AppError::NotFound("groups/not-found"));
    }
    Ok((StatusCode::OK, message_to_api_response("Members added")))
}
