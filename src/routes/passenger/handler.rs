use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::error::AppError;
use crate::identity::TokenClaims;
use crate::utils::success_to_api_response;

use super::model::{
    CreateMarkerRequest, OwnerUpdateRequest, PassengerRequest, UpdateMarkerRequest,
};

#[axum::debug_handler]
pub async fn list_trip_markers(
    State(state): State<AppState>,
    Path(trip_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let markers = PassengerRequest::list_for_trip(&state.pool, trip_id)
        .await
        .map_err(|e| AppError::db("markers/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(markers)))
}

#[axum::debug_handler]
pub async fn create_marker(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(trip_id): Path<i64>,
    Json(req): Json<CreateMarkerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let marker = PassengerRequest::create(&state.pool, trip_id, &claims.uid, req).await?;
    tracing::info!("用户 {} 请求加入行程 {}", claims.uid, trip_id);
    Ok((StatusCode::CREATED, success_to_api_response(marker)))
}

#[axum::debug_handler]
pub async fn get_marker(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let marker = PassengerRequest::find_by_id(&state.pool, id)
        .await
        .map_err(|e| AppError::db("markers/processing-error", e))?
        .ok_or(AppError::NotFound("markers/not-found"))?;
    Ok((StatusCode::OK, success_to_api_response(marker)))
}

#[axum::debug_handler]
pub async fn update_marker(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMarkerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let marker = PassengerRequest::update_pickup(&state.pool, id, &claims.uid, req).await?;
    Ok((StatusCode::OK, success_to_api_response(marker)))
}

#[axum::debug_handler]
pub async fn owner_update_marker(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<i64>,
    Json(req): Json<OwnerUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let marker =
        PassengerRequest::owner_transition(&state.pool, id, &claims.uid, &req.status).await?;
    tracing::info!(
        "行程 {} 的请求 {} 状态变更为 {}",
        marker.trip_id,
        marker.id,
        marker.status
    );
    Ok((StatusCode::OK, success_to_api_response(marker)))
}

#[axum::debug_handler]
pub async fn delete_marker(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    PassengerRequest::delete(&state.pool, id, &claims.uid).await?;
    Ok(StatusCode::NO_CONTENT)
}
