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

use super::model::{UpdateVehicleRequest, Vehicle};

#[axum::debug_handler]
pub async fn list_vehicles(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<impl IntoResponse, AppError> {
    let vehicles = Vehicle::list_for_owner(&state.pool, &claims.uid)
        .await
        .map_err(|e| AppError::db("vehicles/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(vehicles)))
}

#[axum::debug_handler]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let vehicle = Vehicle::find_by_id(&state.pool, id)
        .await
        .map_err(|e| AppError::db("vehicles/processing-error", e))?
        .ok_or(AppError::NotFound("vehicles/not-found"))?;
    Ok((StatusCode::OK, success_to_api_response(vehicle)))
}

#[axum::debug_handler]
pub async fn update_vehicle(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateVehicleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let vehicle = Vehicle::update(&state.pool, id, &claims.uid, req).await?;
    Ok((StatusCode::OK, success_to_api_response(vehicle)))
}
