use axum::{
    Extension,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::chat::GroupLifecycle;
use crate::error::AppError;
use crate::identity::TokenClaims;
use crate::routes::passenger::model::PassengerRequest;
use crate::routes::vehicle::model::Vehicle;
use crate::utils::success_to_api_response;

use super::model::{CreateTripRequest, Trip, TripDetail, UpdateTripRequest};

#[axum::debug_handler]
pub async fn create_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<CreateTripRequest>,
) -> Result<impl IntoResponse, AppError> {
    let trip = Trip::create(&state.pool, &claims.uid, req).await?;
    tracing::info!("用户 {} 发布行程 {}: {}", claims.uid, trip.id, trip.trip_name);

    // 关系库已提交；群组创建不阻塞响应，失败也不影响本次请求的结果
    let lifecycle = GroupLifecycle::new(state.redis.clone());
    let created = trip.clone();
    tokio::spawn(async move {
        lifecycle.on_trip_created(&created).await;
    });

    Ok((StatusCode::CREATED, success_to_api_response(trip)))
}

#[axum::debug_handler]
pub async fn list_upcoming_trips(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let trips = Trip::list_upcoming(&state.pool)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(trips)))
}

#[axum::debug_handler]
pub async fn list_all_trips(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let trips = Trip::list_all(&state.pool)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(trips)))
}

#[axum::debug_handler]
pub async fn list_user_trips(
    State(state): State<AppState>,
    Path(user_uid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let trips = Trip::list_for_driver(&state.pool, &user_uid, true)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(trips)))
}

#[axum::debug_handler]
pub async fn list_all_user_trips(
    State(state): State<AppState>,
    Path(user_uid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let trips = Trip::list_for_driver(&state.pool, &user_uid, false)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(trips)))
}

#[axum::debug_handler]
pub async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let trip = Trip::find_by_id(&state.pool, id)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?
        .ok_or(AppError::NotFound("trips/not-found"))?;

    let vehicle = Vehicle::find_by_id(&state.pool, trip.vehicle_id)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;
    let passengers = PassengerRequest::list_for_trip(&state.pool, trip.id)
        .await
        .map_err(|e| AppError::db("trips/processing-error", e))?;

    Ok((
        StatusCode::OK,
        success_to_api_response(TripDetail {
            trip,
            vehicle,
            passengers,
        }),
    ))
}

#[axum::debug_handler]
pub async fn update_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateTripRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (trip, renamed) = Trip::update(&state.pool, id, &claims.uid, req).await?;

    if renamed {
        // 改名跟随到聊天群组；文档库失败不回滚已提交的改名
        let lifecycle = GroupLifecycle::new(state.redis.clone());
        let trip_id = trip.id;
        let new_name = trip.trip_name.clone();
        tokio::spawn(async move {
            lifecycle.on_trip_renamed(trip_id, &new_name).await;
        });
    }

    Ok((StatusCode::OK, success_to_api_response(trip)))
}

#[axum::debug_handler]
pub async fn delete_trip(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Trip::delete(&state.pool, id, &claims.uid).await?;
    tracing::info!("用户 {} 删除行程 {}", claims.uid, id);

    let lifecycle = GroupLifecycle::new(state.redis.clone());
    tokio::spawn(async move {
        lifecycle.on_trip_deleted(id).await;
    });

    Ok(StatusCode::NO_CONTENT)
}
