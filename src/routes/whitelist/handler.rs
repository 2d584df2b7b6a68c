use axum::{
    Extension,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::database::users::UserRepository;
use crate::error::AppError;
use crate::guard;
use crate::identity::TokenClaims;
use crate::utils::{message_to_api_response, success_to_api_response};

use super::model::{EmailRequest, WhitelistEntry};

#[axum::debug_handler]
pub async fn get_whitelist(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<impl IntoResponse, AppError> {
    if !guard::can_manage_whitelist(&claims) {
        return Err(AppError::Forbidden("whitelist/forbidden"));
    }

    let entries = WhitelistEntry::list(&state.pool)
        .await
        .map_err(|e| AppError::db("whitelist/processing-error", e))?;
    Ok((StatusCode::OK, success_to_api_response(entries)))
}

#[axum::debug_handler]
pub async fn add_email(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !guard::can_manage_whitelist(&claims) {
        return Err(AppError::Forbidden("whitelist/forbidden"));
    }

    WhitelistEntry::insert(&state.pool, &req.email).await?;
    Ok((
        StatusCode::CREATED,
        message_to_api_response("Email added to whitelist"),
    ))
}

/// 注册流程里的白名单预检（公开接口）
#[axum::debug_handler]
pub async fn check_email(
    State(state): State<AppState>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let exists = WhitelistEntry::contains(&state.pool, &req.email)
        .await
        .map_err(|e| AppError::db("whitelist/processing-error", e))?;

    if !exists {
        return Err(AppError::NotFound("whitelist/email-not-found"));
    }
    Ok((
        StatusCode::OK,
        message_to_api_response("Email exists in whitelist"),
    ))
}

/// 移除白名单邮箱，并级联注销对应身份
///
/// 级联顺序：先删上游身份，再删本地镜像；镜像漏删也会被下一轮
/// 同步收敛掉。
#[axum::debug_handler]
pub async fn remove_email(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<EmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !guard::can_manage_whitelist(&claims) {
        return Err(AppError::Forbidden("whitelist/forbidden"));
    }

    let removed = WhitelistEntry::remove(&state.pool, &req.email)
        .await
        .map_err(|e| AppError::db("whitelist/processing-error", e))?;
    if !removed {
        return Err(AppError::NotFound("whitelist/email-not-found"));
    }

    if let Some(identity) = state.identity.find_by_email(&req.email).await? {
        state.identity.delete_identity(&identity.uid).await?;
        UserRepository::delete(&state.pool, &identity.uid)
            .await
            .map_err(|e| AppError::db("whitelist/processing-error", e))?;
        tracing::info!(
            "管理员 {} 移除白名单邮箱并注销身份 {}",
            claims.uid,
            identity.uid
        );
    }

    Ok((
        StatusCode::OK,
        message_to_api_response("Email removed from whitelist"),
    ))
}
