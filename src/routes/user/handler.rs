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
use crate::identity::{Role, TokenClaims};
use crate::utils::{message_to_api_response, success_to_api_response};

use super::model::{CheckUsernameRequest, UpdateRoleRequest, UserInfo};

/// 注册前的用户名可用性检查（公开接口）
#[axum::debug_handler]
pub async fn check_username(
    State(state): State<AppState>,
    Json(req): Json<CheckUsernameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let taken = UserRepository::username_taken(&state.pool, &req.username)
        .await
        .map_err(|e| AppError::db("users/processing-error", e))?;

    if taken {
        return Err(AppError::Duplicate("users/username-exists"));
    }
    Ok((
        StatusCode::OK,
        message_to_api_response("Username is available"),
    ))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
) -> Result<impl IntoResponse, AppError> {
    if !guard::can_list_users(&claims) {
        return Err(AppError::Forbidden("users/forbidden"));
    }

    let users = UserRepository::list(&state.pool)
        .await
        .map_err(|e| AppError::db("users/processing-error", e))?
        .into_iter()
        .map(UserInfo::from)
        .collect::<Vec<_>>();

    Ok((StatusCode::OK, success_to_api_response(users)))
}

/// 管理员改角色：先写上游声明，再写本地镜像，上游始终权威
#[axum::debug_handler]
pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !guard::can_assign_roles(&claims) {
        return Err(AppError::Forbidden("users/forbidden"));
    }

    let role = Role::parse(&req.role).ok_or(AppError::Validation("users/validation-error"))?;

    UserRepository::find_by_uid(&state.pool, &req.user_uid)
        .await
        .map_err(|e| AppError::db("users/processing-error", e))?
        .ok_or(AppError::NotFound("users/not-found"))?;

    state.identity.set_role_claim(&req.user_uid, role).await?;
    UserRepository::update_role(&state.pool, &req.user_uid, role.as_str())
        .await
        .map_err(|e| AppError::db("users/processing-error", e))?;

    tracing::info!(
        "管理员 {} 将用户 {} 角色改为 {}",
        claims.uid,
        req.user_uid,
        role.as_str()
    );
    Ok((StatusCode::OK, message_to_api_response("Role updated")))
}

/// 镜像同步在认证中间件里已经做过，这个接口只是触发入口
#[axum::debug_handler]
pub async fn sync_database() -> impl IntoResponse {
    (StatusCode::OK, message_to_api_response("Database synced"))
}
