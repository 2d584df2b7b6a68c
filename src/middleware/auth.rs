use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::AppState;
use crate::error::AppError;
use crate::identity::reconcile;

/// 认证中间件
///
/// Bearer token 交给身份提供方验证，验证通过的声明（uid + 上游角色）
/// 作为扩展挂到请求上。每个认证请求顺带触发一轮镜像同步；同步失败
/// 只告警，不影响触发它的请求。
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(AppError::Unauthorized("auth/token-not-found"));
    };

    let claims = state.identity.verify_token(bearer.token()).await?;
    tracing::debug!("authenticated request from {}", claims.uid);

    if let Err(e) = reconcile(&state.pool, &state.identity).await {
        tracing::warn!("identity reconcile failed: {}", e);
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
