//! Middleware de autenticación JWT
//!
//! Verifica el bearer token e inyecta en la request el tenant y el usuario
//! que actúan. Si la verificación falla el handler no llega a ejecutarse.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    state::AppState,
    utils::{
        errors::AppError,
        jwt::{extract_token_from_header, verify_token},
    },
};

/// Usuario autenticado que se inyecta en las requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
}

/// Middleware de autenticación JWT
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Authorization token required".to_string()))?;

    let token = extract_token_from_header(auth_header)?;
    let claims = verify_token(token, &state.jwt)?;

    let authenticated_user = AuthenticatedUser {
        user_id: Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".to_string()))?,
        tenant_id: Uuid::parse_str(&claims.tenant)
            .map_err(|_| AppError::Unauthorized("Invalid tenant id in token".to_string()))?,
    };

    tracing::debug!(
        user_id = %authenticated_user.user_id,
        tenant_id = %authenticated_user.tenant_id,
        "request authenticated"
    );

    request.extensions_mut().insert(authenticated_user);

    Ok(next.run(request).await)
}
