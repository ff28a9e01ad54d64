use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::server::config::ServerConfig;
use crate::services::auth_service;
use crate::web::models::AuthenticatedAdmin;
use crate::web::{AppState, error::AppError};

pub const TOKEN_COOKIE: &str = "token";

/// Resolves the admin from `Authorization: Bearer` or, failing that, the token cookie.
pub fn admin_from_headers(
    config: &ServerConfig,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Result<AuthenticatedAdmin, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| jar.get(TOKEN_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| AppError::Unauthorized("Missing admin token".to_string()))?;

    auth_service::decode_admin_token(&token, config)
}

pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let admin = admin_from_headers(&state.config, req.headers(), &jar)?;
    req.extensions_mut().insert(admin);
    Ok(next.run(req).await)
}
