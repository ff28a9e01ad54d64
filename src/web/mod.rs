use axum::{
    extract::State,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::notifications::service::OtpDispatcher;
use crate::server::config::ServerConfig;
use crate::server::update_service::LiveUpdates;
use crate::services::auth_service;
use crate::web::{
    error::ApiJson,
    handlers::*,
    middleware::auth,
    models::LoginRequest,
    routes::*,
};

pub use error::AppError;

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub live_updates: LiveUpdates,
    pub otp_dispatcher: OtpDispatcher,
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let login_response = auth_service::login_admin(&app_state.config, payload)?;

    let auth_cookie = Cookie::build((auth::TOKEN_COOKIE, login_response.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(login_response)))
}

async fn health_check_handler() -> &'static str {
    "OK"
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let methods = vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

    if let Some(url) = config.frontend_url.as_deref() {
        match url.trim_end_matches('/').parse::<HeaderValue>() {
            Ok(origin) => {
                return CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods(methods)
                    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                    .allow_credentials(true);
            }
            Err(e) => warn!(frontend_url = url, error = %e, "Ignoring unusable frontend_url for CORS."),
        }
    }

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(methods)
        .allow_headers(Any)
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/login", post(login_handler))
        .route(
            "/api/auth/me",
            get(auth_service::me).route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth)),
        )
        .nest("/api/influenceurs", influenceur_routes::influenceur_routes(&app_state))
        .merge(vote_routes::vote_routes())
        .route("/ws", get(websocket_handler::websocket_handler))
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}
