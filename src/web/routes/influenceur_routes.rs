use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::db::entities::influenceur;
use crate::db::services::{InfluenceurError, InfluenceurService, InfluenceurWithVotes, NewInfluenceur};
use crate::web::error::{ApiJson, ApiPath, ApiQuery};
use crate::web::middleware::auth;
use crate::web::models::InfluenceurQuery;
use crate::web::{AppError, AppState};

/// Reads are public; creating and deleting require an admin token.
pub fn influenceur_routes(app_state: &Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = || axum_middleware::from_fn_with_state(app_state.clone(), auth::auth);

    Router::new()
        .route(
            "/",
            get(list_influenceurs).merge(post(create_influenceur).route_layer(admin())),
        )
        .route(
            "/{id}",
            get(get_influenceur).merge(delete(delete_influenceur).route_layer(admin())),
        )
}

async fn list_influenceurs(
    State(app_state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<InfluenceurQuery>,
) -> Result<Json<Vec<InfluenceurWithVotes>>, AppError> {
    let category = query.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let list = InfluenceurService::list_with_counts(
        &app_state.db_pool,
        category,
        app_state.config.require_validation,
    )
    .await?;
    Ok(Json(list))
}

async fn get_influenceur(
    State(app_state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<influenceur::Model>, AppError> {
    let influenceur = InfluenceurService::get(&app_state.db_pool, id).await?;
    Ok(Json(influenceur))
}

async fn create_influenceur(
    State(app_state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NewInfluenceur>,
) -> Result<(StatusCode, Json<influenceur::Model>), AppError> {
    let created = InfluenceurService::create(&app_state.db_pool, payload, Utc::now()).await?;
    info!(influenceur_id = created.id, category = %created.category, "Influenceur created.");

    app_state
        .live_updates
        .publish_influenceurs(&app_state.db_pool, app_state.config.require_validation)
        .await;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_influenceur(
    State(app_state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    let removed_votes = InfluenceurService::delete(&app_state.db_pool, id).await?;
    info!(influenceur_id = id, removed_votes, "Influenceur deleted.");

    let only_validated = app_state.config.require_validation;
    app_state
        .live_updates
        .publish_influenceurs(&app_state.db_pool, only_validated)
        .await;
    app_state
        .live_updates
        .publish_vote_counts(&app_state.db_pool, only_validated)
        .await;
    Ok(StatusCode::NO_CONTENT)
}

impl From<InfluenceurError> for AppError {
    fn from(err: InfluenceurError) -> Self {
        match err {
            InfluenceurError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            InfluenceurError::NotFound(id) => AppError::NotFound(format!("Influenceur with ID {id} not found")),
            InfluenceurError::InvalidInput(msg) => AppError::InvalidInput(msg),
        }
    }
}
