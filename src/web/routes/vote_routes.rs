use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::entities::vote;
use crate::db::services::{IssuedBallot, VoteError, VoteService};
use crate::services::phone::{mask_phone_number, normalize_phone_number};
use crate::web::error::{ApiJson, ApiQuery};
use crate::web::middleware::auth::admin_from_headers;
use crate::web::models::{BallotRequest, BallotResponse, ValidateRequest, VotesQuery};
use crate::web::{AppError, AppState};

pub fn vote_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/votes", get(get_votes).post(cast_vote))
        .route("/otp", post(request_otp))
        .route("/validate", post(validate_vote))
}

/// Public totals, or the raw ballot list for an admin with `includePhones=true`.
async fn get_votes(
    State(app_state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<VotesQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, AppError> {
    if query.include_phones {
        admin_from_headers(&app_state.config, &headers, &jar)?;
        let votes = VoteService::list_votes(&app_state.db_pool, query.influenceur_id).await?;
        return Ok(Json(votes).into_response());
    }

    let counts =
        VoteService::vote_counts(&app_state.db_pool, app_state.config.require_validation).await?;
    Ok(Json(counts).into_response())
}

async fn cast_vote(
    State(app_state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<BallotRequest>,
) -> Result<Response, AppError> {
    let phone_number = normalize_phone_number(
        &payload.phone_number,
        app_state.config.default_country_code.as_deref(),
    )?;

    if !app_state.config.require_validation {
        let vote = VoteService::record_unverified_vote(
            &app_state.db_pool,
            payload.influenceur_id,
            &phone_number,
            Utc::now(),
        )
        .await?;
        info!(
            vote_id = vote.id,
            influenceur_id = vote.influenceur_id,
            phone = %mask_phone_number(&phone_number),
            "Vote recorded without validation."
        );
        app_state
            .live_updates
            .publish_vote_counts(&app_state.db_pool, false)
            .await;
        return Ok((StatusCode::CREATED, Json(vote)).into_response());
    }

    let ballot = VoteService::cast_vote(
        &app_state.db_pool,
        payload.influenceur_id,
        &phone_number,
        &app_state.config.otp_policy(),
        Utc::now(),
    )
    .await?;
    let response = deliver_code(&app_state, ballot).await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn request_otp(
    State(app_state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<BallotRequest>,
) -> Result<Json<BallotResponse>, AppError> {
    let phone_number = normalize_phone_number(
        &payload.phone_number,
        app_state.config.default_country_code.as_deref(),
    )?;

    let ballot = VoteService::issue_otp(
        &app_state.db_pool,
        payload.influenceur_id,
        &phone_number,
        &app_state.config.otp_policy(),
        Utc::now(),
    )
    .await?;
    Ok(Json(deliver_code(&app_state, ballot).await?))
}

async fn validate_vote(
    State(app_state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<ValidateRequest>,
) -> Result<Json<vote::Model>, AppError> {
    let phone_number = normalize_phone_number(
        &payload.phone_number,
        app_state.config.default_country_code.as_deref(),
    )?;
    let otp = payload.otp.trim();
    if otp.is_empty() {
        return Err(AppError::InvalidInput("otp is required".to_string()));
    }

    let vote = VoteService::validate(
        &app_state.db_pool,
        &phone_number,
        otp,
        payload.influenceur_id,
        &app_state.config.otp_policy(),
        Utc::now(),
    )
    .await
    .inspect_err(|e| {
        warn!(phone = %mask_phone_number(&phone_number), error = %e, "Vote validation rejected.");
    })?;

    info!(
        vote_id = vote.id,
        influenceur_id = vote.influenceur_id,
        phone = %mask_phone_number(&phone_number),
        "Vote validated."
    );
    app_state
        .live_updates
        .publish_vote_counts(&app_state.db_pool, app_state.config.require_validation)
        .await;
    Ok(Json(vote))
}

async fn deliver_code(app_state: &AppState, ballot: IssuedBallot) -> Result<BallotResponse, AppError> {
    let policy = app_state.config.otp_policy();
    app_state
        .otp_dispatcher
        .dispatch(&ballot.vote.phone_number, &ballot.otp, policy.ttl)
        .await?;

    let masked = mask_phone_number(&ballot.vote.phone_number);
    info!(vote_id = ballot.vote.id, phone = %masked, "OTP issued.");

    Ok(BallotResponse {
        vote_id: ballot.vote.id,
        influenceur_id: ballot.vote.influenceur_id,
        expires_at: ballot.expires_at(),
        message: format!("Verification code sent to {masked}"),
        otp: app_state
            .config
            .otp_expose_in_response
            .then(|| ballot.otp.clone()),
        phone_number: ballot.vote.phone_number,
    })
}

impl From<VoteError> for AppError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            VoteError::InfluenceurNotFound(id) => AppError::NotFound(format!("Influenceur with ID {id} not found")),
            e @ VoteError::NoPendingVote => AppError::NotFound(e.to_string()),
            e @ VoteError::AlreadyVoted { .. } => AppError::Conflict(e.to_string()),
            VoteError::InvalidOtp { remaining_attempts } => AppError::InvalidInput(format!(
                "Invalid OTP, {remaining_attempts} attempt(s) remaining"
            )),
            e @ VoteError::OtpExpired => AppError::InvalidInput(e.to_string()),
            e @ VoteError::TooManyAttempts => AppError::TooManyRequests(e.to_string()),
        }
    }
}
