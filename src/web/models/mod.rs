use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod websocket_models;

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // admin username
    pub iat: usize,
    pub exp: usize,
}

/// Inserted into request extensions by the admin auth middleware.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedAdmin {
    pub username: String,
}

/// Body of `POST /api/votes` and `POST /api/otp`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotRequest {
    pub influenceur_id: i32,
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub phone_number: String,
    pub otp: String,
    pub influenceur_id: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotResponse {
    pub vote_id: i32,
    pub influenceur_id: i32,
    pub phone_number: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotesQuery {
    #[serde(default)]
    pub include_phones: bool,
    pub influenceur_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InfluenceurQuery {
    pub category: Option<String>,
}
