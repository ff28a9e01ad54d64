use axum::Extension;
use bcrypt::verify;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::warn;

use crate::server::config::ServerConfig;
use crate::web::error::AppError;
use crate::web::models::{AuthenticatedAdmin, Claims, LoginRequest, LoginResponse};

/// Checks the submitted credentials against the configured admin account.
pub fn login_admin(config: &ServerConfig, req: LoginRequest) -> Result<LoginResponse, AppError> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidInput(
            "Username and password are required.".to_string(),
        ));
    }

    // The hash is checked for every request, whatever the username.
    let valid_password = verify(&req.password, &config.admin_password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification failed: {e}")))?;

    if req.username != config.admin_username {
        return Err(AppError::InvalidCredentials);
    }

    if !valid_password {
        warn!(username = %req.username, "Rejected admin login with a wrong password.");
        return Err(AppError::InvalidCredentials);
    }

    create_jwt_for_admin(&config.admin_username, config)
}

pub fn create_jwt_for_admin(username: &str, config: &ServerConfig) -> Result<LoginResponse, AppError> {
    let now = Utc::now();
    let expiration = (now + Duration::hours(config.token_ttl_hours)).timestamp() as usize;

    let claims = Claims {
        sub: username.to_string(),
        iat: now.timestamp() as usize,
        exp: expiration,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::TokenCreationError(e.to_string()))?;

    Ok(LoginResponse {
        token,
        username: username.to_string(),
    })
}

pub fn decode_admin_token(token: &str, config: &ServerConfig) -> Result<AuthenticatedAdmin, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!(error = ?e, "JWT decoding error during admin auth.");
        AppError::InvalidCredentials
    })?;

    // Reject tokens issued to a previous admin username.
    if token_data.claims.sub != config.admin_username {
        return Err(AppError::InvalidCredentials);
    }

    Ok(AuthenticatedAdmin {
        username: token_data.claims.sub,
    })
}

pub async fn me(Extension(admin): Extension<AuthenticatedAdmin>) -> axum::Json<AuthenticatedAdmin> {
    axum::Json(admin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_and_decode_round_trip() {
        let config = ServerConfig::for_tests();
        let response = login_admin(
            &config,
            LoginRequest {
                username: "admin".to_string(),
                password: ServerConfig::TEST_ADMIN_PASSWORD.to_string(),
            },
        )
        .unwrap();

        let admin = decode_admin_token(&response.token, &config).unwrap();
        assert_eq!(admin.username, "admin");
    }

    #[test]
    fn test_login_rejects_bad_credentials() {
        let config = ServerConfig::for_tests();
        let wrong_password = login_admin(
            &config,
            LoginRequest {
                username: "admin".to_string(),
                password: "nope".to_string(),
            },
        );
        assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));

        let wrong_user = login_admin(
            &config,
            LoginRequest {
                username: "root".to_string(),
                password: ServerConfig::TEST_ADMIN_PASSWORD.to_string(),
            },
        );
        assert!(matches!(wrong_user, Err(AppError::InvalidCredentials)));

        let empty = login_admin(
            &config,
            LoginRequest {
                username: String::new(),
                password: String::new(),
            },
        );
        assert!(matches!(empty, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_password_hash_is_checked_before_username() {
        let mut config = ServerConfig::for_tests();
        config.admin_password_hash = "not-a-bcrypt-hash".to_string();

        // Reaching the broken hash shows bcrypt ran for an unknown username too.
        let unknown_user = login_admin(
            &config,
            LoginRequest {
                username: "root".to_string(),
                password: "whatever".to_string(),
            },
        );
        assert!(matches!(unknown_user, Err(AppError::InternalServerError(_))));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let config = ServerConfig::for_tests();
        let mut other = config.clone();
        other.jwt_secret = "another-secret-9876543210".to_string();

        let response = create_jwt_for_admin("admin", &other).unwrap();
        assert!(matches!(
            decode_admin_token(&response.token, &config),
            Err(AppError::InvalidCredentials)
        ));
    }
}
