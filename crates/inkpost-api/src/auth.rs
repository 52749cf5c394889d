use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::extract::State;
use tracing::{info, warn};
use validator::Validate;

use inkpost_db::Database;
use inkpost_db::users::NewUser;
use inkpost_types::api::{LoginRequest, LoginResponse, RegisterRequest, field_messages};
use inkpost_types::models::User;

use crate::blocking;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::response::ApiResponse;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    /// Root for user uploads; served publicly under `/uploads`.
    pub upload_dir: PathBuf,
}

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Argon2id with default parameters and a random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Storage(format!("password hashing failed: {e}")))
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<ApiResponse<User>, ApiError> {
    if let Err(errors) = req.validate() {
        return Err(ApiError::InvalidFields(field_messages(&errors)));
    }

    let user = blocking(&state, move |db| {
        let mut taken = BTreeMap::new();
        if db.email_taken(&req.email)? {
            taken.insert("email".to_string(), "Email already registered".to_string());
        }
        if db.username_taken(&req.username)? {
            taken.insert("username".to_string(), "Username already taken".to_string());
        }
        if !taken.is_empty() {
            return Err(ApiError::InvalidFields(taken));
        }

        let password_hash = hash_password(&req.password)?;

        Ok(db.create_user(&NewUser {
            username: &req.username,
            email: &req.email,
            password_hash: &password_hash,
            first_name: &req.first_name,
            last_name: &req.last_name,
            nickname: &req.nickname,
        })?)
    })
    .await?;

    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(ApiResponse::created("User registered successfully", user))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    if let Err(errors) = req.validate() {
        return Err(ApiError::InvalidFields(field_messages(&errors)));
    }

    let user = blocking(&state, move |db| {
        let Some(row) = db.find_login(req.email_or_username.trim())? else {
            return Err(ApiError::Validation(INVALID_CREDENTIALS.into()));
        };

        let parsed = PasswordHash::new(&row.password_hash)
            .map_err(|e| ApiError::Storage(format!("stored hash unreadable: {e}")))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed)
            .map_err(|_| ApiError::Validation(INVALID_CREDENTIALS.into()))?;

        Ok(row.user)
    })
    .await
    .inspect_err(|e| {
        if matches!(e, ApiError::Validation(_)) {
            warn!("failed login attempt");
        }
    })?;

    let issued = state.tokens.issue(user.id, &user.email)?;
    info!(user_id = user.id, "user logged in");

    Ok(ApiResponse::ok(
        "Login successful",
        LoginResponse {
            token: issued.token,
            token_type: "Bearer".into(),
            expires_at: issued.expires_at,
            user,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));

        let parsed = PasswordHash::new(&first).unwrap();
        assert!(Argon2::default().verify_password(b"hunter22", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"hunter23", &parsed).is_err());
    }
}
