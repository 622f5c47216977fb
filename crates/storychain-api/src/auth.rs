use std::sync::Arc;

use anyhow::anyhow;
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use uuid::Uuid;

use storychain_db::Database;
use storychain_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserResponse};

use crate::convert;
use crate::error::ApiError;
use crate::middleware::TOKEN_COOKIE;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();
    let email = req.email.trim();

    // Validate input
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("all fields are required".into()));
    }
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::Validation(
            "username must be between 3 and 32 characters".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters".into(),
        ));
    }

    if state.db.username_or_email_taken(username, email)? {
        return Err(ApiError::Conflict(
            "username or email already registered".into(),
        ));
    }

    // Hash password with Argon2id under a fresh per-user salt; the plaintext
    // never goes anywhere else.
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow!("password hash failed: {e}"))?
        .to_string();

    let user_id = Uuid::new_v4();

    // The UNIQUE constraints are the real guard: a registration racing past
    // the pre-check above lands here as the same conflict.
    let created = state
        .db
        .create_user(&user_id.to_string(), username, email, &password_hash)?;
    if !created {
        return Err(ApiError::Conflict(
            "username or email already registered".into(),
        ));
    }

    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| anyhow!("user missing right after insert"))?;

    let token = create_token(&state.jwt_secret, user_id, username)?;

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(token.clone())),
        Json(AuthResponse {
            user: convert::user_response(&user),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("all fields are required".into()));
    }

    // One generic error for both unknown user and wrong password; the
    // response must not reveal which check failed.
    let user = state
        .db
        .get_user_by_username(username)?
        .ok_or(ApiError::InvalidCredentials)?;

    let parsed_hash =
        PasswordHash::new(&user.password).map_err(|e| anyhow!("stored hash unreadable: {e}"))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow!("corrupt user id '{}': {e}", user.id))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok((
        jar.add(session_cookie(token.clone())),
        Json(AuthResponse {
            user: convert::user_response(&user),
            token,
        }),
    ))
}

/// Logout only clears the client-held cookie. Tokens are stateless, so a
/// previously copied token string stays valid until its natural expiry.
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let mut cookie = Cookie::from(TOKEN_COOKIE);
    cookie.set_path("/");

    (
        jar.remove(cookie),
        Json(json!({ "message": "logged out successfully" })),
    )
}

/// Returns the authenticated user's record.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(convert::user_response(&user)))
}

pub(crate) fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}
