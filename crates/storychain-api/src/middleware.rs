use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{DecodingKey, Validation, decode};

use storychain_types::api::Claims;

use crate::auth::AppState;
use crate::error::ApiError;

/// Name of the http-only cookie carrying the session token.
pub const TOKEN_COOKIE: &str = "access_token";

/// Pulls the raw session token out of a request: the `access_token` cookie
/// wins, then the `Authorization: Bearer` header. Browser clients send the
/// cookie; API clients send the header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}

/// Extract and validate the JWT, rejecting requests with no token (401) or
/// a bad/expired one (403). Verified claims land in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers()).ok_or(ApiError::Unauthenticated)?;

    let claims =
        decode_token(&state.jwt_secret, &token).map_err(|_| ApiError::InvalidToken)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Best-effort identity for routes that allow anonymous access: a missing
/// or invalid token degrades to None instead of an error.
pub fn optional_viewer(state: &AppState, headers: &HeaderMap) -> Option<Claims> {
    let token = extract_token(headers)?;
    decode_token(&state.jwt_secret, &token).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    use crate::auth::create_token;

    fn build_headers(cookie: Option<&str>, bearer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = cookie {
            headers.insert(
                header::COOKIE,
                HeaderValue::from_str(&format!("{TOKEN_COOKIE}={token}")).unwrap(),
            );
        }
        if let Some(token) = bearer {
            headers.insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn cookie_takes_precedence_over_bearer_header() {
        let headers = build_headers(Some("from-cookie"), Some("from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));

        let headers = build_headers(None, Some("from-header"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        let headers = build_headers(None, None);
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn issued_tokens_round_trip() {
        let user_id = Uuid::new_v4();
        let token = create_token("secret", user_id, "alice").unwrap();

        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
    }

    #[test]
    fn wrong_secret_and_expired_tokens_are_rejected() {
        let token = create_token("secret", Uuid::new_v4(), "alice").unwrap();
        assert!(decode_token("other-secret", &token).is_err());

        let expired = Claims {
            sub: Uuid::new_v4(),
            username: "alice".to_string(),
            exp: (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp() as usize,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &expired,
            &jsonwebtoken::EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(decode_token("secret", &token).is_err());
    }
}
