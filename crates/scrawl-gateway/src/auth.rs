use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use scrawl_types::claims::Claims;

/// Why a handshake was refused. Fatal to that connection attempt; the
/// channel is closed with a policy code before any event is accepted.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no token provided")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("token carries no identity claim")]
    MissingIdentity,
}

/// Verify an HMAC-signed bearer token and extract the stable user id.
///
/// Pure and deterministic: signature and expiry come from `jsonwebtoken`'s
/// default validation, the identity claim is checked separately so a
/// well-formed token without one maps to [`AuthError::MissingIdentity`].
pub fn validate_token(token: &str, secret: &str) -> Result<String, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    token_data.claims.sub.ok_or(AuthError::MissingIdentity)
}

/// Sign a token for `user_id`. The broadcaster itself never issues tokens
/// for clients; this mirrors the external auth service for tests and
/// operator tooling.
pub fn issue_token(user_id: &str, secret: &str, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: Some(user_id.to_string()),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Pull the bearer token out of a `Cookie` request header. The handshake
/// delivers it as the `token` cookie.
pub fn token_from_cookies(cookie_header: &str) -> Option<String> {
    cookie_header.split(';').find_map(|cookie| {
        let (name, value) = cookie.trim().split_once('=')?;
        (name == "token").then(|| value.to_string())
    })
}
