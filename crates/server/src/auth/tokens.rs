use crate::{config::JwtConfig, errors::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Represents the claims we put in, and expect to find in, every JWT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// The user's database id.
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

/// What login, registration and refresh hand back.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

pub fn issue_token(
    secret: &str,
    user_id: &str,
    token_type: TokenType,
    ttl: Duration,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp().max(0) as usize,
        iat: now.timestamp().max(0) as usize,
        token_type,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign token: {e}")))
}

pub fn issue_pair(jwt: &JwtConfig, user_id: &str) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access_token: issue_token(
            &jwt.secret,
            user_id,
            TokenType::Access,
            Duration::minutes(jwt.access_ttl_minutes),
        )?,
        refresh_token: issue_token(
            &jwt.secret,
            user_id,
            TokenType::Refresh,
            Duration::days(jwt.refresh_ttl_days),
        )?,
        token_type: "bearer".to_string(),
    })
}

/// Verifies signature and expiry, then that the token is of the expected kind.
pub fn decode_token(secret: &str, token: &str, expected: TokenType) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("JWT validation failed: {}", e);
        AppError::Unauthorized("Invalid or expired token.".to_string())
    })?;

    if data.claims.token_type != expected {
        warn!(expected = ?expected, got = ?data.claims.token_type, "Wrong token type");
        return Err(AppError::Unauthorized("Invalid token type.".to_string()));
    }
    Ok(data.claims)
}
