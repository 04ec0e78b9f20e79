/// Token service: HS256 JWT session tokens
///
/// Two token types are issued at login:
///
/// - **Access** (default 7 days): sent on every request in the `token` cookie
///   or an `Authorization: Bearer` header
/// - **Refresh** (default 30 days): exchanged for a new access token
///
/// Validation checks signature, expiry, not-before and issuer together. Any
/// failure is reported as the single [`JwtError::InvalidToken`] so callers
/// cannot tell a forged token from an expired one.
///
/// # Example
///
/// ```
/// use goaltrack_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-very-long-secret-key-of-at-least-32-characters";
/// let claims = Claims::new(Uuid::new_v4(), "ada@example.com", "ada", TokenType::Access);
///
/// let token = create_token(&claims, secret)?;
/// let decoded = validate_access_token(&token, secret)?;
/// assert_eq!(decoded.username, "ada");
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Value of the `iss` claim on every token
pub const ISSUER: &str = "goaltrack";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Bad signature, wrong issuer, expired, not yet valid, malformed, or
    /// the wrong token type
    #[error("Invalid or expired token")]
    InvalidToken,
}

/// Token type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::days(7),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the token type's default lifetime
    pub fn new(
        user_id: Uuid,
        email: impl Into<String>,
        username: impl Into<String>,
        token_type: TokenType,
    ) -> Self {
        Self::with_expiration(
            user_id,
            email,
            username,
            token_type,
            token_type.default_expiration(),
        )
    }

    /// Claims valid from now for `expires_in`
    pub fn with_expiration(
        user_id: Uuid,
        email: impl Into<String>,
        username: impl Into<String>,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            email: email.into(),
            username: username.into(),
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            token_type,
        }
    }
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, issuer, `exp` and `nbf`, returning the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(reason = ?e.kind(), "Token rejected");
            JwtError::InvalidToken
        })
}

/// Like [`validate_token`] but also requires an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Access {
        debug!("Refresh token presented where an access token is required");
        return Err(JwtError::InvalidToken);
    }

    Ok(claims)
}

/// Like [`validate_token`] but also requires a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;

    if claims.token_type != TokenType::Refresh {
        debug!("Access token presented where a refresh token is required");
        return Err(JwtError::InvalidToken);
    }

    Ok(claims)
}
