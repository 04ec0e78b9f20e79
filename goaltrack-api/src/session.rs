/// Session cookies
///
/// Login sets two HttpOnly, `SameSite=Strict` cookies: `token` (access JWT)
/// and `refreshToken` (refresh JWT). Both are marked `Secure` in production.
/// Logout and account deletion overwrite them with expired empty cookies.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use goaltrack_shared::auth::{
    jwt::{self, Claims, JwtError, TokenType},
    middleware::{REFRESH_COOKIE, SESSION_COOKIE},
};
use goaltrack_shared::models::user::User;

use crate::config::Config;

/// Freshly signed token pair
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

fn session_cookie(
    name: &'static str,
    value: String,
    max_age: chrono::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(max_age.num_seconds()))
        .build()
}

fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    session_cookie(name, String::new(), chrono::Duration::zero(), secure)
}

/// Signs an access token carrying the user's current identity
pub fn sign_access(user: &User, config: &Config) -> Result<String, JwtError> {
    let access = Claims::with_expiration(
        user.user_id,
        &user.email,
        &user.username,
        TokenType::Access,
        config.jwt.access_ttl(),
    );
    jwt::create_token(&access, &config.jwt.secret)
}

/// Signs access and refresh tokens for `user`
pub fn sign_tokens(user: &User, config: &Config) -> Result<SessionTokens, JwtError> {
    let refresh = Claims::with_expiration(
        user.user_id,
        &user.email,
        &user.username,
        TokenType::Refresh,
        config.jwt.refresh_ttl(),
    );

    Ok(SessionTokens {
        access_token: sign_access(user, config)?,
        refresh_token: jwt::create_token(&refresh, &config.jwt.secret)?,
    })
}

/// Adds both session cookies to `jar`
pub fn start_session(jar: CookieJar, tokens: &SessionTokens, config: &Config) -> CookieJar {
    let secure = config.api.production;
    jar.add(session_cookie(
        SESSION_COOKIE,
        tokens.access_token.clone(),
        config.jwt.access_ttl(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        config.jwt.refresh_ttl(),
        secure,
    ))
}

/// Replaces the access cookie after a refresh
pub fn renew_access(jar: CookieJar, access_token: String, config: &Config) -> CookieJar {
    jar.add(session_cookie(
        SESSION_COOKIE,
        access_token,
        config.jwt.access_ttl(),
        config.api.production,
    ))
}

/// Expires both session cookies
pub fn end_session(jar: CookieJar, config: &Config) -> CookieJar {
    let secure = config.api.production;
    jar.add(expired_cookie(SESSION_COOKIE, secure))
        .add(expired_cookie(REFRESH_COOKIE, secure))
}
