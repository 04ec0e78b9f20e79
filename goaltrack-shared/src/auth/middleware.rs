/// Session authentication middleware for Axum
///
/// The access token is read from the `token` cookie first and from an
/// `Authorization: Bearer <token>` header second. On success an
/// [`AuthContext`] is inserted into the request extensions.
///
/// - [`require_auth`] rejects the request with 401 when no valid token is present
/// - [`optional_auth`] lets the request through either way
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use goaltrack_shared::auth::middleware::{create_auth_middleware, AuthContext};
///
/// async fn whoami(Extension(auth): Extension<AuthContext>) -> String {
///     auth.username
/// }
///
/// let app: Router = Router::new()
///     .route("/me", get(whoami))
///     .layer(middleware::from_fn(create_auth_middleware("secret")));
/// ```

use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::jwt::{validate_access_token, Claims};

/// Cookie carrying the access token
pub const SESSION_COOKIE: &str = "token";

/// Cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Identity of the authenticated caller, available to handlers via
/// `Extension<AuthContext>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            username: claims.username,
        }
    }
}

/// Error type for authentication middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    MissingCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
            "error": "unauthorized",
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Finds the access token: `token` cookie, then bearer header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Validates the request's access token and returns the caller identity
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = extract_token(headers).ok_or(AuthError::MissingCredentials)?;
    let claims = validate_access_token(&token, secret).map_err(|_| AuthError::InvalidToken)?;
    Ok(AuthContext::from(claims))
}

/// Rejects the request with 401 unless it carries a valid access token
pub async fn require_auth(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = authenticate(req.headers(), &secret).inspect_err(|e| {
        debug!(path = %req.uri().path(), reason = %e, "Rejected unauthenticated request");
    })?;

    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Attaches the caller identity when a valid token is present, never rejects
pub async fn optional_auth(secret: String, mut req: Request, next: Next) -> Response {
    if let Ok(auth) = authenticate(req.headers(), &secret) {
        req.extensions_mut().insert(auth);
    }
    next.run(req).await
}

type MiddlewareFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Wraps [`require_auth`] for `axum::middleware::from_fn`
pub fn create_auth_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> MiddlewareFuture<Result<Response, AuthError>> + Clone {
    let secret = secret.into();
    move |req, next| {
        let secret = secret.clone();
        Box::pin(require_auth(secret, req, next))
    }
}

/// Wraps [`optional_auth`] for `axum::middleware::from_fn`
pub fn create_optional_auth_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> MiddlewareFuture<Response> + Clone {
    let secret = secret.into();
    move |req, next| {
        let secret = secret.clone();
        Box::pin(optional_auth(secret, req, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{create_token, TokenType};
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    const SECRET: &str = "middleware-test-secret-with-enough-length";

    fn token(token_type: TokenType) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, "ada@example.com", "ada", token_type);
        (user_id, create_token(&claims, SECRET).unwrap())
    }

    fn protected_app() -> Router {
        Router::new()
            .route(
                "/me",
                get(|Extension(auth): Extension<AuthContext>| async move { auth.user_id.to_string() }),
            )
            .layer(middleware::from_fn(create_auth_middleware(SECRET)))
    }

    fn optional_app() -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|auth: Option<Extension<AuthContext>>| async move {
                    auth.map(|Extension(a)| a.username)
                        .unwrap_or_else(|| "anonymous".to_string())
                }),
            )
            .layer(middleware::from_fn(create_optional_auth_middleware(SECRET)))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_extract_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; token=from-cookie".parse().unwrap());
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());

        assert_eq!(extract_token(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn test_extract_token_falls_back_to_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("from-header"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn test_authenticate() {
        let (user_id, access) = token(TokenType::Access);
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, format!("token={}", access).parse().unwrap());

        let auth = authenticate(&headers, SECRET).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.email, "ada@example.com");

        assert!(matches!(
            authenticate(&HeaderMap::new(), SECRET),
            Err(AuthError::MissingCredentials)
        ));
    }

    #[test]
    fn test_refresh_token_not_accepted_as_session() {
        let (_, refresh) = token(TokenType::Refresh);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, format!("Bearer {}", refresh).parse().unwrap());

        assert!(matches!(
            authenticate(&headers, SECRET),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_require_auth_rejects_missing_token() {
        let response = protected_app()
            .oneshot(HttpRequest::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_text(response).await.contains("\"success\":false"));
    }

    #[tokio::test]
    async fn test_require_auth_rejects_garbage_token() {
        let response = protected_app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/me")
                    .header(header::COOKIE, "token=garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_require_auth_passes_identity() {
        let (user_id, access) = token(TokenType::Access);
        let response = protected_app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, user_id.to_string());
    }

    #[tokio::test]
    async fn test_optional_auth() {
        let response = optional_app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header(header::COOKIE, "token=expired-or-garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");

        let (_, access) = token(TokenType::Access);
        let response = optional_app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/whoami")
                    .header(header::COOKIE, format!("token={}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "ada");
    }
}
