/// User account endpoints
///
/// # Endpoints
///
/// - `POST /api/users/create` - Register a new account
/// - `POST /api/users/verify-email` - Redeem an email-verification token
/// - `POST /api/users/login` - Log in and receive session cookies
/// - `POST /api/users/logout` - Clear session cookies
/// - `POST /api/users/refresh` - Exchange the refresh token for a new access token
/// - `GET|PUT|DELETE /api/users/me` - The caller's own account
/// - `POST /api/users/forgot-password` - Request a password-reset token
/// - `POST /api/users/reset-password` - Set a new password with a reset token

use axum::{extract::State, http::StatusCode, Extension};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use goaltrack_shared::{
    auth::{
        jwt,
        middleware::{AuthContext, REFRESH_COOKIE},
        password::{self, HashedPassword, PasswordParams},
    },
    models::{
        goal::Goal,
        one_time_token::{OneTimeToken, TokenPurpose, DEFAULT_TOKEN_TTL_HOURS},
        user::{AccountStatus, CreateUser, UpdateUser, User},
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::ApiJson,
    response::ApiResponse,
    session,
};

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("username_chars");
        err.message = Some("Username may only contain letters, digits, '.', '_' and '-'".into());
        Err(err)
    }
}

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 30, message = "Username must be 3 to 30 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked by [`password::validate_password_strength`]
    pub password: String,

    #[serde(default, alias = "profileData")]
    pub profile_data: Option<JsonValue>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(
        length(min = 3, max = 30, message = "Username must be 3 to 30 characters"),
        custom(function = "validate_username")
    )]
    pub username: Option<String>,

    #[serde(alias = "profileData")]
    pub profile_data: Option<JsonValue>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,

    #[serde(rename = "newPassword", alias = "new_password")]
    pub new_password: String,
}

/// User as returned to clients, without credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub account_status: AccountStatus,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    pub profile_data: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            email: user.email,
            account_status: user.account_status,
            email_verified: user.email_verified,
            mfa_enabled: user.mfa_enabled,
            profile_data: user.profile_data,
            created_at: user.created_at,
            updated_at: user.updated_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    #[serde(flatten)]
    pub user: UserResponse,

    /// Only present when one-time tokens are exposed (development)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub token: String,
}

fn password_detail(message: String) -> ApiError {
    ApiError::ValidationError(vec![ValidationErrorDetail::new("password", message)])
}

/// Argon2id is CPU-bound, keep it off the async workers
async fn hash_blocking(password: String, params: PasswordParams) -> ApiResult<HashedPassword> {
    let hashed = tokio::task::spawn_blocking(move || password::hash_password(&password, &params)).await??;
    Ok(hashed)
}

async fn verify_blocking(password: String, hash: String) -> ApiResult<bool> {
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&password, &hash)).await??;
    Ok(valid)
}

fn token_ttl() -> chrono::Duration {
    chrono::Duration::hours(DEFAULT_TOKEN_TTL_HOURS)
}

/// Register a new account
///
/// The account starts in `PENDING_VERIFICATION` and cannot log in until the
/// email-verification token is redeemed.
///
/// # Errors
///
/// - `400 Bad Request`: invalid fields or weak password
/// - `409 Conflict`: email or username already taken
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, ApiResponse<RegistrationResponse>)> {
    req.validate()?;
    password::validate_password_strength(&req.password).map_err(password_detail)?;

    let hashed = hash_blocking(req.password, state.config.auth.password).await?;

    let user = User::create(
        &state.store,
        CreateUser {
            username: req.username.trim().to_string(),
            email: req.email,
            password: hashed,
            profile_data: req.profile_data,
        },
    )
    .await?;

    let token = OneTimeToken::issue(
        &state.store,
        TokenPurpose::EmailVerification,
        &user,
        token_ttl(),
    )
    .await?;

    let response = RegistrationResponse {
        user: user.into(),
        verification_token: state.config.auth.expose_one_time_tokens.then_some(token),
    };

    Ok(ApiResponse::with_message("User created successfully", response).created())
}

/// Redeem an email-verification token
///
/// # Errors
///
/// - `400 Bad Request`: unknown, used or expired token
pub async fn verify_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<TokenRequest>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let token = OneTimeToken::redeem(&state.store, TokenPurpose::EmailVerification, req.token.trim())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired verification token".to_string()))?;

    let user = User::mark_email_verified(&state.store, token.user_id).await?;
    info!(user_id = %user.user_id, "Email verified");

    Ok(ApiResponse::with_message("Email verified successfully", user.into()))
}

/// Log in with email and password
///
/// A wrong password counts towards the lockout limit. Status checks happen
/// only after the password matched, so a locked account answers `403` to
/// its owner and `401` to everyone else.
///
/// # Errors
///
/// - `401 Unauthorized`: unknown email or wrong password
/// - `403 Forbidden`: account locked or email not verified
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, ApiResponse<UserResponse>)> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.store, &req.email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_blocking(req.password, user.password_hash.clone()).await? {
        if let Some(updated) = User::record_failed_login(&state.store, &user.email).await? {
            warn!(
                user_id = %updated.user_id,
                attempts = updated.login_attempts,
                "Failed login attempt"
            );
        }
        return Err(invalid());
    }

    match user.account_status {
        AccountStatus::Locked => return Err(ApiError::AccountLocked),
        AccountStatus::PendingVerification => return Err(ApiError::EmailNotVerified),
        AccountStatus::Active => {}
    }

    let user = User::record_successful_login(&state.store, user.user_id).await?;
    let tokens = session::sign_tokens(&user, &state.config)?;
    let jar = session::start_session(jar, &tokens, &state.config);

    info!(user_id = %user.user_id, "User logged in");
    Ok((jar, ApiResponse::with_message("Login successful", user.into())))
}

/// Clear the session cookies
///
/// Works with or without a valid session.
pub async fn logout(
    State(state): State<AppState>,
    auth: Option<Extension<AuthContext>>,
    jar: CookieJar,
) -> (CookieJar, ApiResponse<()>) {
    if let Some(Extension(auth)) = auth {
        info!(user_id = %auth.user_id, "User logged out");
    }

    (
        session::end_session(jar, &state.config),
        ApiResponse::message("Logged out successfully"),
    )
}

/// Issue a new access token from the refresh token
///
/// The refresh token is read from the `refreshToken` cookie, or from the
/// request body when no cookie is present.
///
/// # Errors
///
/// - `401 Unauthorized`: missing, invalid or expired refresh token, or the
///   account no longer exists
/// - `403 Forbidden`: account locked
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<ApiJson<RefreshRequest>>,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| body.and_then(|ApiJson(req)| req.refresh_token))
        .ok_or_else(|| ApiError::Unauthorized("Refresh token missing".to_string()))?;

    let claims = jwt::validate_refresh_token(&refresh_token, &state.config.jwt.secret)?;

    // Claims come from the stored record so a rename since login is picked up
    let user = User::find_by_id(&state.store, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
    if user.is_locked() {
        return Err(ApiError::AccountLocked);
    }

    let access_token = session::sign_access(&user, &state.config)?;
    let jar = session::renew_access(jar, access_token, &state.config);
    Ok((jar, ApiResponse::message("Token refreshed")))
}

/// The caller's own account
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let user = User::find_by_id(&state.store, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(ApiResponse::ok(user.into()))
}

/// Change username or profile data
///
/// A username change re-issues the session cookies so the tokens carry the
/// new name.
///
/// # Errors
///
/// - `400 Bad Request`: invalid username
/// - `409 Conflict`: username already taken
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    jar: CookieJar,
    ApiJson(req): ApiJson<UpdateMeRequest>,
) -> ApiResult<(CookieJar, ApiResponse<UserResponse>)> {
    req.validate()?;

    let username = req.username.map(|u| u.trim().to_string());
    let renamed = username.as_deref().is_some_and(|u| u != auth.username);

    let user = User::update(
        &state.store,
        auth.user_id,
        UpdateUser {
            username,
            profile_data: req.profile_data,
            ..Default::default()
        },
    )
    .await?;

    let jar = if renamed {
        let tokens = session::sign_tokens(&user, &state.config)?;
        session::start_session(jar, &tokens, &state.config)
    } else {
        jar
    };

    Ok((jar, ApiResponse::with_message("User updated successfully", user.into())))
}

/// Delete the caller's account and every goal it owns
pub async fn delete_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, ApiResponse<()>)> {
    let goals = Goal::delete_all_for_user(&state.store, auth.user_id).await?;

    User::delete(&state.store, auth.user_id).await?;

    info!(user_id = %auth.user_id, goals, "Account deleted");
    Ok((
        session::end_session(jar, &state.config),
        ApiResponse::message("User deleted successfully"),
    ))
}

/// Request a password-reset token
///
/// Always answers 200 so the endpoint cannot reveal which emails have accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<ApiResponse<ResetTokenResponse>> {
    req.validate()?;

    let token = match User::find_by_email(&state.store, &req.email).await? {
        Some(user) => Some(
            OneTimeToken::issue(&state.store, TokenPurpose::PasswordReset, &user, token_ttl()).await?,
        ),
        None => None,
    };

    let exposed = token
        .filter(|_| state.config.auth.expose_one_time_tokens)
        .map(|token| ResetTokenResponse { token });

    Ok(ApiResponse {
        success: true,
        message: Some("If the email exists, a reset link has been sent".to_string()),
        data: exposed,
    })
}

/// Set a new password using a reset token
///
/// Also unlocks the account and clears the failed-login counter.
///
/// # Errors
///
/// - `400 Bad Request`: weak password, or unknown, used or expired token
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    password::validate_password_strength(&req.new_password).map_err(password_detail)?;

    let token = OneTimeToken::redeem(&state.store, TokenPurpose::PasswordReset, req.token.trim())
        .await?
        .ok_or_else(|| ApiError::BadRequest("Invalid or expired reset token".to_string()))?;

    let hashed = hash_blocking(req.new_password, state.config.auth.password).await?;
    let user = User::reset_password(&state.store, token.user_id, hashed).await?;

    info!(user_id = %user.user_id, "Password reset");
    Ok(ApiResponse::message("Password reset successfully"))
}
