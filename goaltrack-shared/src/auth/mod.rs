/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: access/refresh session tokens
/// - [`opaque_token`]: random one-time tokens stored as SHA-256 digests
/// - [`middleware`]: Axum layers that resolve the caller from the session
/// - [`authorization`]: ownership checks
///
/// # Example
///
/// ```no_run
/// use goaltrack_shared::auth::jwt::{create_token, Claims, TokenType};
/// use goaltrack_shared::auth::password::{hash_password, verify_password, PasswordParams};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hashed = hash_password("Sup3r!secret", &PasswordParams::default())?;
/// assert!(verify_password("Sup3r!secret", &hashed.hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "ada@example.com", "ada", TokenType::Access);
/// let token = create_token(&claims, "secret-key")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod opaque_token;
pub mod password;
