/// One-time tokens for password reset and email verification
///
/// Stored in `one_time_tokens`, partitioned by `purpose#sha256(token)`. Only the
/// digest is persisted; the plaintext is returned once from [`OneTimeToken::issue`].
///
/// A token is accepted once. Two concurrent redemptions of the same token may
/// both succeed (last writer wins on the `used` flag).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::user::User;
use crate::auth::opaque_token::{digest_token, generate_token, validate_token_format};
use crate::store::{Batch, RowKey, Store, StoreError, Table};

/// Default lifetime of a one-time token
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// What a token may be redeemed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    PasswordReset,
    EmailVerification,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::PasswordReset => "password_reset",
            TokenPurpose::EmailVerification => "email_verification",
        }
    }
}

/// Persisted token row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimeToken {
    pub purpose: TokenPurpose,
    pub user_id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

fn token_key(purpose: TokenPurpose, digest: &str) -> RowKey {
    RowKey::single(format!("{}#{}", purpose.as_str(), digest))
}

impl OneTimeToken {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Stores a new token for `user` and returns its plaintext
    pub async fn issue(
        store: &Store,
        purpose: TokenPurpose,
        user: &User,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        let (token, digest) = generate_token();
        let now = Utc::now();
        let row = OneTimeToken {
            purpose,
            user_id: user.user_id,
            email: user.email.clone(),
            created_at: now,
            expires_at: now + ttl,
            used: false,
        };

        let mut batch = Batch::new();
        batch.upsert(Table::OneTimeTokens, token_key(purpose, &digest), &row)?;
        store.execute(batch).await?;

        info!(user_id = %user.user_id, purpose = purpose.as_str(), "Issued one-time token");
        Ok(token)
    }

    /// Consumes a token, returning its row if it was valid
    ///
    /// Unknown, malformed, already used and expired tokens all yield `None`.
    pub async fn redeem(
        store: &Store,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<Self>, StoreError> {
        if !validate_token_format(token) {
            return Ok(None);
        }

        let key = token_key(purpose, &digest_token(token));
        let Some(mut row) = store.get::<OneTimeToken>(Table::OneTimeTokens, &key).await? else {
            return Ok(None);
        };

        if row.used || row.is_expired() {
            debug!(user_id = %row.user_id, used = row.used, "Rejected stale one-time token");
            return Ok(None);
        }

        row.used = true;
        let mut batch = Batch::new();
        batch.upsert(Table::OneTimeTokens, key, &row)?;
        store.execute(batch).await?;

        Ok(Some(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::HashedPassword;
    use crate::models::user::CreateUser;

    async fn user(store: &Store) -> User {
        User::create(
            store,
            CreateUser {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                password: HashedPassword {
                    hash: "$argon2id$stub".to_string(),
                    salt: "stub".to_string(),
                },
                profile_data: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_issue_and_redeem_once() {
        let store = Store::in_memory();
        let user = user(&store).await;

        let token = OneTimeToken::issue(&store, TokenPurpose::PasswordReset, &user, Duration::hours(1))
            .await
            .unwrap();

        let row = OneTimeToken::redeem(&store, TokenPurpose::PasswordReset, &token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.user_id, user.user_id);
        assert!(row.used);

        let again = OneTimeToken::redeem(&store, TokenPurpose::PasswordReset, &token)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_purpose_is_part_of_the_key() {
        let store = Store::in_memory();
        let user = user(&store).await;

        let token = OneTimeToken::issue(&store, TokenPurpose::EmailVerification, &user, Duration::hours(1))
            .await
            .unwrap();

        let wrong = OneTimeToken::redeem(&store, TokenPurpose::PasswordReset, &token)
            .await
            .unwrap();
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn test_expired_and_unknown_tokens() {
        let store = Store::in_memory();
        let user = user(&store).await;

        let token = OneTimeToken::issue(&store, TokenPurpose::PasswordReset, &user, Duration::seconds(-1))
            .await
            .unwrap();
        assert!(OneTimeToken::redeem(&store, TokenPurpose::PasswordReset, &token)
            .await
            .unwrap()
            .is_none());

        assert!(OneTimeToken::redeem(&store, TokenPurpose::PasswordReset, "nope")
            .await
            .unwrap()
            .is_none());
    }
}
