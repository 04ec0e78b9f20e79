/// User model and keyspace operations
///
/// # Tables
///
/// | table | partition | row |
/// |---|---|---|
/// | `users` | email | full [`User`] |
/// | `users_by_username` | username | [`UserLookup`] |
/// | `users_by_id` | user_id | [`UserLookup`] |
///
/// `users` is the canonical record. Both lookup tables point back at it by
/// email. Registration inserts all three rows with insert-if-absent semantics,
/// so a duplicate email or username aborts the batch.
///
/// Emails are trimmed and lower-cased before they are used as a key.
///
/// # Example
///
/// ```no_run
/// use goaltrack_shared::auth::password::{hash_password, PasswordParams};
/// use goaltrack_shared::models::user::{CreateUser, User};
/// use goaltrack_shared::store::Store;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Store::in_memory();
/// let user = User::create(&store, CreateUser {
///     username: "ada".to_string(),
///     email: "ada@example.com".to_string(),
///     password: hash_password("Sup3r!secret", &PasswordParams::default())?,
///     profile_data: None,
/// }).await?;
///
/// let found = User::find_by_username(&store, "ada").await?;
/// assert_eq!(found.map(|u| u.user_id), Some(user.user_id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::password::HashedPassword;
use crate::store::{Batch, RowKey, Store, StoreError, Table};

/// Consecutive failed logins after which the account is locked
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// Account lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    /// Registered, email not yet verified; cannot log in
    #[default]
    PendingVerification,
    Active,
    /// Too many failed logins; cannot log in until the password is reset
    Locked,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::PendingVerification => "PENDING_VERIFICATION",
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Locked => "LOCKED",
        }
    }
}

/// Canonical user record, stored in `users`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: Uuid,
    pub username: String,
    /// Normalized email, also the partition key
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    pub salt: String,
    pub account_status: AccountStatus,
    pub login_attempts: u32,
    pub email_verified: bool,
    pub mfa_enabled: bool,
    /// Free-form client data (display name, avatar, preferences)
    pub profile_data: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Row stored in `users_by_username` and `users_by_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLookup {
    pub username: String,
    pub user_id: Uuid,
    pub email: String,
    pub account_status: AccountStatus,
}

/// Input for creating a new user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: HashedPassword,
    pub profile_data: Option<JsonValue>,
}

/// Input for updating a user; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password: Option<HashedPassword>,
    pub account_status: Option<AccountStatus>,
    pub login_attempts: Option<u32>,
    pub email_verified: Option<bool>,
    pub profile_data: Option<JsonValue>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Trims and lower-cases an email for use as a key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn email_key(email: &str) -> RowKey {
    RowKey::single(normalize_email(email))
}

fn username_key(username: &str) -> RowKey {
    RowKey::single(username)
}

fn id_key(user_id: Uuid) -> RowKey {
    RowKey::single(user_id.to_string())
}

/// Maps a duplicate-key abort onto the uniqueness rule it violated
fn uniqueness_conflict(err: StoreError) -> StoreError {
    match err {
        StoreError::Duplicate {
            table: Table::Users, ..
        } => StoreError::Conflict("User with this email already exists".to_string()),
        StoreError::Duplicate {
            table: Table::UsersByUsername,
            ..
        } => StoreError::Conflict("Username is already taken".to_string()),
        other => other,
    }
}

impl CreateUser {
    fn validate(&self) -> Result<(), StoreError> {
        if self.username.trim().is_empty() {
            return Err(StoreError::Validation("username is required".to_string()));
        }
        if normalize_email(&self.email).is_empty() {
            return Err(StoreError::Validation("email is required".to_string()));
        }
        if self.password.hash.is_empty() || self.password.salt.is_empty() {
            return Err(StoreError::Validation("password hash is required".to_string()));
        }
        Ok(())
    }
}

impl UpdateUser {
    fn validate(&self) -> Result<(), StoreError> {
        if let Some(username) = &self.username {
            if username.trim().is_empty() {
                return Err(StoreError::Validation("username cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

impl User {
    /// Projection row for the lookup tables
    pub fn lookup(&self) -> UserLookup {
        UserLookup {
            username: self.username.clone(),
            user_id: self.user_id,
            email: self.email.clone(),
            account_status: self.account_status,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.account_status == AccountStatus::Locked
    }

    /// Creates a user in `PENDING_VERIFICATION` state
    ///
    /// # Errors
    ///
    /// - `StoreError::Validation` if username, email or password hash is empty
    /// - `StoreError::Conflict` if the email or username is already registered
    pub async fn create(store: &Store, data: CreateUser) -> Result<Self, StoreError> {
        data.validate()?;

        let now = Utc::now();
        let user = User {
            user_id: Uuid::new_v4(),
            username: data.username.trim().to_string(),
            email: normalize_email(&data.email),
            password_hash: data.password.hash,
            salt: data.password.salt,
            account_status: AccountStatus::PendingVerification,
            login_attempts: 0,
            email_verified: false,
            mfa_enabled: false,
            profile_data: data.profile_data.unwrap_or_else(|| JsonValue::Object(Default::default())),
            created_at: now,
            updated_at: now,
            last_login: None,
        };

        let lookup = user.lookup();
        let mut batch = Batch::new();
        batch
            .insert(Table::Users, email_key(&user.email), &user)?
            .insert(Table::UsersByUsername, username_key(&user.username), &lookup)?
            .insert(Table::UsersById, id_key(user.user_id), &lookup)?;

        store.execute(batch).await.map_err(uniqueness_conflict)?;

        info!(user_id = %user.user_id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn find_by_email(store: &Store, email: &str) -> Result<Option<Self>, StoreError> {
        store.get(Table::Users, &email_key(email)).await
    }

    /// Resolves the username lookup row, then reads the canonical record
    pub async fn find_by_username(store: &Store, username: &str) -> Result<Option<Self>, StoreError> {
        let lookup: Option<UserLookup> = store
            .get(Table::UsersByUsername, &username_key(username.trim()))
            .await?;

        match lookup {
            Some(lookup) => Self::find_by_email(store, &lookup.email).await,
            None => Ok(None),
        }
    }

    /// Resolves the id lookup row, then reads the canonical record
    pub async fn find_by_id(store: &Store, user_id: Uuid) -> Result<Option<Self>, StoreError> {
        let lookup: Option<UserLookup> = store.get(Table::UsersById, &id_key(user_id)).await?;

        match lookup {
            Some(lookup) => Self::find_by_email(store, &lookup.email).await,
            None => Ok(None),
        }
    }

    /// Applies the present fields of `data` to the stored user
    ///
    /// A username change claims the new username with insert-if-absent and
    /// releases the old one; lookup rows are rewritten whenever the username
    /// or account status changes. Everything lands in one batch.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no user has this id
    /// - `StoreError::Conflict` if the new username is taken
    pub async fn update(store: &Store, user_id: Uuid, data: UpdateUser) -> Result<Self, StoreError> {
        data.validate()?;

        let current = Self::find_by_id(store, user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {} not found", user_id)))?;

        let mut updated = current.clone();
        if let Some(username) = data.username {
            updated.username = username.trim().to_string();
        }
        if let Some(password) = data.password {
            updated.password_hash = password.hash;
            updated.salt = password.salt;
        }
        if let Some(status) = data.account_status {
            updated.account_status = status;
        }
        if let Some(attempts) = data.login_attempts {
            updated.login_attempts = attempts;
        }
        if let Some(verified) = data.email_verified {
            updated.email_verified = verified;
        }
        if let Some(profile_data) = data.profile_data {
            updated.profile_data = profile_data;
        }
        if let Some(last_login) = data.last_login {
            updated.last_login = Some(last_login);
        }
        updated.updated_at = Utc::now();

        let username_changed = updated.username != current.username;
        let status_changed = updated.account_status != current.account_status;
        let lookup = updated.lookup();

        let mut batch = Batch::new();
        batch.upsert(Table::Users, email_key(&updated.email), &updated)?;

        if username_changed {
            batch.delete(Table::UsersByUsername, username_key(&current.username));
            batch.insert(Table::UsersByUsername, username_key(&updated.username), &lookup)?;
        } else if status_changed {
            batch.upsert(Table::UsersByUsername, username_key(&updated.username), &lookup)?;
        }

        if username_changed || status_changed {
            batch.upsert(Table::UsersById, id_key(updated.user_id), &lookup)?;
        }

        store.execute(batch).await.map_err(uniqueness_conflict)?;
        Ok(updated)
    }

    /// Removes the canonical record and both lookup rows
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user does not exist.
    pub async fn delete(store: &Store, user_id: Uuid) -> Result<(), StoreError> {
        let user = Self::find_by_id(store, user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {} not found", user_id)))?;

        let mut batch = Batch::new();
        batch
            .delete(Table::Users, email_key(&user.email))
            .delete(Table::UsersByUsername, username_key(&user.username))
            .delete(Table::UsersById, id_key(user.user_id));
        store.execute(batch).await?;

        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    /// Counts a failed password attempt, locking the account at the limit
    ///
    /// Returns the updated user, or `None` if no account has this email.
    pub async fn record_failed_login(store: &Store, email: &str) -> Result<Option<Self>, StoreError> {
        let Some(user) = Self::find_by_email(store, email).await? else {
            return Ok(None);
        };

        let attempts = user.login_attempts.saturating_add(1);
        let mut update = UpdateUser {
            login_attempts: Some(attempts),
            ..Default::default()
        };
        if attempts >= MAX_LOGIN_ATTEMPTS && !user.is_locked() {
            warn!(user_id = %user.user_id, attempts, "Locking account after failed logins");
            update.account_status = Some(AccountStatus::Locked);
        }

        Self::update(store, user.user_id, update).await.map(Some)
    }

    /// Resets the failure counter and stamps `last_login` in one write
    pub async fn record_successful_login(store: &Store, user_id: Uuid) -> Result<Self, StoreError> {
        Self::update(
            store,
            user_id,
            UpdateUser {
                login_attempts: Some(0),
                last_login: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await
    }

    /// Marks the email verified and activates a pending account
    pub async fn mark_email_verified(store: &Store, user_id: Uuid) -> Result<Self, StoreError> {
        let user = Self::find_by_id(store, user_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {} not found", user_id)))?;

        let account_status = match user.account_status {
            AccountStatus::PendingVerification => Some(AccountStatus::Active),
            _ => None,
        };

        Self::update(
            store,
            user_id,
            UpdateUser {
                email_verified: Some(true),
                account_status,
                ..Default::default()
            },
        )
        .await
    }

    /// Replaces the password and unlocks the account
    pub async fn reset_password(
        store: &Store,
        user_id: Uuid,
        password: HashedPassword,
    ) -> Result<Self, StoreError> {
        Self::update(
            store,
            user_id,
            UpdateUser {
                password: Some(password),
                login_attempts: Some(0),
                account_status: Some(AccountStatus::Active),
                ..Default::default()
            },
        )
        .await
    }
}
