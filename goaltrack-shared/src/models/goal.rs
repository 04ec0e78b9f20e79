/// Goal model and keyspace operations
///
/// # Tables
///
/// | table | partition | clustering | row |
/// |---|---|---|---|
/// | `user_goals` | user_id | created_at#goal_id, newest first | full [`Goal`] |
/// | `goals_by_id` | goal_id | | full [`Goal`] |
/// | `goals_by_status` | user_id#status | created_at#goal_id, newest first | [`GoalSummary`] |
/// | `goals_by_category` | user_id#category | created_at#goal_id, newest first | [`GoalSummary`] |
/// | `goals_by_target_date` | user_id | target_date#goal_id, soonest first | [`GoalSummary`] |
///
/// Goals without a target date have no `goals_by_target_date` row.
///
/// Every mutation re-reads the stored goal and derives all projection keys
/// from it, so a stale client copy can never leave an orphaned row behind.
/// Concurrent updates of the same goal are last-writer-wins.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{deserialize_nullable, deserialize_nullable_date};
use crate::store::{Batch, RowKey, Store, StoreError, Table};

/// Default page size for goal lists
pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Default page size for upcoming goals
pub const DEFAULT_UPCOMING_LIMIT: usize = 50;

/// Largest page any list query returns
pub const MAX_LIST_LIMIT: usize = 500;

/// Rows read per page when computing statistics
const STATS_PAGE_SIZE: usize = 1_000;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_PROGRESS: u8 = 100;

fn normalize_variant(value: &str) -> String {
    value
        .trim()
        .to_ascii_lowercase()
        .replace(|c: char| c == '-' || c == ' ', "_")
}

/// Goal category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum GoalCategory {
    Health,
    Fitness,
    Career,
    Professional,
    Education,
    Personal,
    Finance,
    Financial,
    Social,
    Creative,
    Other,
}

impl GoalCategory {
    pub const ALL: [GoalCategory; 11] = [
        GoalCategory::Health,
        GoalCategory::Fitness,
        GoalCategory::Career,
        GoalCategory::Professional,
        GoalCategory::Education,
        GoalCategory::Personal,
        GoalCategory::Finance,
        GoalCategory::Financial,
        GoalCategory::Social,
        GoalCategory::Creative,
        GoalCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalCategory::Health => "health",
            GoalCategory::Fitness => "fitness",
            GoalCategory::Career => "career",
            GoalCategory::Professional => "professional",
            GoalCategory::Education => "education",
            GoalCategory::Personal => "personal",
            GoalCategory::Finance => "finance",
            GoalCategory::Financial => "financial",
            GoalCategory::Social => "social",
            GoalCategory::Creative => "creative",
            GoalCategory::Other => "other",
        }
    }
}

impl FromStr for GoalCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_variant(s);
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("Invalid goal category: {}", s))
    }
}

impl TryFrom<String> for GoalCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for GoalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum GoalStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl GoalStatus {
    pub const ALL: [GoalStatus; 5] = [
        GoalStatus::NotStarted,
        GoalStatus::InProgress,
        GoalStatus::Completed,
        GoalStatus::OnHold,
        GoalStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::NotStarted => "not_started",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Completed => "completed",
            GoalStatus::OnHold => "on_hold",
            GoalStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_variant(s);
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("Invalid goal status: {}", s))
    }
}

impl TryFrom<String> for GoalStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Goal priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum GoalPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl GoalPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalPriority::Low => "low",
            GoalPriority::Medium => "medium",
            GoalPriority::High => "high",
        }
    }
}

impl FromStr for GoalPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_variant(s).as_str() {
            "low" => Ok(GoalPriority::Low),
            "medium" => Ok(GoalPriority::Medium),
            "high" => Ok(GoalPriority::High),
            _ => Err(format!("Invalid goal priority: {}", s)),
        }
    }
}

impl TryFrom<String> for GoalPriority {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Full goal record, stored in `user_goals` and `goals_by_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: GoalCategory,
    pub status: GoalStatus,
    pub priority: GoalPriority,
    /// Percent complete, 0..=100
    pub progress: u8,
    pub target_date: Option<NaiveDate>,
    /// Banner image URL
    pub banner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reduced row stored in the status, category and target-date projections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSummary {
    pub goal_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub banner: Option<String>,
    pub status: GoalStatus,
    pub category: GoalCategory,
    pub priority: GoalPriority,
    pub progress: u8,
    pub target_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<&Goal> for GoalSummary {
    fn from(goal: &Goal) -> Self {
        Self {
            goal_id: goal.goal_id,
            user_id: goal.user_id,
            title: goal.title.clone(),
            banner: goal.banner.clone(),
            status: goal.status,
            category: goal.category,
            priority: goal.priority,
            progress: goal.progress,
            target_date: goal.target_date,
            created_at: goal.created_at,
        }
    }
}

/// Goal counts per status for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStats {
    pub total: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub on_hold: usize,
    pub cancelled: usize,
}

impl GoalStats {
    fn record(&mut self, status: GoalStatus) {
        self.total += 1;
        match status {
            GoalStatus::NotStarted => self.not_started += 1,
            GoalStatus::InProgress => self.in_progress += 1,
            GoalStatus::Completed => self.completed += 1,
            GoalStatus::OnHold => self.on_hold += 1,
            GoalStatus::Cancelled => self.cancelled += 1,
        }
    }
}

/// Input for creating a goal
#[derive(Debug, Clone, Default)]
pub struct CreateGoal {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<GoalCategory>,
    pub status: Option<GoalStatus>,
    pub priority: Option<GoalPriority>,
    pub progress: Option<u8>,
    pub target_date: Option<NaiveDate>,
    pub banner: Option<String>,
    pub tags: Vec<String>,
    pub milestones: Vec<String>,
    pub notes: Option<String>,
}

/// Partial goal update
///
/// `None` leaves a field unchanged. Nullable fields are double options:
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGoal {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub description: Option<Option<String>>,
    pub category: Option<GoalCategory>,
    pub status: Option<GoalStatus>,
    pub priority: Option<GoalPriority>,
    pub progress: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_nullable_date")]
    pub target_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub banner: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub milestones: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub notes: Option<Option<String>>,
}

fn validate_title(title: &str) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Validation("title is required".to_string()));
    }
    if title.trim().chars().count() > MAX_TITLE_LENGTH {
        return Err(StoreError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

fn validate_progress(progress: u8) -> Result<(), StoreError> {
    if progress > MAX_PROGRESS {
        return Err(StoreError::Validation(format!(
            "progress must be between 0 and {}",
            MAX_PROGRESS
        )));
    }
    Ok(())
}

/// Drops blank entries and surrounding whitespace
fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Empty strings are stored as absent
fn clean_text(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

impl CreateGoal {
    fn validate(&self) -> Result<GoalCategory, StoreError> {
        validate_title(&self.title)?;
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        self.category
            .ok_or_else(|| StoreError::Validation("category is required".to_string()))
    }
}

impl UpdateGoal {
    fn validate(&self) -> Result<(), StoreError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(progress) = self.progress {
            validate_progress(progress)?;
        }
        Ok(())
    }

    fn apply_to(self, goal: &mut Goal) {
        if let Some(title) = self.title {
            goal.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            goal.description = clean_text(description);
        }
        if let Some(category) = self.category {
            goal.category = category;
        }
        if let Some(status) = self.status {
            goal.status = status;
        }
        if let Some(priority) = self.priority {
            goal.priority = priority;
        }
        if let Some(progress) = self.progress {
            goal.progress = progress;
        }
        if let Some(target_date) = self.target_date {
            goal.target_date = target_date;
        }
        if let Some(banner) = self.banner {
            goal.banner = clean_text(banner);
        }
        if let Some(tags) = self.tags {
            goal.tags = clean_list(tags);
        }
        if let Some(milestones) = self.milestones {
            goal.milestones = clean_list(milestones);
        }
        if let Some(notes) = self.notes {
            goal.notes = clean_text(notes);
        }
    }
}

fn clamp_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_LIST_LIMIT)
}

/// `created_at` in zero-padded microseconds so keys sort chronologically
fn created_clustering(created_at: DateTime<Utc>, goal_id: Uuid) -> String {
    format!("{:020}#{}", created_at.timestamp_micros(), goal_id)
}

fn date_prefix(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn status_partition(user_id: Uuid, status: GoalStatus) -> String {
    format!("{}#{}", user_id, status.as_str())
}

fn category_partition(user_id: Uuid, category: GoalCategory) -> String {
    format!("{}#{}", user_id, category.as_str())
}

impl Goal {
    fn user_goals_key(&self) -> RowKey {
        RowKey::new(
            self.user_id.to_string(),
            created_clustering(self.created_at, self.goal_id),
        )
    }

    fn by_id_key(goal_id: Uuid) -> RowKey {
        RowKey::single(goal_id.to_string())
    }

    fn status_key(&self) -> RowKey {
        RowKey::new(
            status_partition(self.user_id, self.status),
            created_clustering(self.created_at, self.goal_id),
        )
    }

    fn category_key(&self) -> RowKey {
        RowKey::new(
            category_partition(self.user_id, self.category),
            created_clustering(self.created_at, self.goal_id),
        )
    }

    fn target_date_key(&self) -> Option<RowKey> {
        self.target_date.map(|date| {
            RowKey::new(
                self.user_id.to_string(),
                format!("{}#{}", date_prefix(date), self.goal_id),
            )
        })
    }

    /// Stages upserts of every projection derived from `self`
    fn stage_projections(&self, batch: &mut Batch) -> Result<(), StoreError> {
        let summary = GoalSummary::from(self);

        batch
            .upsert(Table::UserGoals, self.user_goals_key(), self)?
            .upsert(Table::GoalsById, Self::by_id_key(self.goal_id), self)?
            .upsert(Table::GoalsByStatus, self.status_key(), &summary)?
            .upsert(Table::GoalsByCategory, self.category_key(), &summary)?;

        if let Some(key) = self.target_date_key() {
            batch.upsert(Table::GoalsByTargetDate, key, &summary)?;
        }
        Ok(())
    }

    /// Creates a goal and writes all of its projections in one batch
    ///
    /// Status defaults to `not_started`, priority to `medium` and progress
    /// to 0.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the title is blank or too long,
    /// the category is missing, or progress exceeds 100.
    pub async fn create(store: &Store, data: CreateGoal) -> Result<Self, StoreError> {
        let category = data.validate()?;

        let now = Utc::now();
        let goal = Goal {
            goal_id: Uuid::new_v4(),
            user_id: data.user_id,
            title: data.title.trim().to_string(),
            description: clean_text(data.description),
            category,
            status: data.status.unwrap_or_default(),
            priority: data.priority.unwrap_or_default(),
            progress: data.progress.unwrap_or(0),
            target_date: data.target_date,
            banner: clean_text(data.banner),
            tags: clean_list(data.tags),
            milestones: clean_list(data.milestones),
            notes: clean_text(data.notes),
            created_at: now,
            updated_at: now,
        };

        let mut batch = Batch::new();
        goal.stage_projections(&mut batch)?;
        store.execute(batch).await?;

        info!(goal_id = %goal.goal_id, user_id = %goal.user_id, category = %goal.category, "Goal created");
        Ok(goal)
    }

    pub async fn find_by_id(store: &Store, goal_id: Uuid) -> Result<Option<Self>, StoreError> {
        store.get(Table::GoalsById, &Self::by_id_key(goal_id)).await
    }

    /// The user's goals, newest first
    pub async fn find_by_user_id(
        store: &Store,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Self>, StoreError> {
        store
            .scan(Table::UserGoals, &user_id.to_string(), None, clamp_limit(limit))
            .await
    }

    /// The user's goals in `status`, newest first
    pub async fn find_by_status(
        store: &Store,
        user_id: Uuid,
        status: GoalStatus,
        limit: usize,
    ) -> Result<Vec<GoalSummary>, StoreError> {
        store
            .scan(
                Table::GoalsByStatus,
                &status_partition(user_id, status),
                None,
                clamp_limit(limit),
            )
            .await
    }

    /// The user's goals in `category`, newest first
    pub async fn find_by_category(
        store: &Store,
        user_id: Uuid,
        category: GoalCategory,
        limit: usize,
    ) -> Result<Vec<GoalSummary>, StoreError> {
        store
            .scan(
                Table::GoalsByCategory,
                &category_partition(user_id, category),
                None,
                clamp_limit(limit),
            )
            .await
    }

    /// Goals due today or later, soonest first
    pub async fn find_upcoming(
        store: &Store,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<GoalSummary>, StoreError> {
        Self::find_upcoming_from(store, user_id, Utc::now().date_naive(), limit).await
    }

    /// Goals due on or after `from`, soonest first
    pub async fn find_upcoming_from(
        store: &Store,
        user_id: Uuid,
        from: NaiveDate,
        limit: usize,
    ) -> Result<Vec<GoalSummary>, StoreError> {
        let from = date_prefix(from);
        store
            .scan(
                Table::GoalsByTargetDate,
                &user_id.to_string(),
                Some(&from),
                clamp_limit(limit),
            )
            .await
    }

    /// Applies the present fields of `data` to the stored goal
    ///
    /// In one batch: both full rows are overwritten, projection rows keyed on
    /// a value that changed (status, category, target date) are deleted, and a
    /// fresh summary is written to every secondary table.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the goal does not exist
    /// - `StoreError::Validation` for a blank title or progress over 100
    pub async fn update(store: &Store, goal_id: Uuid, data: UpdateGoal) -> Result<Self, StoreError> {
        data.validate()?;

        let current = Self::find_by_id(store, goal_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Goal {} not found", goal_id)))?;

        let mut updated = current.clone();
        data.apply_to(&mut updated);
        updated.updated_at = Utc::now();

        let mut batch = Batch::new();
        if current.status != updated.status {
            batch.delete(Table::GoalsByStatus, current.status_key());
        }
        if current.category != updated.category {
            batch.delete(Table::GoalsByCategory, current.category_key());
        }
        if current.target_date != updated.target_date {
            if let Some(key) = current.target_date_key() {
                batch.delete(Table::GoalsByTargetDate, key);
            }
        }
        updated.stage_projections(&mut batch)?;

        store.execute(batch).await?;

        debug!(
            goal_id = %goal_id,
            from_status = %current.status,
            to_status = %updated.status,
            "Goal updated"
        );
        Ok(updated)
    }

    /// Removes every projection of the goal in one batch
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the goal does not exist.
    pub async fn delete(store: &Store, goal_id: Uuid) -> Result<(), StoreError> {
        let goal = Self::find_by_id(store, goal_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Goal {} not found", goal_id)))?;

        let mut batch = Batch::new();
        batch
            .delete(Table::UserGoals, goal.user_goals_key())
            .delete(Table::GoalsById, Self::by_id_key(goal.goal_id))
            .delete(Table::GoalsByStatus, goal.status_key())
            .delete(Table::GoalsByCategory, goal.category_key());
        if let Some(key) = goal.target_date_key() {
            batch.delete(Table::GoalsByTargetDate, key);
        }
        store.execute(batch).await?;

        info!(goal_id = %goal_id, user_id = %goal.user_id, "Goal deleted");
        Ok(())
    }

    /// Deletes every goal owned by `user_id`, returning how many were removed
    pub async fn delete_all_for_user(store: &Store, user_id: Uuid) -> Result<usize, StoreError> {
        let mut deleted = 0;
        loop {
            let goals = Self::find_by_user_id(store, user_id, MAX_LIST_LIMIT).await?;
            if goals.is_empty() {
                break;
            }
            for goal in goals {
                Self::delete(store, goal.goal_id).await?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Counts the user's goals per status
    pub async fn stats(store: &Store, user_id: Uuid) -> Result<GoalStats, StoreError> {
        Self::stats_paged(store, user_id, STATS_PAGE_SIZE).await
    }

    /// Walks `user_goals` page by page; each page restarts at the last key seen
    async fn stats_paged(
        store: &Store,
        user_id: Uuid,
        page_size: usize,
    ) -> Result<GoalStats, StoreError> {
        let partition = user_id.to_string();
        let mut stats = GoalStats::default();
        let mut cursor: Option<String> = None;

        loop {
            // The cursor row comes back first since `from` is inclusive
            let limit = page_size + usize::from(cursor.is_some());
            let page: Vec<Goal> = store
                .scan(Table::UserGoals, &partition, cursor.as_deref(), limit)
                .await?;
            let fetched = page.len();

            let mut last = None;
            for goal in page {
                let key = goal.user_goals_key().clustering;
                if cursor.as_deref() != Some(key.as_str()) {
                    stats.record(goal.status);
                }
                last = Some(key);
            }

            match last {
                Some(key) if fetched == limit => cursor = Some(key),
                _ => break,
            }
        }

        debug!(user_id = %user_id, total = stats.total, "Goal stats computed");
        Ok(stats)
    }
}
