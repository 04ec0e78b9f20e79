/// Goal endpoints
///
/// Every route requires a session. Goals are scoped to the caller: list
/// queries only read the caller's partitions, and single-goal routes check
/// ownership before anything else.
///
/// # Endpoints
///
/// - `GET /api/goals?limit=` - All goals, newest first
/// - `GET /api/goals/status/:status` - Goals in one status
/// - `GET /api/goals/category/:category` - Goals in one category
/// - `GET /api/goals/upcoming?limit=` - Goals due today or later, soonest first
/// - `GET /api/goals/stats` - Counts per status
/// - `GET /api/goals/:id`
/// - `POST /api/goals`
/// - `PUT /api/goals/:id`
/// - `DELETE /api/goals/:id`

use axum::{extract::State, http::StatusCode, Extension};
use chrono::NaiveDate;
use goaltrack_shared::{
    auth::{authorization::ensure_owner, middleware::AuthContext},
    models::{
        deserialize_optional_date,
        goal::{
            CreateGoal, Goal, GoalCategory, GoalPriority, GoalStats, GoalStatus, GoalSummary,
            UpdateGoal, DEFAULT_LIST_LIMIT, DEFAULT_UPCOMING_LIMIT,
        },
        user::User,
    },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    response::ApiResponse,
};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
}

/// Goal creation body; the owner comes from the session
#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<GoalCategory>,
    pub status: Option<GoalStatus>,
    pub priority: Option<GoalPriority>,
    pub progress: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_optional_date")]
    pub target_date: Option<NaiveDate>,
    pub banner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
    pub notes: Option<String>,
}

impl CreateGoalRequest {
    fn into_create(self, user_id: Uuid) -> CreateGoal {
        CreateGoal {
            user_id,
            title: self.title,
            description: self.description,
            category: self.category,
            status: self.status,
            priority: self.priority,
            progress: self.progress,
            target_date: self.target_date,
            banner: self.banner,
            tags: self.tags,
            milestones: self.milestones,
            notes: self.notes,
        }
    }
}

/// Loads a goal and checks the caller owns it
async fn owned_goal(state: &AppState, auth: &AuthContext, goal_id: Uuid) -> ApiResult<Goal> {
    let goal = Goal::find_by_id(&state.store, goal_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Goal not found".to_string()))?;

    ensure_owner(auth, goal.user_id)?;
    Ok(goal)
}

fn parse_path<T: std::str::FromStr<Err = String>>(raw: &str) -> ApiResult<T> {
    raw.parse().map_err(ApiError::BadRequest)
}

pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<ApiResponse<Vec<Goal>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let goals = Goal::find_by_user_id(&state.store, auth.user_id, limit).await?;
    Ok(ApiResponse::ok(goals))
}

/// # Errors
///
/// - `400 Bad Request`: unknown status
pub async fn goals_by_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(status): ApiPath<String>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<ApiResponse<Vec<GoalSummary>>> {
    let status: GoalStatus = parse_path(&status)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let goals = Goal::find_by_status(&state.store, auth.user_id, status, limit).await?;
    Ok(ApiResponse::ok(goals))
}

/// # Errors
///
/// - `400 Bad Request`: unknown category
pub async fn goals_by_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(category): ApiPath<String>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<ApiResponse<Vec<GoalSummary>>> {
    let category: GoalCategory = parse_path(&category)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let goals = Goal::find_by_category(&state.store, auth.user_id, category, limit).await?;
    Ok(ApiResponse::ok(goals))
}

pub async fn upcoming_goals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<ApiResponse<Vec<GoalSummary>>> {
    let limit = query.limit.unwrap_or(DEFAULT_UPCOMING_LIMIT);
    let goals = Goal::find_upcoming(&state.store, auth.user_id, limit).await?;
    Ok(ApiResponse::ok(goals))
}

pub async fn goal_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<GoalStats>> {
    let stats = Goal::stats(&state.store, auth.user_id).await?;
    Ok(ApiResponse::ok(stats))
}

/// # Errors
///
/// - `403 Forbidden`: goal belongs to another user
/// - `404 Not Found`
pub async fn get_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(goal_id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<Goal>> {
    let goal = owned_goal(&state, &auth, goal_id).await?;
    Ok(ApiResponse::ok(goal))
}

/// # Errors
///
/// - `400 Bad Request`: missing title or category, progress over 100
/// - `401 Unauthorized`: the session outlived its account
pub async fn create_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateGoalRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Goal>)> {
    if User::find_by_id(&state.store, auth.user_id).await?.is_none() {
        return Err(ApiError::Unauthorized("Account no longer exists".to_string()));
    }

    let goal = Goal::create(&state.store, req.into_create(auth.user_id)).await?;
    Ok(ApiResponse::with_message("Goal created successfully", goal).created())
}

/// Partial update; `null` clears description, target date, banner or notes
///
/// # Errors
///
/// - `400 Bad Request`: invalid field values
/// - `403 Forbidden`: goal belongs to another user
/// - `404 Not Found`
pub async fn update_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(goal_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateGoal>,
) -> ApiResult<ApiResponse<Goal>> {
    owned_goal(&state, &auth, goal_id).await?;
    let goal = Goal::update(&state.store, goal_id, req).await?;
    Ok(ApiResponse::with_message("Goal updated successfully", goal))
}

/// # Errors
///
/// - `403 Forbidden`: goal belongs to another user
/// - `404 Not Found`
pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(goal_id): ApiPath<Uuid>,
) -> ApiResult<ApiResponse<()>> {
    owned_goal(&state, &auth, goal_id).await?;
    Goal::delete(&state.store, goal_id).await?;
    Ok(ApiResponse::message("Goal deleted successfully"))
}
