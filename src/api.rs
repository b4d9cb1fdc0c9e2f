// Habit Tracker - REST API
// Axum routes over the tracker service; the binary in bin/server.rs serves them

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::admin::{UserDetail, UserSummary};
use crate::db::SqliteStore;
use crate::error::HabitError;
use crate::model::{HabitDetails, HabitUpdate, User};
use crate::stats::{AdminStats, DashboardSummary};
use crate::tracker::{HabitTracker, HabitView, ProgressOutcome};

/// Header carrying the caller's user id
pub const USER_HEADER: &str = "x-user-id";

/// Shared application state
///
/// One mutex around the tracker serializes every fetch-compute-store cycle
/// in this process; the store's revision check covers other writers.
#[derive(Clone)]
pub struct AppState {
    tracker: Arc<Mutex<HabitTracker<SqliteStore>>>,
}

impl AppState {
    pub fn new(tracker: HabitTracker<SqliteStore>) -> Self {
        AppState {
            tracker: Arc::new(Mutex::new(tracker)),
        }
    }

    fn tracker(&self) -> Result<MutexGuard<'_, HabitTracker<SqliteStore>>, ApiError> {
        self.tracker.lock().map_err(|_| ApiError::Poisoned)
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    /// No caller id on the request
    Unauthorized,
    /// A previous request panicked while holding the tracker
    Poisoned,
    Habit(HabitError),
}

impl From<HabitError> for ApiError {
    fn from(err: HabitError) -> Self {
        ApiError::Habit(err)
    }
}

fn status_for(err: &HabitError) -> StatusCode {
    match err {
        HabitError::NotFound(_) => StatusCode::NOT_FOUND,
        HabitError::InvalidValue(_)
        | HabitError::InvalidDate(_)
        | HabitError::KindMismatch { .. } => StatusCode::BAD_REQUEST,
        HabitError::Forbidden(_) => StatusCode::FORBIDDEN,
        HabitError::Conflict(_) => StatusCode::CONFLICT,
        HabitError::MalformedEntry(_)
        | HabitError::Storage(_)
        | HabitError::Serialization(_)
        | HabitError::Export(_)
        | HabitError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                format!("missing {} header", USER_HEADER),
            ),
            ApiError::Poisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "tracker unavailable".to_string(),
            ),
            ApiError::Habit(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    error!(error = %err, "request failed");
                    (status, "internal server error".to_string())
                } else {
                    (status, err.to_string())
                }
            }
        };

        (status, Json(ApiResponse::err(message))).into_response()
    }
}

// ============================================================================
// Caller identity
// ============================================================================

/// User id taken from the `x-user-id` header
pub struct CallerId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| CallerId(id.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    date: String,
}

#[derive(Deserialize)]
pub struct ProgressRequest {
    date: String,
    value: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    habits_removed: Option<usize>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/users - Register a user
async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<User> {
    let user = state.tracker()?.register_user(&req.email, &req.name)?;
    Ok(Json(ApiResponse::ok(user)))
}

/// GET /api/users/me - Caller's profile with XP and level
async fn current_user(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> ApiResult<User> {
    let user = state.tracker()?.user(&user_id)?;
    Ok(Json(ApiResponse::ok(user)))
}

/// GET /api/dashboard - Today's progress summary
async fn dashboard(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> ApiResult<DashboardSummary> {
    let summary = state.tracker()?.dashboard(&user_id)?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// GET /api/habits - Caller's habits with streaks
async fn list_habits(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
) -> ApiResult<Vec<HabitView>> {
    let habits = state.tracker()?.habits(&user_id)?;
    Ok(Json(ApiResponse::ok(habits)))
}

/// POST /api/habits - Create a habit
async fn create_habit(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Json(details): Json<HabitDetails>,
) -> ApiResult<HabitView> {
    let habit = state.tracker()?.create_habit(&user_id, details)?;
    Ok(Json(ApiResponse::ok(habit)))
}

/// PUT /api/habits/:id - Edit descriptive fields and goal, omitted fields are kept
async fn update_habit(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(habit_id): Path<String>,
    Json(update): Json<HabitUpdate>,
) -> ApiResult<HabitView> {
    let habit = state.tracker()?.update_habit(&habit_id, &user_id, update)?;
    Ok(Json(ApiResponse::ok(habit)))
}

/// DELETE /api/habits/:id
async fn delete_habit(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(habit_id): Path<String>,
) -> ApiResult<Deleted> {
    state.tracker()?.delete_habit(&habit_id, &user_id)?;
    Ok(Json(ApiResponse::ok(Deleted {
        deleted: true,
        habits_removed: None,
    })))
}

/// PATCH /api/habits/:id/toggle - Flip a day of a binary habit
async fn toggle_habit(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(habit_id): Path<String>,
    Json(req): Json<ToggleRequest>,
) -> ApiResult<ProgressOutcome> {
    let outcome = state
        .tracker()?
        .toggle_completion(&habit_id, &req.date, &user_id)?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// PATCH /api/habits/:id/progress - Record a quantitative value for a day
async fn set_progress(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path(habit_id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<ProgressOutcome> {
    let outcome = state
        .tracker()?
        .set_progress(&habit_id, &req.date, req.value, &user_id)?;
    Ok(Json(ApiResponse::ok(outcome)))
}

/// DELETE /api/habits/:id/entries/:date - Forget one day
async fn clear_day(
    State(state): State<AppState>,
    CallerId(user_id): CallerId,
    Path((habit_id, date)): Path<(String, String)>,
) -> ApiResult<HabitView> {
    let habit = state.tracker()?.clear_day(&habit_id, &date, &user_id)?;
    Ok(Json(ApiResponse::ok(habit)))
}

/// GET /api/admin/users - All users with habit counts
async fn admin_users(
    State(state): State<AppState>,
    CallerId(admin_id): CallerId,
) -> ApiResult<Vec<UserSummary>> {
    let users = state.tracker()?.admin_list_users(&admin_id)?;
    Ok(Json(ApiResponse::ok(users)))
}

/// GET /api/admin/users/:id - One user with all habits
async fn admin_user(
    State(state): State<AppState>,
    CallerId(admin_id): CallerId,
    Path(user_id): Path<String>,
) -> ApiResult<UserDetail> {
    let detail = state.tracker()?.admin_user_detail(&admin_id, &user_id)?;
    Ok(Json(ApiResponse::ok(detail)))
}

/// DELETE /api/admin/users/:id - Delete a user and their habits
async fn admin_delete_user(
    State(state): State<AppState>,
    CallerId(admin_id): CallerId,
    Path(user_id): Path<String>,
) -> ApiResult<Deleted> {
    let removed = state.tracker()?.admin_delete_user(&admin_id, &user_id)?;
    Ok(Json(ApiResponse::ok(Deleted {
        deleted: true,
        habits_removed: Some(removed),
    })))
}

/// GET /api/admin/stats - Global counters
async fn admin_stats(
    State(state): State<AppState>,
    CallerId(admin_id): CallerId,
) -> ApiResult<AdminStats> {
    let stats = state.tracker()?.admin_stats(&admin_id)?;
    Ok(Json(ApiResponse::ok(stats)))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/users", post(register_user))
        .route("/users/me", get(current_user))
        .route("/dashboard", get(dashboard))
        .route("/habits", get(list_habits).post(create_habit))
        .route("/habits/:id", put(update_habit).delete(delete_habit))
        .route("/habits/:id/toggle", patch(toggle_habit))
        .route("/habits/:id/progress", patch(set_progress))
        .route("/habits/:id/entries/:date", delete(clear_day))
        .route("/admin/users", get(admin_users))
        .route("/admin/users/:id", get(admin_user).delete(admin_delete_user))
        .route("/admin/stats", get(admin_stats));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::parse_day;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TODAY: &str = "2024-01-03";

    fn app_state() -> AppState {
        let tracker = HabitTracker::new(SqliteStore::open_in_memory().unwrap())
            .with_today(parse_day(TODAY).unwrap())
            .with_admin_email("admin@example.com");
        AppState::new(tracker)
    }

    async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(id) = user_id {
            builder = builder.header(USER_HEADER, id);
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

        let response = router(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn patch_as(
        state: &AppState,
        user_id: &str,
        uri: &str,
        body: Value,
    ) -> (StatusCode, Value) {
        send(state, "PATCH", uri, Some(user_id), Some(body)).await
    }

    async fn delete_as(state: &AppState, user_id: &str, uri: &str) -> (StatusCode, Value) {
        send(state, "DELETE", uri, Some(user_id), None).await
    }

    async fn register(state: &AppState, email: &str) -> String {
        let (status, body) = send(
            state,
            "POST",
            "/api/users",
            None,
            Some(json!({"email": email, "name": "Test"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_habit(state: &AppState, user_id: &str, body: Value) -> String {
        let (status, body) = send(state, "POST", "/api/habits", Some(user_id), Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let state = app_state();
        let (status, body) = send(&state, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!("OK"));
    }

    #[tokio::test]
    async fn test_missing_user_header_is_unauthorized() {
        let state = app_state();
        let (status, body) = send(&state, "GET", "/api/habits", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn test_toggle_flow() {
        let state = app_state();
        let user = register(&state, "ada@example.com").await;
        let body = json!({"title": "Meditate", "category": "Mind"});
        let habit = create_habit(&state, &user, body).await;

        let uri = format!("/api/habits/{}/toggle", habit);
        let (status, body) = patch_as(&state, &user, &uri, json!({"date": TODAY})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["habit"]["streak"], json!(1));
        assert_eq!(body["data"]["habit"]["completedToday"], json!(true));
        assert_eq!(body["data"]["user"]["xp"], json!(10));

        let (status, body) = patch_as(&state, &user, &uri, json!({"date": TODAY})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"], Value::Null);
        assert_eq!(body["data"]["habit"]["completedDates"], json!([]));
    }

    #[tokio::test]
    async fn test_progress_flow_and_errors() {
        let state = app_state();
        let user = register(&state, "ada@example.com").await;
        let habit = create_habit(
            &state,
            &user,
            json!({"title": "Push-ups", "isQuantity": true, "goalValue": 10, "unit": "reps"}),
        )
        .await;

        let uri = format!("/api/habits/{}/progress", habit);
        let (_, body) = patch_as(&state, &user, &uri, json!({"date": TODAY, "value": 4})).await;
        assert_eq!(body["data"]["habit"]["todayState"], json!("in_progress"));
        assert_eq!(body["data"]["user"], Value::Null);

        let (_, body) = patch_as(&state, &user, &uri, json!({"date": TODAY, "value": 10})).await;
        assert_eq!(body["data"]["user"]["xp"], json!(10));

        let (status, _) = patch_as(&state, &user, &uri, json!({"date": TODAY, "value": -2})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let bad_date = json!({"date": "tomorrow", "value": 2});
        let (status, _) = patch_as(&state, &user, &uri, bad_date).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let toggle = format!("/api/habits/{}/toggle", habit);
        let (status, _) = patch_as(&state, &user, &toggle, json!({"date": TODAY})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let clear = format!("/api/habits/{}/entries/{}", habit, TODAY);
        let (status, body) = delete_as(&state, &user, &clear).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["completedDates"], json!([]));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_goal() {
        let state = app_state();
        let user = register(&state, "ada@example.com").await;
        let habit = create_habit(
            &state,
            &user,
            json!({"title": "Water", "isQuantity": true, "goalValue": 8, "unit": "glasses"}),
        )
        .await;

        let uri = format!("/api/habits/{}", habit);
        let (status, body) = send(
            &state,
            "PUT",
            &uri,
            Some(&user),
            Some(json!({"title": "Hydrate"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["title"], json!("Hydrate"));
        assert_eq!(body["data"]["isQuantity"], json!(true));
        assert_eq!(body["data"]["goalValue"], json!(8.0));
        assert_eq!(body["data"]["unit"], json!("glasses"));
    }

    #[tokio::test]
    async fn test_foreign_habit_is_not_found() {
        let state = app_state();
        let owner = register(&state, "ada@example.com").await;
        let other = register(&state, "eve@example.com").await;
        let habit = create_habit(&state, &owner, json!({"title": "Run"})).await;

        let uri = format!("/api/habits/{}/toggle", habit);
        let (status, _) = patch_as(&state, &other, &uri, json!({"date": TODAY})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete_as(&state, &other, &format!("/api/habits/{}", habit)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete_as(&state, &owner, &format!("/api/habits/{}", habit)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let state = app_state();
        register(&state, "ada@example.com").await;
        let (status, _) = send(
            &state,
            "POST",
            "/api/users",
            None,
            Some(json!({"email": "ada@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_admin_routes() {
        let state = app_state();
        let admin = register(&state, "admin@example.com").await;
        let user = register(&state, "ada@example.com").await;
        create_habit(&state, &user, json!({"title": "Read"})).await;

        let (status, _) = send(&state, "GET", "/api/admin/stats", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&state, "GET", "/api/admin/stats", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["totalUsers"], json!(2));
        assert_eq!(body["data"]["totalHabits"], json!(1));

        let (_, body) = send(&state, "GET", "/api/admin/users", Some(&admin), None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let uri = format!("/api/admin/users/{}", user);
        let (status, body) = send(&state, "DELETE", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["habitsRemoved"], json!(1));

        let (status, _) = send(&state, "GET", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_and_profile() {
        let state = app_state();
        let user = register(&state, "ada@example.com").await;
        let habit = create_habit(&state, &user, json!({"title": "Stretch"})).await;
        send(
            &state,
            "PATCH",
            &format!("/api/habits/{}/toggle", habit),
            Some(&user),
            Some(json!({"date": TODAY})),
        )
        .await;

        let (_, body) = send(&state, "GET", "/api/dashboard", Some(&user), None).await;
        assert_eq!(body["data"]["completedToday"], json!(1));
        assert_eq!(body["data"]["completionPercent"], json!(100.0));

        let (_, body) = send(&state, "GET", "/api/users/me", Some(&user), None).await;
        assert_eq!(body["data"]["level"], json!(1));
        assert_eq!(body["data"]["xp"], json!(10));
    }
}
