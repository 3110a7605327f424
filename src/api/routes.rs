use crate::analyzer::categorizer::CategoryRules;
use crate::analyzer::summary::{self, LiveFeed, WebsiteVisit};
use crate::analyzer::timeline::{self, TimeBar, TimeWindow, parse_time_of_day};
use crate::analyzer::{self, load_day};
use crate::collector;
use crate::collector::payload::TrackerUpload;
use crate::config::Config;
use crate::db::{ActivityEventRow, Database, EmployeeInput, EmployeeRow, TrackedAppRow};
use crate::scheduler::{RollupSchedule, RollupScheduleView};
use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    /// Where schedule changes are persisted.
    pub config_path: PathBuf,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/employees", get(employee_list).post(employee_create))
        .route("/api/v1/employees/:employee_id/activity", post(activity_upload))
        .route("/api/v1/employees/:employee_id/time-bar", get(time_bar))
        .route("/api/v1/employees/:employee_id/productivity", get(productivity))
        .route("/api/v1/employees/:employee_id/details", get(details))
        .route("/api/v1/employees/:employee_id/weekly", get(weekly))
        .route("/api/v1/employees/:employee_id/live-feed", get(live_feed))
        .route("/api/v1/employees/:employee_id/distribution", get(distribution))
        .route("/api/v1/employees/:employee_id/top-websites", get(top_websites))
        .route("/api/v1/employees/:employee_id/reports", get(report_list))
        .route(
            "/api/v1/employees/:employee_id/reports/:date",
            get(report_by_date),
        )
        .route(
            "/api/v1/employees/:employee_id/reports/:date/markdown",
            get(report_markdown),
        )
        .route("/api/v1/apps", get(apps))
        .route("/api/v1/apps/:name/category", put(app_category_put))
        .route(
            "/api/v1/categories",
            get(categories_get).put(categories_put),
        )
        .route(
            "/api/v1/settings/rollup-schedule",
            get(rollup_schedule_get).put(rollup_schedule_put),
        )
        .with_state(state)
}

/// JSON body whose rejections render as `{"error"}` with 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct ApiJson<T>(T);

#[derive(Debug, Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeBarQuery {
    date: Option<String>,
    time_start: Option<String>,
    time_end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LiveFeedQuery {
    date: Option<String>,
    limit: Option<usize>,
    since: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopWebsitesQuery {
    date: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ReportsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AppCategoryPayload {
    category: String,
}

/// Either an `HH:MM` time or a daily cron expression.
#[derive(Debug, Deserialize)]
struct RollupScheduleUpdatePayload {
    rollup_time: Option<String>,
    cron: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    service: &'static str,
    version: &'static str,
    employees: usize,
    last_event_at: Option<String>,
    latest_report_date: Option<String>,
    rollup_time: String,
    api_port: u16,
}

#[derive(Debug, Serialize)]
struct EmployeesPayload {
    count: usize,
    employees: Vec<EmployeeRow>,
}

#[derive(Debug, Serialize)]
struct UploadPayload {
    employee_id: String,
    date: String,
    stored: usize,
    events: Vec<ActivityEventRow>,
}

#[derive(Debug, Serialize)]
struct TopWebsitesPayload {
    date: String,
    websites: Vec<WebsiteVisit>,
}

#[derive(Debug, Serialize)]
struct ReportsPayload {
    employee_id: String,
    reports: Vec<ReportView>,
}

#[derive(Debug, Serialize)]
struct ReportView {
    date: String,
    generated_at: i64,
    json_url: String,
    markdown_url: String,
}

#[derive(Debug, Serialize)]
struct AppsPayload {
    count: usize,
    apps: Vec<TrackedAppRow>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = Database::open(&state.config.db_path)?;

    let payload = StatusPayload {
        service: "worktrace",
        version: env!("CARGO_PKG_VERSION"),
        employees: database.list_employees()?.len(),
        last_event_at: database
            .latest_event_timestamp()?
            .map(|timestamp| timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()),
        latest_report_date: database.latest_report_meta()?.map(|meta| meta.date),
        rollup_time: state.config.rollup_time.clone(),
        api_port: state.config.api_port,
    };

    Ok(Json(payload))
}

async fn employee_list(State(state): State<ApiState>) -> ApiResult<Json<EmployeesPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let employees = database.list_employees()?;

    Ok(Json(EmployeesPayload {
        count: employees.len(),
        employees,
    }))
}

async fn employee_create(
    State(state): State<ApiState>,
    ApiJson(payload): ApiJson<EmployeeInput>,
) -> ApiResult<(StatusCode, Json<EmployeeRow>)> {
    payload.validate().map_err(ApiError::bad_request)?;

    let database = Database::open(&state.config.db_path)?;
    let employee = database.insert_employee(&payload)?.ok_or_else(|| {
        ApiError::Conflict(format!(
            "Employee already registered: {} / {}",
            payload.employee_id.trim(),
            payload.email.trim()
        ))
    })?;

    Ok((StatusCode::CREATED, Json(employee)))
}

async fn activity_upload(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    ApiJson(upload): ApiJson<TrackerUpload>,
) -> ApiResult<Json<UploadPayload>> {
    let mut database = Database::open(&state.config.db_path)?;
    let employee = require_employee(&database, &employee_id)?;

    let now = Local::now().naive_local();
    let date = upload.upload_date(now);
    let spans = upload.normalize(now).map_err(ApiError::bad_request)?;
    let rules = load_rules(&state.config)?;

    let events = collector::store_spans(
        &mut database,
        &rules,
        &state.config.default_category,
        &employee.employee_id,
        date,
        spans,
    )?;

    Ok(Json(UploadPayload {
        employee_id: employee.employee_id,
        date: date.format("%Y-%m-%d").to_string(),
        stored: events.len(),
        events,
    }))
}

async fn time_bar(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<TimeBarQuery>,
) -> ApiResult<Json<TimeBar>> {
    let date = date_or_today(query.date.as_deref())?;
    let window = TimeWindow::parse(query.time_start.as_deref(), query.time_end.as_deref())
        .map_err(ApiError::bad_request)?;

    let database = Database::open(&state.config.db_path)?;
    require_employee(&database, &employee_id)?;

    let events = database.events_for_date(&employee_id, date)?;
    let segments = timeline::build_segments(&events, date, window);

    Ok(Json(timeline::time_bar(
        date,
        window,
        &segments,
        state.config.time_bar_bucket_minutes,
    )))
}

async fn productivity(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<summary::ProductivityTotalsView>> {
    let date = date_or_today(query.date.as_deref())?;
    let database = Database::open(&state.config.db_path)?;
    require_employee(&database, &employee_id)?;

    let day = load_day(&database, &employee_id, date)?;
    Ok(Json(summary::productivity_totals(date, &day.segments)))
}

async fn details(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<summary::BasicDetails>> {
    let date = date_or_today(query.date.as_deref())?;
    let database = Database::open(&state.config.db_path)?;
    let employee = require_employee(&database, &employee_id)?;

    let row = analyzer::refresh_summary(&database, &employee_id, date)?;
    Ok(Json(summary::basic_details(&employee, &row)))
}

async fn weekly(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<summary::WeeklySummary>> {
    let date = date_or_today(query.date.as_deref())?;
    let database = Database::open(&state.config.db_path)?;
    require_employee(&database, &employee_id)?;

    let (monday, sunday) = summary::week_bounds(date);
    let events = database.events_between(&employee_id, monday, sunday)?;
    let target = state.config.daily_target_seconds()?;

    Ok(Json(summary::weekly_summary(date, &events, target)))
}

async fn live_feed(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<LiveFeedQuery>,
) -> ApiResult<Json<LiveFeed>> {
    let date = date_or_today(query.date.as_deref())?;
    let since = query
        .since
        .as_deref()
        .map(parse_time_of_day)
        .transpose()
        .map_err(ApiError::bad_request)?;
    let limit = query.limit.unwrap_or(state.config.feed_limit).clamp(1, 500);

    let database = Database::open(&state.config.db_path)?;
    require_employee(&database, &employee_id)?;

    let events = database.events_for_date(&employee_id, date)?;
    Ok(Json(summary::live_feed(date, &events, since, limit)))
}

async fn distribution(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<DateQuery>,
) -> ApiResult<Json<summary::ActivityDistribution>> {
    let date = date_or_today(query.date.as_deref())?;
    let database = Database::open(&state.config.db_path)?;
    require_employee(&database, &employee_id)?;

    let day = load_day(&database, &employee_id, date)?;
    Ok(Json(summary::activity_distribution(
        date,
        &day.events,
        &day.segments,
    )))
}

async fn top_websites(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<TopWebsitesQuery>,
) -> ApiResult<Json<TopWebsitesPayload>> {
    let date = date_or_today(query.date.as_deref())?;
    let limit = query
        .limit
        .unwrap_or(state.config.top_websites_limit)
        .clamp(1, 50);

    let database = Database::open(&state.config.db_path)?;
    require_employee(&database, &employee_id)?;

    let events = database.events_for_date(&employee_id, date)?;
    Ok(Json(TopWebsitesPayload {
        date: date.format("%Y-%m-%d").to_string(),
        websites: summary::top_websites(&events, limit),
    }))
}

async fn report_list(
    State(state): State<ApiState>,
    Path(employee_id): Path<String>,
    Query(query): Query<ReportsQuery>,
) -> ApiResult<Json<ReportsPayload>> {
    let limit = query.limit.unwrap_or(7).clamp(1, 90);
    let database = Database::open(&state.config.db_path)?;
    require_employee(&database, &employee_id)?;

    let reports = database
        .list_reports(&employee_id, limit)?
        .into_iter()
        .map(|meta| ReportView {
            json_url: format!("/api/v1/employees/{employee_id}/reports/{}", meta.date),
            markdown_url: format!(
                "/api/v1/employees/{employee_id}/reports/{}/markdown",
                meta.date
            ),
            date: meta.date,
            generated_at: meta.generated_at,
        })
        .collect::<Vec<_>>();

    Ok(Json(ReportsPayload {
        employee_id,
        reports,
    }))
}

async fn report_by_date(
    State(state): State<ApiState>,
    Path((employee_id, date)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let target_date = parse_date(&date).map_err(ApiError::bad_request)?;
    let database = Database::open(&state.config.db_path)?;

    let report_meta = database
        .report_meta(&employee_id, target_date)?
        .ok_or_else(|| missing_report(&employee_id, target_date))?;

    let report = load_json(FsPath::new(&report_meta.json_path))?;
    Ok(Json(report))
}

async fn report_markdown(
    State(state): State<ApiState>,
    Path((employee_id, date)): Path<(String, String)>,
) -> ApiResult<Response> {
    let target_date = parse_date(&date).map_err(ApiError::bad_request)?;
    let database = Database::open(&state.config.db_path)?;

    let report_meta = database
        .report_meta(&employee_id, target_date)?
        .ok_or_else(|| missing_report(&employee_id, target_date))?;

    let markdown = fs::read_to_string(&report_meta.md_path)
        .with_context(|| format!("Failed to read Markdown report: {}", report_meta.md_path))?;

    let mut response = markdown.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/markdown; charset=utf-8"),
    );

    Ok(response)
}

async fn apps(State(state): State<ApiState>) -> ApiResult<Json<AppsPayload>> {
    let database = Database::open(&state.config.db_path)?;
    let apps = database.list_apps()?;

    Ok(Json(AppsPayload {
        count: apps.len(),
        apps,
    }))
}

async fn app_category_put(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    ApiJson(payload): ApiJson<AppCategoryPayload>,
) -> ApiResult<Json<TrackedAppRow>> {
    let category = payload.category.trim().to_lowercase();
    if !CategoryRules::canonical_categories().contains(&category.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unknown category: {}. Expected one of: {}",
            payload.category,
            CategoryRules::canonical_categories().join(", ")
        )));
    }

    let database = Database::open(&state.config.db_path)?;
    let app = database.set_app_category(&name.trim().to_lowercase(), &category)?;

    Ok(Json(app))
}

async fn categories_get(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let path = &state.config.categories_path;
    let content = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Failed to read categories file: {}", path.display()))?
    } else {
        CategoryRules::DEFAULT_JSON.to_string()
    };
    let categories: Value =
        serde_json::from_str(&content).context("Failed to parse categories JSON")?;

    Ok(Json(categories))
}

async fn categories_put(
    State(state): State<ApiState>,
    ApiJson(payload): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let pretty =
        serde_json::to_string_pretty(&payload).context("Failed to serialize categories JSON")?;
    CategoryRules::parse(&pretty)
        .map_err(|error| ApiError::BadRequest(format!("Invalid categories schema: {error:#}")))?;

    let path = &state.config.categories_path;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create categories directory: {}", parent.display()))?;
    }
    fs::write(path, pretty)
        .with_context(|| format!("Failed to save categories file: {}", path.display()))?;

    Ok(Json(json!({
        "saved": true,
        "path": path.display().to_string()
    })))
}

async fn rollup_schedule_get(
    State(state): State<ApiState>,
) -> ApiResult<Json<RollupScheduleView>> {
    let config = current_config(&state);
    let schedule = RollupSchedule::parse(&config.rollup_time)?;

    Ok(Json(schedule.view()))
}

async fn rollup_schedule_put(
    State(state): State<ApiState>,
    ApiJson(payload): ApiJson<RollupScheduleUpdatePayload>,
) -> ApiResult<Json<Value>> {
    let mut config = current_config(&state);
    let normalized_time = match (payload.rollup_time.as_deref(), payload.cron.as_deref()) {
        (Some(time), _) => time.trim().to_string(),
        (None, Some(cron)) => RollupSchedule::from_cron(cron)
            .map_err(ApiError::bad_request)?
            .at
            .format("%H:%M")
            .to_string(),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "Provide rollup_time (HH:MM) or cron".to_string(),
            ));
        }
    };

    config
        .set_value("rollup_time", &normalized_time)
        .map_err(ApiError::bad_request)?;
    config.save_to(&state.config_path)?;

    let schedule = RollupSchedule::parse(&config.rollup_time)?;

    Ok(Json(json!({
        "saved": true,
        "rollup_time": config.rollup_time,
        "cron": schedule.cron_expression()
    })))
}

/// Latest saved config, falling back to the one the server started with.
fn current_config(state: &ApiState) -> Config {
    Config::load_from(&state.config_path).unwrap_or_else(|_| state.config.as_ref().clone())
}

fn load_rules(config: &Config) -> Result<CategoryRules> {
    if config.categories_path.exists() {
        CategoryRules::load(&config.categories_path)
    } else {
        CategoryRules::parse(CategoryRules::DEFAULT_JSON)
    }
}

fn require_employee(database: &Database, employee_id: &str) -> ApiResult<EmployeeRow> {
    database
        .employee(employee_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Unknown employee: {employee_id}")))
}

fn missing_report(employee_id: &str, date: NaiveDate) -> ApiError {
    ApiError::NotFound(format!(
        "No report found for employee {employee_id} on {date}"
    ))
}

fn date_or_today(raw: Option<&str>) -> ApiResult<NaiveDate> {
    raw.map(parse_date)
        .transpose()
        .map(|date| date.unwrap_or_else(|| Local::now().date_naive()))
        .map_err(ApiError::bad_request)
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date format: {input}. Example: 2026-10-19"))
}

fn load_json(path: &FsPath) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report JSON file: {}", path.display()))?;

    let payload = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse report JSON file: {}", path.display()))?;

    Ok(payload)
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn bad_request(error: anyhow::Error) -> Self {
        Self::BadRequest(format!("{error:#}"))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Internal(error) => {
                tracing::error!(error = %format!("{error:#}"), "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiState, router};
    use crate::analyzer;
    use crate::config::Config;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use http::{Method, Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    struct Harness {
        dir: tempfile::TempDir,
        config: Config,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let config = Config::with_root(dir.path());
            config.ensure_bootstrap_files().expect("bootstrap");
            Self { dir, config }
        }

        fn app(&self) -> Router {
            router(ApiState {
                config: Arc::new(self.config.clone()),
                config_path: self.dir.path().join("config.json"),
            })
        }

        async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let request = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(body) => request
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string())),
                None => request.body(Body::empty()),
            }
            .expect("request");

            let response = self.app().oneshot(request).await.expect("response");
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX)
                .await
                .expect("body");
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, value)
        }

        async fn register(&self, employee_id: &str, email: &str) -> StatusCode {
            let body = json!({
                "employee_id": employee_id,
                "first_name": "Dana",
                "last_name": "Kim",
                "email": email
            });
            self.call(Method::POST, "/api/v1/employees", Some(body))
                .await
                .0
        }

        async fn upload_sample(&self) -> (StatusCode, Value) {
            let body = json!({
                "date": "2026-10-19",
                "allWindows": [
                    {"firstUsed": "09:00:00 AM", "lastUsed": "10:00:00 AM", "name": "Code", "title": "main.rs", "totalUsage": 3600, "isActive": false},
                    {"firstUsed": "10:00:00 AM", "lastUsed": "10:30:00 AM", "name": "Firefox", "title": "YouTube", "url": "https://www.youtube.com/watch?v=1", "totalUsage": 1800, "isActive": false},
                    {"firstUsed": "10:40:00 AM", "lastUsed": "11:00:00 AM", "name": "Firefox", "title": "docs", "url": "https://github.com/rust-lang", "totalUsage": 1200, "isActive": false}
                ],
                "idleStates": [{"startTime": "10:30:00 AM", "endTime": "10:40:00 AM", "duration": 600}]
            });
            self.call(
                Method::POST,
                "/api/v1/employees/E-1/activity",
                Some(body),
            )
            .await
        }
    }

    #[tokio::test]
    async fn duplicate_employee_is_a_conflict() {
        let harness = Harness::new();
        assert_eq!(harness.register("E-1", "dana@example.com").await, StatusCode::CREATED);
        assert_eq!(harness.register("E-1", "other@example.com").await, StatusCode::CONFLICT);
        assert_eq!(harness.register("E-2", "DANA@example.com").await, StatusCode::CONFLICT);
        assert_eq!(harness.register("E-3", "not-an-email").await, StatusCode::BAD_REQUEST);

        let (status, body) = harness.call(Method::GET, "/api/v1/employees", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn upload_feeds_every_dashboard_view() {
        let harness = Harness::new();
        harness.register("E-1", "dana@example.com").await;

        let (status, body) = harness.upload_sample().await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stored"], 4);

        let (status, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/productivity?date=2026-10-19", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["productive"]["seconds"], 4800);
        assert_eq!(body["non_productive"]["seconds"], 1800);
        assert_eq!(body["away"]["seconds"], 600);
        assert_eq!(body["working"]["display"], "1h 50m");

        let (_, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/time-bar?date=2026-10-19", None)
            .await;
        let segments = body["segments"].as_array().expect("segments");
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[2]["productivity_status"], "away");

        let (_, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/details?date=2026-10-19", None)
            .await;
        assert_eq!(body["start_time"], "09:00:00");
        assert_eq!(body["last_seen_time"], "11:00:00");

        let (_, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/top-websites?date=2026-10-19&limit=1", None)
            .await;
        assert_eq!(body["websites"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["websites"][0]["domain"], "youtube.com");

        let (_, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/live-feed?date=2026-10-19&limit=2", None)
            .await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["entries"][1]["app_or_website"], "github.com");

        let (_, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/weekly?date=2026-10-21", None)
            .await;
        assert_eq!(body["days"]["monday"]["working_time"]["seconds"], 6600);
        assert_eq!(body["days"]["tuesday"]["working_time"]["seconds"], 0);

        let (_, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/distribution?date=2026-10-19", None)
            .await;
        assert_eq!(body["top_apps"][0]["name"], "code");
    }

    #[tokio::test]
    async fn reupload_does_not_duplicate_events() {
        let harness = Harness::new();
        harness.register("E-1", "dana@example.com").await;

        harness.upload_sample().await;
        harness.upload_sample().await;

        let (_, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/live-feed?date=2026-10-19", None)
            .await;
        assert_eq!(body["count"], 4);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let harness = Harness::new();
        harness.register("E-1", "dana@example.com").await;

        let (status, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/time-bar?time_start=10:00:00", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error").contains("time_start and time_end"));

        let (status, _) = harness
            .call(Method::GET, "/api/v1/employees/E-1/productivity?date=19-10-2026", None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .call(Method::GET, "/api/v1/employees/E-404/details", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let body = json!({
            "allWindows": [{"firstUsed": "09:00:00 AM", "lastUsed": "", "name": "Code", "isActive": false}]
        });
        let (status, body) = harness
            .call(Method::POST, "/api/v1/employees/E-1/activity", Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error").contains("lastUsed"));

        let body = json!({
            "allWindows": [{"lastUsed": "09:10:00 AM", "name": "Code", "isActive": false}]
        });
        let (status, body) = harness
            .call(Method::POST, "/api/v1/employees/E-1/activity", Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error").contains("firstUsed"));

        let body = json!({
            "date": "2026-13-40",
            "allWindows": [{"firstUsed": "09:00:00 AM", "lastUsed": "09:10:00 AM", "name": "Code"}]
        });
        let (status, body) = harness
            .call(Method::POST, "/api/v1/employees/E-1/activity", Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let body = json!({
            "idleStates": [{"startTime": "10:00:00 AM", "endTime": "", "duration": 9_000_000_000_000_000_000i64}]
        });
        let (status, body) = harness
            .call(Method::POST, "/api/v1/employees/E-1/activity", Some(body))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().expect("error").contains("duration"));
    }

    #[tokio::test]
    async fn employee_ids_must_be_path_safe() {
        let harness = Harness::new();

        assert_eq!(
            harness.register("../../escaped", "dana@example.com").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(harness.register("..", "dana@example.com").await, StatusCode::BAD_REQUEST);
        assert_eq!(harness.register("E 1", "dana@example.com").await, StatusCode::BAD_REQUEST);
        assert_eq!(harness.register("E-1.a_b", "dana@example.com").await, StatusCode::CREATED);

        let (_, body) = harness.call(Method::GET, "/api/v1/employees", None).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn app_category_and_rules_can_be_changed() {
        let harness = Harness::new();

        let (status, body) = harness
            .call(
                Method::PUT,
                "/api/v1/apps/hrmware_v2/category",
                Some(json!({"category": "development"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["category"], "development");

        let (status, _) = harness
            .call(
                Method::PUT,
                "/api/v1/apps/hrmware_v2/category",
                Some(json!({"category": "gaming"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .call(
                Method::PUT,
                "/api/v1/categories",
                Some(json!({"apps": {}, "domains": {}, "productivity": {"development": "sleepy"}})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .call(
                Method::PUT,
                "/api/v1/categories",
                Some(json!({"apps": {"code": "development"}, "domains": {}, "productivity": {"development": "productive"}})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = harness.call(Method::GET, "/api/v1/categories", None).await;
        assert_eq!(body["productivity"]["development"], "productive");
    }

    #[tokio::test]
    async fn rollup_schedule_is_persisted() {
        let harness = Harness::new();

        let (status, body) = harness
            .call(
                Method::PUT,
                "/api/v1/settings/rollup-schedule",
                Some(json!({"rollup_time": "22:15"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cron"], "15 22 * * *");

        let (_, body) = harness
            .call(Method::GET, "/api/v1/settings/rollup-schedule", None)
            .await;
        assert_eq!(body["rollup_time"], "22:15");

        let (status, body) = harness
            .call(
                Method::PUT,
                "/api/v1/settings/rollup-schedule",
                Some(json!({"cron": "5 6 * * *"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rollup_time"], "06:05");

        let (status, _) = harness
            .call(
                Method::PUT,
                "/api/v1/settings/rollup-schedule",
                Some(json!({"rollup_time": "25:00"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reports_are_served_after_rollup() {
        let harness = Harness::new();
        harness.register("E-1", "dana@example.com").await;
        harness.upload_sample().await;

        let (status, _) = harness
            .call(Method::GET, "/api/v1/employees/E-1/reports/2026-10-19", None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let date = chrono::NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        analyzer::rollup_day(&harness.config, date).expect("rollup");

        let (status, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/reports", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reports"][0]["date"], "2026-10-19");

        let (status, body) = harness
            .call(Method::GET, "/api/v1/employees/E-1/reports/2026-10-19", None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["employee_id"], "E-1");

        let request = Request::builder()
            .uri("/api/v1/employees/E-1/reports/2026-10-19/markdown")
            .body(Body::empty())
            .expect("request");
        let response = harness.app().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/markdown; charset=utf-8"
        );
    }
}
