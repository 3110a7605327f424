pub mod queries;

use crate::analyzer::categorizer::ProductivityStatus;
use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityAction {
    Visited,
    Active,
    Away,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Visited => "visited",
            ActivityAction::Active => "active",
            ActivityAction::Away => "away",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityAction {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw {
            "visited" => Ok(Self::Visited),
            "active" => Ok(Self::Active),
            "away" => Ok(Self::Away),
            other => bail!("Unknown activity action: {other}"),
        }
    }
}

impl ToSql for ActivityAction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ActivityAction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: anyhow::Error| FromSqlError::Other(error.into()))
    }
}

impl ToSql for ProductivityStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ProductivityStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: anyhow::Error| FromSqlError::Other(error.into()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EmployeeRow {
    pub id: i64,
    pub employee_id: String,
    pub organization_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub created_at: i64,
}

impl EmployeeRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmployeeInput {
    pub employee_id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
}

impl EmployeeInput {
    /// An employee id must be a single path segment: it names the report directory.
    pub fn validate(&self) -> Result<()> {
        let employee_id = self.employee_id.trim();
        if employee_id.is_empty() {
            bail!("employee_id cannot be blank");
        }
        if employee_id == "." || employee_id == ".." || !employee_id_pattern().is_match(employee_id) {
            bail!("Invalid employee_id: {employee_id}. Allowed characters: A-Z a-z 0-9 . _ -");
        }
        if !self.email.contains('@') {
            bail!("Invalid email: {}", self.email);
        }
        Ok(())
    }
}

fn employee_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._-]+$")
            .unwrap_or_else(|error| panic!("invalid employee id pattern: {error}"))
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackedAppRow {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEventRow {
    pub id: i64,
    pub event_id: String,
    pub employee_id: String,
    pub date: NaiveDate,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub duration_sec: i64,
    pub app_or_website: Option<String>,
    pub window_title: Option<String>,
    pub action: ActivityAction,
    pub category: Option<String>,
    pub productivity_status: ProductivityStatus,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct ActivityEventInput {
    pub employee_id: String,
    pub date: NaiveDate,
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub duration_sec: i64,
    pub app_or_website: Option<String>,
    pub window_title: Option<String>,
    pub action: ActivityAction,
    pub category: Option<String>,
    pub productivity_status: ProductivityStatus,
    pub is_active: bool,
}

impl ActivityEventInput {
    /// One row per employee, start, action and subject; re-uploads update that row.
    fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.employee_id,
            self.started_at.format("%Y-%m-%dT%H:%M:%S"),
            self.action,
            self.app_or_website.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub employee_id: String,
    pub summary_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub last_seen_time: Option<NaiveTime>,
    pub working_time: i64,
    pub productive_time: i64,
    pub non_productive_time: i64,
    pub neutral_time: i64,
    pub away_time: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetaRow {
    pub id: i64,
    pub employee_id: String,
    pub date: String,
    pub generated_at: i64,
    pub md_path: String,
    pub json_path: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    /// Returns `None` when the employee id or email is already registered.
    pub fn insert_employee(&self, input: &EmployeeInput) -> Result<Option<EmployeeRow>> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO employees (employee_id, organization_id, first_name, last_name, email, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    input.employee_id.trim(),
                    input.organization_id.trim(),
                    input.first_name.trim(),
                    input.last_name.trim(),
                    input.email.trim().to_lowercase(),
                    Utc::now().timestamp()
                ],
            )
            .context("Failed to insert employee")?;

        if inserted == 0 {
            return Ok(None);
        }

        self.employee(input.employee_id.trim())
    }

    pub fn employee(&self, employee_id: &str) -> Result<Option<EmployeeRow>> {
        self.conn
            .query_row(
                "SELECT id, employee_id, organization_id, first_name, last_name, email, created_at
                 FROM employees WHERE employee_id = ?1",
                params![employee_id],
                employee_from_row,
            )
            .optional()
            .context("Failed to query employee")
    }

    pub fn list_employees(&self) -> Result<Vec<EmployeeRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, employee_id, organization_id, first_name, last_name, email, created_at
             FROM employees
             ORDER BY employee_id ASC",
        )?;

        let rows = statement
            .query_map([], employee_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list employees")?;

        Ok(rows)
    }

    pub fn tracked_app(&self, name: &str) -> Result<Option<TrackedAppRow>> {
        self.conn
            .query_row(
                "SELECT id, name, category, created_at FROM tracked_apps WHERE name = ?1",
                params![name],
                tracked_app_from_row,
            )
            .optional()
            .context("Failed to query tracked app")
    }

    /// Registers an app seen for the first time; an existing entry keeps its category.
    pub fn register_app(&self, name: &str, category: &str) -> Result<TrackedAppRow> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO tracked_apps (name, category, created_at) VALUES (?1, ?2, ?3)",
                params![name, category, Utc::now().timestamp()],
            )
            .context("Failed to register tracked app")?;

        self.tracked_app(name)?
            .with_context(|| format!("Tracked app vanished after insert: {name}"))
    }

    pub fn set_app_category(&self, name: &str, category: &str) -> Result<TrackedAppRow> {
        self.conn
            .execute(
                "INSERT INTO tracked_apps (name, category, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET category = excluded.category",
                params![name, category, Utc::now().timestamp()],
            )
            .context("Failed to update tracked app category")?;

        self.tracked_app(name)?
            .with_context(|| format!("Tracked app vanished after update: {name}"))
    }

    pub fn list_apps(&self) -> Result<Vec<TrackedAppRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, name, category, created_at FROM tracked_apps ORDER BY name ASC",
        )?;

        let rows = statement
            .query_map([], tracked_app_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list tracked apps")?;

        Ok(rows)
    }

    pub fn upsert_events(&mut self, events: &[ActivityEventInput]) -> Result<Vec<ActivityEventRow>> {
        let transaction = self
            .conn
            .transaction()
            .context("Failed to start transaction")?;

        let stored = events
            .iter()
            .map(|event| {
                let dedup_key = event.dedup_key();
                transaction
                    .execute(
                        "INSERT INTO activity_events (event_id, dedup_key, employee_id, date, started_at, ended_at, duration_sec, app_or_website, window_title, action, category, productivity_status, is_active)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                         ON CONFLICT(dedup_key)
                         DO UPDATE SET ended_at=excluded.ended_at, duration_sec=excluded.duration_sec, window_title=excluded.window_title, category=excluded.category, productivity_status=excluded.productivity_status, is_active=excluded.is_active",
                        params![
                            Uuid::new_v4().to_string(),
                            &dedup_key,
                            &event.employee_id,
                            event.date,
                            event.started_at,
                            event.ended_at,
                            event.duration_sec,
                            &event.app_or_website,
                            &event.window_title,
                            event.action,
                            &event.category,
                            event.productivity_status,
                            event.is_active
                        ],
                    )
                    .context("Failed to store activity event")?;

                transaction
                    .query_row(
                        &format!("{} WHERE dedup_key = ?1", queries::SELECT_EVENT_COLUMNS),
                        params![&dedup_key],
                        event_from_row,
                    )
                    .context("Failed to read back activity event")
            })
            .collect::<Result<Vec<_>>>()?;

        transaction
            .commit()
            .context("Failed to commit activity events")?;

        Ok(stored)
    }

    pub fn events_for_date(&self, employee_id: &str, date: NaiveDate) -> Result<Vec<ActivityEventRow>> {
        self.events_between(employee_id, date, date)
    }

    pub fn events_between(
        &self,
        employee_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ActivityEventRow>> {
        let mut statement = self.conn.prepare(&format!(
            "{} WHERE employee_id = ?1 AND date >= ?2 AND date <= ?3 ORDER BY started_at ASC, id ASC",
            queries::SELECT_EVENT_COLUMNS
        ))?;

        let rows = statement
            .query_map(params![employee_id, from, to], event_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to query activity events")?;

        Ok(rows)
    }

    pub fn latest_event_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        self.conn
            .query_row(
                "SELECT ended_at FROM activity_events ORDER BY ended_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query latest activity event")
    }

    pub fn cleanup_old_events(&self, today: NaiveDate, retention_days: u32) -> Result<usize> {
        let threshold = today - Duration::days(i64::from(retention_days));

        let deleted = self
            .conn
            .execute(
                "DELETE FROM activity_events WHERE date < ?1",
                params![threshold],
            )
            .context("Failed to clean up old activity events")?;

        Ok(deleted)
    }

    pub fn upsert_summary(&self, summary: &SummaryRow) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO tracker_summaries (employee_id, summary_date, start_time, last_seen_time, working_time, productive_time, non_productive_time, neutral_time, away_time, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(employee_id, summary_date)
                 DO UPDATE SET start_time=excluded.start_time, last_seen_time=excluded.last_seen_time, working_time=excluded.working_time, productive_time=excluded.productive_time, non_productive_time=excluded.non_productive_time, neutral_time=excluded.neutral_time, away_time=excluded.away_time, updated_at=excluded.updated_at",
                params![
                    &summary.employee_id,
                    summary.summary_date,
                    summary.start_time,
                    summary.last_seen_time,
                    summary.working_time,
                    summary.productive_time,
                    summary.non_productive_time,
                    summary.neutral_time,
                    summary.away_time,
                    summary.updated_at
                ],
            )
            .context("Failed to upsert tracker summary")?;

        Ok(())
    }

    pub fn summary(&self, employee_id: &str, date: NaiveDate) -> Result<Option<SummaryRow>> {
        self.conn
            .query_row(
                "SELECT employee_id, summary_date, start_time, last_seen_time, working_time, productive_time, non_productive_time, neutral_time, away_time, updated_at
                 FROM tracker_summaries WHERE employee_id = ?1 AND summary_date = ?2",
                params![employee_id, date],
                |row| {
                    Ok(SummaryRow {
                        employee_id: row.get(0)?,
                        summary_date: row.get(1)?,
                        start_time: row.get(2)?,
                        last_seen_time: row.get(3)?,
                        working_time: row.get(4)?,
                        productive_time: row.get(5)?,
                        non_productive_time: row.get(6)?,
                        neutral_time: row.get(7)?,
                        away_time: row.get(8)?,
                        updated_at: row.get(9)?,
                    })
                },
            )
            .optional()
            .context("Failed to query tracker summary")
    }

    pub fn report_meta(&self, employee_id: &str, date: NaiveDate) -> Result<Option<ReportMetaRow>> {
        self.conn
            .query_row(
                "SELECT id, employee_id, date, generated_at, md_path, json_path
                 FROM reports WHERE employee_id = ?1 AND date = ?2",
                params![employee_id, date],
                report_meta_from_row,
            )
            .optional()
            .context("Failed to query report metadata")
    }

    pub fn latest_report_meta(&self) -> Result<Option<ReportMetaRow>> {
        self.conn
            .query_row(
                "SELECT id, employee_id, date, generated_at, md_path, json_path
                 FROM reports ORDER BY date DESC, generated_at DESC LIMIT 1",
                [],
                report_meta_from_row,
            )
            .optional()
            .context("Failed to query latest report metadata")
    }

    pub fn list_reports(&self, employee_id: &str, limit: usize) -> Result<Vec<ReportMetaRow>> {
        let mut statement = self.conn.prepare(
            "SELECT id, employee_id, date, generated_at, md_path, json_path
             FROM reports
             WHERE employee_id = ?1
             ORDER BY date DESC
             LIMIT ?2",
        )?;

        let rows = statement
            .query_map(params![employee_id, limit as i64], report_meta_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list reports")?;

        Ok(rows)
    }

    pub fn upsert_report_meta(
        &self,
        employee_id: &str,
        date: NaiveDate,
        generated_at: i64,
        md_path: &str,
        json_path: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO reports (employee_id, date, generated_at, md_path, json_path)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(employee_id, date)
                 DO UPDATE SET generated_at=excluded.generated_at, md_path=excluded.md_path, json_path=excluded.json_path",
                params![employee_id, date, generated_at, md_path, json_path],
            )
            .context("Failed to upsert report metadata")?;

        Ok(())
    }
}

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<EmployeeRow> {
    Ok(EmployeeRow {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        organization_id: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn tracked_app_from_row(row: &Row<'_>) -> rusqlite::Result<TrackedAppRow> {
    Ok(TrackedAppRow {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityEventRow> {
    Ok(ActivityEventRow {
        id: row.get(0)?,
        event_id: row.get(1)?,
        employee_id: row.get(2)?,
        date: row.get(3)?,
        started_at: row.get(4)?,
        ended_at: row.get(5)?,
        duration_sec: row.get(6)?,
        app_or_website: row.get(7)?,
        window_title: row.get(8)?,
        action: row.get(9)?,
        category: row.get(10)?,
        productivity_status: row.get(11)?,
        is_active: row.get(12)?,
    })
}

fn report_meta_from_row(row: &Row<'_>) -> rusqlite::Result<ReportMetaRow> {
    Ok(ReportMetaRow {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        date: row.get(2)?,
        generated_at: row.get(3)?,
        md_path: row.get(4)?,
        json_path: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::{ActivityAction, ActivityEventInput, Database, EmployeeInput};
    use crate::analyzer::categorizer::ProductivityStatus;
    use chrono::NaiveDate;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("db").join("test.db")).expect("open db");
        (dir, database)
    }

    fn employee(id: &str, email: &str) -> EmployeeInput {
        EmployeeInput {
            employee_id: id.to_string(),
            organization_id: "org-1".to_string(),
            first_name: "Sam".to_string(),
            last_name: "Rivera".to_string(),
            email: email.to_string(),
        }
    }

    fn event(start: &str, end: &str, app: &str, duration_sec: i64) -> ActivityEventInput {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        ActivityEventInput {
            employee_id: "E-1".to_string(),
            date,
            started_at: date.and_time(start.parse().expect("start")),
            ended_at: date.and_time(end.parse().expect("end")),
            duration_sec,
            app_or_website: Some(app.to_string()),
            window_title: None,
            action: ActivityAction::Active,
            category: Some("development".to_string()),
            productivity_status: ProductivityStatus::Productive,
            is_active: false,
        }
    }

    #[test]
    fn employee_ids_stay_single_path_segments() {
        assert!(employee("E-1", "sam@example.com").validate().is_ok());
        assert!(employee("org.team_7", "sam@example.com").validate().is_ok());
        assert!(employee("../../escaped", "sam@example.com").validate().is_err());
        assert!(employee("..", "sam@example.com").validate().is_err());
        assert!(employee("a/b", "sam@example.com").validate().is_err());
        assert!(employee("  ", "sam@example.com").validate().is_err());
        assert!(employee("E-1", "not-an-email").validate().is_err());
    }

    #[test]
    fn duplicate_employee_is_rejected() {
        let (_dir, database) = open();

        let first = database
            .insert_employee(&employee("E-1", "sam@example.com"))
            .expect("insert");
        assert!(first.is_some());

        let same_id = database
            .insert_employee(&employee("E-1", "other@example.com"))
            .expect("insert");
        assert!(same_id.is_none());

        let same_email = database
            .insert_employee(&employee("E-2", "SAM@example.com"))
            .expect("insert");
        assert!(same_email.is_none());
    }

    #[test]
    fn reupload_updates_existing_event() {
        let (_dir, mut database) = open();

        let first = database
            .upsert_events(&[event("09:00:00", "09:10:00", "code", 600)])
            .expect("first upload");
        let second = database
            .upsert_events(&[event("09:00:00", "09:30:00", "code", 1800)])
            .expect("second upload");

        assert_eq!(first[0].event_id, second[0].event_id);

        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        let stored = database.events_for_date("E-1", date).expect("events");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].duration_sec, 1800);
        assert_eq!(stored[0].ended_at.time().to_string(), "09:30:00");
        assert_eq!(stored[0].action, ActivityAction::Active);
    }

    #[test]
    fn registered_app_keeps_category_until_reassigned() {
        let (_dir, database) = open();

        database.register_app("hrmware_v2", "other").expect("register");
        let again = database
            .register_app("hrmware_v2", "development")
            .expect("register again");
        assert_eq!(again.category, "other");

        let updated = database
            .set_app_category("hrmware_v2", "development")
            .expect("reassign");
        assert_eq!(updated.category, "development");
    }

    #[test]
    fn cleanup_removes_events_past_retention() {
        let (_dir, mut database) = open();
        database
            .upsert_events(&[event("09:00:00", "09:10:00", "code", 600)])
            .expect("upload");

        let today = NaiveDate::from_ymd_opt(2026, 12, 31).expect("date");
        assert_eq!(database.cleanup_old_events(today, 365).expect("keep"), 0);
        assert_eq!(database.cleanup_old_events(today, 30).expect("purge"), 1);
    }
}
