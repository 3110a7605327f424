pub const CREATE_EMPLOYEES: &str = r#"
CREATE TABLE IF NOT EXISTS employees (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  employee_id     TEXT NOT NULL UNIQUE,
  organization_id TEXT NOT NULL,
  first_name      TEXT NOT NULL,
  last_name       TEXT NOT NULL,
  email           TEXT NOT NULL UNIQUE,
  created_at      INTEGER NOT NULL
);
"#;

pub const CREATE_TRACKED_APPS: &str = r#"
CREATE TABLE IF NOT EXISTS tracked_apps (
  id         INTEGER PRIMARY KEY AUTOINCREMENT,
  name       TEXT NOT NULL UNIQUE,
  category   TEXT NOT NULL DEFAULT 'other',
  created_at INTEGER NOT NULL
);
"#;

pub const CREATE_ACTIVITY_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS activity_events (
  id                  INTEGER PRIMARY KEY AUTOINCREMENT,
  event_id            TEXT NOT NULL UNIQUE,
  dedup_key           TEXT NOT NULL UNIQUE,
  employee_id         TEXT NOT NULL,
  date                TEXT NOT NULL,
  started_at          TEXT NOT NULL,
  ended_at            TEXT NOT NULL,
  duration_sec        INTEGER NOT NULL DEFAULT 0,
  app_or_website      TEXT,
  window_title        TEXT,
  action              TEXT NOT NULL,
  category            TEXT,
  productivity_status TEXT NOT NULL DEFAULT 'neutral',
  is_active           INTEGER NOT NULL DEFAULT 0
);
"#;

pub const CREATE_TRACKER_SUMMARIES: &str = r#"
CREATE TABLE IF NOT EXISTS tracker_summaries (
  id                  INTEGER PRIMARY KEY AUTOINCREMENT,
  employee_id         TEXT NOT NULL,
  summary_date        TEXT NOT NULL,
  start_time          TEXT,
  last_seen_time      TEXT,
  working_time        INTEGER NOT NULL DEFAULT 0,
  productive_time     INTEGER NOT NULL DEFAULT 0,
  non_productive_time INTEGER NOT NULL DEFAULT 0,
  neutral_time        INTEGER NOT NULL DEFAULT 0,
  away_time           INTEGER NOT NULL DEFAULT 0,
  updated_at          INTEGER NOT NULL,
  UNIQUE (employee_id, summary_date)
);
"#;

pub const CREATE_REPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
  id           INTEGER PRIMARY KEY AUTOINCREMENT,
  employee_id  TEXT NOT NULL,
  date         TEXT NOT NULL,
  generated_at INTEGER NOT NULL,
  md_path      TEXT NOT NULL,
  json_path    TEXT NOT NULL,
  UNIQUE (employee_id, date)
);
"#;

pub const INDEX_ACTIVITY_EVENTS_EMPLOYEE_DATE: &str = "CREATE INDEX IF NOT EXISTS idx_activity_events_employee_date ON activity_events(employee_id, date);";

pub const INDEX_TRACKER_SUMMARIES_EMPLOYEE_DATE: &str = "CREATE INDEX IF NOT EXISTS idx_tracker_summaries_employee_date ON tracker_summaries(employee_id, summary_date);";

pub const INDEX_REPORTS_EMPLOYEE_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_reports_employee_date ON reports(employee_id, date);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_EMPLOYEES,
        CREATE_TRACKED_APPS,
        CREATE_ACTIVITY_EVENTS,
        CREATE_TRACKER_SUMMARIES,
        CREATE_REPORTS,
        INDEX_ACTIVITY_EVENTS_EMPLOYEE_DATE,
        INDEX_TRACKER_SUMMARIES_EMPLOYEE_DATE,
        INDEX_REPORTS_EMPLOYEE_DATE,
    ]
}

pub const SELECT_EVENT_COLUMNS: &str = "SELECT id, event_id, employee_id, date, started_at, ended_at, duration_sec, app_or_website, window_title, action, category, productivity_status, is_active FROM activity_events";
