pub mod categorizer;
pub mod duration;
pub mod report;
pub mod summary;
pub mod timeline;

use crate::analyzer::report::{DailyReport, ReportOptions, SavedReport};
use crate::analyzer::timeline::Segment;
use crate::config::Config;
use crate::db::{ActivityEventRow, Database, EmployeeRow, SummaryRow};
use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, Utc};
use tracing::{error, info};

/// One employee's events for one day, with the resolved time bar segments.
pub struct DayActivity {
    pub events: Vec<ActivityEventRow>,
    pub segments: Vec<Segment>,
}

pub fn load_day(database: &Database, employee_id: &str, date: NaiveDate) -> Result<DayActivity> {
    let events = database.events_for_date(employee_id, date)?;
    let segments = timeline::build_segments(&events, date, None);

    Ok(DayActivity { events, segments })
}

/// Recomputes and persists the tracker summary of one day.
pub fn refresh_summary(
    database: &Database,
    employee_id: &str,
    date: NaiveDate,
) -> Result<SummaryRow> {
    let day = load_day(database, employee_id, date)?;
    let row = summary::summarize_day(employee_id, date, &day.segments, Utc::now().timestamp());
    database.upsert_summary(&row)?;

    Ok(row)
}

pub fn generate_and_store_report(
    config: &Config,
    database: &Database,
    employee: &EmployeeRow,
    date: NaiveDate,
) -> Result<(DailyReport, SavedReport)> {
    refresh_summary(database, &employee.employee_id, date)?;

    let day = load_day(database, &employee.employee_id, date)?;
    let options = ReportOptions {
        bucket_minutes: config.time_bar_bucket_minutes,
        website_limit: config.top_websites_limit,
    };
    let report = report::build_daily_report(employee, date, &day.events, &options);
    let saved = report::save_report_files(&report, &config.report_dir)?;

    database.upsert_report_meta(
        &employee.employee_id,
        date,
        Utc::now().timestamp(),
        &saved.markdown_path.display().to_string(),
        &saved.json_path.display().to_string(),
    )?;

    Ok((report, saved))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RollupOutcome {
    pub reports: usize,
    pub failed: usize,
    pub purged: usize,
}

/// Summaries and reports for every employee on `date`, then the retention purge.
pub fn rollup_day(config: &Config, date: NaiveDate) -> Result<RollupOutcome> {
    let database = Database::open(&config.db_path)?;
    let employees = database
        .list_employees()
        .context("Failed to load employees for rollup")?;

    let mut outcome = RollupOutcome::default();
    for employee in &employees {
        match generate_and_store_report(config, &database, employee, date) {
            Ok(_) => outcome.reports += 1,
            Err(error) => {
                outcome.failed += 1;
                error!(
                    employee = %employee.employee_id,
                    date = %date,
                    error = %error,
                    "rollup failed for employee"
                );
            }
        }
    }

    let today = Local::now().date_naive();
    outcome.purged = database.cleanup_old_events(today, config.retention_days)?;

    info!(
        date = %date,
        reports = outcome.reports,
        failed = outcome.failed,
        purged = outcome.purged,
        "rollup finished"
    );

    Ok(outcome)
}

/// Scheduled rollup: the given day plus the one before it, for late uploads.
pub fn scheduled_rollup(config: &Config, date: NaiveDate) -> Result<RollupOutcome> {
    let previous = rollup_day(config, date - Duration::days(1))?;
    let current = rollup_day(config, date)?;

    Ok(RollupOutcome {
        reports: previous.reports + current.reports,
        failed: previous.failed + current.failed,
        purged: previous.purged + current.purged,
    })
}
