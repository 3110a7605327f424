pub mod payload;

use crate::analyzer::categorizer::{CategoryRules, ProductivityStatus};
use crate::collector::payload::{Subject, UsageSpan};
use crate::db::{ActivityAction, ActivityEventInput, ActivityEventRow, Database};
use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

/// Resolves the category of an app: registry entry first, then rules, then the default.
/// Apps seen for the first time are registered.
pub fn resolve_app_category(
    database: &Database,
    rules: &CategoryRules,
    default_category: &str,
    app_name: &str,
) -> Result<String> {
    if let Some(app) = database.tracked_app(app_name)? {
        return Ok(app.category);
    }

    let category = rules
        .categorize_app(app_name)
        .unwrap_or_else(|| CategoryRules::normalize_category(default_category));
    let registered = database.register_app(app_name, &category)?;
    debug!(app = app_name, category = %registered.category, "new app registered");

    Ok(registered.category)
}

pub fn classify_spans(
    database: &Database,
    rules: &CategoryRules,
    default_category: &str,
    employee_id: &str,
    date: NaiveDate,
    spans: Vec<UsageSpan>,
) -> Result<Vec<ActivityEventInput>> {
    spans
        .into_iter()
        .map(|span| -> Result<ActivityEventInput> {
            let (action, app_or_website, category, productivity_status) = match span.subject {
                Subject::App(name) => {
                    let category = resolve_app_category(database, rules, default_category, &name)?;
                    let status = rules.status_for_category(&category);
                    (ActivityAction::Active, Some(name), Some(category), status)
                }
                Subject::Website(domain) => {
                    let category = rules.categorize_domain(&domain);
                    let status = rules.status_for_category(&category);
                    (ActivityAction::Visited, Some(domain), Some(category), status)
                }
                Subject::Away => (ActivityAction::Away, None, None, ProductivityStatus::Away),
            };

            Ok(ActivityEventInput {
                employee_id: employee_id.to_string(),
                date,
                started_at: span.started_at,
                ended_at: span.ended_at,
                duration_sec: span.duration_sec,
                app_or_website,
                window_title: span.window_title,
                action,
                category,
                productivity_status,
                is_active: span.is_active,
            })
        })
        .collect()
}

pub fn store_spans(
    database: &mut Database,
    rules: &CategoryRules,
    default_category: &str,
    employee_id: &str,
    date: NaiveDate,
    spans: Vec<UsageSpan>,
) -> Result<Vec<ActivityEventRow>> {
    let events = classify_spans(database, rules, default_category, employee_id, date, spans)?;
    let stored = database.upsert_events(&events)?;

    info!(
        employee = employee_id,
        date = %date,
        stored = stored.len(),
        "activity upload stored"
    );

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::{resolve_app_category, store_spans};
    use crate::analyzer::categorizer::{CategoryRules, ProductivityStatus};
    use crate::collector::payload::TrackerUpload;
    use crate::db::{ActivityAction, Database};
    use chrono::NaiveDate;
    use serde_json::json;

    fn setup() -> (tempfile::TempDir, Database, CategoryRules) {
        let dir = tempfile::tempdir().expect("tempdir");
        let database = Database::open(&dir.path().join("test.db")).expect("open db");
        let rules = CategoryRules::parse(CategoryRules::DEFAULT_JSON).expect("rules");
        (dir, database, rules)
    }

    #[test]
    fn unknown_app_is_registered_with_default_category() {
        let (_dir, database, rules) = setup();

        let category =
            resolve_app_category(&database, &rules, "other", "hrmware_v2").expect("category");
        assert_eq!(category, "other");
        assert!(database.tracked_app("hrmware_v2").expect("query").is_some());

        database
            .set_app_category("hrmware_v2", "development")
            .expect("reassign");
        let category =
            resolve_app_category(&database, &rules, "other", "hrmware_v2").expect("category");
        assert_eq!(category, "development");
    }

    #[test]
    fn upload_is_classified_and_stored() {
        let (_dir, mut database, rules) = setup();
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        let now = date.and_hms_opt(18, 0, 0).expect("now");

        let upload: TrackerUpload = serde_json::from_value(json!({
            "date": "2026-10-19",
            "allWindows": [
                {"firstUsed": "09:00:00 AM", "lastUsed": "10:00:00 AM", "name": "Code", "title": "main.rs", "totalUsage": 3600, "isActive": false},
                {"firstUsed": "10:00:00 AM", "lastUsed": "10:20:00 AM", "name": "Firefox", "title": "YouTube", "url": "https://www.youtube.com/watch?v=1", "totalUsage": 1200, "isActive": false}
            ],
            "idleStates": [{"startTime": "10:20:00 AM", "endTime": "10:30:00 AM", "duration": 600}]
        }))
        .expect("upload");

        let spans = upload.normalize(now).expect("normalize");
        let stored =
            store_spans(&mut database, &rules, "other", "E-1", date, spans).expect("store");

        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].productivity_status, ProductivityStatus::Productive);
        assert_eq!(stored[1].action, ActivityAction::Visited);
        assert_eq!(stored[1].app_or_website.as_deref(), Some("youtube.com"));
        assert_eq!(
            stored[1].productivity_status,
            ProductivityStatus::NonProductive
        );
        assert_eq!(stored[2].action, ActivityAction::Away);
        assert_eq!(stored[2].app_or_website, None);
    }
}
