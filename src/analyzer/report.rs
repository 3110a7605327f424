use crate::analyzer::categorizer::ProductivityStatus;
use crate::analyzer::duration::format_duration_seconds;
use crate::analyzer::summary::{
    self, ActivityDistribution, BasicDetails, ProductivityTotalsView, UsageMetric, WebsiteVisit,
};
use crate::analyzer::timeline::{self, TimeBar};
use crate::db::{ActivityEventRow, EmployeeRow};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub employee_id: String,
    pub employee_name: String,
    pub date: String,
    pub generated_at: String,
    pub details: BasicDetails,
    pub totals: ProductivityTotalsView,
    pub distribution: ActivityDistribution,
    pub top_websites: Vec<WebsiteVisit>,
    pub time_bar: TimeBar,
    pub anomalies: Vec<String>,
}

#[derive(Debug)]
pub struct SavedReport {
    pub markdown_path: PathBuf,
    pub json_path: PathBuf,
}

pub struct ReportOptions {
    pub bucket_minutes: u32,
    pub website_limit: usize,
}

pub fn build_daily_report(
    employee: &EmployeeRow,
    date: NaiveDate,
    events: &[ActivityEventRow],
    options: &ReportOptions,
) -> DailyReport {
    let generated_at: DateTime<Utc> = Utc::now();
    let segments = timeline::build_segments(events, date, None);

    let summary_row =
        summary::summarize_day(&employee.employee_id, date, &segments, generated_at.timestamp());
    let details = summary::basic_details(employee, &summary_row);
    let totals = summary::productivity_totals(date, &segments);
    let distribution = summary::activity_distribution(date, events, &segments);
    let top_websites = summary::top_websites(events, options.website_limit);
    let time_bar = timeline::time_bar(date, None, &segments, options.bucket_minutes);
    let anomalies = detect_anomalies(&totals, &top_websites);

    DailyReport {
        employee_id: employee.employee_id.clone(),
        employee_name: employee.full_name(),
        date: date.format("%Y-%m-%d").to_string(),
        generated_at: generated_at.to_rfc3339(),
        details,
        totals,
        distribution,
        top_websites,
        time_bar,
        anomalies,
    }
}

pub fn render_markdown(report: &DailyReport) -> String {
    let details = &report.details;
    let most_used_app = report
        .distribution
        .top_apps
        .first()
        .map(|metric| format!("{} ({})", metric.name, metric.duration.display_text()))
        .unwrap_or_else(|| "None".to_string());

    let status_rows = report
        .distribution
        .by_status
        .iter()
        .map(|share| {
            let label = share
                .name
                .parse::<ProductivityStatus>()
                .map(ProductivityStatus::label)
                .unwrap_or("Unknown");
            format!(
                "| {} | {} | {:.0}% |",
                label,
                share.duration.display_text(),
                share.percentage
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let category_rows = report
        .distribution
        .by_category
        .iter()
        .map(|share| {
            format!(
                "| {} | {} | {:.0}% |",
                category_label(&share.name),
                share.duration.display_text(),
                share.percentage
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let app_rows = list_metrics(&report.distribution.top_apps);
    let website_rows = list_websites(&report.top_websites);

    let bar_rows = if report.time_bar.segments.is_empty() {
        "- No activity".to_string()
    } else {
        report
            .time_bar
            .segments
            .iter()
            .map(|segment| {
                format!(
                    "- {}-{} {} ({})",
                    segment.start_time,
                    segment.end_time,
                    segment.productivity_status.label(),
                    segment.duration.display_text()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let anomaly_rows = if report.anomalies.is_empty() {
        "- No notable anomaly detected".to_string()
    } else {
        report
            .anomalies
            .iter()
            .map(|entry| format!("- {entry}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# Daily Activity Report - {} ({})\n\n## Summary\n- Employee: {}\n- Start time: {}\n- Last seen: {}\n- Working time: {}\n- Away time: {}\n- Productivity ratio: {:.0}%\n- Most used app: {}\n\n## Time by Status\n| Status | Time | Ratio |\n|--------|------|-------|\n{}\n\n## Time by Category\n| Category | Time | Ratio |\n|----------|------|-------|\n{}\n\n## Top Apps (5)\n{}\n\n## Top Websites\n{}\n\n## Time Bar\n{}\n\n## Anomalies\n{}\n",
        report.date,
        report.employee_id,
        report.employee_name,
        details.start_time.as_deref().unwrap_or("-"),
        details.last_seen_time.as_deref().unwrap_or("-"),
        details.working_time.display_text(),
        details.away_time.display_text(),
        details.productivity_ratio,
        most_used_app,
        status_rows,
        category_rows,
        app_rows,
        website_rows,
        bar_rows,
        anomaly_rows
    )
}

/// Writes `<report_dir>/<employee_id>/<date>.{md,json}`.
pub fn save_report_files(report: &DailyReport, report_dir: &Path) -> Result<SavedReport> {
    let employee_dir = report_dir.join(&report.employee_id);
    fs::create_dir_all(&employee_dir).with_context(|| {
        format!(
            "Failed to create report directory: {}",
            employee_dir.display()
        )
    })?;

    let date = report.date.clone();
    let markdown_path = employee_dir.join(format!("{date}.md"));
    let json_path = employee_dir.join(format!("{date}.json"));

    fs::write(&markdown_path, render_markdown(report)).with_context(|| {
        format!(
            "Failed to write Markdown report: {}",
            markdown_path.display()
        )
    })?;

    let json_content =
        serde_json::to_string_pretty(report).context("Failed to serialize report JSON")?;
    fs::write(&json_path, json_content)
        .with_context(|| format!("Failed to write JSON report: {}", json_path.display()))?;

    Ok(SavedReport {
        markdown_path,
        json_path,
    })
}

fn category_label(raw: &str) -> &'static str {
    match raw {
        "development" => "Development",
        "research" => "Research",
        "communication" => "Communication",
        "entertainment" => "Entertainment",
        "sns" => "SNS",
        "shopping" => "Shopping",
        _ => "Other",
    }
}

fn detect_anomalies(totals: &ProductivityTotalsView, top_websites: &[WebsiteVisit]) -> Vec<String> {
    let non_productive_alert = (totals.non_productive.seconds >= 90 * 60).then(|| {
        format!(
            "Non-productive usage is high: {}",
            format_duration_seconds(totals.non_productive.seconds)
        )
    });

    let website_alert = top_websites
        .iter()
        .find(|visit| {
            visit.productivity_status == ProductivityStatus::NonProductive
                && visit.duration.seconds >= 60 * 60
        })
        .map(|visit| {
            format!(
                "{} session was unusually long: {}",
                visit.domain,
                format_duration_seconds(visit.duration.seconds)
            )
        });

    let away_alert = (totals.away.seconds > totals.working.seconds && totals.away.seconds > 0)
        .then(|| "Away time exceeds working time".to_string());

    let low_activity_alert = (totals.tracked.seconds > 0 && totals.working.seconds < 60 * 60)
        .then(|| "Working time is below 1 hour".to_string());

    [non_productive_alert, website_alert, away_alert, low_activity_alert]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
}

fn list_metrics(metrics: &[UsageMetric]) -> String {
    if metrics.is_empty() {
        return "- No data".to_string();
    }

    metrics
        .iter()
        .enumerate()
        .map(|(index, metric)| {
            format!(
                "{}. {} - {}",
                index + 1,
                metric.name,
                metric.duration.display_text()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_websites(visits: &[WebsiteVisit]) -> String {
    if visits.is_empty() {
        return "- No data".to_string();
    }

    visits
        .iter()
        .enumerate()
        .map(|(index, visit)| {
            format!(
                "{}. {} - {} ({} visits, {})",
                index + 1,
                visit.domain,
                visit.duration.display_text(),
                visit.visits,
                visit.productivity_status.label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::{ReportOptions, build_daily_report, render_markdown, save_report_files};
    use crate::analyzer::categorizer::ProductivityStatus;
    use crate::analyzer::timeline::tests::{app, away, day, event_on};
    use crate::db::{ActivityAction, EmployeeRow};

    fn employee() -> EmployeeRow {
        EmployeeRow {
            id: 1,
            employee_id: "E-1".to_string(),
            organization_id: "ORG".to_string(),
            first_name: "Dana".to_string(),
            last_name: "Kim".to_string(),
            email: "dana@example.com".to_string(),
            created_at: 0,
        }
    }

    fn options() -> ReportOptions {
        ReportOptions {
            bucket_minutes: 60,
            website_limit: 10,
        }
    }

    #[test]
    fn report_collects_every_view() {
        let events = vec![
            app("09:00:00", "11:00:00", "code", ProductivityStatus::Productive),
            event_on(
                day(),
                "11:00:00",
                "12:40:00",
                Some("youtube.com"),
                ActivityAction::Visited,
                ProductivityStatus::NonProductive,
                Some("entertainment"),
            ),
            away("12:40:00", "13:00:00"),
        ];

        let report = build_daily_report(&employee(), day(), &events, &options());
        assert_eq!(report.employee_name, "Dana Kim");
        assert_eq!(report.totals.productive.seconds, 2 * 3600);
        assert_eq!(report.top_websites[0].domain, "youtube.com");
        assert_eq!(report.time_bar.segments.len(), 3);
        assert!(
            report
                .anomalies
                .iter()
                .any(|entry| entry.starts_with("Non-productive usage is high"))
        );
        assert!(
            report
                .anomalies
                .iter()
                .any(|entry| entry.starts_with("youtube.com session"))
        );

        let markdown = render_markdown(&report);
        assert!(markdown.starts_with("# Daily Activity Report - 2026-10-19 (E-1)"));
        assert!(markdown.contains("- Working time: 3h 40m"));
        assert!(markdown.contains("| Productive | 2h 0m |"));
        assert!(markdown.contains("- 12:40:00-13:00:00 Away (20m)"));
    }

    #[test]
    fn empty_day_renders_placeholders() {
        let report = build_daily_report(&employee(), day(), &[], &options());
        assert!(report.anomalies.is_empty());

        let markdown = render_markdown(&report);
        assert!(markdown.contains("- Start time: -"));
        assert!(markdown.contains("## Top Apps (5)\n- No data"));
        assert!(markdown.contains("## Time Bar\n- No activity"));
    }

    #[test]
    fn files_land_under_employee_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let events = vec![app("09:00:00", "10:00:00", "code", ProductivityStatus::Productive)];
        let report = build_daily_report(&employee(), day(), &events, &options());

        let saved = save_report_files(&report, dir.path()).expect("save");
        assert_eq!(saved.markdown_path, dir.path().join("E-1").join("2026-10-19.md"));
        assert!(saved.json_path.exists());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&saved.json_path).expect("read"))
                .expect("json");
        assert_eq!(json["details"]["working_time"]["seconds"], 3600);
        assert_eq!(json["time_bar"]["segments"][0]["productivity_status"], "productive");
    }
}
