use crate::analyzer::categorizer::{CategoryRules, ProductivityStatus};
use crate::analyzer::duration::{TimeAmount, sec_to_min};
use crate::analyzer::timeline::{Segment, build_segments, clock_label};
use crate::db::{ActivityAction, ActivityEventRow, EmployeeRow, SummaryRow};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTotals {
    pub productive: i64,
    pub neutral: i64,
    pub non_productive: i64,
    pub away: i64,
}

impl StatusTotals {
    pub fn from_segments(segments: &[Segment]) -> Self {
        segments.iter().fold(Self::default(), |mut totals, segment| {
            let seconds = segment.seconds();
            match segment.status {
                ProductivityStatus::Productive => totals.productive += seconds,
                ProductivityStatus::Neutral => totals.neutral += seconds,
                ProductivityStatus::NonProductive => totals.non_productive += seconds,
                ProductivityStatus::Away => totals.away += seconds,
            }
            totals
        })
    }

    pub fn get(&self, status: ProductivityStatus) -> i64 {
        match status {
            ProductivityStatus::Productive => self.productive,
            ProductivityStatus::Neutral => self.neutral,
            ProductivityStatus::NonProductive => self.non_productive,
            ProductivityStatus::Away => self.away,
        }
    }

    pub fn working(&self) -> i64 {
        self.productive + self.neutral + self.non_productive
    }

    pub fn tracked(&self) -> i64 {
        self.working() + self.away
    }

    pub fn productivity_ratio(&self) -> f64 {
        percentage(self.productive, self.working())
    }
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 1000.0).round() / 10.0
}

fn date_label(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductivityTotalsView {
    pub date: String,
    pub productive: TimeAmount,
    pub neutral: TimeAmount,
    pub non_productive: TimeAmount,
    pub away: TimeAmount,
    pub working: TimeAmount,
    pub tracked: TimeAmount,
    pub productivity_ratio: f64,
}

pub fn productivity_totals(date: NaiveDate, segments: &[Segment]) -> ProductivityTotalsView {
    let totals = StatusTotals::from_segments(segments);

    ProductivityTotalsView {
        date: date_label(date),
        productive: TimeAmount::from_signed(totals.productive),
        neutral: TimeAmount::from_signed(totals.neutral),
        non_productive: TimeAmount::from_signed(totals.non_productive),
        away: TimeAmount::from_signed(totals.away),
        working: TimeAmount::from_signed(totals.working()),
        tracked: TimeAmount::from_signed(totals.tracked()),
        productivity_ratio: totals.productivity_ratio(),
    }
}

pub fn summarize_day(
    employee_id: &str,
    date: NaiveDate,
    segments: &[Segment],
    updated_at: i64,
) -> SummaryRow {
    let totals = StatusTotals::from_segments(segments);

    SummaryRow {
        employee_id: employee_id.to_string(),
        summary_date: date,
        start_time: segments.first().map(|segment| segment.start.time()),
        last_seen_time: segments.last().map(|segment| {
            if segment.end.date() > date {
                NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
            } else {
                segment.end.time()
            }
        }),
        working_time: totals.working(),
        productive_time: totals.productive,
        non_productive_time: totals.non_productive,
        neutral_time: totals.neutral,
        away_time: totals.away,
        updated_at,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BasicDetails {
    pub employee_id: String,
    pub employee_name: String,
    pub date: String,
    pub start_time: Option<String>,
    pub last_seen_time: Option<String>,
    pub working_time: TimeAmount,
    pub productive_time: TimeAmount,
    pub non_productive_time: TimeAmount,
    pub neutral_time: TimeAmount,
    pub away_time: TimeAmount,
    pub productivity_ratio: f64,
}

pub fn basic_details(employee: &EmployeeRow, summary: &SummaryRow) -> BasicDetails {
    let clock = |time: Option<NaiveTime>| time.map(|value| value.format("%H:%M:%S").to_string());

    BasicDetails {
        employee_id: employee.employee_id.clone(),
        employee_name: employee.full_name(),
        date: date_label(summary.summary_date),
        start_time: clock(summary.start_time),
        last_seen_time: clock(summary.last_seen_time),
        working_time: TimeAmount::from_signed(summary.working_time),
        productive_time: TimeAmount::from_signed(summary.productive_time),
        non_productive_time: TimeAmount::from_signed(summary.non_productive_time),
        neutral_time: TimeAmount::from_signed(summary.neutral_time),
        away_time: TimeAmount::from_signed(summary.away_time),
        productivity_ratio: percentage(summary.productive_time, summary.working_time),
    }
}

/// Monday and Sunday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

/// Mapping keyed by weekday, serialized Monday first.
#[derive(Debug, Clone, Serialize)]
pub struct WeekdayMap<T> {
    pub monday: T,
    pub tuesday: T,
    pub wednesday: T,
    pub thursday: T,
    pub friday: T,
    pub saturday: T,
    pub sunday: T,
}

impl<T> WeekdayMap<T> {
    pub fn from_fn(mut build: impl FnMut(Weekday) -> T) -> Self {
        Self {
            monday: build(Weekday::Mon),
            tuesday: build(Weekday::Tue),
            wednesday: build(Weekday::Wed),
            thursday: build(Weekday::Thu),
            friday: build(Weekday::Fri),
            saturday: build(Weekday::Sat),
            sunday: build(Weekday::Sun),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayRollup {
    pub date: String,
    pub working_time: TimeAmount,
    pub away_time: TimeAmount,
    pub productive_time: TimeAmount,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklySummary {
    pub week_start: String,
    pub week_end: String,
    pub days: WeekdayMap<DayRollup>,
    pub total_working_time: TimeAmount,
    pub total_away_time: TimeAmount,
    pub total_productive_time: TimeAmount,
    pub average_daily_working: TimeAmount,
    pub daily_target: TimeAmount,
    pub target_total: TimeAmount,
    pub difference_seconds: i64,
}

/// `events` must cover the whole week returned by [`week_bounds`].
pub fn weekly_summary(
    date: NaiveDate,
    events: &[ActivityEventRow],
    daily_target_seconds: u64,
) -> WeeklySummary {
    let (monday, sunday) = week_bounds(date);

    let totals = WeekdayMap::from_fn(|weekday| {
        let day = monday + Duration::days(i64::from(weekday.num_days_from_monday()));
        let day_events = events
            .iter()
            .filter(|event| event.date == day)
            .cloned()
            .collect::<Vec<_>>();
        (day, StatusTotals::from_segments(&build_segments(&day_events, day, None)))
    });

    let all_days = [
        totals.monday,
        totals.tuesday,
        totals.wednesday,
        totals.thursday,
        totals.friday,
        totals.saturday,
        totals.sunday,
    ];

    let total_working = all_days.iter().map(|(_, day)| day.working()).sum::<i64>();
    let total_away = all_days.iter().map(|(_, day)| day.away).sum::<i64>();
    let total_productive = all_days.iter().map(|(_, day)| day.productive).sum::<i64>();
    let tracked_days = all_days
        .iter()
        .filter(|(_, day)| day.tracked() > 0)
        .count() as i64;
    let average_daily_working = if tracked_days == 0 {
        0
    } else {
        total_working / tracked_days
    };

    let target_total = daily_target_seconds.saturating_mul(5);
    let days = WeekdayMap::from_fn(|weekday| {
        let (day, day_totals) = all_days[weekday.num_days_from_monday() as usize];
        DayRollup {
            date: date_label(day),
            working_time: TimeAmount::from_signed(day_totals.working()),
            away_time: TimeAmount::from_signed(day_totals.away),
            productive_time: TimeAmount::from_signed(day_totals.productive),
        }
    });

    WeeklySummary {
        week_start: date_label(monday),
        week_end: date_label(sunday),
        days,
        total_working_time: TimeAmount::from_signed(total_working),
        total_away_time: TimeAmount::from_signed(total_away),
        total_productive_time: TimeAmount::from_signed(total_productive),
        average_daily_working: TimeAmount::from_signed(average_daily_working),
        daily_target: TimeAmount::from_seconds(daily_target_seconds),
        target_total: TimeAmount::from_seconds(target_total),
        difference_seconds: total_working - target_total as i64,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedEntry {
    pub time: String,
    pub end_time: String,
    pub app_or_website: Option<String>,
    pub window_title: Option<String>,
    pub action: ActivityAction,
    pub category: Option<String>,
    pub productivity_status: ProductivityStatus,
    pub duration: TimeAmount,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiveFeed {
    pub date: String,
    pub count: usize,
    pub entries: Vec<FeedEntry>,
}

/// Latest `limit` events (optionally from `since` on), oldest first.
pub fn live_feed(
    date: NaiveDate,
    events: &[ActivityEventRow],
    since: Option<NaiveTime>,
    limit: usize,
) -> LiveFeed {
    let mut selected = events
        .iter()
        .filter(|event| since.is_none_or(|since| event.started_at.time() >= since))
        .collect::<Vec<_>>();
    selected.sort_by_key(|event| (event.started_at, event.id));

    let skip = selected.len().saturating_sub(limit);
    let entries = selected
        .into_iter()
        .skip(skip)
        .map(|event| FeedEntry {
            time: clock_label(date, event.started_at),
            end_time: clock_label(date, event.ended_at),
            app_or_website: event.app_or_website.clone(),
            window_title: event.window_title.clone(),
            action: event.action,
            category: event.category.clone(),
            productivity_status: event.productivity_status,
            duration: TimeAmount::from_signed(event.duration_sec),
            is_active: event.is_active,
        })
        .collect::<Vec<_>>();

    LiveFeed {
        date: date_label(date),
        count: entries.len(),
        entries,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareView {
    pub name: String,
    pub duration: TimeAmount,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageMetric {
    pub name: String,
    pub duration: TimeAmount,
    pub minutes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityDistribution {
    pub date: String,
    pub tracked: TimeAmount,
    pub by_status: Vec<ShareView>,
    pub by_category: Vec<ShareView>,
    pub top_apps: Vec<UsageMetric>,
}

pub fn sum_by<F>(events: &[ActivityEventRow], key: F) -> HashMap<String, i64>
where
    F: Fn(&ActivityEventRow) -> Option<String>,
{
    events.iter().fold(HashMap::new(), |mut acc, event| {
        if let Some(name) = key(event) {
            *acc.entry(name).or_insert(0_i64) += event.duration_sec.max(0);
        }
        acc
    })
}

pub fn top_n_metrics(source: HashMap<String, i64>, n: usize) -> Vec<UsageMetric> {
    let mut items = source
        .into_iter()
        .map(|(name, seconds)| (name, seconds.max(0)))
        .collect::<Vec<_>>();

    items.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
    items
        .into_iter()
        .take(n)
        .map(|(name, seconds)| UsageMetric {
            name,
            duration: TimeAmount::from_signed(seconds),
            minutes: sec_to_min(seconds),
        })
        .collect()
}

pub fn activity_distribution(
    date: NaiveDate,
    events: &[ActivityEventRow],
    segments: &[Segment],
) -> ActivityDistribution {
    let totals = StatusTotals::from_segments(segments);

    let by_status = ProductivityStatus::ALL
        .into_iter()
        .map(|status| ShareView {
            name: status.as_str().to_string(),
            duration: TimeAmount::from_signed(totals.get(status)),
            percentage: percentage(totals.get(status), totals.tracked()),
        })
        .collect();

    let category_seconds = sum_by(events, |event| {
        (event.action != ActivityAction::Away).then(|| {
            CategoryRules::normalize_category(event.category.as_deref().unwrap_or("other"))
        })
    });
    let category_total = category_seconds.values().sum::<i64>();

    let mut by_category = CategoryRules::canonical_categories()
        .into_iter()
        .map(|category| {
            let seconds = category_seconds.get(category).copied().unwrap_or_default();
            ShareView {
                name: category.to_string(),
                duration: TimeAmount::from_signed(seconds),
                percentage: percentage(seconds, category_total),
            }
        })
        .collect::<Vec<_>>();
    by_category.sort_by(|left, right| {
        right
            .duration
            .seconds
            .cmp(&left.duration.seconds)
            .then_with(|| left.name.cmp(&right.name))
    });

    let app_seconds = sum_by(events, |event| {
        (event.action == ActivityAction::Active)
            .then(|| event.app_or_website.clone())
            .flatten()
    });

    ActivityDistribution {
        date: date_label(date),
        tracked: TimeAmount::from_signed(totals.tracked()),
        by_status,
        by_category,
        top_apps: top_n_metrics(app_seconds, 5),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebsiteVisit {
    pub domain: String,
    pub category: String,
    pub productivity_status: ProductivityStatus,
    pub visits: usize,
    pub duration: TimeAmount,
}

pub fn top_websites(events: &[ActivityEventRow], limit: usize) -> Vec<WebsiteVisit> {
    let mut grouped: HashMap<&str, WebsiteVisit> = HashMap::new();

    events
        .iter()
        .filter(|event| event.action == ActivityAction::Visited)
        .filter_map(|event| event.app_or_website.as_deref().map(|domain| (domain, event)))
        .for_each(|(domain, event)| {
            let entry = grouped.entry(domain).or_insert_with(|| WebsiteVisit {
                domain: domain.to_string(),
                category: event.category.clone().unwrap_or_else(|| "other".to_string()),
                productivity_status: event.productivity_status,
                visits: 0,
                duration: TimeAmount::from_seconds(0),
            });
            entry.visits += 1;
            entry.duration =
                TimeAmount::from_seconds(entry.duration.seconds + event.duration_sec.max(0) as u64);
        });

    let mut visits = grouped.into_values().collect::<Vec<_>>();
    visits.sort_by(|left, right| {
        right
            .duration
            .seconds
            .cmp(&left.duration.seconds)
            .then_with(|| left.domain.cmp(&right.domain))
    });
    visits.truncate(limit);

    visits
}
