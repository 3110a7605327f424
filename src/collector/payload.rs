use crate::analyzer::categorizer::normalize_domain;
use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use url::Url;

/// Upload body sent by the desktop tracker agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerUpload {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub all_windows: Vec<WindowUsage>,
    #[serde(default)]
    pub idle_states: Vec<UsageSession>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowUsage {
    #[serde(default)]
    pub id: Option<i64>,
    pub first_used: String,
    #[serde(default)]
    pub last_used: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub session: Vec<UsageSession>,
    #[serde(default)]
    pub total_usage: i64,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSession {
    #[serde(default)]
    pub duration: i64,
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    App(String),
    Website(String),
    Away,
}

#[derive(Debug, Clone)]
pub struct UsageSpan {
    pub started_at: NaiveDateTime,
    pub ended_at: NaiveDateTime,
    pub duration_sec: i64,
    pub subject: Subject,
    pub window_title: Option<String>,
    pub is_active: bool,
}

const CLOCK_FORMATS: [&str; 4] = ["%I:%M:%S %p", "%H:%M:%S", "%I:%M %p", "%H:%M"];
const MAX_REPORTED_SECONDS: i64 = 24 * 60 * 60;

pub fn parse_clock(raw: &str) -> Result<NaiveTime> {
    let value = raw.trim().to_uppercase();

    CLOCK_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&value, format).ok())
        .with_context(|| format!("Invalid time: {raw}. Example: 12:45:44 PM or 12:45:44"))
}

impl TrackerUpload {
    pub fn upload_date(&self, now: NaiveDateTime) -> NaiveDate {
        self.date.unwrap_or_else(|| now.date())
    }

    /// Validates the upload and flattens it into one span per foreground interval.
    pub fn normalize(&self, now: NaiveDateTime) -> Result<Vec<UsageSpan>> {
        if self.all_windows.is_empty() && self.idle_states.is_empty() {
            bail!("Upload contains no windows or idle states");
        }

        let date = self.upload_date(now);

        let windows = self
            .all_windows
            .iter()
            .map(|window| window.spans(date, now))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten();

        let idle = self
            .idle_states
            .iter()
            .map(|state| -> Result<UsageSpan> {
                let (started_at, ended_at) = state.bounds(date)?;
                Ok(UsageSpan {
                    started_at,
                    ended_at,
                    duration_sec: usage_seconds(state.duration, started_at, ended_at),
                    subject: Subject::Away,
                    window_title: None,
                    is_active: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut spans = windows.chain(idle).collect::<Vec<_>>();
        spans.sort_by_key(|span| span.started_at);

        Ok(spans)
    }
}

impl WindowUsage {
    fn subject(&self) -> Result<Subject> {
        let name = self.name.trim().to_lowercase();
        if name.is_empty() {
            bail!("Window name cannot be blank");
        }

        match self.url.as_deref().map(str::trim).filter(|url| !url.is_empty()) {
            Some(raw) => website_domain(raw).map(Subject::Website),
            None => Ok(Subject::App(name)),
        }
    }

    fn spans(&self, date: NaiveDate, now: NaiveDateTime) -> Result<Vec<UsageSpan>> {
        let subject = self.subject()?;
        let window_title = Some(self.title.trim().to_string()).filter(|title| !title.is_empty());

        check_reported_seconds("totalUsage", self.total_usage)?;
        if self.last_used.trim().is_empty() && !self.is_active {
            bail!(
                "lastUsed cannot be blank when isActive is false (window: {})",
                self.name
            );
        }

        if !self.session.is_empty() {
            let last_index = self.session.len() - 1;
            return self
                .session
                .iter()
                .enumerate()
                .map(|(index, session)| -> Result<UsageSpan> {
                    let (started_at, ended_at) = session.bounds(date)?;
                    Ok(UsageSpan {
                        started_at,
                        ended_at,
                        duration_sec: usage_seconds(session.duration, started_at, ended_at),
                        subject: subject.clone(),
                        window_title: window_title.clone(),
                        is_active: self.is_active && index == last_index,
                    })
                })
                .collect();
        }

        let started_at = date.and_time(parse_clock(&self.first_used)?);
        let ended_at = if self.last_used.trim().is_empty() {
            if now.date() == date && now >= started_at {
                now
            } else {
                end_after(started_at, self.total_usage)?
            }
        } else {
            date.and_time(parse_clock(&self.last_used)?)
        };

        if ended_at < started_at {
            bail!(
                "Window {} ends before it starts ({} > {})",
                self.name,
                self.first_used,
                self.last_used
            );
        }

        Ok(vec![UsageSpan {
            started_at,
            ended_at,
            duration_sec: usage_seconds(self.total_usage, started_at, ended_at),
            subject,
            window_title,
            is_active: self.is_active,
        }])
    }
}

impl UsageSession {
    fn bounds(&self, date: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime)> {
        check_reported_seconds("duration", self.duration)?;
        let started_at = date.and_time(parse_clock(&self.start_time)?);
        let ended_at = if self.end_time.trim().is_empty() {
            end_after(started_at, self.duration)?
        } else {
            date.and_time(parse_clock(&self.end_time)?)
        };

        if ended_at < started_at {
            bail!(
                "Interval ends before it starts ({} > {})",
                self.start_time,
                self.end_time
            );
        }

        Ok((started_at, ended_at))
    }
}

fn check_reported_seconds(field: &str, seconds: i64) -> Result<()> {
    if !(0..=MAX_REPORTED_SECONDS).contains(&seconds) {
        bail!("{field} must be between 0 and {MAX_REPORTED_SECONDS} seconds, got {seconds}");
    }
    Ok(())
}

fn end_after(started_at: NaiveDateTime, seconds: i64) -> Result<NaiveDateTime> {
    Duration::try_seconds(seconds)
        .and_then(|elapsed| started_at.checked_add_signed(elapsed))
        .with_context(|| format!("Interval starting at {started_at} cannot last {seconds} seconds"))
}

/// Reported usage when present, otherwise the wall-clock span.
fn usage_seconds(reported: i64, started_at: NaiveDateTime, ended_at: NaiveDateTime) -> i64 {
    if reported > 0 {
        reported
    } else {
        (ended_at - started_at).num_seconds().max(0)
    }
}

fn website_domain(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)
        .or_else(|_| Url::parse(&format!("https://{raw}")))
        .with_context(|| format!("Invalid url: {raw}"))?;

    parsed
        .host_str()
        .map(normalize_domain)
        .filter(|domain| !domain.is_empty())
        .with_context(|| format!("Url has no host: {raw}"))
}
