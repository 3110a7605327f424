use crate::config::parse_hhmm;
use anyhow::{Context, Result, bail};
use chrono::{
    DateTime, Duration as ChronoDuration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone,
    Timelike,
};
use serde::Serialize;
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

/// Daily trigger time of the rollup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupSchedule {
    pub at: NaiveTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollupScheduleView {
    pub rollup_time: String,
    pub cron: String,
    pub next_run: Option<String>,
}

impl RollupSchedule {
    pub fn parse(rollup_time: &str) -> Result<Self> {
        Ok(Self {
            at: parse_hhmm(rollup_time)?,
        })
    }

    /// Daily cron form, `<minute> <hour> * * *`.
    pub fn cron_expression(&self) -> String {
        format!("{} {} * * *", self.at.minute(), self.at.hour())
    }

    pub fn from_cron(cron_expr: &str) -> Result<Self> {
        let fields = cron_expr.split_whitespace().collect::<Vec<_>>();

        if fields.len() != 5 {
            bail!("Invalid cron expression: {cron_expr}. Expected format: '<minute> <hour> * * *'");
        }

        if fields[2..].iter().any(|field| *field != "*") {
            bail!(
                "Unsupported cron expression: {cron_expr}. Only daily format '<minute> <hour> * * *' is supported"
            );
        }

        let minute = fields[0]
            .parse::<u32>()
            .with_context(|| format!("Invalid cron minute: {}", fields[0]))?;
        let hour = fields[1]
            .parse::<u32>()
            .with_context(|| format!("Invalid cron hour: {}", fields[1]))?;

        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .with_context(|| format!("Invalid cron time values: hour={hour}, minute={minute}"))?;

        Ok(Self { at })
    }

    /// First trigger strictly after `now`; a time skipped by a DST jump moves to the next day.
    pub fn next_run_after(&self, now: DateTime<Local>) -> Result<DateTime<Local>> {
        let today = now.date_naive();

        (0..=2)
            .map(|offset| today + ChronoDuration::days(offset))
            .find_map(|day| match Local.from_local_datetime(&day.and_time(self.at)) {
                LocalResult::Single(candidate) if candidate > now => Some(candidate),
                LocalResult::Ambiguous(earliest, _) if earliest > now => Some(earliest),
                _ => None,
            })
            .context("Failed to compute next rollup time")
    }

    pub fn view(&self) -> RollupScheduleView {
        RollupScheduleView {
            rollup_time: self.at.format("%H:%M").to_string(),
            cron: self.cron_expression(),
            next_run: self
                .next_run_after(Local::now())
                .ok()
                .map(|next| next.to_rfc3339()),
        }
    }
}

/// Polls `schedule_provider` so config edits apply without a restart, then runs `task`
/// with the local date at each trigger.
pub async fn run_rollup_scheduler<S, F, Fut>(mut schedule_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<RollupSchedule>,
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged: Option<RollupSchedule> = None;

    loop {
        let schedule = match schedule_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load rollup schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let now = Local::now();
        let delay = match schedule
            .next_run_after(now)
            .and_then(|next| (next - now).to_std().context("Negative rollup delay"))
        {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, cron = %schedule.cron_expression(), "cannot schedule rollup");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if last_logged != Some(schedule) {
            info!(seconds = delay.as_secs(), cron = %schedule.cron_expression(), "next rollup scheduled");
            last_logged = Some(schedule);
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let date = Local::now().date_naive();
        if let Err(error) = task(date).await {
            error!(error = %error, date = %date, "scheduled rollup failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}
