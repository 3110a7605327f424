//! Time bar construction.
//!
//! Raw events overlap (an agent reports every window it saw, with first/last use),
//! so the bar is built from elementary slices between every start/end instant.
//! Each slice is owned by one event: away wins, otherwise the most recently
//! started window. Adjacent slices with the same status are merged.

use crate::analyzer::categorizer::ProductivityStatus;
use crate::analyzer::duration::TimeAmount;
use crate::db::{ActivityAction, ActivityEventRow};
use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Both bounds or neither; `start` must not be after `end`.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), Some(end)) => {
                let start = parse_time_of_day(start)?;
                let end = parse_time_of_day(end)?;
                if start > end {
                    bail!("Please provide valid time_start and time_end arguments");
                }
                Ok(Some(Self { start, end }))
            }
            _ => bail!("Please provide both time_start and time_end arguments if required"),
        }
    }
}

pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    let value = raw.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .with_context(|| format!("Invalid time: {raw}. Example: 09:30:00"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: ProductivityStatus,
}

impl Segment {
    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds().max(0)
    }
}

#[derive(Debug, Clone)]
pub struct Bucket {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub seconds: BTreeMap<ProductivityStatus, i64>,
}

struct Clipped {
    start: NaiveDateTime,
    end: NaiveDateTime,
    status: ProductivityStatus,
    away: bool,
    order: usize,
}

pub fn build_segments(
    events: &[ActivityEventRow],
    date: NaiveDate,
    window: Option<TimeWindow>,
) -> Vec<Segment> {
    let day_start = date.and_time(NaiveTime::MIN);
    let (lower, upper) = match window {
        Some(window) => (date.and_time(window.start), date.and_time(window.end)),
        None => (day_start, day_start + Duration::days(1)),
    };

    let clipped = events
        .iter()
        .enumerate()
        .filter_map(|(order, event)| {
            let start = event.started_at.max(lower);
            let end = event.ended_at.min(upper);
            (start < end).then(|| Clipped {
                start,
                end,
                status: event.productivity_status,
                away: event.action == ActivityAction::Away,
                order,
            })
        })
        .collect::<Vec<_>>();

    let mut points = clipped
        .iter()
        .flat_map(|entry| [entry.start, entry.end])
        .collect::<Vec<_>>();
    points.sort();
    points.dedup();

    let mut segments: Vec<Segment> = Vec::new();

    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let winner = clipped
            .iter()
            .filter(|entry| entry.start <= from && entry.end >= to)
            .max_by_key(|entry| (entry.away, entry.start, entry.order));

        let Some(winner) = winner else {
            continue;
        };

        match segments.last_mut() {
            Some(last) if last.status == winner.status && last.end == from => last.end = to,
            _ => segments.push(Segment {
                start: from,
                end: to,
                status: winner.status,
            }),
        }
    }

    segments
}

pub fn empty_status_map() -> BTreeMap<ProductivityStatus, i64> {
    ProductivityStatus::ALL
        .into_iter()
        .map(|status| (status, 0))
        .collect()
}

/// Cuts the covered span into fixed-width buckets aligned to midnight.
pub fn bucketize(segments: &[Segment], bucket_minutes: u32) -> Vec<Bucket> {
    let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
        return Vec::new();
    };

    let width = i64::from(bucket_minutes.max(1)) * 60;
    let midnight = first.start.date().and_time(NaiveTime::MIN);
    let offset = (first.start - midnight).num_seconds();
    let mut cursor = midnight + Duration::seconds(offset - offset.rem_euclid(width));
    let mut buckets = Vec::new();

    while cursor < last.end {
        let bucket_end = cursor + Duration::seconds(width);
        let mut seconds = empty_status_map();

        segments
            .iter()
            .filter(|segment| segment.start < bucket_end && segment.end > cursor)
            .for_each(|segment| {
                let overlap = (segment.end.min(bucket_end) - segment.start.max(cursor)).num_seconds();
                *seconds.entry(segment.status).or_insert(0) += overlap.max(0);
            });

        buckets.push(Bucket {
            start: cursor,
            end: bucket_end,
            seconds,
        });
        cursor = bucket_end;
    }

    buckets
}

/// `HH:MM:SS` relative to `date`; the following midnight renders as `24:00:00`.
pub fn clock_label(date: NaiveDate, instant: NaiveDateTime) -> String {
    if instant.date() > date && instant.time() == NaiveTime::MIN {
        "24:00:00".to_string()
    } else {
        instant.format("%H:%M:%S").to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeBarSegmentView {
    pub start_time: String,
    pub end_time: String,
    pub duration: TimeAmount,
    pub productivity_status: ProductivityStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeBarBucketView {
    pub start_time: String,
    pub end_time: String,
    pub productivity_status_map: BTreeMap<ProductivityStatus, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeWindowView {
    pub time_start: String,
    pub time_end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeBar {
    pub date: String,
    pub window: Option<TimeWindowView>,
    pub bucket_minutes: u32,
    pub segments: Vec<TimeBarSegmentView>,
    pub buckets: Vec<TimeBarBucketView>,
}

pub fn time_bar(
    date: NaiveDate,
    window: Option<TimeWindow>,
    segments: &[Segment],
    bucket_minutes: u32,
) -> TimeBar {
    let segment_views = segments
        .iter()
        .map(|segment| TimeBarSegmentView {
            start_time: clock_label(date, segment.start),
            end_time: clock_label(date, segment.end),
            duration: TimeAmount::from_signed(segment.seconds()),
            productivity_status: segment.status,
        })
        .collect();

    let bucket_views = bucketize(segments, bucket_minutes)
        .into_iter()
        .map(|bucket| TimeBarBucketView {
            start_time: clock_label(date, bucket.start),
            end_time: clock_label(date, bucket.end),
            productivity_status_map: bucket
                .seconds
                .into_iter()
                .map(|(status, seconds)| (status, seconds.max(0) as u64))
                .collect(),
        })
        .collect();

    TimeBar {
        date: date.format("%Y-%m-%d").to_string(),
        window: window.map(|window| TimeWindowView {
            time_start: window.start.format("%H:%M:%S").to_string(),
            time_end: window.end.format("%H:%M:%S").to_string(),
        }),
        bucket_minutes,
        segments: segment_views,
        buckets: bucket_views,
    }
}
