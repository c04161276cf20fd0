//! Timers queued with `at`, one queue letter per job class.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

/// Number of whitespace separated tokens in an `atq` job line:
/// `<id> <weekday> <month> <day> <HH:MM:SS> <year> <queue> <user>`
const ATQ_TOKENS: usize = 8;
const ATQ_TIME_TOKEN: usize = 4;

/// Next run time of each queued job class, if one is queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobQueue {
    /// Queue `s`: stop playback after a delay
    pub stop_after: Option<NaiveTime>,
    /// Queue `t`: shut down after a delay
    pub shutdown_after: Option<NaiveTime>,
    /// Queue `q`: gradual volume reduction before shutdown
    pub shutdown_volume_reduction: Option<NaiveTime>,
    /// Queue `i`: idle shutdown
    pub idle: Option<NaiveTime>,
}

impl JobQueue {
    pub const STOP_AFTER: char = 's';
    pub const SHUTDOWN_AFTER: char = 't';
    pub const SHUTDOWN_VOLUME_REDUCTION: char = 'q';
    pub const IDLE: char = 'i';
}

/// Time of day of the first job listed by `atq -q <letter>`.
#[must_use]
pub fn parse_atq(output: &str) -> Option<NaiveTime> {
    let tokens: Vec<&str> = output.split_whitespace().collect();
    if tokens.len() < ATQ_TOKENS {
        return None;
    }
    NaiveTime::parse_from_str(tokens[ATQ_TIME_TOKEN], "%H:%M:%S").ok()
}

/// Whole minutes from `now` until the job at time of day `at` runs.
///
/// The job is assumed to run today; if that moment has already passed, `now`
/// is moved back one day instead. Jobs queued more than a day ahead are not
/// representable.
// Minute counts stay far below f64 precision limits
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#[must_use]
pub fn minutes_until(now: NaiveDateTime, at: NaiveTime) -> i64 {
    let scheduled = now.date().and_time(at);
    let reference = if now > scheduled {
        now - TimeDelta::days(1)
    } else {
        now
    };

    let seconds = (scheduled - reference).num_milliseconds() as f64 / 1000.0;
    (seconds / 60.0).round_ties_even() as i64
}
