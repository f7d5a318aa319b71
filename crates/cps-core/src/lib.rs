//! # cps-core
//!
//! Domain model, working-calendar arithmetic, and the error type shared by
//! every stage of the cps critical-path scheduling engine.
//!
//! This crate has no I/O and no process-wide state: `Calendar` and the data
//! types below are plain values, and every operation is a pure function of
//! its inputs.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration as ChronoDuration, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Task and dependency identifiers are small integers throughout the core.
pub type Id = i64;

/// Threshold below which a working-hour quantity is treated as zero.
pub const EPSILON_HOURS: f64 = 1e-9;

/// Threshold below which total float is treated as zero (critical).
pub const EPSILON_FLOAT_HOURS: f64 = 1e-4;

pub const DEFAULT_WORKDAY_START_HOUR: u32 = 8;
pub const DEFAULT_WORKDAY_END_HOUR: u32 = 17;

/// Errors raised by the core. Every variant here is fail-fast: the caller
/// gets back an `Err` rather than a partially computed schedule.
///
/// `MissingPredecessor` and `CycleDetected` are deliberately absent — they
/// are soft diagnostics carried on `ScheduleResult` (see
/// [`DependencyIssue`] and [`CycleResolution`]), never raised as errors.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("no tasks were supplied for scheduling")]
    EmptyInput,

    #[error("duplicate task uid: {0}")]
    DuplicateUid(Id),

    #[error("invalid dependency token: {0:?}")]
    InvalidDependencyFormat(String),

    #[error("unsupported dependency relation: {0:?}")]
    UnsupportedRelation(String),

    #[error("topological sort failed to order all tasks after cycle breaking (internal inconsistency)")]
    TopoFailure,

    #[error("invalid calendar configuration: {0}")]
    InvalidCalendar(String),
}

/// The four precedence relation types, FS being the implicit default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationType {
    FinishToStart,
    StartToStart,
    FinishToFinish,
    StartToFinish,
}

impl Default for RelationType {
    fn default() -> Self {
        Self::FinishToStart
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::FinishToStart => "FS",
            Self::StartToStart => "SS",
            Self::FinishToFinish => "FF",
            Self::StartToFinish => "SF",
        };
        f.write_str(code)
    }
}

impl FromStr for RelationType {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "FS" => Ok(Self::FinishToStart),
            "SS" => Ok(Self::StartToStart),
            "FF" => Ok(Self::FinishToFinish),
            "SF" => Ok(Self::StartToFinish),
            other => Err(ScheduleError::UnsupportedRelation(other.to_string())),
        }
    }
}

/// The four supported date-constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    MustStartOn,
    StartNoEarlierThan,
    MustFinishOn,
    FinishNoEarlierThan,
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::MustStartOn => "MSO",
            Self::StartNoEarlierThan => "SNET",
            Self::MustFinishOn => "MFO",
            Self::FinishNoEarlierThan => "FNET",
        };
        f.write_str(code)
    }
}

impl ConstraintType {
    /// Parses a constraint type. An unrecognized string is not an error:
    /// per the error-handling contract, an unknown constraint is simply
    /// ignored, so this returns `None` rather than `Result`.
    pub fn parse_lenient(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MSO" | "MUST_START_ON" => Some(Self::MustStartOn),
            "SNET" | "START_NO_EARLIER_THAN" => Some(Self::StartNoEarlierThan),
            "MFO" | "MUST_FINISH_ON" => Some(Self::MustFinishOn),
            "FNET" | "FINISH_NO_EARLIER_THAN" => Some(Self::FinishNoEarlierThan),
            _ => None,
        }
    }
}

/// A single typed precedence edge pointing at a predecessor task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencySpec {
    pub predecessor_uid: Id,
    pub relation_type: RelationType,
    pub lag_days: f64,
}

impl DependencySpec {
    pub fn new(predecessor_uid: Id, relation_type: RelationType, lag_days: f64) -> Self {
        Self {
            predecessor_uid,
            relation_type,
            lag_days,
        }
    }
}

impl PartialEq for DependencySpec {
    fn eq(&self, other: &Self) -> bool {
        self.predecessor_uid == other.predecessor_uid
            && self.relation_type == other.relation_type
            && (self.lag_days - other.lag_days).abs() < EPSILON_HOURS
    }
}

/// Input task definition. Immutable from the caller's perspective: the
/// graph normalizer works on a defensive clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub uid: Id,
    pub name: String,
    pub duration_days: f64,
    pub dependencies: Vec<DependencySpec>,
    pub is_milestone: bool,
    pub outline_level: Option<i32>,
    pub constraint_type: Option<ConstraintType>,
    pub constraint_date: Option<NaiveDateTime>,
    pub calendar_name: Option<String>,
    pub original_start: Option<NaiveDateTime>,
    pub original_finish: Option<NaiveDateTime>,
}

impl TaskSpec {
    pub fn new(uid: Id, name: impl Into<String>, duration_days: f64) -> Self {
        Self {
            uid,
            name: name.into(),
            duration_days,
            dependencies: Vec::new(),
            is_milestone: duration_days.abs() < EPSILON_HOURS,
            outline_level: None,
            constraint_type: None,
            constraint_date: None,
            calendar_name: None,
            original_start: None,
            original_finish: None,
        }
    }

    pub fn depends_on(mut self, dependency: DependencySpec) -> Self {
        self.dependencies.push(dependency);
        self
    }
}

/// A task after the forward/backward pass has placed it in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub spec: TaskSpec,
    pub earliest_start: NaiveDateTime,
    pub earliest_finish: NaiveDateTime,
    pub latest_start: NaiveDateTime,
    pub latest_finish: NaiveDateTime,
    pub total_float_hours: f64,
}

impl ScheduledTask {
    pub fn is_critical(&self) -> bool {
        self.total_float_hours.abs() < EPSILON_FLOAT_HOURS
    }
}

/// A predecessor reference that pointed at a task not present in the input
/// set. Non-fatal: the dependency is pruned and this is recorded instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyIssue {
    pub task_uid: Id,
    pub dependency: DependencySpec,
    pub reason: String,
}

impl DependencyIssue {
    pub fn formatted(&self) -> String {
        format!(
            "task {} references missing predecessor {} ({})",
            self.task_uid, self.dependency.predecessor_uid, self.reason
        )
    }
}

/// One back-edge removed while breaking a dependency cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResolution {
    pub cycle_task_uids: Vec<Id>,
    pub removed_from_task_uid: Id,
    pub removed_dependency: DependencySpec,
}

impl CycleResolution {
    pub fn formatted_cycle(&self) -> String {
        self.cycle_task_uids
            .iter()
            .map(Id::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// One row of the schedule's flat, adapter-facing projection (see
/// component C7 and the CSV/XLSX output contracts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub uid: Id,
    pub name: String,
    pub earliest_start: NaiveDateTime,
    pub earliest_finish: NaiveDateTime,
    pub latest_start: NaiveDateTime,
    pub latest_finish: NaiveDateTime,
    pub total_float_hours: f64,
    pub is_critical: bool,
    pub duration_days: f64,
    pub is_milestone: bool,
    pub constraint_type: Option<ConstraintType>,
    pub constraint_date: Option<NaiveDateTime>,
}

/// The full output of `calculate_schedule`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub project_start: NaiveDateTime,
    pub project_finish: NaiveDateTime,
    pub tasks: Vec<ScheduledTask>,
    pub cycle_resolutions: Vec<CycleResolution>,
    pub dependency_issues: Vec<DependencyIssue>,
}

impl ScheduleResult {
    /// Tasks lying on at least one critical chain, in topological order.
    pub fn critical_path(&self) -> Vec<&ScheduledTask> {
        self.tasks.iter().filter(|t| t.is_critical()).collect()
    }

    /// Flat row projection used by the CSV/XLSX adapters.
    pub fn to_rows(&self) -> Vec<ScheduleRow> {
        self.tasks
            .iter()
            .map(|t| ScheduleRow {
                uid: t.spec.uid,
                name: t.spec.name.clone(),
                earliest_start: t.earliest_start,
                earliest_finish: t.earliest_finish,
                latest_start: t.latest_start,
                latest_finish: t.latest_finish,
                total_float_hours: t.total_float_hours,
                is_critical: t.is_critical(),
                duration_days: t.spec.duration_days,
                is_milestone: t.spec.is_milestone,
                constraint_type: t.spec.constraint_type,
                constraint_date: t.spec.constraint_date,
            })
            .collect()
    }
}

fn weekday_index(day: Weekday) -> u32 {
    day.num_days_from_monday()
}

/// Parses a weekend specification from either numeric weekday strings
/// (`"0"`..`"6"`, Monday-indexed) or day names/abbreviations. An empty
/// slice defaults to Saturday/Sunday.
pub fn parse_weekend(tokens: &[String]) -> Result<HashSet<Weekday>, ScheduleError> {
    if tokens.is_empty() {
        return Ok(HashSet::from([Weekday::Sat, Weekday::Sun]));
    }
    let mut days = HashSet::new();
    for token in tokens {
        let trimmed = token.trim();
        if let Ok(index) = trimmed.parse::<u32>() {
            let day = weekday_from_monday_index(index).ok_or_else(|| {
                ScheduleError::InvalidCalendar(format!("invalid weekday index: {trimmed}"))
            })?;
            days.insert(day);
            continue;
        }
        let day = match trimmed.to_ascii_lowercase().as_str() {
            "mon" | "monday" => Weekday::Mon,
            "tue" | "tues" | "tuesday" => Weekday::Tue,
            "wed" | "wednesday" => Weekday::Wed,
            "thu" | "thur" | "thursday" => Weekday::Thu,
            "fri" | "friday" => Weekday::Fri,
            "sat" | "saturday" => Weekday::Sat,
            "sun" | "sunday" => Weekday::Sun,
            other => {
                return Err(ScheduleError::InvalidCalendar(format!(
                    "unrecognized weekend day: {other:?}"
                )))
            }
        };
        days.insert(day);
    }
    Ok(days)
}

fn weekday_from_monday_index(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Working-time calendar: a single workday window plus a set of weekend
/// days. See SPEC_FULL.md §4.1 for the arithmetic this implements.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub weekend_days: HashSet<Weekday>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new(
            NaiveTime::from_hms_opt(DEFAULT_WORKDAY_START_HOUR, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(DEFAULT_WORKDAY_END_HOUR, 0, 0).unwrap(),
            HashSet::from([Weekday::Sat, Weekday::Sun]),
        )
        .expect("default calendar window is always valid")
    }
}

impl Calendar {
    pub fn new(
        workday_start: NaiveTime,
        workday_end: NaiveTime,
        weekend_days: HashSet<Weekday>,
    ) -> Result<Self, ScheduleError> {
        if workday_end <= workday_start {
            return Err(ScheduleError::InvalidCalendar(format!(
                "workday end ({workday_end}) must be after workday start ({workday_start})"
            )));
        }
        Ok(Self {
            workday_start,
            workday_end,
            weekend_days,
        })
    }

    pub fn hours_per_day(&self) -> f64 {
        (self.workday_end - self.workday_start).num_seconds() as f64 / 3600.0
    }

    pub fn is_working_day(&self, date: chrono::NaiveDate) -> bool {
        !self.weekend_days.contains(&date.weekday())
    }

    fn next_working_date(&self, date: chrono::NaiveDate) -> chrono::NaiveDate {
        let mut next = date.succ_opt().expect("date overflow");
        while !self.is_working_day(next) {
            next = next.succ_opt().expect("date overflow");
        }
        next
    }

    fn previous_working_date(&self, date: chrono::NaiveDate) -> chrono::NaiveDate {
        let mut prev = date.pred_opt().expect("date underflow");
        while !self.is_working_day(prev) {
            prev = prev.pred_opt().expect("date underflow");
        }
        prev
    }

    /// Aligns `t` forward to the nearest valid "start of work" instant.
    pub fn align_start(&self, t: NaiveDateTime) -> NaiveDateTime {
        let date = t.date();
        if !self.is_working_day(date) {
            return self.next_working_date(date).and_time(self.workday_start);
        }
        let time = t.time();
        if time >= self.workday_end {
            return self.next_working_date(date).and_time(self.workday_start);
        }
        if time < self.workday_start {
            return date.and_time(self.workday_start);
        }
        t
    }

    /// Aligns `t` backward to the nearest valid "end of work" instant.
    pub fn align_finish(&self, t: NaiveDateTime) -> NaiveDateTime {
        let date = t.date();
        if !self.is_working_day(date) {
            return self.previous_working_date(date).and_time(self.workday_end);
        }
        let time = t.time();
        if time > self.workday_end {
            return date.and_time(self.workday_end);
        }
        if time < self.workday_start {
            return date.and_time(self.workday_start);
        }
        t
    }

    /// Adds `days` working days (fractional) to `t`.
    pub fn add_work_duration(&self, t: NaiveDateTime, days: f64) -> NaiveDateTime {
        self.add_work_hours(t, days * self.hours_per_day())
    }

    /// Adds `hours` working hours to `t`, skipping non-working time.
    pub fn add_work_hours(&self, t: NaiveDateTime, hours: f64) -> NaiveDateTime {
        if hours < 0.0 {
            return self.subtract_work_hours(t, -hours);
        }
        let mut current = self.align_start(t);
        if hours < EPSILON_HOURS {
            return current;
        }
        let mut remaining = hours;
        loop {
            let day_end = current.date().and_time(self.workday_end);
            let available_hours = (day_end - current).num_seconds().max(0) as f64 / 3600.0;
            if remaining <= available_hours + EPSILON_HOURS {
                let delta = ChronoDuration::seconds((remaining * 3600.0).round() as i64);
                return current + delta;
            }
            remaining -= available_hours;
            current = self
                .next_working_date(current.date())
                .and_time(self.workday_start);
        }
    }

    /// Subtracts `days` working days (fractional) from `t`.
    pub fn subtract_work_duration(&self, t: NaiveDateTime, days: f64) -> NaiveDateTime {
        self.subtract_work_hours(t, days * self.hours_per_day())
    }

    /// Subtracts `hours` working hours from `t`, skipping non-working time.
    pub fn subtract_work_hours(&self, t: NaiveDateTime, hours: f64) -> NaiveDateTime {
        if hours < 0.0 {
            return self.add_work_hours(t, -hours);
        }
        let mut current = self.align_finish(t);
        if hours < EPSILON_HOURS {
            return current;
        }
        let mut remaining = hours;
        loop {
            let day_start = current.date().and_time(self.workday_start);
            let available_hours = (current - day_start).num_seconds().max(0) as f64 / 3600.0;
            if remaining <= available_hours + EPSILON_HOURS {
                let delta = ChronoDuration::seconds((remaining * 3600.0).round() as i64);
                return current - delta;
            }
            remaining -= available_hours;
            current = self
                .previous_working_date(current.date())
                .and_time(self.workday_end);
        }
    }

    /// Working hours elapsed between two instants, >= 0.
    pub fn work_hours_between(&self, start: NaiveDateTime, finish: NaiveDateTime) -> f64 {
        if finish <= start {
            return 0.0;
        }
        let aligned_start = self.align_start(start);
        let aligned_finish = self.align_finish(finish);
        if aligned_finish <= aligned_start {
            return 0.0;
        }
        if aligned_start.date() == aligned_finish.date() {
            return (aligned_finish - aligned_start).num_seconds() as f64 / 3600.0;
        }
        let first_day_end = aligned_start.date().and_time(self.workday_end);
        let first_day_hours = (first_day_end - aligned_start).num_seconds() as f64 / 3600.0;
        let last_day_start = aligned_finish.date().and_time(self.workday_start);
        let last_day_hours = (aligned_finish - last_day_start).num_seconds() as f64 / 3600.0;

        let first_intervening = self.next_working_date(aligned_start.date());
        let last_intervening = self.previous_working_date(aligned_finish.date());
        let intervening_days = if first_intervening > last_intervening {
            0
        } else {
            self.count_working_days_inclusive(first_intervening, last_intervening)
        };

        first_day_hours + intervening_days as f64 * self.hours_per_day() + last_day_hours
    }

    /// Counts working days in `[from, to]` inclusive using the
    /// `full_weeks * working_days_per_week + remainder` identity.
    fn count_working_days_inclusive(&self, from: chrono::NaiveDate, to: chrono::NaiveDate) -> i64 {
        let total_days = (to - from).num_days() + 1;
        let working_days_per_week = 7 - self.weekend_days.len() as i64;
        let full_weeks = total_days / 7;
        let remainder_days = total_days % 7;
        let mut count = full_weeks * working_days_per_week;
        let mut cursor = from + ChronoDuration::days(full_weeks * 7);
        for _ in 0..remainder_days {
            if self.is_working_day(cursor) {
                count += 1;
            }
            cursor = cursor.succ_opt().expect("date overflow");
        }
        count
    }

    pub fn describe(&self) -> String {
        let mut days: Vec<Weekday> = self.weekend_days.iter().copied().collect();
        days.sort_by_key(|d| weekday_index(*d));
        let names: Vec<&str> = days
            .iter()
            .map(|d| match d {
                Weekday::Mon => "Mon",
                Weekday::Tue => "Tue",
                Weekday::Wed => "Wed",
                Weekday::Thu => "Thu",
                Weekday::Fri => "Fri",
                Weekday::Sat => "Sat",
                Weekday::Sun => "Sun",
            })
            .collect();
        format!(
            "{}-{} workday, weekend: {}",
            self.workday_start.format("%H:%M"),
            self.workday_end.format("%H:%M"),
            names.join("/")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn align_start_idempotent() {
        let cal = Calendar::default();
        let t = dt(2024, 6, 3, 10, 0);
        assert_eq!(cal.align_start(cal.align_start(t)), cal.align_start(t));
    }

    #[test]
    fn align_start_weekend_lands_on_monday() {
        let cal = Calendar::default();
        let saturday = dt(2024, 6, 1, 10, 0);
        let aligned = cal.align_start(saturday);
        assert_eq!(aligned, dt(2024, 6, 3, 8, 0));
    }

    #[test]
    fn add_work_hours_round_trip() {
        let cal = Calendar::default();
        let start = dt(2024, 6, 3, 8, 0);
        let later = cal.add_work_hours(start, 10.0);
        assert_eq!(cal.work_hours_between(start, later), 10.0);
    }

    #[test]
    fn add_work_duration_skips_weekend() {
        let cal = Calendar::default();
        let friday_start = dt(2024, 5, 31, 8, 0);
        let finish = cal.add_work_duration(friday_start, 1.0);
        assert_eq!(finish, dt(2024, 5, 31, 17, 0));
        let next_start = cal.align_start(finish);
        assert_eq!(next_start, dt(2024, 6, 3, 8, 0));
    }

    #[test]
    fn subtract_then_add_returns_aligned_start() {
        let cal = Calendar::default();
        let t = dt(2024, 6, 5, 8, 0);
        let forward = cal.add_work_hours(t, 6.0);
        let back = cal.subtract_work_hours(forward, 6.0);
        assert_eq!(back, cal.align_start(t));
    }

    #[test]
    fn work_hours_between_same_day() {
        let cal = Calendar::default();
        let a = dt(2024, 6, 3, 9, 0);
        let b = dt(2024, 6, 3, 12, 0);
        assert_eq!(cal.work_hours_between(a, b), 3.0);
    }

    #[test]
    fn work_hours_between_spans_weekend() {
        let cal = Calendar::default();
        let friday = dt(2024, 5, 31, 8, 0);
        let monday = dt(2024, 6, 3, 17, 0);
        assert_eq!(cal.work_hours_between(friday, monday), 18.0);
    }

    #[test]
    fn invalid_calendar_rejects_inverted_window() {
        let err = Calendar::new(
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            HashSet::new(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn parse_weekend_defaults_to_weekend() {
        let days = parse_weekend(&[]).unwrap();
        assert_eq!(days, HashSet::from([Weekday::Sat, Weekday::Sun]));
    }

    #[test]
    fn parse_weekend_accepts_names_and_numbers() {
        let days = parse_weekend(&["Friday".to_string(), "6".to_string()]).unwrap();
        assert_eq!(days, HashSet::from([Weekday::Fri, Weekday::Sun]));
    }

    #[test]
    fn parse_weekend_rejects_unknown_token() {
        assert!(parse_weekend(&["blursday".to_string()]).is_err());
    }

    #[test]
    fn dependency_equality_uses_lag_tolerance() {
        let a = DependencySpec::new(1, RelationType::FinishToStart, 1.0);
        let b = DependencySpec::new(1, RelationType::FinishToStart, 1.0 + 1e-12);
        assert_eq!(a, b);
    }

    #[test]
    fn relation_type_parses_case_insensitively_and_defaults() {
        assert_eq!("fs".parse::<RelationType>().unwrap(), RelationType::FinishToStart);
        assert_eq!("".parse::<RelationType>().unwrap(), RelationType::FinishToStart);
        assert!("xx".parse::<RelationType>().is_err());
    }
}
