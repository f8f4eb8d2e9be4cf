/*
 *  Copyright 2025 Vellum Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Schedule records and the next-run interval arithmetic.
//!
//! A schedule describes a recurrence for one notebook: a start time, an
//! interval (`every N months/weeks/days/hours/minutes`), and an optional
//! end time. The computed `next_run` drives the scheduler's due-schedule
//! scan. A notebook may have at most one active schedule (store-enforced).

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The unit of a schedule's recurrence interval.
///
/// Legacy `seconds` intervals are accepted by [`IntervalUnit::parse`] and
/// normalized to minutes (rounded up, minimum 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Months,
    Weeks,
    #[default]
    Days,
    Hours,
    Minutes,
}

impl IntervalUnit {
    /// Parses a unit tag together with its count, normalizing the legacy
    /// `seconds` unit to minutes.
    pub fn parse(unit: &str, number: i64) -> Option<(IntervalUnit, i64)> {
        let number = number.max(1);
        match unit {
            "months" => Some((IntervalUnit::Months, number)),
            "weeks" => Some((IntervalUnit::Weeks, number)),
            "days" => Some((IntervalUnit::Days, number)),
            "hours" => Some((IntervalUnit::Hours, number)),
            "minutes" => Some((IntervalUnit::Minutes, number)),
            "seconds" => Some((IntervalUnit::Minutes, normalize_seconds_to_minutes(number))),
            _ => None,
        }
    }
}

/// Converts a legacy seconds count to whole minutes, rounding up with a
/// minimum of 1.
pub fn normalize_seconds_to_minutes(seconds: i64) -> i64 {
    ((seconds.max(1) + 59) / 60).max(1)
}

/// A schedule record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub notebook_id: Uuid,
    pub name: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub interval_number: i64,
    pub interval_unit: IntervalUnit,
    /// Computed; `None` while the schedule is inactive.
    pub next_run: Option<DateTime<Utc>>,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: i64,
}

impl Schedule {
    /// Adds one interval to `base`.
    ///
    /// Month arithmetic is calendar-aware (Jan 31 + 1 month = Feb 28/29);
    /// all other units are fixed durations.
    pub fn add_interval(&self, base: DateTime<Utc>) -> DateTime<Utc> {
        let number = self.interval_number.max(1);
        match self.interval_unit {
            IntervalUnit::Months => base
                .checked_add_months(Months::new(number as u32))
                .unwrap_or(base),
            IntervalUnit::Weeks => base + Duration::weeks(number),
            IntervalUnit::Days => base + Duration::days(number),
            IntervalUnit::Hours => base + Duration::hours(number),
            IntervalUnit::Minutes => base + Duration::minutes(number),
        }
    }

    /// Recomputes `next_run` as of `now`.
    ///
    /// Inactive schedules have no next run. A schedule that has never fired
    /// and whose start is now-or-past is stamped with `start_datetime`, so
    /// it is due on any tick at or after its start regardless of when the
    /// stamp was computed; otherwise the next run is one interval after the
    /// base (`last_run`, or `start_datetime` before the first firing).
    pub fn compute_next_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.active {
            return None;
        }
        let base = self.last_run.unwrap_or(self.start_datetime);
        if self.last_run.is_none() && base <= now {
            Some(base)
        } else {
            Some(self.add_interval(base))
        }
    }

    /// True when the schedule should fire at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_run.is_some_and(|next| next <= now)
    }

    /// True when the schedule's end time has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_datetime.is_some_and(|end| end < now)
    }
}

/// Values for creating a schedule record.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub notebook_id: Uuid,
    pub name: Option<String>,
    pub start_datetime: DateTime<Utc>,
    pub end_datetime: Option<DateTime<Utc>>,
    pub interval_number: i64,
    pub interval_unit: IntervalUnit,
    pub active: bool,
}

impl NewSchedule {
    /// A new active schedule starting at `start` and repeating every
    /// `number` `unit`s.
    pub fn new(
        notebook_id: Uuid,
        start: DateTime<Utc>,
        number: i64,
        unit: IntervalUnit,
    ) -> Self {
        Self {
            notebook_id,
            name: None,
            start_datetime: start,
            end_datetime: None,
            interval_number: number.max(1),
            interval_unit: unit,
            active: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule(number: i64, unit: IntervalUnit) -> Schedule {
        Schedule {
            id: Uuid::new_v4(),
            notebook_id: Uuid::new_v4(),
            name: None,
            start_datetime: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            end_datetime: None,
            interval_number: number,
            interval_unit: unit,
            next_run: None,
            active: true,
            last_run: None,
            run_count: 0,
        }
    }

    #[test]
    fn seconds_normalize_to_minutes_rounding_up() {
        assert_eq!(normalize_seconds_to_minutes(90), 2);
        assert_eq!(normalize_seconds_to_minutes(60), 1);
        assert_eq!(normalize_seconds_to_minutes(61), 2);
        assert_eq!(normalize_seconds_to_minutes(1), 1);
        assert_eq!(normalize_seconds_to_minutes(0), 1);
    }

    #[test]
    fn legacy_seconds_unit_parses_as_minutes() {
        assert_eq!(
            IntervalUnit::parse("seconds", 90),
            Some((IntervalUnit::Minutes, 2))
        );
        assert_eq!(
            IntervalUnit::parse("days", 3),
            Some((IntervalUnit::Days, 3))
        );
        assert_eq!(IntervalUnit::parse("fortnights", 1), None);
    }

    #[test]
    fn past_start_without_prior_run_fires_immediately() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut sched = schedule(1, IntervalUnit::Days);
        sched.start_datetime = now - Duration::hours(1);
        assert_eq!(sched.compute_next_run(now), Some(sched.start_datetime));
    }

    #[test]
    fn past_start_stamp_is_stable_across_evaluation_times() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut sched = schedule(1, IntervalUnit::Hours);
        sched.start_datetime = start;
        let early = sched.compute_next_run(start + Duration::minutes(1));
        let late = sched.compute_next_run(start + Duration::days(3));
        assert_eq!(early, late);
        assert!(early.unwrap() <= start + Duration::minutes(1));
    }

    #[test]
    fn future_start_schedules_one_interval_after_start() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut sched = schedule(2, IntervalUnit::Hours);
        sched.start_datetime = now + Duration::hours(1);
        assert_eq!(
            sched.compute_next_run(now),
            Some(sched.start_datetime + Duration::hours(2))
        );
    }

    #[test]
    fn after_firing_next_run_is_one_interval_after_last_run() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut sched = schedule(1, IntervalUnit::Days);
        sched.last_run = Some(now);
        assert_eq!(sched.compute_next_run(now), Some(now + Duration::days(1)));
    }

    #[test]
    fn inactive_schedule_has_no_next_run() {
        let now = Utc::now();
        let mut sched = schedule(1, IntervalUnit::Days);
        sched.active = false;
        assert_eq!(sched.compute_next_run(now), None);
    }

    #[test]
    fn month_arithmetic_clamps_to_end_of_month() {
        let base = Utc.with_ymd_and_hms(2025, 1, 31, 9, 0, 0).unwrap();
        let sched = schedule(1, IntervalUnit::Months);
        assert_eq!(
            sched.add_interval(base),
            Utc.with_ymd_and_hms(2025, 2, 28, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn expiry_and_due_checks() {
        let now = Utc::now();
        let mut sched = schedule(1, IntervalUnit::Minutes);
        sched.next_run = Some(now - Duration::minutes(1));
        assert!(sched.is_due(now));
        sched.end_datetime = Some(now - Duration::minutes(5));
        assert!(sched.is_expired(now));
    }
}
