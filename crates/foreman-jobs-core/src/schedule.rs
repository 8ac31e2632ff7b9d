// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule parsing and next run calculation for jobs.

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use std::fmt;
use std::str::FromStr;

use crate::error::{JobsError, Result};

/// When a worker's job is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
	/// Periodic: a cron expression (six-field with seconds; five-field
	/// input is normalized).
	Cron(String),
	/// One-shot: fires once immediately at start.
	Now,
	/// Always-on: starts immediately, restarted indefinitely while the
	/// worker is persistent.
	Continuous,
}

/// Convert a 5- or 6-field cron expression to the 7-field format expected
/// by the `cron` crate.
///
/// 5-field format: minute hour day-of-month month day-of-week
/// 6-field format: second minute hour day-of-month month day-of-week
/// 7-field format: adds a trailing year field
///
/// We add "0" for seconds when absent (run at :00 of each minute) and "*"
/// for year (any year).
fn convert_to_cron_crate_format(expression: &str) -> String {
	let field_count = expression.split_whitespace().count();
	match field_count {
		5 => format!("0 {} *", expression),
		6 => format!("{} *", expression),
		// Already extended, or invalid; let the parser decide.
		_ => expression.to_string(),
	}
}

impl Schedule {
	/// Parse the configuration form of a schedule: a cron expression
	/// string, the literal `"now"`, or `None` for continuous/always-on.
	///
	/// Cron expressions are validated here so that a bad schedule is a
	/// setup-time configuration error, not a runtime surprise.
	pub fn from_config(value: Option<&str>) -> Result<Self> {
		match value {
			None => Ok(Self::Continuous),
			Some("now") => Ok(Self::Now),
			Some(expression) => {
				let normalized = convert_to_cron_crate_format(expression);
				CronSchedule::from_str(&normalized)
					.map_err(|e| JobsError::InvalidCronExpression(e.to_string()))?;
				Ok(Self::Cron(expression.to_string()))
			}
		}
	}

	/// Calculate the next occurrence after the given time.
	///
	/// Only meaningful for cron schedules; `Now` and `Continuous` trigger
	/// immediately and return `None`.
	pub fn next_after(&self, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
		match self {
			Self::Cron(expression) => {
				let normalized = convert_to_cron_crate_format(expression);
				let schedule = CronSchedule::from_str(&normalized)
					.map_err(|e| JobsError::InvalidCronExpression(e.to_string()))?;
				let next = schedule
					.after(&after)
					.next()
					.ok_or_else(|| JobsError::ScheduleExhausted(expression.clone()))?;
				Ok(Some(next))
			}
			Self::Now | Self::Continuous => Ok(None),
		}
	}

	pub fn is_cron(&self) -> bool {
		matches!(self, Self::Cron(_))
	}
}

impl fmt::Display for Schedule {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Cron(expression) => write!(f, "{}", expression),
			Self::Now => write!(f, "now"),
			Self::Continuous => write!(f, "continuous"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn test_from_config_continuous() {
		assert_eq!(Schedule::from_config(None).unwrap(), Schedule::Continuous);
	}

	#[test]
	fn test_from_config_now() {
		assert_eq!(Schedule::from_config(Some("now")).unwrap(), Schedule::Now);
	}

	#[test]
	fn test_from_config_valid_cron() {
		let schedule = Schedule::from_config(Some("0 0 * * *")).unwrap();
		assert_eq!(schedule, Schedule::Cron("0 0 * * *".to_string()));
	}

	#[test]
	fn test_from_config_invalid_cron() {
		assert!(Schedule::from_config(Some("not a schedule")).is_err());
		assert!(Schedule::from_config(Some("60 0 * * *")).is_err()); // minute > 59
		assert!(Schedule::from_config(Some("* * * *")).is_err()); // missing field
	}

	#[test]
	fn test_next_after_daily_midnight() {
		let schedule = Schedule::from_config(Some("0 0 * * *")).unwrap();

		// 2026-01-19 10:30:00 UTC
		let after = Utc.with_ymd_and_hms(2026, 1, 19, 10, 30, 0).unwrap();
		let next = schedule.next_after(after).unwrap().unwrap();

		assert_eq!(next.date_naive().to_string(), "2026-01-20");
		assert_eq!(next.time().to_string(), "00:00:00");
	}

	#[test]
	fn test_next_after_every_15_minutes() {
		let schedule = Schedule::from_config(Some("*/15 * * * *")).unwrap();

		let after = Utc.with_ymd_and_hms(2026, 1, 19, 10, 32, 0).unwrap();
		let next = schedule.next_after(after).unwrap().unwrap();

		assert_eq!(next.date_naive().to_string(), "2026-01-19");
		assert_eq!(next.time().to_string(), "10:45:00");
	}

	#[test]
	fn test_next_after_six_field_seconds() {
		// Every 10 seconds.
		let schedule = Schedule::from_config(Some("*/10 * * * * *")).unwrap();

		let after = Utc.with_ymd_and_hms(2026, 1, 19, 10, 0, 3).unwrap();
		let next = schedule.next_after(after).unwrap().unwrap();

		assert_eq!(next.time().to_string(), "10:00:10");
	}

	#[test]
	fn test_next_after_immediate_schedules() {
		let now = Utc::now();
		assert_eq!(Schedule::Now.next_after(now).unwrap(), None);
		assert_eq!(Schedule::Continuous.next_after(now).unwrap(), None);
	}

	#[test]
	fn test_display() {
		assert_eq!(Schedule::Cron("0 0 * * *".to_string()).to_string(), "0 0 * * *");
		assert_eq!(Schedule::Now.to_string(), "now");
		assert_eq!(Schedule::Continuous.to_string(), "continuous");
	}
}
