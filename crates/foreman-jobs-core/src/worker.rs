// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Worker definitions: a supervision policy bound to one job.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::job::Job;

/// What happens when a cron schedule fires while the previous occurrence's
/// instances are still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
	/// Start a new occurrence with an independent run id alongside the old
	/// one.
	Allow,
	/// Drop the tick and log a warning.
	Skip,
}

impl Default for OverlapPolicy {
	fn default() -> Self {
		Self::Allow
	}
}

/// Concurrency and overlap configuration for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOptions {
	/// Number of parallel process instances per occurrence. Must be >= 1.
	pub concurrency: u32,
	pub overlap: OverlapPolicy,
}

impl Default for WorkerOptions {
	fn default() -> Self {
		Self {
			concurrency: 1,
			overlap: OverlapPolicy::default(),
		}
	}
}

/// A supervision unit: one job plus the policy for running it.
///
/// The worker holds a reference to its job; it does not own the job's
/// lifecycle.
#[derive(Debug, Clone)]
pub struct Worker {
	pub name: String,
	pub job: Arc<Job>,
	/// Restart exited instances indefinitely instead of running to
	/// completion.
	pub persistent: bool,
	/// Start automatically when the runner starts, rather than on a manual
	/// trigger.
	pub auto: bool,
	pub options: WorkerOptions,
}

impl Worker {
	pub fn new(name: impl Into<String>, job: Arc<Job>) -> Self {
		Self {
			name: name.into(),
			job,
			persistent: false,
			auto: true,
			options: WorkerOptions::default(),
		}
	}

	pub fn persistent(mut self, persistent: bool) -> Self {
		self.persistent = persistent;
		self
	}

	pub fn auto(mut self, auto: bool) -> Self {
		self.auto = auto;
		self
	}

	pub fn concurrency(mut self, concurrency: u32) -> Self {
		self.options.concurrency = concurrency;
		self
	}

	pub fn overlap(mut self, overlap: OverlapPolicy) -> Self {
		self.options.overlap = overlap;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::{JobCommand, JobKey, JobOptions};
	use crate::schedule::Schedule;

	fn job() -> Arc<Job> {
		Arc::new(Job::new(
			JobKey::new("app", "core", "jobs", "noop"),
			Schedule::Now,
			JobCommand::new("true"),
			JobOptions::default(),
		))
	}

	#[test]
	fn test_worker_defaults() {
		let worker = Worker::new("noop-worker", job());
		assert!(!worker.persistent);
		assert!(worker.auto);
		assert_eq!(worker.options.concurrency, 1);
		assert_eq!(worker.options.overlap, OverlapPolicy::Allow);
	}

	#[test]
	fn test_worker_builder() {
		let worker = Worker::new("hb-worker", job())
			.persistent(true)
			.auto(false)
			.concurrency(4)
			.overlap(OverlapPolicy::Skip);
		assert!(worker.persistent);
		assert!(!worker.auto);
		assert_eq!(worker.options.concurrency, 4);
		assert_eq!(worker.options.overlap, OverlapPolicy::Skip);
	}
}
