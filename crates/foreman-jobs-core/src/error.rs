// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for job and worker registration and supervision.

use thiserror::Error;

use crate::job::{JobId, JobKey};

/// Result type for jobs operations.
pub type Result<T> = std::result::Result<T, JobsError>;

/// Errors that can occur in jobs operations.
///
/// Registration variants are configuration errors: they are raised during
/// the application's setup phase and are fatal, the process does not start.
#[derive(Debug, Error)]
pub enum JobsError {
	#[error("duplicate job: {0}")]
	DuplicateJob(JobKey),

	#[error("job not found: {0}")]
	JobNotFound(JobKey),

	#[error("job id not found: {0}")]
	JobIdNotFound(JobId),

	#[error("worker {worker} references unknown job: {job}")]
	UnknownJob { worker: String, job: JobKey },

	#[error("duplicate worker: {0}")]
	DuplicateWorker(String),

	#[error("worker {0}: concurrency must be at least 1")]
	InvalidConcurrency(String),

	#[error("worker not found: {0}")]
	WorkerNotFound(String),

	#[error("invalid cron expression: {0}")]
	InvalidCronExpression(String),

	#[error("cron schedule has no future occurrence: {0}")]
	ScheduleExhausted(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("internal error: {0}")]
	Internal(String),
}
