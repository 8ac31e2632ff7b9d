// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Worker event stream types.
//!
//! This module defines the events the worker runner emits while supervising
//! job processes, consumed by external monitoring/history collaborators.
//!
//! # Events
//!
//! - `run` - A scheduling occurrence has begun
//! - `process.run` - One instance has been spawned
//! - `process.log` - Structured log line relayed from the child
//! - `process.message` - Application-defined message relayed from the child
//! - `process.exit` - The instance has terminated
//!
//! Events for a single `(run_id, instance)` are emitted in strict causal
//! order; no ordering is guaranteed across instances or runs. Delivery is
//! in-process, at-most-once and best-effort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::job::JobId;

/// Unique identifier for one scheduling occurrence.
///
/// Shared by all concurrent instances spawned for that occurrence; the join
/// key external consumers use to group process records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for RunId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for RunId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for RunId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// One running instance of a worker's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProcess {
	pub run_id: RunId,
	/// Instance index, `1..=concurrency`. Stable across restarts of the
	/// slot: a respawned instance keeps its original index.
	pub instance: u32,
	pub pid: Option<u32>,
	pub exit_code: Option<i32>,
}

/// A structured log line relayed from a job process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
	pub level: String,
	pub message: String,
}

impl LogRecord {
	pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			level: level.into(),
			message: message.into(),
		}
	}
}

/// Worker supervision events.
///
/// Each variant corresponds to a specific event type emitted on the worker
/// event bus, in causal order per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum WorkerEvent {
	/// A scheduling occurrence has begun.
	#[serde(rename = "run")]
	Run(RunData),

	/// One instance has been spawned.
	#[serde(rename = "process.run")]
	ProcessRun(ProcessRunData),

	/// Structured log line relayed from the child's IPC channel.
	#[serde(rename = "process.log")]
	ProcessLog(ProcessLogData),

	/// Application-defined message relayed from the child.
	#[serde(rename = "process.message")]
	ProcessMessage(ProcessMessageData),

	/// The instance has terminated.
	#[serde(rename = "process.exit")]
	ProcessExit(ProcessExitData),
}

impl WorkerEvent {
	/// Returns the event type name as a string.
	pub fn event_type(&self) -> &'static str {
		match self {
			WorkerEvent::Run(_) => "run",
			WorkerEvent::ProcessRun(_) => "process.run",
			WorkerEvent::ProcessLog(_) => "process.log",
			WorkerEvent::ProcessMessage(_) => "process.message",
			WorkerEvent::ProcessExit(_) => "process.exit",
		}
	}

	/// The occurrence this event belongs to.
	pub fn run_id(&self) -> RunId {
		match self {
			WorkerEvent::Run(data) => data.run_id,
			WorkerEvent::ProcessRun(data) => data.process.run_id,
			WorkerEvent::ProcessLog(data) => data.process.run_id,
			WorkerEvent::ProcessMessage(data) => data.process.run_id,
			WorkerEvent::ProcessExit(data) => data.process.run_id,
		}
	}

	/// The worker this event belongs to.
	pub fn worker(&self) -> &str {
		match self {
			WorkerEvent::Run(data) => &data.worker,
			WorkerEvent::ProcessRun(data) => &data.worker,
			WorkerEvent::ProcessLog(data) => &data.worker,
			WorkerEvent::ProcessMessage(data) => &data.worker,
			WorkerEvent::ProcessExit(data) => &data.worker,
		}
	}

	/// Creates a new run event.
	pub fn run(worker: impl Into<String>, job_id: JobId, run_id: RunId) -> Self {
		WorkerEvent::Run(RunData {
			worker: worker.into(),
			job_id,
			run_id,
			timestamp: Utc::now(),
		})
	}

	/// Creates a new process.run event.
	pub fn process_run(worker: impl Into<String>, job_id: JobId, process: JobProcess) -> Self {
		WorkerEvent::ProcessRun(ProcessRunData {
			worker: worker.into(),
			job_id,
			process,
			timestamp: Utc::now(),
		})
	}

	/// Creates a new process.log event.
	pub fn process_log(
		worker: impl Into<String>,
		job_id: JobId,
		process: JobProcess,
		record: LogRecord,
	) -> Self {
		WorkerEvent::ProcessLog(ProcessLogData {
			worker: worker.into(),
			job_id,
			process,
			record,
			timestamp: Utc::now(),
		})
	}

	/// Creates a new process.message event.
	pub fn process_message(
		worker: impl Into<String>,
		job_id: JobId,
		process: JobProcess,
		message_name: impl Into<String>,
		message: serde_json::Value,
	) -> Self {
		WorkerEvent::ProcessMessage(ProcessMessageData {
			worker: worker.into(),
			job_id,
			process,
			message_name: message_name.into(),
			message,
			timestamp: Utc::now(),
		})
	}

	/// Creates a new process.exit event.
	pub fn process_exit(worker: impl Into<String>, job_id: JobId, process: JobProcess) -> Self {
		let success = process.exit_code == Some(0);
		WorkerEvent::ProcessExit(ProcessExitData {
			worker: worker.into(),
			job_id,
			process,
			success,
			timestamp: Utc::now(),
		})
	}
}

/// Data for the run event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunData {
	pub worker: String,
	pub job_id: JobId,
	pub run_id: RunId,
	pub timestamp: DateTime<Utc>,
}

/// Data for the process.run event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessRunData {
	pub worker: String,
	pub job_id: JobId,
	pub process: JobProcess,
	pub timestamp: DateTime<Utc>,
}

/// Data for the process.log event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessLogData {
	pub worker: String,
	pub job_id: JobId,
	pub process: JobProcess,
	pub record: LogRecord,
	pub timestamp: DateTime<Utc>,
}

/// Data for the process.message event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessMessageData {
	pub worker: String,
	pub job_id: JobId,
	pub process: JobProcess,
	pub message_name: String,
	pub message: serde_json::Value,
	pub timestamp: DateTime<Utc>,
}

/// Data for the process.exit event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessExitData {
	pub worker: String,
	pub job_id: JobId,
	pub process: JobProcess,
	/// `true` exactly when the exit code is 0. A signal-killed child has no
	/// exit code and classifies as failure.
	pub success: bool,
	pub timestamp: DateTime<Utc>,
}
