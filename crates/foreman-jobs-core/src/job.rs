// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job definitions: identity, composite registry key and the executable
//! command a job instance runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::schedule::Schedule;

/// Unique identifier for a job, generated at creation and stable for the
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for JobId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for JobId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Composite registry key for a job.
///
/// A job name must be unique within its `(application, app, controller)`
/// scope; registering the same key twice is a configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
	pub application: String,
	pub app: String,
	pub controller: String,
	pub name: String,
}

impl JobKey {
	pub fn new(
		application: impl Into<String>,
		app: impl Into<String>,
		controller: impl Into<String>,
		name: impl Into<String>,
	) -> Self {
		Self {
			application: application.into(),
			app: app.into(),
			controller: controller.into(),
			name: name.into(),
		}
	}
}

impl fmt::Display for JobKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}.{}.{}.{}",
			self.application, self.app, self.controller, self.name
		)
	}
}

/// The executable invocation a job instance runs in its child process.
///
/// Work crosses a process boundary, so the unit of work is described as a
/// command, not a closure. The command's program and environment are never
/// exposed through introspection (the environment may carry secrets).
#[derive(Debug, Clone)]
pub struct JobCommand {
	pub program: String,
	pub args: Vec<String>,
	pub env: Vec<(String, String)>,
	pub current_dir: Option<PathBuf>,
}

impl JobCommand {
	pub fn new(program: impl Into<String>) -> Self {
		Self {
			program: program.into(),
			args: Vec::new(),
			env: Vec::new(),
			current_dir: None,
		}
	}

	pub fn arg(mut self, arg: impl Into<String>) -> Self {
		self.args.push(arg.into());
		self
	}

	pub fn args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.push((key.into(), value.into()));
		self
	}

	pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.current_dir = Some(dir.into());
		self
	}
}

/// Free-form configuration attached to a job at registration time.
#[derive(Debug, Clone, Default)]
pub struct JobOptions(pub serde_json::Map<String, serde_json::Value>);

impl JobOptions {
	pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
		self.0.get(key)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl From<serde_json::Map<String, serde_json::Value>> for JobOptions {
	fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
		Self(map)
	}
}

/// A named, schedulable unit of work.
///
/// Created during a controller's setup phase and never mutated afterwards;
/// lives in the job registry for the application's lifetime.
#[derive(Debug, Clone)]
pub struct Job {
	pub id: JobId,
	pub key: JobKey,
	pub schedule: Schedule,
	pub command: JobCommand,
	pub options: JobOptions,
}

impl Job {
	pub fn new(key: JobKey, schedule: Schedule, command: JobCommand, options: JobOptions) -> Self {
		Self {
			id: JobId::new(),
			key,
			schedule,
			command,
			options,
		}
	}
}
