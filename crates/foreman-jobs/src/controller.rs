// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The registration facade application authors use during setup.
//!
//! [`JobsBuilder`] owns the registries for the single-writer setup phase.
//! A [`JobsController`] is a scoped view of the builder for one
//! `(application, app, controller)`: job names it registers are qualified
//! by that scope, so there is no ambient global state anywhere. `finish()`
//! freezes everything into an immutable [`JobsContext`] consumed by the
//! runner.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use foreman_jobs_core::{
	Job, JobCommand, JobId, JobKey, JobOptions, JobsError, ProcessMessageData, Result, Schedule,
	Worker, WorkerOptions,
};

use crate::hooks::{HookScope, JobHook};
use crate::manager::{JobInfo, JobManager};
use crate::workers::{HandlerError, WorkerEvents, WorkerManager};

/// Supervision policy for `create_workers`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerSpec {
	pub persistent: bool,
	pub manual: bool,
	pub options: WorkerOptions,
}

impl WorkerSpec {
	pub fn persistent(mut self) -> Self {
		self.persistent = true;
		self
	}

	/// Start only on an explicit trigger instead of automatically.
	pub fn manual(mut self) -> Self {
		self.manual = true;
		self
	}

	pub fn concurrency(mut self, concurrency: u32) -> Self {
		self.options.concurrency = concurrency;
		self
	}

	pub fn overlap(mut self, overlap: foreman_jobs_core::OverlapPolicy) -> Self {
		self.options.overlap = overlap;
		self
	}
}

/// Capability contract for registering jobs and workers.
pub trait JobRegistrar {
	/// Register a job under the registrar's scope. `schedule` is the
	/// configuration form: a cron expression, `"now"`, or `None` for
	/// continuous.
	fn create_job(
		&mut self,
		name: &str,
		schedule: Option<&str>,
		command: JobCommand,
		options: JobOptions,
	) -> Result<Arc<Job>>;

	/// Register a worker bound to a job previously created under the same
	/// scope.
	fn create_workers(&mut self, name: &str, job_name: &str, spec: WorkerSpec)
		-> Result<Arc<Worker>>;
}

/// Owns the registries during the setup phase.
pub struct JobsBuilder {
	jobs: JobManager,
	workers: WorkerManager,
}

impl JobsBuilder {
	pub fn new() -> Self {
		Self {
			jobs: JobManager::new(),
			workers: WorkerManager::new(),
		}
	}

	/// A registrar scoped to one `(application, app, controller)`.
	pub fn controller(
		&mut self,
		application: impl Into<String>,
		app: impl Into<String>,
		controller: impl Into<String>,
	) -> JobsController<'_> {
		JobsController {
			application: application.into(),
			app: app.into(),
			controller: controller.into(),
			jobs: &mut self.jobs,
			workers: &mut self.workers,
		}
	}

	/// Attach a setup hook with explicit wildcard scoping.
	pub fn job_setup(&mut self, scope: HookScope, hook: Arc<dyn JobHook>) {
		self.jobs.set_setup_hook(scope, hook);
	}

	/// Attach a teardown hook with explicit wildcard scoping.
	pub fn job_teardown(&mut self, scope: HookScope, hook: Arc<dyn JobHook>) {
		self.jobs.set_teardown_hook(scope, hook);
	}

	pub fn events(&self) -> &WorkerEvents {
		self.workers.events()
	}

	/// End the setup phase: freeze the registries into an immutable
	/// context.
	pub fn finish(self) -> Arc<JobsContext> {
		Arc::new(JobsContext {
			jobs: self.jobs,
			workers: self.workers,
		})
	}
}

impl Default for JobsBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// A scoped registrar for one controller.
pub struct JobsController<'a> {
	application: String,
	app: String,
	controller: String,
	jobs: &'a mut JobManager,
	workers: &'a mut WorkerManager,
}

impl JobsController<'_> {
	fn key(&self, name: &str) -> JobKey {
		JobKey::new(&self.application, &self.app, &self.controller, name)
	}

	/// Attach a setup hook scoped to this controller.
	pub fn job_setup(&mut self, hook: Arc<dyn JobHook>) {
		self.jobs.set_setup_hook(
			HookScope::controller(&self.application, &self.app, &self.controller),
			hook,
		);
	}

	/// Attach a teardown hook scoped to this controller.
	pub fn job_teardown(&mut self, hook: Arc<dyn JobHook>) {
		self.jobs.set_teardown_hook(
			HookScope::controller(&self.application, &self.app, &self.controller),
			hook,
		);
	}

	/// Subscribe to `process.message` events with the given name.
	pub fn on_message<H, Fut>(&self, message_name: impl Into<String>, handler: H) -> JoinHandle<()>
	where
		H: Fn(ProcessMessageData) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<(), HandlerError>> + Send,
	{
		self.workers.events().on_message(message_name, handler)
	}
}

impl JobRegistrar for JobsController<'_> {
	fn create_job(
		&mut self,
		name: &str,
		schedule: Option<&str>,
		command: JobCommand,
		options: JobOptions,
	) -> Result<Arc<Job>> {
		let schedule = Schedule::from_config(schedule)?;
		let job = Job::new(self.key(name), schedule, command, options);
		self.jobs.add_job(job)
	}

	fn create_workers(
		&mut self,
		name: &str,
		job_name: &str,
		spec: WorkerSpec,
	) -> Result<Arc<Worker>> {
		let key = self.key(job_name);
		let job = self.jobs.get_job(&key).map_err(|_| JobsError::UnknownJob {
			worker: name.to_string(),
			job: key,
		})?;

		let worker = Worker {
			name: name.to_string(),
			job,
			persistent: spec.persistent,
			auto: !spec.manual,
			options: spec.options,
		};
		self.workers.add_worker(worker)
	}
}

/// The frozen registries, shared read-only with the runner and any
/// introspection consumers for the application's lifetime.
pub struct JobsContext {
	jobs: JobManager,
	workers: WorkerManager,
}

impl JobsContext {
	pub fn jobs(&self) -> &JobManager {
		&self.jobs
	}

	pub fn workers(&self) -> &WorkerManager {
		&self.workers
	}

	pub fn events(&self) -> &WorkerEvents {
		self.workers.events()
	}

	/// Read-only job metadata keyed by job UUID.
	pub fn jobs_information(&self) -> HashMap<JobId, JobInfo> {
		self.jobs.jobs_information(&self.workers)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_create_job_and_workers() {
		let mut builder = JobsBuilder::new();
		let mut controller = builder.controller("billing", "invoices", "reminders");

		let job = controller
			.create_job(
				"send-daily",
				Some("0 0 * * *"),
				JobCommand::new("/usr/bin/send-reminders"),
				JobOptions::default(),
			)
			.unwrap();

		let worker = controller
			.create_workers(
				"reminder-worker",
				"send-daily",
				WorkerSpec::default().concurrency(2),
			)
			.unwrap();

		assert_eq!(worker.job.id, job.id);
		assert_eq!(worker.options.concurrency, 2);
		assert!(worker.auto);

		let context = builder.finish();
		assert_eq!(context.jobs().job_count(), 1);
		assert_eq!(context.workers().worker_count(), 1);
	}

	#[test]
	fn test_duplicate_job_is_fatal_at_setup() {
		let mut builder = JobsBuilder::new();
		let mut controller = builder.controller("billing", "invoices", "reminders");

		controller
			.create_job("send-daily", Some("now"), JobCommand::new("true"), JobOptions::default())
			.unwrap();
		let result = controller.create_job(
			"send-daily",
			Some("now"),
			JobCommand::new("true"),
			JobOptions::default(),
		);

		assert!(matches!(result, Err(JobsError::DuplicateJob(_))));
	}

	#[test]
	fn test_create_workers_unknown_job() {
		let mut builder = JobsBuilder::new();
		let mut controller = builder.controller("billing", "invoices", "reminders");

		let result = controller.create_workers("w", "no-such-job", WorkerSpec::default());
		match result {
			Err(JobsError::UnknownJob { worker, job }) => {
				assert_eq!(worker, "w");
				assert_eq!(job.name, "no-such-job");
			}
			other => panic!("expected UnknownJob, got: {:?}", other.err()),
		}
	}

	#[test]
	fn test_invalid_schedule_is_fatal_at_setup() {
		let mut builder = JobsBuilder::new();
		let mut controller = builder.controller("billing", "invoices", "reminders");

		let result = controller.create_job(
			"send-daily",
			Some("not a cron expression"),
			JobCommand::new("true"),
			JobOptions::default(),
		);
		assert!(matches!(result, Err(JobsError::InvalidCronExpression(_))));
	}

	#[test]
	fn test_scopes_do_not_collide() {
		let mut builder = JobsBuilder::new();

		builder
			.controller("billing", "invoices", "reminders")
			.create_job("sync", Some("now"), JobCommand::new("true"), JobOptions::default())
			.unwrap();
		builder
			.controller("billing", "invoices", "escalations")
			.create_job("sync", Some("now"), JobCommand::new("true"), JobOptions::default())
			.unwrap();

		let context = builder.finish();
		assert_eq!(context.jobs().job_count(), 2);
	}

	#[test]
	fn test_jobs_information_passthrough() {
		let mut builder = JobsBuilder::new();
		let mut controller = builder.controller("billing", "invoices", "reminders");

		let job = controller
			.create_job("send-daily", None, JobCommand::new("true"), JobOptions::default())
			.unwrap();
		controller
			.create_workers(
				"reminder-worker",
				"send-daily",
				WorkerSpec::default().persistent().concurrency(2),
			)
			.unwrap();

		let context = builder.finish();
		let info = context.jobs_information();
		let entry = info.get(&job.id).unwrap();
		assert_eq!(entry.schedule, "continuous");
		assert_eq!(entry.instances, 2);
	}
}
