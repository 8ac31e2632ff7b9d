// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The job registry.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use foreman_jobs_core::{Job, JobId, JobKey, JobsError, Result};

use crate::hooks::{HookRegistry, HookScope, JobHook};
use crate::workers::WorkerManager;

/// Read-only job metadata exposed to external monitoring consumers.
///
/// Deliberately excludes the job's command: the program and environment may
/// carry secrets and are never exposed through introspection.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
	pub id: JobId,
	pub application: String,
	pub app: String,
	pub controller: String,
	pub name: String,
	pub schedule: String,
	/// Number of workers bound to this job.
	pub workers: u32,
	/// Total desired process instances across those workers.
	pub instances: u32,
}

/// Registry of job definitions.
///
/// Registration happens during the application's setup phase through
/// `&mut self` methods; afterwards the manager is frozen behind an `Arc`
/// and only read.
#[derive(Default)]
pub struct JobManager {
	jobs: HashMap<JobKey, Arc<Job>>,
	by_id: HashMap<JobId, JobKey>,
	setup_hooks: HookRegistry,
	teardown_hooks: HookRegistry,
}

impl JobManager {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a job. Fails with [`JobsError::DuplicateJob`] if the
	/// composite key is already taken.
	pub fn add_job(&mut self, job: Job) -> Result<Arc<Job>> {
		if self.jobs.contains_key(&job.key) {
			return Err(JobsError::DuplicateJob(job.key));
		}

		let job = Arc::new(job);
		self.by_id.insert(job.id, job.key.clone());
		self.jobs.insert(job.key.clone(), Arc::clone(&job));
		Ok(job)
	}

	/// Look up a job by its composite key.
	pub fn get_job(&self, key: &JobKey) -> Result<Arc<Job>> {
		self.jobs
			.get(key)
			.cloned()
			.ok_or_else(|| JobsError::JobNotFound(key.clone()))
	}

	/// Convenience lookup from the key's parts.
	pub fn get_job_parts(
		&self,
		application: &str,
		app: &str,
		controller: &str,
		name: &str,
	) -> Result<Arc<Job>> {
		self.get_job(&JobKey::new(application, app, controller, name))
	}

	/// Look up a job by its UUID.
	pub fn get_job_by_id(&self, id: JobId) -> Option<Arc<Job>> {
		self.by_id.get(&id).and_then(|key| self.jobs.get(key)).cloned()
	}

	pub fn jobs(&self) -> impl Iterator<Item = &Arc<Job>> {
		self.jobs.values()
	}

	pub fn job_count(&self) -> usize {
		self.jobs.len()
	}

	/// Read-only introspection for external monitoring consumers, keyed by
	/// job UUID.
	pub fn jobs_information(&self, workers: &WorkerManager) -> HashMap<JobId, JobInfo> {
		self.jobs
			.values()
			.map(|job| {
				(
					job.id,
					JobInfo {
						id: job.id,
						application: job.key.application.clone(),
						app: job.key.app.clone(),
						controller: job.key.controller.clone(),
						name: job.key.name.clone(),
						schedule: job.schedule.to_string(),
						workers: workers.worker_count_for(job.id),
						instances: workers.instance_count_for(job.id),
					},
				)
			})
			.collect()
	}

	/// Attach a setup hook for the given scope, replacing any hook already
	/// set for that exact scope.
	pub fn set_setup_hook(&mut self, scope: HookScope, hook: Arc<dyn JobHook>) {
		self.setup_hooks.set(scope, hook);
	}

	/// Attach a teardown hook for the given scope.
	pub fn set_teardown_hook(&mut self, scope: HookScope, hook: Arc<dyn JobHook>) {
		self.teardown_hooks.set(scope, hook);
	}

	/// The most specific setup hook matching the job, if any.
	pub fn resolve_setup_hook(&self, key: &JobKey) -> Option<Arc<dyn JobHook>> {
		self.setup_hooks.resolve(key)
	}

	/// The most specific teardown hook matching the job, if any.
	pub fn resolve_teardown_hook(&self, key: &JobKey) -> Option<Arc<dyn JobHook>> {
		self.teardown_hooks.resolve(key)
	}
}
