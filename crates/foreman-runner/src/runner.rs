// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The worker runner: schedule evaluation and worker lifecycle.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use foreman_jobs::JobsContext;
use foreman_jobs_core::{JobsError, OverlapPolicy, Result, Schedule, Worker};

use crate::cancel::CancellationToken;
use crate::config::RunnerConfig;
use crate::occurrence::run_occurrence;

/// Supervises the workers of a frozen [`JobsContext`].
///
/// The supervising process stays single-threaded/event-driven; job work
/// executes in separate OS processes, bounded by each worker's
/// concurrency.
pub struct WorkerRunner {
	context: Arc<JobsContext>,
	config: RunnerConfig,
	shutdown_tx: broadcast::Sender<()>,
	handles: Mutex<Vec<JoinHandle<()>>>,
	tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl WorkerRunner {
	pub fn new(context: Arc<JobsContext>) -> Self {
		Self::with_config(context, RunnerConfig::default())
	}

	pub fn with_config(context: Arc<JobsContext>, config: RunnerConfig) -> Self {
		let (shutdown_tx, _) = broadcast::channel(1);
		Self {
			context,
			config,
			shutdown_tx,
			handles: Mutex::new(Vec::new()),
			tokens: Mutex::new(HashMap::new()),
		}
	}

	/// Start supervision for every auto worker.
	#[instrument(skip(self))]
	pub async fn start(&self) -> Result<()> {
		let workers: Vec<Arc<Worker>> = self
			.context
			.workers()
			.workers()
			.filter(|w| w.auto)
			.cloned()
			.collect();

		let worker_count = workers.len();
		for worker in workers {
			self.spawn_worker_loop(worker).await;
		}

		info!(worker_count, "worker runner started");
		Ok(())
	}

	/// Trigger one worker by name. This is how non-auto workers are
	/// started; a worker that is already running is left alone.
	#[instrument(skip(self))]
	pub async fn start_worker(&self, name: &str) -> Result<()> {
		let worker = self
			.context
			.workers()
			.get_worker(name)
			.ok_or_else(|| JobsError::WorkerNotFound(name.to_string()))?;

		self.spawn_worker_loop(worker).await;
		Ok(())
	}

	/// Cooperatively stop a worker: running instances finish their current
	/// execution and are not respawned.
	#[instrument(skip(self))]
	pub async fn stop_worker(&self, name: &str) -> Result<()> {
		if self.context.workers().get_worker(name).is_none() {
			return Err(JobsError::WorkerNotFound(name.to_string()));
		}

		if let Some(token) = self.tokens.lock().await.get(name) {
			info!(worker = %name, "stopping worker");
			token.cancel();
		}
		Ok(())
	}

	/// Stop everything: kill remaining job processes and join all
	/// supervision tasks.
	#[instrument(skip(self))]
	pub async fn shutdown(&self) {
		let _ = self.shutdown_tx.send(());

		let mut handles = self.handles.lock().await;
		for handle in handles.drain(..) {
			let _ = handle.await;
		}

		info!("worker runner shut down");
	}

	async fn spawn_worker_loop(&self, worker: Arc<Worker>) {
		let mut tokens = self.tokens.lock().await;
		if let Some(token) = tokens.get(&worker.name) {
			if !token.is_cancelled() {
				warn!(worker = %worker.name, "worker already running, ignoring start");
				return;
			}
		}

		let token = CancellationToken::new();
		tokens.insert(worker.name.clone(), token.clone());
		drop(tokens);

		let context = Arc::clone(&self.context);
		let config = self.config;
		let shutdown = self.shutdown_tx.clone();

		let handle = tokio::spawn(async move {
			run_worker(context, worker, config, token, shutdown).await;
		});
		self.handles.lock().await.push(handle);
	}
}

async fn run_worker(
	context: Arc<JobsContext>,
	worker: Arc<Worker>,
	config: RunnerConfig,
	token: CancellationToken,
	shutdown: broadcast::Sender<()>,
) {
	match &worker.job.schedule {
		// One-shot and always-on schedules trigger a single occurrence
		// immediately; persistence is handled per instance slot.
		Schedule::Now | Schedule::Continuous => {
			run_occurrence(context, worker, config, token, shutdown).await;
		}
		Schedule::Cron(_) => {
			run_cron_worker(context, worker, config, token, shutdown).await;
		}
	}
}

async fn run_cron_worker(
	context: Arc<JobsContext>,
	worker: Arc<Worker>,
	config: RunnerConfig,
	token: CancellationToken,
	shutdown: broadcast::Sender<()>,
) {
	let mut shutdown_rx = shutdown.subscribe();
	let mut occurrences: Vec<JoinHandle<()>> = Vec::new();

	loop {
		if token.is_cancelled() {
			break;
		}

		let next = match worker.job.schedule.next_after(Utc::now()) {
			Ok(Some(next)) => next,
			Ok(None) => break,
			Err(e) => {
				error!(worker = %worker.name, error = %e, "schedule error, stopping worker");
				break;
			}
		};
		let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = shutdown_rx.recv() => break,
		}
		if token.is_cancelled() {
			break;
		}

		occurrences.retain(|handle| !handle.is_finished());

		if worker.options.overlap == OverlapPolicy::Skip && !occurrences.is_empty() {
			warn!(worker = %worker.name, "previous occurrence still running, skipping tick");
			continue;
		}

		occurrences.push(tokio::spawn(run_occurrence(
			Arc::clone(&context),
			Arc::clone(&worker),
			config,
			token.clone(),
			shutdown.clone(),
		)));
	}

	// A cooperative stop never abandons running occurrences; wait for them
	// to finish on their own (shutdown kills their children).
	for handle in occurrences {
		let _ = handle.await;
	}
}
