// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The worker registry and its event bus.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use foreman_jobs_core::{JobId, JobsError, ProcessMessageData, Result, Worker, WorkerEvent};

/// Per-subscriber queue depth. A subscriber that falls further behind than
/// this loses its oldest events (logged), not the whole stream.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Error type subscriber handlers may return; logged and swallowed, never
/// allowed to interrupt the event pipeline.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// The worker event bus.
///
/// Broadcast semantics: every subscriber owns an independent receiver with
/// its own queue, so a slow or failing subscriber cannot block emission to
/// the others. Delivery is in-process, at-most-once and best-effort; with
/// no subscribers events are dropped.
#[derive(Clone)]
pub struct WorkerEvents {
	tx: broadcast::Sender<WorkerEvent>,
}

impl WorkerEvents {
	pub fn new() -> Self {
		let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		Self { tx }
	}

	/// Subscribe to all worker events from this point on.
	pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
		self.tx.subscribe()
	}

	/// Emit an event. Never fails; without subscribers the event is
	/// dropped.
	pub fn emit(&self, event: WorkerEvent) {
		let receivers = self.tx.send(event).unwrap_or(0);
		debug!(receivers, "worker event emitted");
	}

	/// Spawn a subscriber task invoking `handler` for every event.
	///
	/// Handler errors are logged and subsequent events continue to fire;
	/// supervision stays resilient to broken downstream consumers. Lag
	/// (queue overflow) is logged with the number of skipped events.
	pub fn spawn_handler<H, Fut>(&self, name: impl Into<String>, handler: H) -> JoinHandle<()>
	where
		H: Fn(WorkerEvent) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<(), HandlerError>> + Send,
	{
		let name = name.into();
		let mut rx = self.subscribe();

		tokio::spawn(async move {
			loop {
				match rx.recv().await {
					Ok(event) => {
						if let Err(e) = handler(event).await {
							warn!(subscriber = %name, error = %e, "event handler failed");
						}
					}
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!(subscriber = %name, skipped, "event subscriber lagged, events dropped");
					}
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}
		})
	}

	/// Spawn a subscriber for `process.message` events with the given
	/// message name.
	pub fn on_message<H, Fut>(&self, message_name: impl Into<String>, handler: H) -> JoinHandle<()>
	where
		H: Fn(ProcessMessageData) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = std::result::Result<(), HandlerError>> + Send,
	{
		let message_name = message_name.into();
		let subscriber = format!("on_message:{}", message_name);
		let handler = Arc::new(handler);

		self.spawn_handler(subscriber, move |event| {
			let message_name = message_name.clone();
			let handler = Arc::clone(&handler);
			async move {
				match event {
					WorkerEvent::ProcessMessage(data) if data.message_name == message_name => {
						(*handler)(data).await
					}
					_ => Ok(()),
				}
			}
		})
	}
}

impl Default for WorkerEvents {
	fn default() -> Self {
		Self::new()
	}
}

/// Registry of workers.
///
/// Like the job registry, mutated only during the single-writer setup
/// phase and read-only afterwards.
pub struct WorkerManager {
	workers: HashMap<String, Arc<Worker>>,
	events: WorkerEvents,
}

impl WorkerManager {
	pub fn new() -> Self {
		Self {
			workers: HashMap::new(),
			events: WorkerEvents::new(),
		}
	}

	/// Register a worker. Fails on a duplicate name or zero concurrency.
	pub fn add_worker(&mut self, worker: Worker) -> Result<Arc<Worker>> {
		if worker.options.concurrency < 1 {
			return Err(JobsError::InvalidConcurrency(worker.name));
		}
		if self.workers.contains_key(&worker.name) {
			return Err(JobsError::DuplicateWorker(worker.name));
		}

		let worker = Arc::new(worker);
		self.workers.insert(worker.name.clone(), Arc::clone(&worker));
		Ok(worker)
	}

	pub fn get_worker(&self, name: &str) -> Option<Arc<Worker>> {
		self.workers.get(name).cloned()
	}

	pub fn workers(&self) -> impl Iterator<Item = &Arc<Worker>> {
		self.workers.values()
	}

	pub fn worker_count(&self) -> usize {
		self.workers.len()
	}

	/// Number of workers bound to the given job.
	pub fn worker_count_for(&self, job_id: JobId) -> u32 {
		self.workers
			.values()
			.filter(|w| w.job.id == job_id)
			.count() as u32
	}

	/// Total desired process instances across the workers bound to the
	/// given job.
	pub fn instance_count_for(&self, job_id: JobId) -> u32 {
		self.workers
			.values()
			.filter(|w| w.job.id == job_id)
			.map(|w| w.options.concurrency)
			.sum()
	}

	pub fn events(&self) -> &WorkerEvents {
		&self.events
	}
}

impl Default for WorkerManager {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use foreman_jobs_core::{
		Job, JobCommand, JobKey, JobOptions, JobProcess, LogRecord, RunId, Schedule,
	};
	use serde_json::json;
	use std::sync::atomic::{AtomicU32, Ordering};
	use tokio::sync::mpsc;

	fn job() -> Arc<Job> {
		Arc::new(Job::new(
			JobKey::new("app", "core", "jobs", "noop"),
			Schedule::Continuous,
			JobCommand::new("true"),
			JobOptions::default(),
		))
	}

	fn process() -> JobProcess {
		JobProcess {
			run_id: RunId::new(),
			instance: 1,
			pid: Some(99),
			exit_code: None,
		}
	}

	#[test]
	fn test_add_worker_and_lookup() {
		let mut manager = WorkerManager::new();
		manager.add_worker(Worker::new("hb-worker", job())).unwrap();

		assert!(manager.get_worker("hb-worker").is_some());
		assert!(manager.get_worker("missing").is_none());
	}

	#[test]
	fn test_duplicate_worker_is_rejected() {
		let mut manager = WorkerManager::new();
		manager.add_worker(Worker::new("hb-worker", job())).unwrap();

		let result = manager.add_worker(Worker::new("hb-worker", job()));
		assert!(matches!(result, Err(JobsError::DuplicateWorker(name)) if name == "hb-worker"));
	}

	#[test]
	fn test_zero_concurrency_is_rejected() {
		let mut manager = WorkerManager::new();
		let result = manager.add_worker(Worker::new("hb-worker", job()).concurrency(0));
		assert!(matches!(result, Err(JobsError::InvalidConcurrency(_))));
	}

	#[test]
	fn test_instance_counts() {
		let shared = job();
		let mut manager = WorkerManager::new();
		manager
			.add_worker(Worker::new("a", Arc::clone(&shared)).concurrency(2))
			.unwrap();
		manager
			.add_worker(Worker::new("b", Arc::clone(&shared)).concurrency(3))
			.unwrap();

		assert_eq!(manager.worker_count_for(shared.id), 2);
		assert_eq!(manager.instance_count_for(shared.id), 5);
	}

	#[tokio::test]
	async fn test_events_reach_all_subscribers() {
		let events = WorkerEvents::new();
		let mut rx1 = events.subscribe();
		let mut rx2 = events.subscribe();

		events.emit(WorkerEvent::run("hb-worker", job().id, RunId::new()));

		assert_eq!(rx1.recv().await.unwrap().event_type(), "run");
		assert_eq!(rx2.recv().await.unwrap().event_type(), "run");
	}

	#[tokio::test]
	async fn test_emit_without_subscribers_is_dropped() {
		let events = WorkerEvents::new();
		// Must not fail or panic.
		events.emit(WorkerEvent::run("hb-worker", job().id, RunId::new()));
	}

	#[tokio::test]
	async fn test_failing_handler_does_not_stop_the_stream() {
		let events = WorkerEvents::new();
		let seen = Arc::new(AtomicU32::new(0));
		let handler_seen = Arc::clone(&seen);

		events.spawn_handler("flaky", move |_event| {
			let seen = Arc::clone(&handler_seen);
			async move {
				let n = seen.fetch_add(1, Ordering::SeqCst);
				if n == 0 {
					Err("first event always fails".into())
				} else {
					Ok(())
				}
			}
		});

		let job_id = job().id;
		events.emit(WorkerEvent::run("w", job_id, RunId::new()));
		events.emit(WorkerEvent::run("w", job_id, RunId::new()));
		events.emit(WorkerEvent::run("w", job_id, RunId::new()));

		tokio::time::timeout(std::time::Duration::from_secs(1), async {
			while seen.load(Ordering::SeqCst) < 3 {
				tokio::time::sleep(std::time::Duration::from_millis(5)).await;
			}
		})
		.await
		.expect("handler should keep receiving after a failure");
	}

	#[tokio::test]
	async fn test_on_message_filters_by_name() {
		let events = WorkerEvents::new();
		let (tx, mut rx) = mpsc::unbounded_channel();

		events.on_message("wanted", move |data| {
			let tx = tx.clone();
			async move {
				tx.send(data.message).ok();
				Ok(())
			}
		});

		let job_id = job().id;
		events.emit(WorkerEvent::process_message(
			"w",
			job_id,
			process(),
			"ignored",
			json!({"n": 1}),
		));
		events.emit(WorkerEvent::process_message(
			"w",
			job_id,
			process(),
			"wanted",
			json!({"n": 2}),
		));
		events.emit(WorkerEvent::process_log(
			"w",
			job_id,
			process(),
			LogRecord::new("info", "noise"),
		));

		let received = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
			.await
			.unwrap()
			.unwrap();
		assert_eq!(received, json!({"n": 2}));

		// Nothing else matched.
		assert!(rx.try_recv().is_err());
	}
}
