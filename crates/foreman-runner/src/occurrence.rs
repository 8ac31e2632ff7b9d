// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One scheduling occurrence: spawning, relaying and supervising the
//! concurrency-many instance slots that share a run id.

use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use foreman_jobs::{JobsContext, WorkerEvents};
use foreman_jobs_core::{
	Job, JobId, JobProcess, LogRecord, ParsedLine, RunId, Worker, WorkerEvent,
};

use crate::cancel::CancellationToken;
use crate::config::RunnerConfig;

/// Run one scheduling occurrence of a worker: assign the run id once, emit
/// `run`, spawn every instance slot, and wait for all of them to finish.
pub(crate) async fn run_occurrence(
	context: Arc<JobsContext>,
	worker: Arc<Worker>,
	config: RunnerConfig,
	token: CancellationToken,
	shutdown: broadcast::Sender<()>,
) {
	let run_id = RunId::new();
	let job = Arc::clone(&worker.job);

	info!(worker = %worker.name, run_id = %run_id, job = %job.key, "run starting");
	context
		.events()
		.emit(WorkerEvent::run(worker.name.clone(), job.id, run_id));

	let mut handles = Vec::new();
	for instance in 1..=worker.options.concurrency {
		let context = Arc::clone(&context);
		let worker = Arc::clone(&worker);
		let token = token.clone();
		// Subscribed before the task starts so a shutdown signalled while
		// the slot is spawning stays buffered instead of being missed.
		let shutdown_rx = shutdown.subscribe();

		handles.push(tokio::spawn(async move {
			supervise_instance(context, worker, run_id, instance, config, token, shutdown_rx).await;
		}));
	}

	for handle in handles {
		let _ = handle.await;
	}

	debug!(worker = %worker.name, run_id = %run_id, "run complete");
}

/// Supervise one instance slot of an occurrence.
///
/// The slot keeps its `instance` index and the occurrence's `run_id`
/// across restarts; only the pid is fresh. Restarts are independent, an
/// exiting slot never affects its siblings.
async fn supervise_instance(
	context: Arc<JobsContext>,
	worker: Arc<Worker>,
	run_id: RunId,
	instance: u32,
	config: RunnerConfig,
	token: CancellationToken,
	mut shutdown_rx: broadcast::Receiver<()>,
) {
	let job = Arc::clone(&worker.job);
	let events = context.events().clone();

	loop {
		if token.is_cancelled() {
			return;
		}

		// Setup hook: a failure aborts this spawn attempt only.
		if let Some(hook) = context.jobs().resolve_setup_hook(&job.key) {
			if let Err(e) = hook.run(Arc::clone(&job)).await {
				warn!(
					worker = %worker.name,
					run_id = %run_id,
					instance,
					error = %e,
					"setup hook failed"
				);
				if worker.persistent && !token.is_cancelled() {
					tokio::time::sleep(config.restart_delay).await;
					continue;
				}
				return;
			}
		}

		let mut child = match build_command(&job).spawn() {
			Ok(child) => child,
			Err(e) => {
				// Fatal to this slot's occurrence only; sibling instances
				// and workers are unaffected.
				error!(
					worker = %worker.name,
					run_id = %run_id,
					instance,
					program = %job.command.program,
					error = %e,
					"failed to spawn job process"
				);
				let process = JobProcess {
					run_id,
					instance,
					pid: None,
					exit_code: None,
				};
				events.emit(WorkerEvent::process_log(
					worker.name.clone(),
					job.id,
					process,
					LogRecord::new(
						"error",
						format!("failed to spawn {}: {}", job.command.program, e),
					),
				));
				return;
			}
		};

		let pid = child.id();
		let process = JobProcess {
			run_id,
			instance,
			pid,
			exit_code: None,
		};

		info!(
			worker = %worker.name,
			run_id = %run_id,
			instance,
			pid = ?pid,
			"job process started"
		);
		events.emit(WorkerEvent::process_run(worker.name.clone(), job.id, process));

		let stdout_task = child.stdout.take().map(|stdout| {
			tokio::spawn(relay_stdout(
				stdout,
				events.clone(),
				worker.name.clone(),
				job.id,
				process,
			))
		});
		let stderr_task = child.stderr.take().map(|stderr| {
			tokio::spawn(relay_stderr(
				stderr,
				events.clone(),
				worker.name.clone(),
				job.id,
				process,
			))
		});

		let mut shutting_down = false;
		let status = tokio::select! {
			status = child.wait() => status,
			_ = shutdown_rx.recv() => {
				shutting_down = true;
				let _ = child.start_kill();
				child.wait().await
			}
		};

		// Drain the relay before the exit event so per-instance causal
		// order holds.
		if let Some(task) = stdout_task {
			let _ = task.await;
		}
		if let Some(task) = stderr_task {
			let _ = task.await;
		}

		let exit_code = match status {
			Ok(status) => status.code(),
			Err(e) => {
				warn!(
					worker = %worker.name,
					run_id = %run_id,
					instance,
					error = %e,
					"failed to wait for job process"
				);
				None
			}
		};

		// Teardown failures never block the restart decision.
		if let Some(hook) = context.jobs().resolve_teardown_hook(&job.key) {
			if let Err(e) = hook.run(Arc::clone(&job)).await {
				warn!(
					worker = %worker.name,
					run_id = %run_id,
					instance,
					error = %e,
					"teardown hook failed"
				);
			}
		}

		let exited = JobProcess {
			run_id,
			instance,
			pid,
			exit_code,
		};
		info!(
			worker = %worker.name,
			run_id = %run_id,
			instance,
			exit_code = ?exit_code,
			"job process exited"
		);
		events.emit(WorkerEvent::process_exit(worker.name.clone(), job.id, exited));

		if shutting_down || !worker.persistent || token.is_cancelled() {
			return;
		}

		// Independent restart of this slot: same run id, same instance,
		// fresh pid.
		tokio::select! {
			_ = tokio::time::sleep(config.restart_delay) => {}
			_ = shutdown_rx.recv() => return,
		}
	}
}

fn build_command(job: &Job) -> Command {
	let mut command = Command::new(&job.command.program);
	command
		.args(&job.command.args)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);
	for (key, value) in &job.command.env {
		command.env(key, value);
	}
	if let Some(dir) = &job.command.current_dir {
		command.current_dir(dir);
	}
	command
}

/// Relay the child's stdout through the envelope parser onto the bus.
///
/// Relay errors are logged and swallowed; they never interrupt the event
/// pipeline or the child process.
async fn relay_stdout(
	stdout: ChildStdout,
	events: WorkerEvents,
	worker: String,
	job_id: JobId,
	process: JobProcess,
) {
	let mut lines = BufReader::new(stdout).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => match ParsedLine::parse(&line) {
				ParsedLine::Message { name, payload } => {
					events.emit(WorkerEvent::process_message(
						worker.clone(),
						job_id,
						process,
						name,
						payload,
					));
				}
				ParsedLine::Log(record) => {
					events.emit(WorkerEvent::process_log(worker.clone(), job_id, process, record));
				}
				ParsedLine::Raw(text) => {
					if !text.is_empty() {
						events.emit(WorkerEvent::process_log(
							worker.clone(),
							job_id,
							process,
							LogRecord::new("info", text),
						));
					}
				}
			},
			Ok(None) => break,
			Err(e) => {
				warn!(worker = %worker, error = %e, "failed to read job process stdout");
				break;
			}
		}
	}
}

/// Relay the child's stderr as error-level log records.
async fn relay_stderr(
	stderr: ChildStderr,
	events: WorkerEvents,
	worker: String,
	job_id: JobId,
	process: JobProcess,
) {
	let mut lines = BufReader::new(stderr).lines();
	loop {
		match lines.next_line().await {
			Ok(Some(line)) => {
				if !line.is_empty() {
					events.emit(WorkerEvent::process_log(
						worker.clone(),
						job_id,
						process,
						LogRecord::new("error", line),
					));
				}
			}
			Ok(None) => break,
			Err(e) => {
				warn!(worker = %worker, error = %e, "failed to read job process stderr");
				break;
			}
		}
	}
}
