// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded-polling rendezvous for eventually-consistent external state.
//!
//! Event emission is immediate; a downstream consumer's side effect (for
//! example a history row insert keyed by run id) may land later. `wait_for`
//! bridges that gap: poll a probe at a fixed interval until it produces a
//! value or a timeout elapses. Polling is deliberate here, the producing
//! side is across a process boundary and has no notification hook.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Rendezvous failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
	#[error("timed out after {waited:?} waiting for value")]
	TimedOut { waited: Duration },
}

/// Poll `probe` every `interval` until it returns `Some`, or fail with
/// [`WaitError::TimedOut`] once `timeout` has elapsed.
///
/// The probe is always invoked at least once, and once more at the deadline
/// before giving up.
pub async fn wait_for<T, F, Fut>(
	mut probe: F,
	timeout: Duration,
	interval: Duration,
) -> Result<T, WaitError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Option<T>>,
{
	let deadline = Instant::now() + timeout;

	loop {
		if let Some(value) = probe().await {
			return Ok(value);
		}

		if Instant::now() >= deadline {
			return Err(WaitError::TimedOut { waited: timeout });
		}

		tokio::time::sleep_until(deadline.min(Instant::now() + interval)).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[tokio::test]
	async fn test_immediate_success() {
		let value = wait_for(
			|| async { Some(42) },
			Duration::from_secs(1),
			Duration::from_millis(10),
		)
		.await;
		assert_eq!(value, Ok(42));
	}

	#[tokio::test]
	async fn test_eventual_success() {
		let calls = Arc::new(AtomicU32::new(0));
		let probe_calls = Arc::clone(&calls);

		let value = wait_for(
			move || {
				let calls = Arc::clone(&probe_calls);
				async move {
					if calls.fetch_add(1, Ordering::SeqCst) >= 3 {
						Some("ready")
					} else {
						None
					}
				}
			},
			Duration::from_secs(5),
			Duration::from_millis(5),
		)
		.await;

		assert_eq!(value, Ok("ready"));
		assert!(calls.load(Ordering::SeqCst) >= 4);
	}

	#[tokio::test]
	async fn test_timeout() {
		let result: Result<(), WaitError> = wait_for(
			|| async { None },
			Duration::from_millis(30),
			Duration::from_millis(5),
		)
		.await;

		assert_eq!(
			result,
			Err(WaitError::TimedOut {
				waited: Duration::from_millis(30)
			})
		);
	}

	#[tokio::test]
	async fn test_zero_timeout_probes_once() {
		let calls = Arc::new(AtomicU32::new(0));
		let probe_calls = Arc::clone(&calls);

		let result: Result<(), WaitError> = wait_for(
			move || {
				let calls = Arc::clone(&probe_calls);
				async move {
					calls.fetch_add(1, Ordering::SeqCst);
					None
				}
			},
			Duration::ZERO,
			Duration::from_millis(5),
		)
		.await;

		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
