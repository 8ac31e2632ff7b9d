// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Foreman job supervision system.
//!
//! This crate defines the domain model shared by the registries, the worker
//! runner and the child-side harness: job and worker definitions, schedules,
//! the worker event stream, the stdout IPC envelope protocol and the
//! bounded-polling rendezvous helper.

pub mod error;
pub mod events;
pub mod ipc;
pub mod job;
pub mod schedule;
pub mod wait;
pub mod worker;

pub use error::{JobsError, Result};
pub use events::{
	JobProcess, LogRecord, ProcessExitData, ProcessLogData, ProcessMessageData, ProcessRunData,
	RunData, RunId, WorkerEvent,
};
pub use ipc::{Envelope, ParsedLine};
pub use job::{Job, JobCommand, JobId, JobKey, JobOptions};
pub use schedule::Schedule;
pub use wait::{wait_for, WaitError};
pub use worker::{OverlapPolicy, Worker, WorkerOptions};
