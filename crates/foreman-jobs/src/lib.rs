// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job and worker registries for the Foreman supervision system.
//!
//! This crate holds the setup-time surface of Foreman: the job registry
//! ([`JobManager`]) with wildcard-scoped setup/teardown hooks, the worker
//! registry ([`WorkerManager`]) with its event bus, and the
//! [`JobsController`] facade application authors register through.
//!
//! Registries are mutated only during the single-writer setup phase and
//! frozen into an immutable [`JobsContext`] consumed by the runner.

pub mod controller;
pub mod hooks;
pub mod manager;
pub mod workers;

pub use controller::{JobRegistrar, JobsBuilder, JobsContext, JobsController, WorkerSpec};
pub use hooks::{FnHook, HookResult, HookScope, JobHook};
pub use manager::{JobInfo, JobManager};
pub use workers::{HandlerError, WorkerEvents, WorkerManager};
