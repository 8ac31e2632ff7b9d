// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Setup/teardown hooks with wildcard scoping.
//!
//! A hook is attached to a scope over the job registry's composite key
//! space; `None` at any level means "match all" at that level. When a job
//! executes, the single most specific matching hook fires once. There is
//! no cascade of every matching wildcard.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use foreman_jobs_core::{Job, JobKey};

/// Hook outcome. Failures are logged by the supervisor, never propagated
/// into sibling workers.
pub type HookResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A setup or teardown hook run by the supervisor around a job instance's
/// execution.
#[async_trait]
pub trait JobHook: Send + Sync {
	async fn run(&self, job: Arc<Job>) -> HookResult;
}

/// Adapter implementing [`JobHook`] for a plain async closure.
pub struct FnHook<F> {
	f: F,
}

impl<F> FnHook<F> {
	pub fn new<Fut>(f: F) -> Self
	where
		F: Fn(Arc<Job>) -> Fut + Send + Sync,
		Fut: Future<Output = HookResult> + Send,
	{
		Self { f }
	}
}

#[async_trait]
impl<F, Fut> JobHook for FnHook<F>
where
	F: Fn(Arc<Job>) -> Fut + Send + Sync,
	Fut: Future<Output = HookResult> + Send,
{
	async fn run(&self, job: Arc<Job>) -> HookResult {
		(self.f)(job).await
	}
}

/// Scope a hook applies to. `None` components are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookScope {
	pub application: Option<String>,
	pub app: Option<String>,
	pub controller: Option<String>,
}

impl HookScope {
	/// Matches every job.
	pub fn all() -> Self {
		Self::default()
	}

	/// Matches every job in one application.
	pub fn application(application: impl Into<String>) -> Self {
		Self {
			application: Some(application.into()),
			..Self::default()
		}
	}

	/// Matches every job in one app of one application.
	pub fn app(application: impl Into<String>, app: impl Into<String>) -> Self {
		Self {
			application: Some(application.into()),
			app: Some(app.into()),
			controller: None,
		}
	}

	/// Matches every job of one controller.
	pub fn controller(
		application: impl Into<String>,
		app: impl Into<String>,
		controller: impl Into<String>,
	) -> Self {
		Self {
			application: Some(application.into()),
			app: Some(app.into()),
			controller: Some(controller.into()),
		}
	}

	fn matches(&self, key: &JobKey) -> bool {
		self.application
			.as_deref()
			.map(|a| a == key.application)
			.unwrap_or(true)
			&& self.app.as_deref().map(|a| a == key.app).unwrap_or(true)
			&& self
				.controller
				.as_deref()
				.map(|c| c == key.controller)
				.unwrap_or(true)
	}

	/// Weighted specificity: application outranks app outranks controller,
	/// so ties between matches resolve deterministically.
	fn specificity(&self) -> u8 {
		let mut score = 0;
		if self.application.is_some() {
			score += 4;
		}
		if self.app.is_some() {
			score += 2;
		}
		if self.controller.is_some() {
			score += 1;
		}
		score
	}
}

/// Scope-keyed hook storage. Setting a hook for an existing scope replaces
/// it.
#[derive(Default)]
pub(crate) struct HookRegistry {
	entries: Vec<(HookScope, Arc<dyn JobHook>)>,
}

impl HookRegistry {
	pub(crate) fn set(&mut self, scope: HookScope, hook: Arc<dyn JobHook>) {
		if let Some(entry) = self.entries.iter_mut().find(|(s, _)| *s == scope) {
			entry.1 = hook;
		} else {
			self.entries.push((scope, hook));
		}
	}

	/// The single most specific hook matching the key, if any.
	pub(crate) fn resolve(&self, key: &JobKey) -> Option<Arc<dyn JobHook>> {
		self.entries
			.iter()
			.filter(|(scope, _)| scope.matches(key))
			.max_by_key(|(scope, _)| scope.specificity())
			.map(|(_, hook)| Arc::clone(hook))
	}
}
