//! Running the click sequence configured for a recognized state.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, BackendError};
use crate::clock::Clock;
use crate::mapper::{CoordinateMapper, OutOfBounds};
use crate::region::DisplayBounds;
use crate::target::Target;
use crate::tracker::WindowRegionTracker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
	pub target: Target,
	/// Pause after the step, whether it clicked or was skipped.
	#[serde(default)]
	pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
	pub state: String,
	pub steps: Vec<ActionStep>,
}

/// Bounded retry with exponential backoff for a single click.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Total attempts, including the first.
	pub attempts: u32,
	pub initial_backoff_ms: u64,
	pub multiplier: f32,
	pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			attempts: 3,
			initial_backoff_ms: 1000,
			multiplier: 2.0,
			max_backoff_ms: 5000,
		}
	}
}

impl RetryPolicy {
	/// Pause before retry number `retry` (1-based).
	pub fn backoff(&self, retry: u32) -> Duration {
		let factor = self.multiplier.max(1.0).powi(retry.saturating_sub(1) as i32);
		let ms = (self.initial_backoff_ms as f64 * factor as f64).min(self.max_backoff_ms as f64);
		Duration::from_millis(ms as u64)
	}
}

#[derive(Debug, thiserror::Error)]
#[error("click at ({x}, {y}) failed after {attempts} attempt(s)")]
pub struct ClickDispatchFailure {
	pub x: i32,
	pub y: i32,
	pub attempts: u32,
	#[source]
	pub last: BackendError,
}

#[derive(Debug)]
pub enum StepOutcome {
	Clicked { x: i32, y: i32, attempts: u32 },
	Skipped(OutOfBounds),
	Failed(ClickDispatchFailure),
}

#[derive(Debug)]
pub struct StepReport {
	/// 1-based position in the sequence.
	pub step: usize,
	pub outcome: StepOutcome,
}

#[derive(Debug)]
pub enum DispatchReport {
	/// Classification produced no state.
	Unrecognized,
	/// State recognized, nothing configured for it.
	NoAction { state: String },
	Sequence { state: String, steps: Vec<StepReport> },
}

impl DispatchReport {
	fn step_numbers(&self, pred: impl Fn(&StepOutcome) -> bool) -> Vec<usize> {
		match self {
			DispatchReport::Sequence { steps, .. } => steps.iter().filter(|s| pred(&s.outcome)).map(|s| s.step).collect(),
			_ => Vec::new(),
		}
	}

	pub fn skipped_steps(&self) -> Vec<usize> {
		self.step_numbers(|o| matches!(o, StepOutcome::Skipped(_)))
	}

	pub fn failed_steps(&self) -> Vec<usize> {
		self.step_numbers(|o| matches!(o, StepOutcome::Failed(_)))
	}

	pub fn clicked_steps(&self) -> Vec<usize> {
		self.step_numbers(|o| matches!(o, StepOutcome::Clicked { .. }))
	}

	/// Every step of a sequence clicked. False for the non-sequence variants.
	pub fn is_complete(&self) -> bool {
		matches!(self, DispatchReport::Sequence { steps, .. }
			if steps.iter().all(|s| matches!(s.outcome, StepOutcome::Clicked { .. })))
	}
}

#[derive(Debug, thiserror::Error)]
#[error("more than one action sequence for state {0:?}")]
pub struct DuplicateAction(pub String);

/// Maps recognized states to click sequences and runs them.
pub struct ActionDispatcher<C> {
	actions: HashMap<String, ActionSpec>,
	retry: RetryPolicy,
	display_fallback: DisplayBounds,
	clock: C,
}

impl<C: Clock> ActionDispatcher<C> {
	pub fn new(
		specs: Vec<ActionSpec>,
		retry: RetryPolicy,
		display_fallback: DisplayBounds,
		clock: C,
	) -> Result<Self, DuplicateAction> {
		let mut actions = HashMap::with_capacity(specs.len());
		for spec in specs {
			if actions.contains_key(&spec.state) {
				return Err(DuplicateAction(spec.state));
			}
			actions.insert(spec.state.clone(), spec);
		}
		Ok(Self { actions, retry, display_fallback, clock })
	}

	pub fn action_for(&self, state: &str) -> Option<&ActionSpec> {
		self.actions.get(state)
	}

	/// Run the sequence for `state`, if any.
	///
	/// Steps run in order. An out-of-bounds step is skipped and a failing click
	/// is retried; neither stops the remaining steps. A fresh mapper is built
	/// for each step so every step sees the current region.
	pub fn dispatch<B: Backend + ?Sized, T: Clock>(
		&self,
		state: Option<&str>,
		tracker: &mut WindowRegionTracker<T>,
		backend: &mut B,
	) -> DispatchReport {
		let Some(state) = state else {
			tracing::debug!("no recognized state; nothing to dispatch");
			return DispatchReport::Unrecognized;
		};
		let Some(action) = self.actions.get(state) else {
			tracing::debug!(state, "no action configured for state");
			return DispatchReport::NoAction { state: state.to_owned() };
		};

		tracing::info!(state, steps = action.steps.len(), "running action sequence");
		let mut steps = Vec::with_capacity(action.steps.len());
		for (i, step) in action.steps.iter().enumerate() {
			let number = i + 1;
			let outcome = {
				let mut mapper = CoordinateMapper::new(&mut *tracker, &mut *backend, self.display_fallback);
				let (x, y) = mapper.resolve(step.target);
				match mapper.validate(x, y) {
					Ok(()) => match self.click_with_retry(&mut *backend, x, y) {
						Ok(attempts) => StepOutcome::Clicked { x, y, attempts },
						Err(err) => {
							tracing::warn!(state, step = number, error = %err, cause = %err.last, "step failed");
							StepOutcome::Failed(err)
						}
					},
					Err(err) => {
						tracing::warn!(state, step = number, error = %err, "step skipped");
						StepOutcome::Skipped(err)
					}
				}
			};
			steps.push(StepReport { step: number, outcome });
			self.clock.sleep(Duration::from_millis(step.delay_ms));
		}

		let report = DispatchReport::Sequence { state: state.to_owned(), steps };
		let skipped = report.skipped_steps();
		let failed = report.failed_steps();
		if skipped.is_empty() && failed.is_empty() {
			tracing::info!(state, "action sequence complete");
		} else {
			tracing::warn!(state, ?skipped, ?failed, "action sequence partially completed");
		}
		report
	}

	fn click_with_retry<B: Backend + ?Sized>(&self, backend: &mut B, x: i32, y: i32) -> Result<u32, ClickDispatchFailure> {
		let attempts = self.retry.attempts.max(1);
		let mut attempt = 1;
		loop {
			match backend.click(x, y) {
				Ok(()) => return Ok(attempt),
				Err(err) if attempt >= attempts || !err.is_transient() => {
					return Err(ClickDispatchFailure { x, y, attempts: attempt, last: err });
				}
				Err(err) => {
					let pause = self.retry.backoff(attempt);
					tracing::debug!(x, y, attempt, error = %err, ?pause, "click failed; retrying");
					self.clock.sleep(pause);
					attempt += 1;
				}
			}
		}
	}
}
