//! The capture-classify-act loop.
//!
//! One cycle runs to completion on the caller's thread: resolve the tracked
//! region, capture it, classify the frame, then dispatch the action for the
//! recognized state. Cadence is a fixed delay between cycles.

use std::time::Duration;

use ie::{Classification, RecognitionError, StateClassifier};

use crate::backend::{Backend, BackendError};
use crate::clock::Clock;
use crate::dispatcher::{ActionDispatcher, DispatchReport};
use crate::region::WindowRegion;
use crate::snapshot::FrameSink;
use crate::tracker::WindowRegionTracker;

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
	#[error("capture of region {region} failed")]
	Capture {
		region: WindowRegion,
		#[source]
		source: BackendError,
	},
	#[error(transparent)]
	Recognition(#[from] RecognitionError),
}

#[derive(Debug)]
pub struct CycleReport {
	pub region: WindowRegion,
	pub classification: Classification,
	/// `None` in dry-run mode.
	pub dispatch: Option<DispatchReport>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
	pub cycles: u64,
	pub recognized: u64,
	pub errors: u64,
}

pub struct Bot<B, C> {
	backend: B,
	classifier: StateClassifier,
	tracker: WindowRegionTracker<C>,
	dispatcher: ActionDispatcher<C>,
	clock: C,
	execute: bool,
	frames: Option<FrameSink>,
}

impl<B: Backend, C: Clock> Bot<B, C> {
	pub fn new(
		backend: B,
		classifier: StateClassifier,
		tracker: WindowRegionTracker<C>,
		dispatcher: ActionDispatcher<C>,
		clock: C,
	) -> Self {
		Self { backend, classifier, tracker, dispatcher, clock, execute: true, frames: None }
	}

	/// Classify only; never click.
	pub fn dry_run(mut self, dry_run: bool) -> Self {
		self.execute = !dry_run;
		self
	}

	/// Save every captured frame into `sink` before it is classified.
	pub fn save_frames(mut self, sink: Option<FrameSink>) -> Self {
		self.frames = sink;
		self
	}

	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Run one capture-classify-act cycle.
	///
	/// A failed capture drops the cached region, since the window has most
	/// likely moved or closed.
	pub fn tick(&mut self) -> Result<CycleReport, CycleError> {
		let region = self.tracker.current_region(&mut self.backend, false);
		let frame = match self.backend.capture_region(region) {
			Ok(frame) => frame,
			Err(source) => {
				self.tracker.invalidate();
				return Err(CycleError::Capture { region, source });
			}
		};
		if let Some(sink) = &mut self.frames
			&& let Err(err) = sink.save(&frame)
		{
			tracing::warn!(error = %err, "could not save frame");
		}

		let classification = self.classifier.classify(&frame)?;
		tracing::info!(
			state = classification.state.as_deref().unwrap_or("-"),
			confidence = classification.confidence,
			basis = ?classification.basis,
			"classified frame"
		);

		let dispatch = self
			.execute
			.then(|| self.dispatcher.dispatch(classification.state.as_deref(), &mut self.tracker, &mut self.backend));
		Ok(CycleReport { region, classification, dispatch })
	}

	/// Tick every `poll_delay` until `max_cycles` is reached (forever if `None`).
	///
	/// Errors are logged and counted; they never stop the loop.
	pub fn run(&mut self, poll_delay: Duration, max_cycles: Option<u64>) -> RunSummary {
		let mut summary = RunSummary::default();
		while max_cycles.is_none_or(|max| summary.cycles < max) {
			summary.cycles += 1;
			match self.tick() {
				Ok(report) if report.classification.is_recognized() => summary.recognized += 1,
				Ok(_) => {}
				Err(err) => {
					summary.errors += 1;
					tracing::warn!(cycle = summary.cycles, error = %err, "cycle failed");
				}
			}
			if max_cycles.is_none_or(|max| summary.cycles < max) {
				self.clock.sleep(poll_delay);
			}
		}
		summary
	}
}

#[cfg(test)]
mod tests {
	use ie::{Basis, OwnedGray, OwnedImage, SearchParams, StateTemplate, Weights};

	use super::*;
	use crate::backend::ScriptedBackend;
	use crate::clock::ManualClock;
	use crate::dispatcher::{ActionSpec, ActionStep, RetryPolicy};
	use crate::region::{DisplayBounds, RelativeRect};
	use crate::target::Target;
	use crate::tracker::TrackerSettings;

	/// 40x40 black frame with a 2x2 bright button at (20, 30) whose
	/// bottom-right pixel is dimmer, so a pure-white patch scores 0.95.
	fn chest_frame() -> OwnedImage {
		let img = xcap::image::RgbImage::from_fn(40, 40, |x, y| {
			let v = match (x, y) {
				(21, 31) => 204,
				(20..=21, 30..=31) => 255,
				_ => 0,
			};
			xcap::image::Rgb([v, v, v])
		});
		OwnedImage::from_rgb_image(&img)
	}

	fn classifier() -> StateClassifier {
		let reference = || OwnedGray::from_fn(40, 40, |_, _| 90);
		let states = vec![
			StateTemplate::new("InBattle", reference(), 0.6, Weights { page: 0.7, button: 0.3 })
				.with_button(OwnedGray::from_fn(2, 2, |_, _| 128)),
			StateTemplate::new("ChestReady", reference(), 0.65, Weights { page: 0.4, button: 0.6 })
				.with_button(OwnedGray::from_fn(2, 2, |_, _| 255)),
		];
		StateClassifier::new(states, SearchParams { step: 1, ..SearchParams::default() }).unwrap()
	}

	fn bot(clock: &ManualClock, backend: ScriptedBackend) -> Bot<ScriptedBackend, &ManualClock> {
		let tracker = WindowRegionTracker::new(
			TrackerSettings {
				app_name: "WeChat".into(),
				sub_window: RelativeRect::FULL,
				cache_timeout: Duration::from_secs(5),
				fallback: WindowRegion::FALLBACK_HOST,
			},
			clock,
		);
		let tap = |x, y| ActionStep { target: Target::Percent { x, y }, delay_ms: 200 };
		let chest = ActionSpec {
			state: "ChestReady".into(),
			steps: vec![
				tap(50.0, 55.0),
				tap(50.0, 60.0),
				ActionStep { target: Target::Absolute { x: 20.0, y: 20.0 }, delay_ms: 200 },
				tap(50.0, 70.0),
				tap(50.0, 88.0),
			],
		};
		let dispatcher = ActionDispatcher::new(vec![chest], RetryPolicy::default(), DisplayBounds::FALLBACK, clock).unwrap();
		Bot::new(backend, classifier(), tracker, dispatcher, clock)
	}

	fn window() -> WindowRegion {
		WindowRegion::new(100, 200, 400, 300).unwrap()
	}

	#[test]
	fn chest_sequence_runs_around_an_out_of_bounds_step() {
		let clock = ManualClock::new();
		let mut bot = bot(&clock, ScriptedBackend::new(window()).with_frame(chest_frame()));

		let report = bot.tick().unwrap();
		assert_eq!(report.region, window());
		assert_eq!(report.classification.state.as_deref(), Some("ChestReady"));
		assert_eq!(report.classification.basis, Basis::Button);
		assert!((report.classification.confidence - 0.95).abs() < 1e-4);

		let dispatch = report.dispatch.unwrap();
		assert_eq!(dispatch.skipped_steps(), vec![3]);
		assert_eq!(dispatch.clicked_steps(), vec![1, 2, 4, 5]);
		assert_eq!(bot.backend().clicks.len(), 4);
		assert_eq!(bot.backend().captures, vec![window()]);
	}

	#[test]
	fn dry_run_classifies_without_clicking() {
		let clock = ManualClock::new();
		let mut bot = bot(&clock, ScriptedBackend::new(window()).with_frame(chest_frame())).dry_run(true);

		let report = bot.tick().unwrap();
		assert!(report.classification.is_recognized());
		assert!(report.dispatch.is_none());
		assert!(bot.backend().click_attempts.is_empty());
	}

	#[test]
	fn capture_failure_invalidates_region() {
		let clock = ManualClock::new();
		let mut bot = bot(&clock, ScriptedBackend::new(window()));

		assert!(matches!(bot.tick(), Err(CycleError::Capture { .. })));
		assert!(matches!(bot.tick(), Err(CycleError::Capture { .. })));
		assert_eq!(bot.backend().geometry_queries, 2);
	}

	#[test]
	fn captured_frames_are_saved_when_enabled() {
		let dir = tempfile::tempdir().unwrap();
		let clock = ManualClock::new();
		let sink = FrameSink::new(dir.path(), "cycle").unwrap();
		let mut bot = bot(&clock, ScriptedBackend::new(window()).with_frame(chest_frame()))
			.dry_run(true)
			.save_frames(Some(sink));

		bot.run(Duration::from_secs(2), Some(2));
		let mut names: Vec<_> = std::fs::read_dir(dir.path())
			.unwrap()
			.map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
			.collect();
		names.sort();
		assert_eq!(names.len(), 2);
		assert!(names[0].starts_with("cycle_") && names[0].ends_with("_001.png"));

		let saved = OwnedImage::open(dir.path().join(&names[1])).unwrap();
		assert_eq!((saved.width(), saved.height()), (40, 40));
	}

	#[test]
	fn empty_frame_is_a_recognition_error() {
		let clock = ManualClock::new();
		let empty = OwnedImage::from_rgba(0, &[]);
		let mut bot = bot(&clock, ScriptedBackend::new(window()).with_frame(empty));
		assert!(matches!(bot.tick(), Err(CycleError::Recognition(RecognitionError::EmptyFrame { .. }))));
	}

	#[test]
	fn run_counts_cycles_and_waits_between_them() {
		let clock = ManualClock::new();
		let mut bot = bot(&clock, ScriptedBackend::new(window()).with_frame(chest_frame())).dry_run(true);

		let summary = bot.run(Duration::from_secs(2), Some(3));
		assert_eq!(summary, RunSummary { cycles: 3, recognized: 3, errors: 0 });
		assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 2]);
	}
}
