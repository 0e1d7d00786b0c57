//! Screen-state classification.
//!
//! Every state has at least one whole-scene reference and may have a button
//! patch. Classification is a pure function of the frame and the loaded
//! templates:
//!
//! 1. Each state's button patch is searched for in the lower band of the frame.
//! 2. A single button score above [`SearchParams::early_exit_threshold`] that
//!    leads every other state by at least [`SearchParams::significance_margin`]
//!    decides the state immediately.
//! 3. Otherwise page and button scores are fused with each state's own weights,
//!    and the winner must meet its own threshold.

use serde::{Deserialize, Serialize};

use crate::compare::{scaled_template_similarity, sliding_window_match};
use crate::{CatalogError, Gray, OwnedGray, OwnedImage, RecognitionError};

/// Relative importance of page layout vs. button presence for one state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
	pub page: f32,
	pub button: f32,
}

impl Weights {
	pub const PAGE_ONLY: Self = Self { page: 1.0, button: 0.0 };

	fn is_valid(&self) -> bool {
		(0.0..=1.0).contains(&self.page)
			&& (0.0..=1.0).contains(&self.button)
			&& (self.page + self.button - 1.0).abs() <= 1e-3
	}
}

/// Check the per-state numbers shared by config validation and catalog load.
pub fn validate_state(name: &str, threshold: f32, weights: Weights) -> Result<(), CatalogError> {
	if !(0.0..=1.0).contains(&threshold) {
		return Err(CatalogError::InvalidThreshold {
			state: name.to_string(),
			value: threshold,
		});
	}
	if !weights.is_valid() {
		return Err(CatalogError::InvalidWeights {
			state: name.to_string(),
			page: weights.page,
			button: weights.button,
		});
	}
	Ok(())
}

/// Button search and early-exit tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
	/// Fraction of the frame height where the button search band starts.
	pub start_fraction: f32,
	/// Stride (pixels) between candidate offsets.
	pub step: u32,
	/// Button score needed to skip whole-frame comparison.
	pub early_exit_threshold: f32,
	/// Minimum lead of the best button score over every other state.
	pub significance_margin: f32,
}

impl Default for SearchParams {
	fn default() -> Self {
		Self {
			start_fraction: 0.5,
			step: 5,
			early_exit_threshold: 0.85,
			significance_margin: 0.05,
		}
	}
}

/// Templates for one named state. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct StateTemplate {
	name: String,
	references: Vec<OwnedGray>,
	button: Option<OwnedGray>,
	threshold: f32,
	weights: Weights,
}

impl StateTemplate {
	pub fn new(name: impl Into<String>, reference: OwnedGray, threshold: f32, weights: Weights) -> Self {
		Self {
			name: name.into(),
			references: vec![reference],
			button: None,
			threshold,
			weights,
		}
	}

	pub fn with_button(mut self, button: OwnedGray) -> Self {
		self.button = Some(button);
		self
	}

	/// Additional whole-scene reference (e.g. a variant of the same screen).
	pub fn with_reference(mut self, reference: OwnedGray) -> Self {
		self.references.push(reference);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn references(&self) -> &[OwnedGray] {
		&self.references
	}

	pub fn button(&self) -> Option<&OwnedGray> {
		self.button.as_ref()
	}

	pub fn threshold(&self) -> f32 {
		self.threshold
	}

	pub fn weights(&self) -> Weights {
		self.weights
	}
}

/// Which rule produced a [`Classification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
	/// Unambiguous button match; whole-frame templates were not consulted.
	Button,
	/// Weighted page + button fusion.
	Fused,
}

/// Outcome of one classification call.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
	/// `None` when the best candidate missed its own threshold.
	pub state: Option<String>,
	pub confidence: f32,
	pub basis: Basis,
}

impl Classification {
	pub fn is_recognized(&self) -> bool {
		self.state.is_some()
	}
}

pub struct StateClassifier {
	states: Vec<StateTemplate>,
	params: SearchParams,
}

impl StateClassifier {
	pub fn new(states: Vec<StateTemplate>, params: SearchParams) -> Result<Self, CatalogError> {
		if states.is_empty() {
			return Err(CatalogError::Empty);
		}
		for (i, state) in states.iter().enumerate() {
			if states[..i].iter().any(|s| s.name == state.name) {
				return Err(CatalogError::DuplicateState(state.name.clone()));
			}
			validate_state(&state.name, state.threshold, state.weights)?;
		}
		Ok(Self { states, params })
	}

	pub fn states(&self) -> &[StateTemplate] {
		&self.states
	}

	pub fn state(&self, name: &str) -> Option<&StateTemplate> {
		self.states.iter().find(|s| s.name == name)
	}

	pub fn params(&self) -> &SearchParams {
		&self.params
	}

	/// Classify a captured RGB frame.
	pub fn classify(&self, frame: &OwnedImage) -> Result<Classification, RecognitionError> {
		if frame.is_empty() {
			return Err(RecognitionError::EmptyFrame {
				width: frame.width(),
				height: frame.height(),
			});
		}
		let gray = frame.to_gray();
		self.classify_gray(gray.as_view())
	}

	/// Classify a frame that is already single-channel.
	pub fn classify_gray(&self, frame: Gray) -> Result<Classification, RecognitionError> {
		if frame.is_empty() {
			return Err(RecognitionError::EmptyFrame {
				width: frame.width(),
				height: frame.height(),
			});
		}

		let button_scores = self
			.states
			.iter()
			.map(|state| match &state.button {
				Some(button) => {
					let score = sliding_window_match(
						frame,
						button.as_view(),
						self.params.start_fraction,
						self.params.step,
					);
					tracing::trace!(state = %state.name, score, "button score");
					score
				}
				None => {
					tracing::debug!(state = %state.name, "no button template; skipped");
					0.0
				}
			})
			.collect::<Vec<_>>();

		self.decide(&button_scores, |idx| {
			let score = self.page_score(&self.states[idx], frame)?;
			tracing::trace!(state = %self.states[idx].name, score, "page score");
			Ok(score)
		})
	}

	/// Best similarity of `frame` against any of the state's references.
	fn page_score(&self, state: &StateTemplate, frame: Gray) -> Result<f32, RecognitionError> {
		let mut best = 0.0f32;
		for reference in &state.references {
			best = best.max(scaled_template_similarity(frame, reference.as_view())?);
		}
		Ok(best)
	}

	/// Index of a button score that wins outright, if any.
	fn significant_button(&self, button_scores: &[f32]) -> Option<(usize, f32)> {
		let (best, score) = button_scores
			.iter()
			.copied()
			.enumerate()
			.max_by(|a, b| a.1.total_cmp(&b.1))?;

		if score <= self.params.early_exit_threshold {
			return None;
		}
		let contested = button_scores
			.iter()
			.enumerate()
			.any(|(i, &other)| i != best && score - other < self.params.significance_margin);
		if contested { None } else { Some((best, score)) }
	}

	/// Apply the early-exit rule, then weighted fusion and the winner's threshold.
	///
	/// `page_score` is only called when no button wins outright.
	fn decide(
		&self,
		button_scores: &[f32],
		mut page_score: impl FnMut(usize) -> Result<f32, RecognitionError>,
	) -> Result<Classification, RecognitionError> {
		if let Some((idx, score)) = self.significant_button(button_scores) {
			tracing::debug!(state = %self.states[idx].name, score, "button match is decisive");
			return Ok(Classification {
				state: Some(self.states[idx].name.clone()),
				confidence: score,
				basis: Basis::Button,
			});
		}

		// The catalog is never empty, so the first state always seeds the winner.
		let (mut idx, mut score) = (0, f32::NEG_INFINITY);
		for (i, state) in self.states.iter().enumerate() {
			let page = page_score(i)?;
			let button = button_scores.get(i).copied().unwrap_or(0.0);
			let combined = state.weights.page * page + state.weights.button * button;
			tracing::debug!(state = %state.name, page, button, combined, "fused score");
			if i == 0 || combined > score {
				(idx, score) = (i, combined);
			}
		}

		let state = &self.states[idx];
		let recognized = score >= state.threshold;
		if !recognized {
			tracing::debug!(state = %state.name, score, threshold = state.threshold, "best candidate below its threshold");
		}
		Ok(Classification {
			state: recognized.then(|| state.name.clone()),
			confidence: score,
			basis: Basis::Fused,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn flat(w: u32, h: u32, v: u8) -> OwnedGray {
		OwnedGray::from_fn(w, h, |_, _| v)
	}

	fn classifier(states: &[(&str, f32, Weights)]) -> StateClassifier {
		let states = states
			.iter()
			.map(|&(name, threshold, weights)| StateTemplate::new(name, flat(4, 4, 0), threshold, weights))
			.collect();
		StateClassifier::new(states, SearchParams::default()).unwrap()
	}

	#[test]
	fn below_threshold_winner_is_unrecognized() {
		let c = classifier(&[("A", 0.6, Weights::PAGE_ONLY), ("B", 0.6, Weights::PAGE_ONLY)]);
		let pages = [0.59, 0.3];
		let result = c.decide(&[0.0, 0.0], |i| Ok(pages[i])).unwrap();
		assert_eq!(result.state, None);
		assert!((result.confidence - 0.59).abs() < 1e-6);
		assert_eq!(result.basis, Basis::Fused);
	}

	#[test]
	fn decisive_button_skips_page_comparison() {
		let c = classifier(&[("A", 0.6, Weights::PAGE_ONLY), ("B", 0.6, Weights::PAGE_ONLY)]);
		let result = c
			.decide(&[0.9, 0.83], |_| panic!("whole-frame templates must not be consulted"))
			.unwrap();
		assert_eq!(result.state.as_deref(), Some("A"));
		assert!((result.confidence - 0.9).abs() < 1e-6);
		assert_eq!(result.basis, Basis::Button);
	}

	#[test]
	fn close_runner_up_disables_early_exit() {
		let c = classifier(&[
			("A", 0.5, Weights { page: 0.5, button: 0.5 }),
			("B", 0.5, Weights { page: 0.5, button: 0.5 }),
		]);
		let mut consulted = Vec::new();
		let result = c
			.decide(&[0.9, 0.87], |i| {
				consulted.push(i);
				Ok([0.4, 0.9][i])
			})
			.unwrap();
		assert_eq!(consulted, vec![0, 1]);
		assert_eq!(result.state.as_deref(), Some("B"));
		assert!((result.confidence - 0.885).abs() < 1e-6);
	}

	#[test]
	fn button_at_threshold_is_not_decisive() {
		let c = classifier(&[("A", 0.5, Weights::PAGE_ONLY), ("B", 0.5, Weights::PAGE_ONLY)]);
		let result = c.decide(&[0.85, 0.0], |i| Ok([0.2, 0.7][i])).unwrap();
		assert_eq!(result.basis, Basis::Fused);
		assert_eq!(result.state.as_deref(), Some("B"));
	}

	#[test]
	fn per_state_weights_and_thresholds_apply() {
		// A is layout-dominant, B is button-dominant.
		let c = classifier(&[
			("A", 0.9, Weights { page: 0.8, button: 0.2 }),
			("B", 0.6, Weights { page: 0.2, button: 0.8 }),
		]);
		// A: 0.72 + 0.02 = 0.74 beats B: 0.10 + 0.56 = 0.66, but misses A's 0.9.
		let result = c.decide(&[0.1, 0.7], |i| Ok([0.9, 0.5][i])).unwrap();
		assert_eq!(result.state, None);
		assert!((result.confidence - 0.74).abs() < 1e-6);

		let result = c.decide(&[0.1, 0.84], |i| Ok([0.9, 0.5][i])).unwrap();
		assert_eq!(result.state.as_deref(), Some("B"));
	}

	#[test]
	fn single_state_catalog_always_has_a_winner() {
		let c = classifier(&[("A", 0.5, Weights::PAGE_ONLY)]);
		let result = c.decide(&[0.0], |_| Ok(0.0)).unwrap();
		assert_eq!(result.state, None);
		assert_eq!(result.confidence, 0.0);

		let result = c.decide(&[0.0], |_| Ok(0.8)).unwrap();
		assert_eq!(result.state.as_deref(), Some("A"));
	}

	#[test]
	fn page_errors_propagate() {
		let c = classifier(&[("A", 0.5, Weights::PAGE_ONLY)]);
		let result = c.decide(&[0.0], |_| Err(RecognitionError::Resize("boom".into())));
		assert!(matches!(result, Err(RecognitionError::Resize(_))));
	}

	#[test]
	fn catalog_validation_fails_fast() {
		let dup = vec![
			StateTemplate::new("A", flat(2, 2, 0), 0.5, Weights::PAGE_ONLY),
			StateTemplate::new("A", flat(2, 2, 0), 0.5, Weights::PAGE_ONLY),
		];
		assert!(matches!(
			StateClassifier::new(dup, SearchParams::default()),
			Err(CatalogError::DuplicateState(name)) if name == "A"
		));

		let bad_threshold = vec![StateTemplate::new("A", flat(2, 2, 0), 1.5, Weights::PAGE_ONLY)];
		assert!(matches!(
			StateClassifier::new(bad_threshold, SearchParams::default()),
			Err(CatalogError::InvalidThreshold { .. })
		));

		let bad_weights = vec![StateTemplate::new("A", flat(2, 2, 0), 0.5, Weights { page: 0.7, button: 0.7 })];
		assert!(matches!(
			StateClassifier::new(bad_weights, SearchParams::default()),
			Err(CatalogError::InvalidWeights { .. })
		));

		assert!(matches!(
			StateClassifier::new(Vec::new(), SearchParams::default()),
			Err(CatalogError::Empty)
		));
	}

	#[test]
	fn empty_frame_is_a_recognition_error() {
		let c = classifier(&[("A", 0.5, Weights::PAGE_ONLY)]);
		let frame = OwnedImage::from_rgba(0, &[]);
		assert!(matches!(c.classify(&frame), Err(RecognitionError::EmptyFrame { .. })));
	}

	/// Scene with a bright button in the lower half and a state-specific stripe.
	fn scene(stripe: u8, button_x: Option<u32>) -> OwnedGray {
		OwnedGray::from_fn(60, 80, move |x, y| {
			if let Some(bx) = button_x {
				if (bx..bx + 10).contains(&x) && (60..68).contains(&y) {
					return 240;
				}
			}
			if y < 10 { stripe } else { 40 }
		})
	}

	fn button() -> OwnedGray {
		OwnedGray::from_fn(10, 8, |_, _| 240)
	}

	#[test]
	fn classifies_real_frames_by_button() {
		let battle = StateTemplate::new("Battle", scene(200, Some(25)), 0.7, Weights { page: 0.5, button: 0.5 })
			.with_button(button());
		let menu = StateTemplate::new("Menu", scene(10, None), 0.7, Weights::PAGE_ONLY);
		let c = StateClassifier::new(vec![battle, menu], SearchParams::default()).unwrap();

		let frame = scene(200, Some(25));
		let result = c.classify_gray(frame.as_view()).unwrap();
		assert_eq!(result.state.as_deref(), Some("Battle"));
		assert_eq!(result.basis, Basis::Button);
		assert_eq!(result.confidence, 1.0);
	}

	#[test]
	fn classifies_buttonless_frames_by_layout() {
		let battle = StateTemplate::new("Battle", scene(200, Some(25)), 0.7, Weights { page: 0.5, button: 0.5 })
			.with_button(button());
		let menu = StateTemplate::new("Menu", scene(10, None), 0.7, Weights::PAGE_ONLY);
		let c = StateClassifier::new(vec![battle, menu], SearchParams::default()).unwrap();

		let frame = scene(10, None);
		let result = c.classify_gray(frame.as_view()).unwrap();
		assert_eq!(result.state.as_deref(), Some("Menu"));
		assert_eq!(result.basis, Basis::Fused);
		assert_eq!(result.confidence, 1.0);
	}

	#[test]
	fn best_of_several_references_counts() {
		let state = StateTemplate::new("Chest", flat(8, 8, 0), 0.9, Weights::PAGE_ONLY).with_reference(flat(8, 8, 100));
		let c = StateClassifier::new(vec![state], SearchParams::default()).unwrap();
		let frame = flat(16, 16, 100);
		let result = c.classify_gray(frame.as_view()).unwrap();
		assert_eq!(result.state.as_deref(), Some("Chest"));
		assert!(result.confidence > 0.99);
	}
}
