//! Deriving click targets from button templates.
//!
//! Each state's button is located in that state's reference screenshot and
//! its centre, as a percentage of the screenshot, becomes the click target.

use ie::compare::{self, Match};
use ie::StateClassifier;

use crate::config::Config;
use crate::region::WindowRegion;
use crate::target::{Target, TargetPoint};

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTarget {
	pub state: String,
	/// Button placement inside the reference image.
	pub found: Match,
	pub target: Target,
}

fn round2(v: f64) -> f64 {
	(v * 100.0).round() / 100.0
}

/// Locate every state's button inside its first reference image.
///
/// The whole reference is searched. States without a button template, and
/// matches scoring below the early-exit threshold, are skipped.
pub fn derive_targets(classifier: &StateClassifier) -> Vec<DerivedTarget> {
	let params = classifier.params();
	let mut derived = Vec::new();
	for state in classifier.states() {
		let (Some(button), Some(reference)) = (state.button(), state.references().first()) else {
			tracing::debug!(state = state.name(), "no button template; skipping");
			continue;
		};
		let Some(found) = compare::locate(reference.as_view(), button.as_view(), 0.0, params.step) else {
			tracing::warn!(state = state.name(), "button template is larger than the reference image");
			continue;
		};
		if found.score < params.early_exit_threshold {
			tracing::warn!(state = state.name(), score = found.score, "button not found in reference image");
			continue;
		}

		let Some(frame) = WindowRegion::new(0, 0, reference.width() as i32, reference.height() as i32) else {
			continue;
		};
		let cx = (found.x + found.width / 2) as i32;
		let cy = (found.y + found.height / 2) as i32;
		let p = TargetPoint::relative_to(cx, cy, frame);
		let target = Target::Percent { x: round2(p.x), y: round2(p.y) };
		tracing::info!(state = state.name(), x = found.x, y = found.y, score = found.score, ?target, "located button");
		derived.push(DerivedTarget { state: state.name().to_owned(), found, target });
	}
	derived
}

/// Point each state's existing action at its derived target.
///
/// The first step, and every later step aimed at the same point, are
/// retargeted. States without an action are left alone. Returns the states
/// whose action changed.
pub fn apply_targets(cfg: &mut Config, derived: &[DerivedTarget]) -> Vec<String> {
	let mut updated = Vec::new();
	for d in derived {
		let Some(action) = cfg.actions.iter_mut().find(|a| a.state == d.state) else {
			tracing::info!(state = %d.state, "no action configured; target not applied");
			continue;
		};
		let Some(first) = action.steps.first().map(|s| s.target) else {
			continue;
		};
		let mut changed = false;
		for step in action.steps.iter_mut().filter(|s| s.target == first) {
			changed |= step.target != d.target;
			step.target = d.target;
		}
		if changed {
			updated.push(d.state.clone());
		}
	}
	updated
}

#[cfg(test)]
mod tests {
	use ie::{OwnedGray, SearchParams, StateTemplate, Weights};

	use super::*;

	/// 100x50 dark page with a bright 10x8 button at (30, 20).
	fn page() -> OwnedGray {
		OwnedGray::from_fn(100, 50, |x, y| if (30..40).contains(&x) && (20..28).contains(&y) { 240 } else { 20 })
	}

	fn button() -> OwnedGray {
		OwnedGray::from_fn(10, 8, |_, _| 240)
	}

	fn classifier() -> StateClassifier {
		let weights = Weights { page: 0.4, button: 0.6 };
		let states = vec![
			StateTemplate::new("ChestReady", page(), 0.65, weights).with_button(button()),
			StateTemplate::new("InBattle", page(), 0.6, weights).with_button(button()),
			StateTemplate::new("BattleEnded", page(), 0.7, Weights::PAGE_ONLY),
			// Button absent from the page.
			StateTemplate::new("BattleNotStarted", OwnedGray::from_fn(100, 50, |_, _| 20), 0.7, weights)
				.with_button(button()),
		];
		StateClassifier::new(states, SearchParams::default()).unwrap()
	}

	#[test]
	fn button_centre_becomes_a_percent_target() {
		let derived = derive_targets(&classifier());
		let states: Vec<_> = derived.iter().map(|d| d.state.as_str()).collect();
		assert_eq!(states, vec!["ChestReady", "InBattle"]);

		let chest = &derived[0];
		assert_eq!((chest.found.x, chest.found.y), (30, 20));
		assert_eq!(chest.found.score, 1.0);
		// Centre (35, 24) of a 100x50 page.
		assert_eq!(chest.target, Target::Percent { x: 35.0, y: 48.0 });
	}

	#[test]
	fn derived_targets_replace_repeated_first_steps() {
		let mut cfg = Config::default();
		let derived = derive_targets(&classifier());
		let updated = apply_targets(&mut cfg, &derived);

		// InBattle has no action, so nothing is created for it.
		assert_eq!(updated, vec!["ChestReady".to_string()]);
		let chest = cfg.actions.iter().find(|a| a.state == "ChestReady").unwrap();
		let targets: Vec<_> = chest.steps.iter().map(|s| s.target).collect();
		let new = Target::Percent { x: 35.0, y: 48.0 };
		assert_eq!(targets, vec![new, new, new, new, Target::Percent { x: 50.0, y: 88.0 }]);
		assert!(cfg.validate().is_ok());

		assert!(apply_targets(&mut cfg, &derived).is_empty());
	}

	#[test]
	fn updated_config_survives_a_save() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("crbot.json");
		let mut cfg = Config::default();
		apply_targets(&mut cfg, &derive_targets(&classifier()));
		cfg.save(&path).unwrap();
		assert_eq!(Config::load(&path).unwrap(), cfg);
	}
}
