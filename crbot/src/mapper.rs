//! Converting click targets into validated device coordinates.

use std::fmt;

use crate::backend::Backend;
use crate::clock::Clock;
use crate::region::{DisplayBounds, WindowRegion};
use crate::target::{Target, TargetPoint};
use crate::tracker::WindowRegionTracker;

/// Why a point was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsViolation {
	OffDisplay(DisplayBounds),
	OutsideRegion(WindowRegion),
}

impl fmt::Display for BoundsViolation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BoundsViolation::OffDisplay(d) => write!(f, "outside display bounds {d}"),
			BoundsViolation::OutsideRegion(r) => write!(f, "outside tracked region {r}"),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("point ({x}, {y}) rejected: {}", join_violations(.violations))]
pub struct OutOfBounds {
	pub x: i32,
	pub y: i32,
	pub violations: Vec<BoundsViolation>,
}

fn join_violations(violations: &[BoundsViolation]) -> String {
	violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl OutOfBounds {
	pub fn off_display(&self) -> bool {
		self.violations.iter().any(|v| matches!(v, BoundsViolation::OffDisplay(_)))
	}

	pub fn outside_region(&self) -> bool {
		self.violations.iter().any(|v| matches!(v, BoundsViolation::OutsideRegion(_)))
	}
}

/// Short-lived view over the tracker and backend.
///
/// Region and display bounds are fetched on every call (the tracker cache
/// applies), so a mapper never holds stale geometry.
pub struct CoordinateMapper<'a, B: ?Sized, C> {
	tracker: &'a mut WindowRegionTracker<C>,
	backend: &'a mut B,
	display_fallback: DisplayBounds,
}

impl<'a, B: Backend + ?Sized, C: Clock> CoordinateMapper<'a, B, C> {
	pub fn new(tracker: &'a mut WindowRegionTracker<C>, backend: &'a mut B, display_fallback: DisplayBounds) -> Self {
		Self { tracker, backend, display_fallback }
	}

	pub fn region(&mut self) -> WindowRegion {
		self.tracker.current_region(&mut *self.backend, false)
	}

	pub fn display(&mut self) -> DisplayBounds {
		match self.backend.display_bounds() {
			Ok(bounds) => bounds,
			Err(err) => {
				tracing::warn!(error = %err, fallback = %self.display_fallback, "display bounds unavailable; using fallback");
				self.display_fallback
			}
		}
	}

	/// Device coordinates for an untagged point, interpreted by range.
	pub fn to_absolute(&mut self, point: TargetPoint) -> (i32, i32) {
		self.resolve(Target::infer(point))
	}

	pub fn resolve(&mut self, target: Target) -> (i32, i32) {
		match target {
			Target::Absolute { x, y } => (x as i32, y as i32),
			Target::Percent { .. } => {
				let region = self.region();
				target.resolve(region)
			}
		}
	}

	/// Inverse of percent resolution: where `(x, y)` sits within the region.
	pub fn to_percentage(&mut self, x: i32, y: i32) -> TargetPoint {
		let region = self.region();
		TargetPoint::relative_to(x, y, region)
	}

	/// Accept `(x, y)` only if it is on a display and inside the tracked region.
	pub fn validate(&mut self, x: i32, y: i32) -> Result<(), OutOfBounds> {
		let display = self.display();
		let region = self.region();

		let mut violations = Vec::new();
		if !display.contains(x, y) {
			violations.push(BoundsViolation::OffDisplay(display));
		}
		if !region.contains(x, y) {
			violations.push(BoundsViolation::OutsideRegion(region));
		}

		if violations.is_empty() {
			Ok(())
		} else {
			Err(OutOfBounds { x, y, violations })
		}
	}
}
