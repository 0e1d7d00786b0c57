//! Click targets.
//!
//! Targets are resolution independent when given as percentages of the
//! tracked region. The legacy untagged form `[x, y]` is interpreted by range:
//! both values in `0..=100` mean percent, anything else is absolute. An
//! absolute point that happens to fall inside `0..=100` on both axes cannot be
//! expressed that way; use the tagged `{"absolute": [x, y]}` form.

use serde::{Deserialize, Serialize};

use crate::region::WindowRegion;

/// Raw, untagged point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPoint {
	pub x: f64,
	pub y: f64,
}

impl TargetPoint {
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}

	/// Where `(x, y)` sits within `region`, in percent of its size.
	///
	/// Points outside the region give values outside `0..=100`.
	pub fn relative_to(x: i32, y: i32, region: WindowRegion) -> Self {
		Self {
			x: (x as f64 - region.x() as f64) / region.width() as f64 * 100.0,
			y: (y as f64 - region.y() as f64) / region.height() as f64 * 100.0,
		}
	}

	fn is_percent_range(&self) -> bool {
		(0.0..=100.0).contains(&self.x) && (0.0..=100.0).contains(&self.y)
	}
}

/// A click target with its interpretation fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TargetRepr", into = "TargetRepr")]
pub enum Target {
	/// Percent (0..=100) of the tracked region's width/height.
	Percent { x: f64, y: f64 },
	/// Device coordinates, used as-is.
	Absolute { x: f64, y: f64 },
}

impl Target {
	/// Range-based interpretation of an untagged point.
	pub fn infer(point: TargetPoint) -> Self {
		if point.is_percent_range() {
			Target::Percent { x: point.x, y: point.y }
		} else {
			Target::Absolute { x: point.x, y: point.y }
		}
	}

	/// Device coordinates of this target inside `region` (truncated).
	pub fn resolve(&self, region: WindowRegion) -> (i32, i32) {
		match *self {
			Target::Percent { x, y } => (
				region.x().saturating_add((x / 100.0 * region.width() as f64) as i32),
				region.y().saturating_add((y / 100.0 * region.height() as f64) as i32),
			),
			Target::Absolute { x, y } => (x as i32, y as i32),
		}
	}

	pub fn needs_region(&self) -> bool {
		matches!(self, Target::Percent { .. })
	}
}

impl From<TargetPoint> for Target {
	fn from(point: TargetPoint) -> Self {
		Target::infer(point)
	}
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetRepr {
	Percent { percent: [f64; 2] },
	Absolute { absolute: [f64; 2] },
	Inferred([f64; 2]),
}

impl From<TargetRepr> for Target {
	fn from(repr: TargetRepr) -> Self {
		match repr {
			TargetRepr::Percent { percent: [x, y] } => Target::Percent { x, y },
			TargetRepr::Absolute { absolute: [x, y] } => Target::Absolute { x, y },
			TargetRepr::Inferred([x, y]) => Target::infer(TargetPoint::new(x, y)),
		}
	}
}

impl From<Target> for TargetRepr {
	fn from(target: Target) -> Self {
		match target {
			Target::Percent { x, y } => TargetRepr::Percent { percent: [x, y] },
			Target::Absolute { x, y } => TargetRepr::Absolute { absolute: [x, y] },
		}
	}
}
