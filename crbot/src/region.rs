//! Screen-space rectangles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in absolute screen coordinates.
///
/// Always non-empty: constructors reject zero or negative sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRegion", into = "RawRegion")]
pub struct WindowRegion {
	x: i32,
	y: i32,
	width: i32,
	height: i32,
}

#[derive(Serialize, Deserialize)]
struct RawRegion {
	x: i32,
	y: i32,
	width: i32,
	height: i32,
}

impl TryFrom<RawRegion> for WindowRegion {
	type Error = String;

	fn try_from(raw: RawRegion) -> Result<Self, Self::Error> {
		WindowRegion::new(raw.x, raw.y, raw.width, raw.height)
			.ok_or_else(|| format!("region size must be positive, got {}x{}", raw.width, raw.height))
	}
}

impl From<WindowRegion> for RawRegion {
	fn from(r: WindowRegion) -> Self {
		Self { x: r.x, y: r.y, width: r.width, height: r.height }
	}
}

impl WindowRegion {
	/// Host geometry assumed when the real window cannot be queried.
	pub const FALLBACK_HOST: Self = Self { x: 400, y: 100, width: 800, height: 600 };

	pub fn new(x: i32, y: i32, width: i32, height: i32) -> Option<Self> {
		(width > 0 && height > 0).then_some(Self { x, y, width, height })
	}

	pub fn x(&self) -> i32 {
		self.x
	}

	pub fn y(&self) -> i32 {
		self.y
	}

	pub fn width(&self) -> i32 {
		self.width
	}

	pub fn height(&self) -> i32 {
		self.height
	}

	/// Far edges saturate at `i32::MAX`.
	pub fn right(&self) -> i32 {
		self.x.saturating_add(self.width)
	}

	pub fn bottom(&self) -> i32 {
		self.y.saturating_add(self.height)
	}

	/// Inclusive on all four edges.
	pub fn contains(&self, x: i32, y: i32) -> bool {
		(self.x..=self.right()).contains(&x) && (self.y..=self.bottom()).contains(&y)
	}
}

impl fmt::Display for WindowRegion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
	}
}

/// Sub-rectangle expressed as fractions (0..=1) of a host window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
	pub x: f32,
	pub y: f32,
	pub width: f32,
	pub height: f32,
}

impl RelativeRect {
	pub const FULL: Self = Self { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };

	pub fn is_valid(&self) -> bool {
		let unit = 0.0..=1.0;
		unit.contains(&self.x)
			&& unit.contains(&self.y)
			&& self.width > 0.0
			&& self.height > 0.0
			&& self.x + self.width <= 1.0 + f32::EPSILON
			&& self.y + self.height <= 1.0 + f32::EPSILON
	}

	/// Absolute rectangle of this fraction of `host` (at least 1x1).
	pub fn apply(&self, host: WindowRegion) -> WindowRegion {
		let x = host.x.saturating_add((self.x * host.width as f32) as i32);
		let y = host.y.saturating_add((self.y * host.height as f32) as i32);
		let width = ((self.width * host.width as f32) as i32).max(1);
		let height = ((self.height * host.height as f32) as i32).max(1);
		WindowRegion { x, y, width, height }
	}
}

/// Physical display area (union of all monitors). Half-open on the far edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayBounds {
	pub x: i32,
	pub y: i32,
	pub width: i32,
	pub height: i32,
}

impl DisplayBounds {
	pub const FALLBACK: Self = Self { x: 0, y: 0, width: 1920, height: 1080 };

	pub fn right(&self) -> i32 {
		self.x.saturating_add(self.width)
	}

	pub fn bottom(&self) -> i32 {
		self.y.saturating_add(self.height)
	}

	pub fn contains(&self, x: i32, y: i32) -> bool {
		(self.x..self.right()).contains(&x) && (self.y..self.bottom()).contains(&y)
	}

	/// Smallest bounds covering both, clamped to the `i32` range.
	pub fn union(&self, other: &Self) -> Self {
		let x = self.x.min(other.x);
		let y = self.y.min(other.y);
		let right = self.right().max(other.right());
		let bottom = self.bottom().max(other.bottom());
		Self { x, y, width: right.saturating_sub(x), height: bottom.saturating_sub(y) }
	}
}

impl fmt::Display for DisplayBounds {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
	}
}
