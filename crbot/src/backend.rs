//! Platform seam: screen capture, window geometry and pointer input.

use crate::region::{DisplayBounds, WindowRegion};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
	#[error("no window found for application {0:?}")]
	WindowNotFound(String),
	#[error("window for {app:?} reports an empty size")]
	EmptyWindow { app: String },
	#[error("screen capture failed: {0}")]
	Capture(String),
	#[error("display query failed: {0}")]
	Display(String),
	#[error("pointer input failed: {0}")]
	Input(String),
	#[error("pointer cannot reach ({x}, {y})")]
	Unreachable { x: i32, y: i32 },
}

impl BackendError {
	/// Whether repeating the same call may succeed.
	pub fn is_transient(&self) -> bool {
		!matches!(self, BackendError::Unreachable { .. })
	}
}

/// Everything the bot needs from the operating system.
///
/// Implementations may block. Coordinates are device pixels.
pub trait Backend {
	fn capture_region(&mut self, region: WindowRegion) -> Result<ie::OwnedImage, BackendError>;
	fn query_window_geometry(&mut self, app_name: &str) -> Result<WindowRegion, BackendError>;
	/// Union of all attached displays.
	fn display_bounds(&mut self) -> Result<DisplayBounds, BackendError>;
	fn move_mouse(&mut self, x: i32, y: i32) -> Result<(), BackendError>;
	/// Move to `(x, y)` and press the primary button once.
	fn click(&mut self, x: i32, y: i32) -> Result<(), BackendError>;
}

#[cfg(test)]
pub use scripted::ScriptedBackend;
