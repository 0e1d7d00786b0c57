//! Desktop implementation of [`Backend`]: `xcap` for windows, monitors and
//! screenshots, `rustautogui` for the pointer.

use std::time::Duration;

use rustautogui::RustAutoGui;
use xcap::image::imageops;

use crate::backend::{Backend, BackendError};
use crate::region::{DisplayBounds, WindowRegion};

/// Pause between moving the pointer and pressing the button.
const SETTLE: Duration = Duration::from_millis(20);

pub fn find_window(app_name: &str) -> Option<xcap::Window> {
	let windows = xcap::Window::all().ok()?;
	windows
		.into_iter()
		.find(|window| window.app_name().ok().as_deref() == Some(app_name) && !window.is_minimized().unwrap_or(false))
}

pub struct DesktopBackend {
	gui: RustAutoGui,
}

impl DesktopBackend {
	pub fn new() -> anyhow::Result<Self> {
		let gui = RustAutoGui::new(false).map_err(|e| anyhow::anyhow!("failed to initialize RustAutoGui: {e}"))?;
		Ok(Self { gui })
	}
}

/// The pointer API only takes unsigned coordinates.
fn to_pointer(x: i32, y: i32) -> Result<(u32, u32), BackendError> {
	match (u32::try_from(x), u32::try_from(y)) {
		(Ok(x), Ok(y)) => Ok((x, y)),
		_ => Err(BackendError::Unreachable { x, y }),
	}
}

impl Backend for DesktopBackend {
	fn capture_region(&mut self, region: WindowRegion) -> Result<ie::OwnedImage, BackendError> {
		let capture_err = |e: xcap::XCapError| BackendError::Capture(e.to_string());

		let monitor = xcap::Monitor::from_point(region.x(), region.y()).map_err(capture_err)?;
		let (mx, my) = (monitor.x().map_err(capture_err)?, monitor.y().map_err(capture_err)?);
		let logical_width = monitor.width().map_err(capture_err)?.max(1);
		let shot = monitor.capture_image().map_err(capture_err)?;

		// Screenshots are in physical pixels; geometry may be logical.
		let scale = shot.width() as f32 / logical_width as f32;
		let px = |v: i32| (v.max(0) as f32 * scale) as u32;
		let x = px(region.x() - mx).min(shot.width());
		let y = px(region.y() - my).min(shot.height());
		let width = px(region.width()).min(shot.width() - x);
		let height = px(region.height()).min(shot.height() - y);
		if width == 0 || height == 0 {
			return Err(BackendError::Capture(format!("region {region} is outside its monitor")));
		}

		let cropped = imageops::crop_imm(&shot, x, y, width, height).to_image();
		tracing::trace!(%region, width, height, scale, "captured region");
		Ok(ie::OwnedImage::from_rgba(cropped.width() as usize, cropped.as_raw()))
	}

	fn query_window_geometry(&mut self, app_name: &str) -> Result<WindowRegion, BackendError> {
		let window = find_window(app_name).ok_or_else(|| BackendError::WindowNotFound(app_name.to_owned()))?;
		let geometry_err = |e: xcap::XCapError| BackendError::Capture(e.to_string());
		let x = window.x().map_err(geometry_err)?;
		let y = window.y().map_err(geometry_err)?;
		let width = window.width().map_err(geometry_err)? as i32;
		let height = window.height().map_err(geometry_err)? as i32;
		WindowRegion::new(x, y, width, height).ok_or_else(|| BackendError::EmptyWindow { app: app_name.to_owned() })
	}

	fn display_bounds(&mut self) -> Result<DisplayBounds, BackendError> {
		let display_err = |e: xcap::XCapError| BackendError::Display(e.to_string());
		let mut bounds: Option<DisplayBounds> = None;
		for monitor in xcap::Monitor::all().map_err(display_err)? {
			let m = DisplayBounds {
				x: monitor.x().map_err(display_err)?,
				y: monitor.y().map_err(display_err)?,
				width: monitor.width().map_err(display_err)? as i32,
				height: monitor.height().map_err(display_err)? as i32,
			};
			bounds = Some(bounds.map_or(m, |b| b.union(&m)));
		}
		bounds.ok_or_else(|| BackendError::Display("no monitors attached".into()))
	}

	fn move_mouse(&mut self, x: i32, y: i32) -> Result<(), BackendError> {
		let (px, py) = to_pointer(x, y)?;
		self.gui
			.move_mouse_to_pos(px, py, 0.0)
			.map_err(|e| BackendError::Input(e.to_string()))
	}

	fn click(&mut self, x: i32, y: i32) -> Result<(), BackendError> {
		self.move_mouse(x, y)?;
		std::thread::sleep(SETTLE);
		self.gui.left_click().map_err(|e| BackendError::Input(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn negative_points_are_unreachable() {
		assert_eq!(to_pointer(0, 1079).unwrap(), (0, 1079));
		let err = to_pointer(-800, 350).unwrap_err();
		assert!(matches!(err, BackendError::Unreachable { x: -800, y: 350 }));
		assert!(!err.is_transient());
		assert!(matches!(to_pointer(10, -1), Err(BackendError::Unreachable { .. })));
	}
}
