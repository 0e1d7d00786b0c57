//! Saving captures of the tracked region to disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::backend::Backend;
use crate::clock::Clock;
use crate::tracker::WindowRegionTracker;

/// `{prefix}_{YYYYmmdd_HHMMSS}_{index}.png`
pub fn frame_file_name(prefix: &str, now: DateTime<Local>, index: usize) -> String {
	format!("{prefix}_{}_{index:03}.png", now.format("%Y%m%d_%H%M%S"))
}

/// Writes frames into one directory under timestamped, numbered names.
pub struct FrameSink {
	dir: PathBuf,
	prefix: String,
	saved: usize,
}

impl FrameSink {
	/// Creates `dir` if needed.
	pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self> {
		let dir = dir.into();
		fs::create_dir_all(&dir).with_context(|| format!("create frame directory {}", dir.display()))?;
		Ok(Self { dir, prefix: prefix.into(), saved: 0 })
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Number of frames written so far.
	pub fn saved(&self) -> usize {
		self.saved
	}

	pub fn save(&mut self, frame: &ie::OwnedImage) -> Result<PathBuf> {
		let path = self.dir.join(frame_file_name(&self.prefix, Local::now(), self.saved + 1));
		frame
			.to_rgb_image()
			.save_with_format(&path, xcap::image::ImageFormat::Png)
			.with_context(|| format!("save frame {}", path.display()))?;
		self.saved += 1;
		tracing::debug!(path = %path.display(), width = frame.width(), height = frame.height(), "saved frame");
		Ok(path)
	}
}

/// Capture the tracked region `count` times, `interval` apart, saving each frame.
///
/// A failed capture is logged and skipped, and drops the cached region. A
/// failed write stops the series.
pub fn capture_series<B: Backend + ?Sized, T: Clock, C: Clock>(
	tracker: &mut WindowRegionTracker<T>,
	backend: &mut B,
	clock: &C,
	sink: &mut FrameSink,
	count: u32,
	interval: Duration,
) -> Result<Vec<PathBuf>> {
	let mut saved = Vec::with_capacity(count as usize);
	for shot in 1..=count {
		let region = tracker.current_region(&mut *backend, false);
		match backend.capture_region(region) {
			Ok(frame) => {
				let path = sink.save(&frame)?;
				tracing::info!(shot, count, %region, path = %path.display(), "captured region");
				saved.push(path);
			}
			Err(err) => {
				tracker.invalidate();
				tracing::warn!(shot, count, %region, error = %err, "capture failed");
			}
		}
		if shot < count {
			clock.sleep(interval);
		}
	}
	Ok(saved)
}
