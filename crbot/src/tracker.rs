//! Cached resolution of the region the bot works in.

use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::clock::Clock;
use crate::region::{RelativeRect, WindowRegion};

#[derive(Debug, Clone)]
pub struct TrackerSettings {
	/// Application whose window hosts the tracked region.
	pub app_name: String,
	/// Tracked part of the host window.
	pub sub_window: RelativeRect,
	pub cache_timeout: Duration,
	/// Host geometry used when the window cannot be found.
	pub fallback: WindowRegion,
}

/// Tracks the on-screen region of the target window.
///
/// The resolved region is cached for `cache_timeout`. A refresh that fails
/// still stamps the cache (with the fallback region), so a missing window is
/// not re-queried on every call.
pub struct WindowRegionTracker<C> {
	settings: TrackerSettings,
	clock: C,
	cache: Option<(WindowRegion, Instant)>,
}

impl<C: Clock> WindowRegionTracker<C> {
	pub fn new(settings: TrackerSettings, clock: C) -> Self {
		Self { settings, clock, cache: None }
	}

	pub fn settings(&self) -> &TrackerSettings {
		&self.settings
	}

	/// Geometry of the host window, or the fallback if it is unavailable.
	pub fn resolve_host_window<B: Backend + ?Sized>(&self, backend: &mut B) -> WindowRegion {
		match backend.query_window_geometry(&self.settings.app_name) {
			Ok(region) => region,
			Err(err) => {
				tracing::warn!(
					app = %self.settings.app_name,
					error = %err,
					fallback = %self.settings.fallback,
					"window geometry unavailable; using fallback"
				);
				self.settings.fallback
			}
		}
	}

	/// Current tracked region, re-querying the backend when the cached value is
	/// older than the timeout or `force_refresh` is set.
	pub fn current_region<B: Backend + ?Sized>(&mut self, backend: &mut B, force_refresh: bool) -> WindowRegion {
		let now = self.clock.now();
		if !force_refresh
			&& let Some((region, stamped)) = self.cache
			&& now.saturating_duration_since(stamped) < self.settings.cache_timeout
		{
			return region;
		}

		let region = self.settings.sub_window.apply(self.resolve_host_window(backend));
		if self.cache.map(|(old, _)| old) != Some(region) {
			tracing::debug!(region = %region, "tracked region updated");
		}
		self.cache = Some((region, now));
		region
	}

	/// Drop the cached region so the next call re-queries.
	pub fn invalidate(&mut self) {
		self.cache = None;
	}
}
