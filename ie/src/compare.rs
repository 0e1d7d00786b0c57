//! Pixel-level similarity primitives.
//!
//! All scores use the same difference ratio:
//! `1 - sum(|a - b|) / (pixel_count * 255)`, clamped to `[0, 1]`.

use crate::{Gray, RecognitionError};

/// Best placement of a patch found by [`locate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
	pub x: u32,
	pub y: u32,
	pub width: u32,
	pub height: u32,
	pub score: f32,
}

fn similarity_from_diff(diff: u64, pixels: u64) -> f32 {
	if pixels == 0 {
		return 0.0;
	}
	let ratio = diff as f64 / (pixels as f64 * 255.0);
	(1.0 - ratio).clamp(0.0, 1.0) as f32
}

/// Sum of absolute differences of two equally sized views.
///
/// Stops early once the running sum exceeds `limit`.
fn abs_diff(a: Gray, b: Gray, limit: u64) -> u64 {
	debug_assert_eq!((a.width(), a.height()), (b.width(), b.height()));
	let mut sum = 0u64;
	for y in 0..a.height() {
		sum += a
			.row(y)
			.iter()
			.zip(b.row(y))
			.map(|(&p, &q)| p.abs_diff(q) as u64)
			.sum::<u64>();
		if sum > limit {
			break;
		}
	}
	sum
}

/// Compare two frames pixel by pixel.
///
/// Frames of different size are both cropped to their common top-left
/// rectangle first, so they remain comparable.
pub fn full_frame_similarity(a: Gray, b: Gray) -> f32 {
	let w = a.width().min(b.width());
	let h = a.height().min(b.height());
	let a = a.top_left(w, h);
	let b = b.top_left(w, h);
	similarity_from_diff(abs_diff(a, b, u64::MAX), w as u64 * h as u64)
}

/// Resize `template` to the frame's dimensions, then compare whole frames.
pub fn scaled_template_similarity(frame: Gray, template: Gray) -> Result<f32, RecognitionError> {
	if frame.is_empty() || template.is_empty() {
		return Ok(0.0);
	}
	if frame.width() == template.width() && frame.height() == template.height() {
		return Ok(full_frame_similarity(frame, template));
	}
	let resized = template.to_owned_gray().resized(frame.width(), frame.height())?;
	Ok(full_frame_similarity(frame, resized.as_view()))
}

/// Exhaustively scan `frame` for the placement of `patch` with the highest
/// similarity.
///
/// Candidate offsets advance by `step` on both axes. Rows above
/// `start_fraction * frame_height` are skipped; the band start is clamped to
/// the last valid offset so the bottom-most placement is always tried.
///
/// Returns `None` when the patch does not fit inside the frame.
pub fn locate(frame: Gray, patch: Gray, start_fraction: f32, step: u32) -> Option<Match> {
	if patch.is_empty() || patch.width() > frame.width() || patch.height() > frame.height() {
		return None;
	}

	let (pw, ph) = (patch.width(), patch.height());
	let max_x = frame.width() - pw;
	let max_y = frame.height() - ph;
	let start_y = ((start_fraction.clamp(0.0, 1.0) * frame.height() as f32) as u32).min(max_y);
	let step = step.max(1) as usize;
	let pixels = pw as u64 * ph as u64;

	let mut best: Option<(u32, u32, u64)> = None;
	for y in (start_y..=max_y).step_by(step) {
		for x in (0..=max_x).step_by(step) {
			let limit = best.map_or(u64::MAX, |(_, _, d)| d);
			let diff = abs_diff(frame.sub_image(x, y, pw, ph), patch, limit);
			if best.is_none() || diff < limit {
				best = Some((x, y, diff));
			}
		}
	}

	best.map(|(x, y, diff)| Match {
		x,
		y,
		width: pw,
		height: ph,
		score: similarity_from_diff(diff, pixels),
	})
}

/// Maximum similarity of `patch` anywhere in the searched band of `frame`.
///
/// Exactly `0.0` when the patch is larger than the frame on either axis.
pub fn sliding_window_match(frame: Gray, patch: Gray, start_fraction: f32, step: u32) -> f32 {
	locate(frame, patch, start_fraction, step).map_or(0.0, |m| m.score)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::OwnedGray;

	fn gradient(w: u32, h: u32) -> OwnedGray {
		OwnedGray::from_fn(w, h, |x, y| ((x * 7 + y * 13) % 256) as u8)
	}

	#[test]
	fn identical_frames_score_one() {
		let a = gradient(32, 24);
		assert_eq!(full_frame_similarity(a.as_view(), a.as_view()), 1.0);
		assert_eq!(scaled_template_similarity(a.as_view(), a.as_view()).unwrap(), 1.0);
	}

	#[test]
	fn similarity_is_symmetric() {
		let a = gradient(20, 10);
		let b = OwnedGray::from_fn(20, 10, |x, y| ((x * 3 + y * 31) % 200) as u8);
		assert_eq!(
			full_frame_similarity(a.as_view(), b.as_view()),
			full_frame_similarity(b.as_view(), a.as_view())
		);
	}

	#[test]
	fn opposite_frames_score_zero() {
		let black = OwnedGray::from_fn(4, 4, |_, _| 0);
		let white = OwnedGray::from_fn(4, 4, |_, _| 255);
		assert_eq!(full_frame_similarity(black.as_view(), white.as_view()), 0.0);
	}

	#[test]
	fn difference_ratio_is_per_pixel() {
		// Half the pixels differ by 255 -> similarity 0.5.
		let a = OwnedGray::from_fn(4, 2, |_, _| 0);
		let b = OwnedGray::from_fn(4, 2, |_, y| if y == 0 { 255 } else { 0 });
		assert!((full_frame_similarity(a.as_view(), b.as_view()) - 0.5).abs() < 1e-6);
	}

	#[test]
	fn mismatched_sizes_compare_common_top_left() {
		let big = OwnedGray::from_fn(10, 10, |x, y| if x < 4 && y < 3 { 50 } else { 255 });
		let small = OwnedGray::from_fn(4, 3, |_, _| 50);
		assert_eq!(full_frame_similarity(big.as_view(), small.as_view()), 1.0);
		assert_eq!(full_frame_similarity(small.as_view(), big.as_view()), 1.0);
	}

	#[test]
	fn empty_region_scores_zero() {
		let a = OwnedGray::from_fn(0, 5, |_, _| 0);
		let b = gradient(5, 5);
		assert_eq!(full_frame_similarity(a.as_view(), b.as_view()), 0.0);
		assert_eq!(scaled_template_similarity(b.as_view(), a.as_view()).unwrap(), 0.0);
	}

	#[test]
	fn scaled_template_matches_resized_scene() {
		let frame = OwnedGray::from_fn(40, 40, |_, _| 90);
		let template = OwnedGray::from_fn(20, 20, |_, _| 90);
		let score = scaled_template_similarity(frame.as_view(), template.as_view()).unwrap();
		assert!(score > 0.99, "score {score}");
	}

	#[test]
	fn oversized_patch_scores_exactly_zero() {
		let frame = gradient(10, 10);
		let wide = gradient(11, 2);
		let tall = gradient(2, 11);
		assert_eq!(sliding_window_match(frame.as_view(), wide.as_view(), 0.0, 1), 0.0);
		assert_eq!(sliding_window_match(frame.as_view(), tall.as_view(), 0.0, 1), 0.0);
		assert!(locate(frame.as_view(), wide.as_view(), 0.0, 1).is_none());
	}

	#[test]
	fn locates_patch_in_lower_band() {
		let frame = OwnedGray::from_fn(40, 40, |x, y| {
			if (20..26).contains(&x) && (30..34).contains(&y) { 250 } else { 10 }
		});
		let patch = OwnedGray::from_fn(6, 4, |_, _| 250);

		let m = locate(frame.as_view(), patch.as_view(), 0.5, 5).unwrap();
		assert_eq!((m.x, m.y), (20, 30));
		assert_eq!(m.score, 1.0);
		assert_eq!(sliding_window_match(frame.as_view(), patch.as_view(), 0.5, 5), 1.0);
	}

	#[test]
	fn band_excludes_upper_part_of_frame() {
		let frame = OwnedGray::from_fn(20, 20, |x, y| if x < 5 && y < 5 { 255 } else { 0 });
		let patch = OwnedGray::from_fn(5, 5, |_, _| 255);
		assert_eq!(sliding_window_match(frame.as_view(), patch.as_view(), 0.0, 1), 1.0);
		assert_eq!(sliding_window_match(frame.as_view(), patch.as_view(), 0.5, 1), 0.0);
	}

	#[test]
	fn band_start_is_clamped_to_last_offset() {
		let frame = OwnedGray::from_fn(8, 8, |_, y| if y >= 6 { 200 } else { 0 });
		let patch = OwnedGray::from_fn(8, 2, |_, _| 200);
		let m = locate(frame.as_view(), patch.as_view(), 0.95, 5).unwrap();
		assert_eq!((m.x, m.y), (0, 6));
		assert_eq!(m.score, 1.0);
	}

	#[test]
	fn zero_step_is_treated_as_one() {
		let frame = OwnedGray::from_fn(6, 6, |x, y| if x == 3 && y == 3 { 255 } else { 0 });
		let patch = OwnedGray::from_fn(1, 1, |_, _| 255);
		assert_eq!(sliding_window_match(frame.as_view(), patch.as_view(), 0.0, 0), 1.0);
	}
}
