//! Debug snapshots: draw where a button was found on a screenshot.

use std::path::Path;

use anyhow::{Context, Result};
use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::compare::{Match, locate};
use crate::{Gray, OwnedImage, SearchParams};

const MARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MARK_THICKNESS: u32 = 3;

/// Locate `button` on `screenshot` and outline it in red.
///
/// Returns the annotated copy and the match, or `None` when the button does
/// not fit in the screenshot.
pub fn annotate_button(screenshot: &OwnedImage, button: Gray, params: &SearchParams) -> Option<(image::RgbImage, Match)> {
	let gray = screenshot.to_gray();
	let found = locate(gray.as_view(), button, params.start_fraction, params.step)?;

	let mut out = screenshot.to_rgb_image();
	for i in 0..MARK_THICKNESS {
		let (x, y) = (found.x as i32 - i as i32, found.y as i32 - i as i32);
		let rect = Rect::at(x, y).of_size(found.width + 2 * i, found.height + 2 * i);
		draw_hollow_rect_mut(&mut out, rect, MARK_COLOR);
	}
	Some((out, found))
}

/// Annotate and write the result as PNG.
pub fn save_annotated(
	screenshot: &OwnedImage,
	button: Gray,
	params: &SearchParams,
	out: impl AsRef<Path>,
) -> Result<Option<Match>> {
	let out = out.as_ref();
	let Some((img, found)) = annotate_button(screenshot, button, params) else {
		return Ok(None);
	};
	img.save_with_format(out, image::ImageFormat::Png)
		.with_context(|| format!("save {:?}", out))?;
	Ok(Some(found))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::OwnedGray;

	fn screenshot() -> OwnedImage {
		let img = image::RgbImage::from_fn(30, 30, |x, y| {
			if (10..16).contains(&x) && (20..24).contains(&y) { Rgb([250, 250, 250]) } else { Rgb([0, 0, 0]) }
		});
		OwnedImage::from_rgb_image(&img)
	}

	#[test]
	fn outlines_the_located_button() {
		let button = OwnedGray::from_fn(6, 4, |_, _| 250);
		let params = SearchParams { step: 1, ..SearchParams::default() };
		let (img, found) = annotate_button(&screenshot(), button.as_view(), &params).unwrap();

		assert_eq!((found.x, found.y), (10, 20));
		assert_eq!(*img.get_pixel(10, 20), MARK_COLOR);
		assert_eq!(*img.get_pixel(8, 18), MARK_COLOR);
		assert_eq!(*img.get_pixel(12, 22), Rgb([250, 250, 250]));
		assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
	}

	#[test]
	fn oversized_button_is_not_annotated() {
		let button = OwnedGray::from_fn(40, 4, |_, _| 250);
		assert!(annotate_button(&screenshot(), button.as_view(), &SearchParams::default()).is_none());
	}

	#[test]
	fn writes_png() {
		let dir = tempfile::tempdir().unwrap();
		let out = dir.path().join("marked.png");
		let button = OwnedGray::from_fn(6, 4, |_, _| 250);
		let params = SearchParams { step: 1, ..SearchParams::default() };
		let found = save_annotated(&screenshot(), button.as_view(), &params, &out).unwrap();
		assert!(found.is_some());
		assert_eq!(OwnedImage::open(&out).unwrap().width(), 30);
	}
}
