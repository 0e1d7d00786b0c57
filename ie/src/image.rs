//! Raster primitives.
//!
//! Captures arrive as owned RGB images (`OwnedImage`). Everything the
//! classifier compares is single-channel luma: templates are loaded straight
//! into `OwnedGray`, frames are converted once per classification.
//!
//! Comparisons borrow a view (`Gray<'a>`) instead of copying pixels, so a
//! sliding-window scan over a frame never allocates.

use std::path::Path;

use crate::error::{ImageLoadError, RecognitionError};

/// Owned RGB image (no alpha).
#[derive(Clone, Debug)]
pub struct OwnedImage {
    width: u32,
    height: u32,
    data: Vec<Color>,
}

impl OwnedImage {
    /// Build an `OwnedImage` from RGBA bytes (alpha is discarded).
    ///
    /// The buffer is expected to be tightly packed: `width * height * 4` bytes.
    pub fn from_rgba(width: usize, bytes: &[u8]) -> Self {
        let height = if width == 0 { 0 } else { bytes.len() / width / 4 };
        let data = bytes
            .chunks_exact(4)
            .take(width * height)
            .map(|v| Color::new(v[0], v[1], v[2]))
            .collect::<Vec<_>>();

        Self {
            width: width as u32,
            height: height as u32,
            data,
        }
    }

    pub fn from_rgb_image(img: &image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        let data = img
            .pixels()
            .map(|p| Color::new(p.0[0], p.0[1], p.0[2]))
            .collect();
        Self { width, height, data }
    }

    /// Decode any format supported by `image` (screenshots are usually PNG).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|source| ImageLoadError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgb8();
        Ok(Self::from_rgb_image(&img))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Convert to single-channel luma.
    pub fn to_gray(&self) -> OwnedGray {
        OwnedGray {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(Color::luma).collect(),
        }
    }

    pub fn to_rgb_image(&self) -> image::RgbImage {
        let mut out = image::RgbImage::new(self.width, self.height);
        for (dst, c) in out.pixels_mut().zip(&self.data) {
            dst.0 = [c.r, c.g, c.b];
        }
        out
    }
}

// ----------

/// Owned single-channel (luma) raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedGray {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl OwnedGray {
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, ImageLoadError> {
        if data.len() != width as usize * height as usize {
            return Err(ImageLoadError::BufferSize {
                len: data.len(),
                width,
                height,
            });
        }
        Ok(Self { width, height, data })
    }

    /// Build a raster by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    pub fn from_luma(img: image::GrayImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }

    /// Load an image file and convert it to luma.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|source| ImageLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_luma(img.to_luma8()))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Create a borrowed view of the entire raster.
    pub fn as_view(&self) -> Gray<'_> {
        Gray {
            x1: 0,
            y1: 0,
            x2: self.width,
            y2: self.height,
            true_width: self.width,
            data: &self.data,
        }
    }

    /// Resize to exactly `width` x `height` (aspect ratio is not preserved).
    ///
    /// Uses `fast_image_resize` with bilinear interpolation.
    pub fn resized(&self, width: u32, height: u32) -> Result<Self, RecognitionError> {
        if self.width == width && self.height == height {
            return Ok(self.clone());
        }
        if width == 0 || height == 0 || self.width == 0 || self.height == 0 {
            return Err(RecognitionError::Resize(format!(
                "cannot resize {}x{} to {}x{}",
                self.width, self.height, width, height
            )));
        }

        let src = fast_image_resize::images::ImageRef::new(
            self.width,
            self.height,
            &self.data,
            fast_image_resize::PixelType::U8,
        )
        .map_err(|e| RecognitionError::Resize(e.to_string()))?;

        let mut dst = fast_image_resize::images::Image::new(width, height, fast_image_resize::PixelType::U8);

        let mut resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new().resize_alg(
            fast_image_resize::ResizeAlg::Interpolation(fast_image_resize::FilterType::Bilinear),
        );

        resizer
            .resize(&src, &mut dst, &Some(options))
            .map_err(|e| RecognitionError::Resize(e.to_string()))?;

        Ok(Self {
            width,
            height,
            data: dst.into_vec(),
        })
    }
}

// ----------

/// Borrowed view into an `OwnedGray`.
#[derive(Clone, Copy, Debug)]
pub struct Gray<'a> {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    true_width: u32,
    data: &'a [u8],
}

impl<'a> Gray<'a> {
    #[inline(always)]
    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Row `y` of the view (relative coordinates).
    #[inline(always)]
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = ((self.y1 + y) * self.true_width + self.x1) as usize;
        &self.data[start..start + self.width() as usize]
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        self.row(y)[x as usize]
    }

    pub fn to_owned_gray(self) -> OwnedGray {
        let mut data = Vec::with_capacity((self.width() * self.height()) as usize);
        for y in 0..self.height() {
            data.extend_from_slice(self.row(y));
        }
        OwnedGray {
            width: self.width(),
            height: self.height(),
            data,
        }
    }

    /// Create an arbitrary subimage (relative coordinates), clamped to the view.
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let x = x.min(self.width());
        let y = y.min(self.height());
        let width = width.min(self.width() - x);
        let height = height.min(self.height() - y);

        Self {
            x1: self.x1 + x,
            y1: self.y1 + y,
            x2: self.x1 + x + width,
            y2: self.y1 + y + height,
            true_width: self.true_width,
            data: self.data,
        }
    }

    /// The top-left `width` x `height` corner of the view.
    #[inline]
    pub fn top_left(&self, width: u32, height: u32) -> Self {
        self.sub_image(0, 0, width, height)
    }
}

// ----------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Compute luma (grayscale intensity, ITU-R 601 weights).
    pub fn luma(&self) -> u8 {
        let r = self.r as u32;
        let g = self.g as u32;
        let b = self.b as u32;
        ((299 * r + 587 * g + 114 * b) / 1000) as u8
    }
}
