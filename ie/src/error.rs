use std::path::PathBuf;

/// A template or frame could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ImageLoadError {
	#[error("failed to decode image {path:?}: {source}")]
	Decode {
		path: PathBuf,
		source: image::ImageError,
	},
	#[error("failed to list template directory {path:?}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("template directory {0:?} contains no images")]
	EmptyDirectory(PathBuf),
	#[error("raster buffer of {len} bytes does not match {width}x{height}")]
	BufferSize { len: usize, width: u32, height: u32 },
}

/// Classification input was malformed.
///
/// Distinct from a below-threshold result, which is `Ok` with `state: None`.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
	#[error("frame is empty ({width}x{height})")]
	EmptyFrame { width: u32, height: u32 },
	#[error("template resize failed: {0}")]
	Resize(String),
}

/// The state catalog is incomplete or inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
	#[error("state catalog is empty")]
	Empty,
	#[error("state {0:?} is declared more than once")]
	DuplicateState(String),
	#[error("state {state:?}: threshold {value} is outside [0, 1]")]
	InvalidThreshold { state: String, value: f32 },
	#[error("state {state:?}: weights page={page} button={button} must lie in [0, 1] and sum to 1")]
	InvalidWeights { state: String, page: f32, button: f32 },
	#[error("state {state:?}: reference template: {source}")]
	Reference {
		state: String,
		source: ImageLoadError,
	},
}
