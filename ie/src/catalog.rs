//! Loading state templates from disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::{StateTemplate, Weights, validate_state};
use crate::{CatalogError, ImageLoadError, OwnedGray};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// On-disk description of one state.
///
/// `threshold` and `weights` have no defaults: a state missing either is
/// rejected when the catalog is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
	pub name: String,
	/// Whole-scene reference: an image file, or a directory of variants.
	pub reference: PathBuf,
	/// Optional button patch searched for in the lower part of the frame.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub button: Option<PathBuf>,
	pub threshold: f32,
	pub weights: Weights,
}

impl StateSpec {
	pub fn validate(&self) -> Result<(), CatalogError> {
		validate_state(&self.name, self.threshold, self.weights)
	}

	/// Load this state's templates, resolving relative paths against `base`.
	///
	/// A reference that cannot be read is an error. A button that cannot be
	/// read is logged and left out; the state then scores 0 on buttons.
	pub fn load(&self, base: &Path) -> Result<StateTemplate, CatalogError> {
		self.validate()?;

		let mut references = load_references(&base.join(&self.reference))
			.map_err(|source| CatalogError::Reference {
				state: self.name.clone(),
				source,
			})?
			.into_iter();
		// `load_references` never returns an empty list.
		let Some(first) = references.next() else {
			return Err(CatalogError::Reference {
				state: self.name.clone(),
				source: ImageLoadError::EmptyDirectory(base.join(&self.reference)),
			});
		};

		let mut template = StateTemplate::new(&self.name, first, self.threshold, self.weights);
		for reference in references {
			template = template.with_reference(reference);
		}

		if let Some(button) = &self.button {
			match OwnedGray::open(base.join(button)) {
				Ok(img) => template = template.with_button(img),
				Err(err) => {
					tracing::warn!(state = %self.name, error = %err, "button template unavailable; button score will be 0");
				}
			}
		}

		tracing::info!(
			state = %self.name,
			references = template.references().len(),
			button = template.button().is_some(),
			"loaded state templates"
		);
		Ok(template)
	}
}

/// Load every state in `specs`.
pub fn load_catalog(specs: &[StateSpec], base: &Path) -> Result<Vec<StateTemplate>, CatalogError> {
	specs.iter().map(|spec| spec.load(base)).collect()
}

fn is_image_file(path: &Path) -> bool {
	path.is_file()
		&& path
			.extension()
			.and_then(|e| e.to_str())
			.is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// A single file, or every image in a directory (sorted by file name).
fn load_references(path: &Path) -> Result<Vec<OwnedGray>, ImageLoadError> {
	if !path.is_dir() {
		return Ok(vec![OwnedGray::open(path)?]);
	}

	let entries = std::fs::read_dir(path).map_err(|source| ImageLoadError::Io {
		path: path.to_path_buf(),
		source,
	})?;
	let mut files = entries
		.flatten()
		.map(|e| e.path())
		.filter(|p| is_image_file(p))
		.collect::<Vec<_>>();
	files.sort();

	if files.is_empty() {
		return Err(ImageLoadError::EmptyDirectory(path.to_path_buf()));
	}
	files.iter().map(OwnedGray::open).collect()
}
