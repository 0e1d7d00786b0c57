use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Resolve the template directory in a way that works both:
/// - when running from the repo (`cargo run`), and
/// - when running a packaged binary (templates next to the executable).
///
/// Absolute paths are used as-is. You can override discovery of relative paths
/// by setting `CRBOT_ASSETS_DIR` to the folder that contains them.
pub fn resolve_template_dir(template_dir: &Path) -> Result<PathBuf> {
	if template_dir.is_absolute() {
		if template_dir.is_dir() {
			return Ok(template_dir.to_path_buf());
		}
		bail!("template directory {} does not exist", template_dir.display());
	}

	let mut candidates: Vec<PathBuf> = Vec::new();
	if let Some(dir) = std::env::var_os("CRBOT_ASSETS_DIR") {
		candidates.push(PathBuf::from(dir));
	}
	if let Ok(exe) = std::env::current_exe()
		&& let Some(dir) = exe.parent()
	{
		candidates.push(dir.to_path_buf());
	}
	if let Ok(cwd) = std::env::current_dir() {
		candidates.push(cwd);
	}
	// Compile-time path to the workspace root, for local runs from another CWD.
	#[cfg(debug_assertions)]
	candidates.push(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".."));

	search(template_dir, candidates)
}

fn search(template_dir: &Path, candidates: Vec<PathBuf>) -> Result<PathBuf> {
	let mut tried = Vec::new();
	for base in candidates {
		let dir = base.join(template_dir);
		if dir.is_dir() {
			tracing::debug!(dir = %dir.display(), "resolved template directory");
			return Ok(dir);
		}
		tried.push(dir);
	}

	bail!(
		"template directory {:?} not found.\n\nSearched in:\n{}\n\nFix: copy it next to the executable (or set CRBOT_ASSETS_DIR to the folder that contains it).",
		template_dir,
		tried
			.into_iter()
			.map(|p| format!("  - {}", p.display()))
			.collect::<Vec<_>>()
			.join("\n")
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn first_candidate_containing_the_directory_wins() {
		let a = tempfile::tempdir().unwrap();
		let b = tempfile::tempdir().unwrap();
		std::fs::create_dir(b.path().join("png")).unwrap();

		let found = search(Path::new("png"), vec![a.path().to_path_buf(), b.path().to_path_buf()]).unwrap();
		assert_eq!(found, b.path().join("png"));
	}

	#[test]
	fn error_lists_every_searched_location() {
		let a = tempfile::tempdir().unwrap();
		let err = search(Path::new("png"), vec![a.path().to_path_buf()]).unwrap_err();
		assert!(err.to_string().contains(&a.path().join("png").display().to_string()));
	}

	#[test]
	fn absolute_directory_is_used_directly() {
		let a = tempfile::tempdir().unwrap();
		assert_eq!(resolve_template_dir(a.path()).unwrap(), a.path());
	}
}
