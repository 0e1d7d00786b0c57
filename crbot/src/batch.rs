//! Offline classification of saved screenshots.
//!
//! Screenshots are usually sorted into one folder per state; when a file's
//! parent folder is named after a known state, that state is taken as the
//! expected answer and accuracy is reported.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ie::{Classification, OwnedImage, StateClassifier};

pub struct BatchEntry {
	pub path: PathBuf,
	pub expected: Option<String>,
	pub outcome: Result<Classification>,
}

impl BatchEntry {
	/// `None` when there is no expected state to compare against.
	pub fn is_correct(&self) -> Option<bool> {
		let expected = self.expected.as_deref()?;
		Some(matches!(&self.outcome, Ok(c) if c.state.as_deref() == Some(expected)))
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
	pub total: usize,
	pub recognized: usize,
	pub errors: usize,
	pub labelled: usize,
	pub correct: usize,
}

impl BatchSummary {
	pub fn accuracy(&self) -> Option<f32> {
		(self.labelled > 0).then(|| self.correct as f32 / self.labelled as f32)
	}
}

fn is_png(path: &Path) -> bool {
	path.extension()
		.and_then(|e| e.to_str())
		.is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Every PNG under `dir`, recursively, sorted by path.
pub fn collect_pngs(dir: &Path) -> Result<Vec<PathBuf>> {
	let mut out = Vec::new();
	let mut pending = vec![dir.to_path_buf()];
	while let Some(current) = pending.pop() {
		for entry in fs::read_dir(&current).with_context(|| format!("read {:?}", current))? {
			let path = entry.with_context(|| format!("read {:?}", current))?.path();
			if path.is_dir() {
				pending.push(path);
			} else if is_png(&path) {
				out.push(path);
			}
		}
	}
	out.sort();
	Ok(out)
}

fn expected_state(classifier: &StateClassifier, path: &Path) -> Option<String> {
	let folder = path.parent()?.file_name()?.to_str()?;
	classifier.state(folder).map(|s| s.name().to_string())
}

pub fn analyze_dir(classifier: &StateClassifier, dir: &Path) -> Result<Vec<BatchEntry>> {
	let files = collect_pngs(dir)?;
	tracing::info!(dir = %dir.display(), files = files.len(), "analyzing screenshots");
	Ok(files
		.into_iter()
		.map(|path| {
			let outcome = OwnedImage::open(&path)
				.map_err(anyhow::Error::from)
				.and_then(|frame| Ok(classifier.classify(&frame)?));
			BatchEntry { expected: expected_state(classifier, &path), path, outcome }
		})
		.collect())
}

pub fn summarize(entries: &[BatchEntry]) -> BatchSummary {
	let mut s = BatchSummary { total: entries.len(), ..Default::default() };
	for entry in entries {
		match &entry.outcome {
			Ok(c) if c.is_recognized() => s.recognized += 1,
			Ok(_) => {}
			Err(_) => s.errors += 1,
		}
		if let Some(correct) = entry.is_correct() {
			s.labelled += 1;
			s.correct += correct as usize;
		}
	}
	s
}

pub fn print_report(root: &Path, entries: &[BatchEntry], summary: &BatchSummary) {
	println!("{:<48} {:<18} {:>10}", "file", "state", "confidence");
	for entry in entries {
		let name = entry.path.strip_prefix(root).unwrap_or(&entry.path).display().to_string();
		match &entry.outcome {
			Ok(c) => {
				let mark = match (entry.is_correct(), &entry.expected) {
					(Some(false), Some(expected)) => format!("  (expected {expected})"),
					_ => String::new(),
				};
				println!("{:<48} {:<18} {:>10.4}{}", name, c.state.as_deref().unwrap_or("unknown"), c.confidence, mark);
			}
			Err(err) => println!("{:<48} error: {err:#}", name),
		}
	}

	println!();
	println!(
		"{} files: {} recognized, {} unknown, {} errors",
		summary.total,
		summary.recognized,
		summary.total - summary.recognized - summary.errors,
		summary.errors
	);
	if let Some(acc) = summary.accuracy() {
		println!("accuracy on {} labelled files: {:.1}%", summary.labelled, acc * 100.0);
	}
}
