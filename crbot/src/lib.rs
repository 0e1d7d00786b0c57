//! Screen-state bot: tracks a window, classifies what it shows and clicks
//! through the configured sequence for that state.

pub mod assets;
pub mod backend;
pub mod batch;
pub mod calibrate;
pub mod capture;
pub mod clock;
pub mod config;
pub mod cycle;
pub mod dispatcher;
pub mod mapper;
pub mod region;
pub mod snapshot;
pub mod target;
pub mod tracker;

use anyhow::{Context, Result};

/// Load every configured state and build the classifier.
pub fn build_classifier(cfg: &config::Config) -> Result<ie::StateClassifier> {
	let base = assets::resolve_template_dir(&cfg.template_dir)?;
	let templates = ie::load_catalog(&cfg.states, &base).context("load state templates")?;
	ie::StateClassifier::new(templates, cfg.search).context("build classifier")
}
