//! Persistent bot configuration.
//!
//! Stored as JSON in a platform-appropriate config directory, or at a path
//! given on the command line. Validated on load; an invalid file is an error,
//! never silently replaced by defaults.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ie::{CatalogError, SearchParams, StateSpec, Weights};
use serde::{Deserialize, Serialize};

use crate::dispatcher::{ActionSpec, ActionStep, RetryPolicy};
use crate::region::{DisplayBounds, RelativeRect, WindowRegion};
use crate::target::Target;
use crate::tracker::TrackerSettings;

/// Where the tracked region lives and how long it is trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Tracked part of the host window, as fractions of its size.
    pub sub_window: RelativeRect,
    pub cache_timeout_ms: u64,
    /// Host geometry assumed when the window cannot be found.
    pub fallback_window: WindowRegion,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            sub_window: RelativeRect::FULL,
            cache_timeout_ms: 5000,
            fallback_window: WindowRegion::FALLBACK_HOST,
        }
    }
}

/// On-disk configuration for the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host application name (from `xcap::Window::app_name()`).
    ///
    /// If multiple windows share the same app name, the first match is used.
    pub app_name: String,

    /// Delay (seconds) between capture-classify-act cycles.
    pub poll_delay_s: f32,

    /// Base directory for template paths. Relative paths are resolved by
    /// [`crate::assets::resolve_template_dir`].
    pub template_dir: PathBuf,

    pub states: Vec<StateSpec>,
    pub actions: Vec<ActionSpec>,
    pub tracking: TrackingConfig,
    pub search: SearchParams,
    pub retry: RetryPolicy,

    /// Display area assumed when the monitors cannot be queried.
    pub display_fallback: DisplayBounds,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("action for undeclared state {0:?}")]
    UnknownActionState(String),
    #[error("more than one action for state {0:?}")]
    DuplicateAction(String),
    #[error("action {state:?} step {step}: percent target ({x}, {y}) is outside [0, 100]")]
    PercentOutOfRange { state: String, step: usize, x: f64, y: f64 },
    #[error("action {state:?} step {step}: target is not a finite point")]
    NonFiniteTarget { state: String, step: usize },
    #[error("tracking sub-window must lie within [0, 1] and have a positive size")]
    InvalidSubWindow,
    #[error("search parameters: {0}")]
    InvalidSearch(&'static str),
    #[error("retry policy: {0}")]
    InvalidRetry(&'static str),
    #[error("poll delay must be a positive number of seconds, got {0}")]
    InvalidPollDelay(f32),
    #[error("fallback display bounds must have a positive size")]
    InvalidDisplayFallback,
}

fn state(name: &str, dir: &str, page: &str, button: &str, threshold: f32, weights: Weights) -> StateSpec {
    StateSpec {
        name: name.to_string(),
        reference: Path::new(dir).join(page),
        button: Some(Path::new(dir).join(button)),
        threshold,
        weights,
    }
}

fn tap(x: f64, y: f64, delay_ms: u64) -> ActionStep {
    ActionStep { target: Target::Percent { x, y }, delay_ms }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "WeChat".to_string(),
            poll_delay_s: 2.0,
            template_dir: PathBuf::from("png"),
            states: vec![
                state("BattleNotStarted", "battle_not_started", "page.png", "battle_button.png", 0.7, Weights { page: 0.3, button: 0.7 }),
                // Animated arena: lean on the layout rather than the button.
                state("InBattle", "in_battle", "arena.png", "emote_button.png", 0.6, Weights { page: 0.7, button: 0.3 }),
                state("BattleEnded", "battle_ended", "page.png", "ok_button.png", 0.7, Weights { page: 0.4, button: 0.6 }),
                state("ChestReady", "chest_ready", "page.png", "open_button.png", 0.65, Weights { page: 0.4, button: 0.6 }),
            ],
            actions: vec![
                ActionSpec { state: "BattleNotStarted".into(), steps: vec![tap(50.0, 78.0, 2000)] },
                ActionSpec { state: "BattleEnded".into(), steps: vec![tap(50.0, 88.0, 1500)] },
                ActionSpec {
                    state: "ChestReady".into(),
                    steps: vec![
                        tap(50.0, 55.0, 1500),
                        tap(50.0, 55.0, 800),
                        tap(50.0, 55.0, 800),
                        tap(50.0, 55.0, 800),
                        tap(50.0, 88.0, 1000),
                    ],
                },
            ],
            tracking: TrackingConfig::default(),
            search: SearchParams::default(),
            retry: RetryPolicy::default(),
            display_fallback: DisplayBounds::FALLBACK,
        }
    }
}

impl Config {
    /// Path to the default config file.
    pub fn path() -> Result<PathBuf> {
        let base = dirs::config_dir().context("config_dir() unavailable")?;
        Ok(base.join("crbot.json"))
    }

    /// Load and validate the config at the default path.
    pub fn try_load() -> Result<Self> {
        Self::load(&Self::path()?)
    }

    /// Load and validate the config at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
        let cfg: Self = serde_json::from_str(&json).with_context(|| format!("parse {:?}", path))?;
        cfg.validate().with_context(|| format!("validate {:?}", path))?;
        Ok(cfg)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, json).with_context(|| format!("write {:?}", path))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.states.is_empty() {
            return Err(CatalogError::Empty.into());
        }
        let mut names = HashSet::new();
        for spec in &self.states {
            spec.validate()?;
            if !names.insert(spec.name.as_str()) {
                return Err(CatalogError::DuplicateState(spec.name.clone()).into());
            }
        }

        let mut with_action = HashSet::new();
        for action in &self.actions {
            if !names.contains(action.state.as_str()) {
                return Err(ConfigError::UnknownActionState(action.state.clone()));
            }
            if !with_action.insert(action.state.as_str()) {
                return Err(ConfigError::DuplicateAction(action.state.clone()));
            }
            for (i, step) in action.steps.iter().enumerate() {
                let (x, y) = match step.target {
                    Target::Percent { x, y } | Target::Absolute { x, y } => (x, y),
                };
                if !x.is_finite() || !y.is_finite() {
                    return Err(ConfigError::NonFiniteTarget { state: action.state.clone(), step: i + 1 });
                }
                let percent = 0.0..=100.0;
                if matches!(step.target, Target::Percent { .. }) && !(percent.contains(&x) && percent.contains(&y)) {
                    return Err(ConfigError::PercentOutOfRange { state: action.state.clone(), step: i + 1, x, y });
                }
            }
        }

        if !self.tracking.sub_window.is_valid() {
            return Err(ConfigError::InvalidSubWindow);
        }

        let s = &self.search;
        if !(0.0..=1.0).contains(&s.start_fraction) {
            return Err(ConfigError::InvalidSearch("start_fraction must lie in [0, 1]"));
        }
        if s.step == 0 {
            return Err(ConfigError::InvalidSearch("step must be at least 1"));
        }
        if !(0.0..=1.0).contains(&s.early_exit_threshold) {
            return Err(ConfigError::InvalidSearch("early_exit_threshold must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&s.significance_margin) {
            return Err(ConfigError::InvalidSearch("significance_margin must lie in [0, 1]"));
        }

        if self.retry.attempts == 0 {
            return Err(ConfigError::InvalidRetry("attempts must be at least 1"));
        }
        if !self.retry.multiplier.is_finite() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidRetry("multiplier must be at least 1"));
        }

        if !self.poll_delay_s.is_finite() || self.poll_delay_s <= 0.0 {
            return Err(ConfigError::InvalidPollDelay(self.poll_delay_s));
        }
        if self.display_fallback.width <= 0 || self.display_fallback.height <= 0 {
            return Err(ConfigError::InvalidDisplayFallback);
        }
        Ok(())
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs_f32(self.poll_delay_s)
    }

    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            app_name: self.app_name.clone(),
            sub_window: self.tracking.sub_window,
            cache_timeout: Duration::from_millis(self.tracking.cache_timeout_ms),
            fallback: self.tracking.fallback_window,
        }
    }
}
