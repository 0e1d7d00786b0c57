//! Image engine: rasters, similarity primitives and screen-state
//! classification. No OS automation lives here.

mod image;
pub use image::*;
mod error;
pub use error::*;

pub mod annotate;
pub mod catalog;
pub mod classifier;
pub mod compare;

pub use catalog::{StateSpec, load_catalog};
pub use classifier::{Basis, Classification, SearchParams, StateClassifier, StateTemplate, Weights};
