//! Segmentation inference on a single grayscale image.
//!
//! The network itself is opaque: a [`ModelBackend`] turns a model file into
//! a [`Predictor`], which maps a normalized image array to a per-pixel label
//! array of the same shape. This module handles everything around it: model
//! selection and lifecycle, preprocessing, and turning labels into an image.

pub mod model;
pub mod preprocess;
pub mod workbench;

pub use model::{
    DEFAULT_MODEL_PATH, ModelBackend, ModelCatalog, ModelEntry, ModelSession, ModelState,
    PredictError, Predictor,
};
pub use preprocess::{CropSelection, DEFAULT_INPUT_SIZE};
pub use workbench::InferenceWorkbench;
