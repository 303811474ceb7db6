//! Model catalog and model lifecycle.

use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2};

/// Model offered before the user adds any.
pub const DEFAULT_MODEL_PATH: &str = "models/AttentionUNet_weights.weights.h5";

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("Failed to load model {path:?}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("Prediction failed: {0}")]
    Backend(String),

    #[error("Model output is {actual:?} but input is {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Input array is empty")]
    EmptyInput,

    #[error("No model selected")]
    NoModelSelected,
}

/// A loaded network.
///
/// Input values are normalized to `[0, 1]`. The output holds one label
/// probability per input pixel.
pub trait Predictor {
    fn predict(&mut self, input: ArrayView2<'_, f32>) -> Result<Array2<f32>, PredictError>;
}

/// Turns model files into predictors.
pub trait ModelBackend {
    fn load(&self, model_path: &Path) -> Result<Box<dyn Predictor>, PredictError>;
}

/// Lifecycle state of a [`ModelSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelState {
    Unloaded,
    Loaded { path: PathBuf },
}

/// Keeps at most one model loaded and reuses it across predictions.
pub struct ModelSession {
    backend: Box<dyn ModelBackend>,
    loaded: Option<(PathBuf, Box<dyn Predictor>)>,
}

impl std::fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSession")
            .field("state", &self.state())
            .finish()
    }
}

impl ModelSession {
    pub fn new(backend: Box<dyn ModelBackend>) -> Self {
        Self {
            backend,
            loaded: None,
        }
    }

    pub fn state(&self) -> ModelState {
        match &self.loaded {
            Some((path, _)) => ModelState::Loaded { path: path.clone() },
            None => ModelState::Unloaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Load `model_path` unless it is already the loaded model.
    ///
    /// On failure the previously loaded model stays active.
    pub fn load(&mut self, model_path: &Path) -> Result<(), PredictError> {
        if let Some((path, _)) = &self.loaded {
            if path == model_path {
                return Ok(());
            }
        }
        let predictor = self.backend.load(model_path)?;
        log::info!("Loaded model {:?}", model_path);
        self.loaded = Some((model_path.to_path_buf(), predictor));
        Ok(())
    }

    pub fn unload(&mut self) {
        if let Some((path, _)) = self.loaded.take() {
            log::debug!("Unloaded model {:?}", path);
        }
    }

    /// Run `model_path` on `input`, loading the model first if needed.
    pub fn predict(
        &mut self,
        input: &Array2<f32>,
        model_path: &Path,
    ) -> Result<Array2<f32>, PredictError> {
        if input.is_empty() {
            return Err(PredictError::EmptyInput);
        }
        self.load(model_path)?;
        let Some((_, predictor)) = self.loaded.as_mut() else {
            return Err(PredictError::NoModelSelected);
        };

        let output = predictor.predict(input.view())?;
        if output.dim() != input.dim() {
            return Err(PredictError::ShapeMismatch {
                expected: input.dim(),
                actual: output.dim(),
            });
        }
        log::debug!("Predicted {:?} labels", output.dim());
        Ok(output)
    }
}

/// A model the user can pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    pub path: PathBuf,
}

impl ModelEntry {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }
}

/// The list of selectable models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCatalog {
    entries: Vec<ModelEntry>,
    selected: Option<usize>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            entries: vec![ModelEntry::from_path(DEFAULT_MODEL_PATH)],
            selected: Some(0),
        }
    }
}

impl ModelCatalog {
    /// A catalog with no models.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            selected: None,
        }
    }

    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    /// Add a model file and select it. Adding a path twice selects the
    /// existing entry.
    pub fn add_model(&mut self, path: impl Into<PathBuf>) -> usize {
        let path = path.into();
        let index = match self.entries.iter().position(|e| e.path == path) {
            Some(index) => index,
            None => {
                self.entries.push(ModelEntry::from_path(path));
                self.entries.len() - 1
            }
        };
        self.selected = Some(index);
        index
    }

    /// Select by index. Returns false when out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.entries.len() {
            self.selected = Some(index);
            true
        } else {
            false
        }
    }

    pub fn selected(&self) -> Option<&ModelEntry> {
        self.selected.and_then(|i| self.entries.get(i))
    }

    pub fn selected_path(&self) -> Result<&Path, PredictError> {
        self.selected()
            .map(|e| e.path.as_path())
            .ok_or(PredictError::NoModelSelected)
    }
}
