//! State of one inference run: the input image, its optional contrast
//! enhanced copy, and the resulting segmentation.

use std::path::Path;

use image::GrayImage;

use super::model::ModelSession;
use super::preprocess::{self, CropSelection};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct InferenceWorkbench {
    image: Option<GrayImage>,
    contrasted: Option<GrayImage>,
    segmentation: Option<GrayImage>,
    input_size: u32,
}

impl Default for InferenceWorkbench {
    fn default() -> Self {
        Self::new(preprocess::DEFAULT_INPUT_SIZE)
    }
}

impl InferenceWorkbench {
    pub fn new(input_size: u32) -> Self {
        Self {
            image: None,
            contrasted: None,
            segmentation: None,
            input_size: input_size.max(1),
        }
    }

    /// Load an image as grayscale, discarding previous results.
    pub fn load_image(&mut self, path: &Path) -> Result<()> {
        let image = preprocess::load_grayscale(path)?;
        log::debug!(
            "Inference input {:?} ({}x{})",
            path,
            image.width(),
            image.height()
        );
        self.set_image(image);
        Ok(())
    }

    pub fn set_image(&mut self, image: GrayImage) {
        self.image = Some(image);
        self.contrasted = None;
        self.segmentation = None;
    }

    pub fn image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    pub fn contrasted(&self) -> Option<&GrayImage> {
        self.contrasted.as_ref()
    }

    pub fn contrast_enabled(&self) -> bool {
        self.contrasted.is_some()
    }

    pub fn segmentation(&self) -> Option<&GrayImage> {
        self.segmentation.as_ref()
    }

    /// Equalize the input histogram. Later runs use the enhanced image.
    pub fn enhance_contrast(&mut self) -> Result<&GrayImage> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| Error::validation("No image to enhance"))?;
        Ok(self
            .contrasted
            .insert(preprocess::equalize_histogram(image)))
    }

    /// Crop the input. An enhanced copy is recomputed from the cropped image.
    pub fn crop(&mut self, selection: CropSelection) -> Result<()> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| Error::validation("No image to crop"))?;
        let cropped = selection
            .apply(image)
            .ok_or_else(|| Error::validation("Crop selection is outside the image"))?;

        let had_contrast = self.contrast_enabled();
        self.set_image(cropped);
        if had_contrast {
            self.enhance_contrast()?;
        }
        Ok(())
    }

    /// The image fed to the network: the enhanced copy when contrast is on.
    pub fn inference_source(&self) -> Option<&GrayImage> {
        self.contrasted.as_ref().or(self.image.as_ref())
    }

    /// Run the model and keep the thresholded label image.
    pub fn run(&mut self, models: &mut ModelSession, model_path: &Path) -> Result<&GrayImage> {
        let source = self
            .inference_source()
            .ok_or_else(|| Error::validation("No image to segment"))?;
        let input = preprocess::resize_and_sample(source, self.input_size);
        let labels = models.predict(&input, model_path)?;
        Ok(self.segmentation.insert(preprocess::labels_to_image(&labels)))
    }

    pub fn save_segmentation(&self, path: &Path) -> Result<()> {
        let segmentation = self
            .segmentation
            .as_ref()
            .ok_or_else(|| Error::validation("No segmentation to save"))?;
        preprocess::save_label_image(segmentation, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ModelBackend, PredictError, Predictor};
    use image::Luma;
    use ndarray::{Array2, ArrayView2};

    /// Marks pixels brighter than mid gray.
    struct Bright;

    impl Predictor for Bright {
        fn predict(
            &mut self,
            input: ArrayView2<'_, f32>,
        ) -> std::result::Result<Array2<f32>, PredictError> {
            Ok(input.mapv(|v| if v > 0.5 { 1.0 } else { 0.0 }))
        }
    }

    struct BrightBackend;

    impl ModelBackend for BrightBackend {
        fn load(
            &self,
            _model_path: &Path,
        ) -> std::result::Result<Box<dyn Predictor>, PredictError> {
            Ok(Box::new(Bright))
        }
    }

    fn half_bright(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| {
            Luma([if x < width / 2 { 90 } else { 110 }])
        })
    }

    #[test]
    fn test_run_without_image_is_validation_error() {
        let mut bench = InferenceWorkbench::default();
        let mut models = ModelSession::new(Box::new(BrightBackend));
        let err = bench.run(&mut models, Path::new("m.h5")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(bench.save_segmentation(Path::new("x.png")).is_err());
    }

    #[test]
    fn test_contrast_selects_inference_source() {
        let mut bench = InferenceWorkbench::new(8);
        bench.set_image(half_bright(16, 16));
        let mut models = ModelSession::new(Box::new(BrightBackend));

        // Raw image never exceeds mid gray, so nothing is marked.
        let raw = bench.run(&mut models, Path::new("m.h5")).unwrap().clone();
        assert!(raw.pixels().all(|p| p[0] == 0));
        assert_eq!(raw.dimensions(), (8, 8));

        bench.enhance_contrast().unwrap();
        assert!(bench.contrast_enabled());
        let enhanced = bench.run(&mut models, Path::new("m.h5")).unwrap();
        assert_eq!(enhanced.get_pixel(0, 0)[0], 0);
        assert_eq!(enhanced.get_pixel(7, 0)[0], 255);
    }

    #[test]
    fn test_crop_recomputes_contrast() {
        let mut bench = InferenceWorkbench::new(8);
        bench.set_image(half_bright(20, 10));
        bench.enhance_contrast().unwrap();

        let selection = CropSelection::from_drag((0, 0), (5, 5)).unwrap();
        bench.crop(selection).unwrap();
        assert_eq!(bench.image().unwrap().dimensions(), (5, 5));
        let contrasted = bench.contrasted().unwrap();
        assert_eq!(contrasted.dimensions(), (5, 5));
        // Only one intensity left after the crop.
        assert!(contrasted.pixels().all(|p| p[0] == 90));
    }

    #[test]
    fn test_crop_outside_image_is_rejected() {
        let mut bench = InferenceWorkbench::default();
        bench.set_image(half_bright(10, 10));
        let selection = CropSelection::from_drag((20, 20), (30, 30)).unwrap();
        assert!(bench.crop(selection).is_err());
        assert_eq!(bench.image().unwrap().dimensions(), (10, 10));
    }
}
