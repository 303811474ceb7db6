//! Image preparation for the segmentation network and label output.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;
use segtool_raster::RasterError;

/// Side length of the square array the network expects.
pub const DEFAULT_INPUT_SIZE: u32 = 160;

/// Label probability at or above which a pixel is marked.
pub const LABEL_THRESHOLD: f32 = 0.5;

/// Decode an image file as 8-bit grayscale.
pub fn load_grayscale(path: &Path) -> Result<GrayImage, RasterError> {
    let decoded = image::open(path).map_err(|e| RasterError::decode(path, e))?;
    Ok(decoded.to_luma8())
}

/// Spread intensities over the full 0-255 range by histogram equalization.
///
/// A single-intensity image has nothing to spread and is returned unchanged.
pub fn equalize_histogram(image: &GrayImage) -> GrayImage {
    let mut histogram = [0u64; 256];
    for Luma([v]) in image.pixels() {
        histogram[usize::from(*v)] += 1;
    }

    let total: u64 = histogram.iter().sum();
    let mut cdf = [0u64; 256];
    let mut running = 0;
    for (bin, count) in histogram.iter().enumerate() {
        running += count;
        cdf[bin] = running;
    }
    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);
    if total == cdf_min {
        return image.clone();
    }

    let range = (total - cdf_min) as f64;
    let mut lut = [0u8; 256];
    for (bin, entry) in lut.iter_mut().enumerate() {
        let scaled = cdf[bin].saturating_sub(cdf_min) as f64 / range * 255.0;
        *entry = scaled.round().clamp(0.0, 255.0) as u8;
    }

    let mut out = image.clone();
    for Luma([v]) in out.pixels_mut() {
        *v = lut[usize::from(*v)];
    }
    out
}

/// Rectangle chosen by dragging over an image, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropSelection {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropSelection {
    /// Build a selection from the drag start and end points, in any order.
    ///
    /// Returns `None` when the drag has no area.
    pub fn from_drag(begin: (u32, u32), end: (u32, u32)) -> Option<Self> {
        let selection = Self {
            left: begin.0.min(end.0),
            top: begin.1.min(end.1),
            right: begin.0.max(end.0),
            bottom: begin.1.max(end.1),
        };
        (selection.width() > 0 && selection.height() > 0).then_some(selection)
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Crop `image`, limited to its bounds. `None` if nothing remains.
    pub fn apply(&self, image: &GrayImage) -> Option<GrayImage> {
        let (width, height) = image.dimensions();
        let right = self.right.min(width);
        let bottom = self.bottom.min(height);
        if self.left >= right || self.top >= bottom {
            return None;
        }
        let view = imageops::crop_imm(
            image,
            self.left,
            self.top,
            right - self.left,
            bottom - self.top,
        );
        Some(view.to_image())
    }
}

/// Keep every n-th pixel on both axes so the shorter side is still at least
/// `target` pixels.
pub fn regular_sample(image: &GrayImage, target: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    let stride = (width.min(height) / target.max(1)).max(1);
    if stride == 1 {
        return image.clone();
    }
    let sampled_w = width.div_ceil(stride);
    let sampled_h = height.div_ceil(stride);
    GrayImage::from_fn(sampled_w, sampled_h, |x, y| {
        *image.get_pixel(x * stride, y * stride)
    })
}

/// Sample and resize to a `target`x`target` array normalized to `[0, 1]`.
///
/// The array is indexed `[row, column]`.
pub fn resize_and_sample(image: &GrayImage, target: u32) -> Array2<f32> {
    let target = target.max(1);
    let sampled = regular_sample(image, target);
    let sized = imageops::resize(&sampled, target, target, FilterType::Triangle);
    let n = target as usize;
    Array2::from_shape_fn((n, n), |(row, col)| {
        f32::from(sized.get_pixel(col as u32, row as u32)[0]) / 255.0
    })
}

/// Threshold label probabilities into a black and white image.
pub fn labels_to_image(labels: &Array2<f32>) -> GrayImage {
    let (rows, cols) = labels.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let marked = labels[[y as usize, x as usize]] >= LABEL_THRESHOLD;
        Luma([if marked { 255 } else { 0 }])
    })
}

/// Save a label image as PNG.
pub fn save_label_image(image: &GrayImage, path: &Path) -> Result<(), RasterError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| RasterError::write(path, e))?;
    log::info!("Saved segmentation {:?}", path);
    Ok(())
}
