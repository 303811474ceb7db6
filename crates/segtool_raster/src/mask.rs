//! The annotation mask raster.
//!
//! A mask is a premultiplied RGBA buffer with the same pixel size as the image
//! it annotates. Only its alpha channel carries meaning: 0 is unmarked, 255 is
//! marked, and intermediate values only appear on antialiased stroke edges.
//! Pixels are changed exclusively through [`crate::stroke`].

use std::fmt;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};
use tiny_skia::Pixmap;

use crate::error::{RasterError, Result};
use crate::geometry::{ImagePoint, Size};
use crate::pixels;

/// Mutable mask buffer for the active image.
#[derive(Clone)]
pub struct MaskStore {
    pixmap: Pixmap,
}

impl MaskStore {
    /// A fully transparent mask.
    pub fn create(size: Size) -> Result<Self> {
        Ok(Self {
            pixmap: pixels::blank_pixmap(size)?,
        })
    }

    /// Read a mask PNG, rescaling it to `expected` when its size differs.
    ///
    /// Rescaling ignores aspect ratio and uses nearest-neighbour sampling so a
    /// binary mask stays binary.
    pub fn load(path: impl AsRef<Path>, expected: Size) -> Result<Self> {
        let path = path.as_ref();
        let mut rgba = image::open(path)
            .map_err(|e| RasterError::decode(path, e))?
            .into_rgba8();

        let (width, height) = rgba.dimensions();
        if (width, height) != (expected.width, expected.height) {
            log::debug!(
                "Rescaling mask {:?} from {}x{} to {}x{}",
                path,
                width,
                height,
                expected.width,
                expected.height
            );
            if expected.is_empty() {
                return Err(RasterError::InvalidSize {
                    width: expected.width,
                    height: expected.height,
                });
            }
            rgba = imageops::resize(&rgba, expected.width, expected.height, FilterType::Nearest);
        }

        Ok(Self {
            pixmap: pixels::rgba_to_pixmap(rgba)?,
        })
    }

    /// Load the mask at `path` or fall back to a blank one.
    ///
    /// Missing, unreadable and corrupt files are all treated as "no mask yet".
    pub fn load_or_create(path: impl AsRef<Path>, expected: Size) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path, expected) {
            Ok(mask) => Ok(mask),
            Err(RasterError::Decode { source, .. }) => {
                log::warn!("Ignoring unreadable mask {:?}: {}", path, source);
                Self::create(expected)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the mask as a PNG with straight (non-premultiplied) alpha.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.to_rgba_image()
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| RasterError::write(path, e))?;
        log::debug!("Wrote mask {:?}", path);
        Ok(())
    }

    /// Deep copy for the undo history.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn size(&self) -> Size {
        pixels::pixmap_size(&self.pixmap)
    }

    /// Alpha at a pixel, or `None` outside the mask.
    pub fn alpha_at(&self, point: ImagePoint) -> Option<u8> {
        if !self.size().contains(point) {
            return None;
        }
        self.pixmap.pixel(point.x, point.y).map(|px| px.alpha())
    }

    /// Number of pixels with nonzero alpha.
    pub fn marked_pixel_count(&self) -> usize {
        self.pixmap.pixels().iter().filter(|px| px.alpha() > 0).count()
    }

    /// True when no pixel is marked.
    pub fn is_empty(&self) -> bool {
        self.pixmap.pixels().iter().all(|px| px.alpha() == 0)
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixmap.data().len()
    }

    /// Straight-alpha copy suitable for encoding.
    pub fn to_rgba_image(&self) -> RgbaImage {
        pixels::pixmap_to_rgba(&self.pixmap)
    }

    /// Raw premultiplied bytes, row-major RGBA.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    pub(crate) fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }
}

impl PartialEq for MaskStore {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.data() == other.data()
    }
}

impl Eq for MaskStore {}

impl fmt::Debug for MaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaskStore")
            .field("size", &self.size())
            .field("marked", &self.marked_pixel_count())
            .finish()
    }
}
