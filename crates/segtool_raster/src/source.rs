//! Read-only source image held for display.

use std::fmt;
use std::path::Path;

use image::DynamicImage;
use tiny_skia::Pixmap;

use crate::error::{RasterError, Result};
use crate::geometry::Size;
use crate::pixels;

/// A decoded source image.
///
/// Grayscale and RGB inputs are promoted to opaque RGBA so the compositor
/// works on a single pixel format.
#[derive(Clone)]
pub struct SourceImage {
    pixmap: Pixmap,
}

impl SourceImage {
    /// Decode an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|e| RasterError::decode(path, e))?;
        log::trace!(
            "Decoded {:?}: {}x{} {:?}",
            path,
            decoded.width(),
            decoded.height(),
            decoded.color()
        );
        Self::from_dynamic(decoded)
    }

    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        Ok(Self {
            pixmap: pixels::rgba_to_pixmap(image.into_rgba8())?,
        })
    }

    pub fn size(&self) -> Size {
        pixels::pixmap_size(&self.pixmap)
    }

    pub(crate) fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceImage")
            .field("size", &self.size())
            .finish()
    }
}
