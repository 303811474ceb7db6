//! Conversions between straight-alpha `image` buffers and premultiplied
//! `tiny_skia` pixmaps.

use image::{Rgba, RgbaImage};
use tiny_skia::{ColorU8, IntSize, Pixmap};

use crate::error::{RasterError, Result};
use crate::geometry::Size;

/// Allocate a fully transparent pixmap.
pub(crate) fn blank_pixmap(size: Size) -> Result<Pixmap> {
    Pixmap::new(size.width, size.height).ok_or(RasterError::InvalidSize {
        width: size.width,
        height: size.height,
    })
}

/// Premultiply a straight-alpha RGBA buffer into a pixmap.
pub(crate) fn rgba_to_pixmap(rgba: RgbaImage) -> Result<Pixmap> {
    let (width, height) = rgba.dimensions();
    let invalid = RasterError::InvalidSize { width, height };
    let size = IntSize::from_wh(width, height).ok_or(invalid)?;

    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let c = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
        px[0] = c.red();
        px[1] = c.green();
        px[2] = c.blue();
        px[3] = c.alpha();
    }

    Pixmap::from_vec(data, size).ok_or(RasterError::InvalidSize { width, height })
}

/// Demultiply a pixmap back into a straight-alpha RGBA buffer.
pub(crate) fn pixmap_to_rgba(pixmap: &Pixmap) -> RgbaImage {
    let width = pixmap.width();
    RgbaImage::from_fn(width, pixmap.height(), |x, y| {
        let index = (y * width + x) as usize;
        let c = pixmap.pixels()[index].demultiply();
        Rgba([c.red(), c.green(), c.blue(), c.alpha()])
    })
}

pub(crate) fn pixmap_size(pixmap: &Pixmap) -> Size {
    Size::new(pixmap.width(), pixmap.height())
}
