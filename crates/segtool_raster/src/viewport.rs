//! Pan/zoom viewport transform.
//!
//! Maps between image pixel space and viewport (widget) space for a given
//! zoom factor and pan offset. Pan is measured in scaled-image pixels and is
//! the origin of the crop window. On an axis where the scaled image fits the
//! viewport, the image is centered and pan is forced to zero, so on any axis
//! at most one of letterbox offset and pan is nonzero.

use crate::geometry::{ImagePoint, Region, Size, ViewPoint};

/// Smallest zoom factor (10 %).
pub const MIN_ZOOM: f32 = 0.10;
/// Largest zoom factor (400 %).
pub const MAX_ZOOM: f32 = 4.00;
/// Zoom increment used by [`Viewport::zoom_in`] and [`Viewport::zoom_out`], in percent.
pub const ZOOM_STEP_PERCENT: u32 = 10;

/// Image and viewport sizes a transform is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub image: Size,
    pub view: Size,
}

impl Bounds {
    pub const fn new(image: Size, view: Size) -> Self {
        Self { image, view }
    }
}

/// Per-axis placement of the scaled image inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Axis {
    /// Crop origin in scaled-image pixels.
    pan: u32,
    /// Centering offset in viewport pixels.
    offset: u32,
    /// Visible extent in pixels.
    extent: u32,
}

fn fit_axis(scaled: u32, view: u32, pan: i32) -> Axis {
    if scaled <= view {
        Axis {
            pan: 0,
            offset: (view - scaled) / 2,
            extent: scaled,
        }
    } else {
        let max_pan = scaled - view;
        Axis {
            pan: u32::try_from(pan.max(0)).unwrap_or(0).min(max_pan),
            offset: 0,
            extent: view,
        }
    }
}

fn scale_dim(dim: u32, zoom: f32) -> u32 {
    if dim == 0 {
        return 0;
    }
    let scaled = (f64::from(dim) * f64::from(zoom)).round();
    (scaled as u32).max(1)
}

/// Zoom factor and pan offset of the image view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    zoom: f32,
    pan_x: i32,
    pan_y: i32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Viewport {
    /// Create a viewport with the given zoom (clamped) and no pan.
    pub fn new(zoom: f32) -> Self {
        Self {
            zoom: clamp_zoom(zoom),
            pan_x: 0,
            pan_y: 0,
        }
    }

    /// Return a copy with the given raw pan. It is clamped on first use.
    pub fn with_pan(mut self, pan_x: i32, pan_y: i32) -> Self {
        self.pan_x = pan_x;
        self.pan_y = pan_y;
        self
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn pan(&self) -> (i32, i32) {
        (self.pan_x, self.pan_y)
    }

    /// Zoom expressed as a whole percentage (100 = 1:1).
    pub fn zoom_percent(&self) -> u32 {
        (self.zoom * 100.0).round() as u32
    }

    /// Size of the image after scaling by the zoom factor.
    pub fn scaled_size(&self, image: Size) -> Size {
        Size::new(
            scale_dim(image.width, self.zoom),
            scale_dim(image.height, self.zoom),
        )
    }

    /// Effective horizontal and vertical scale, `scaled / original`.
    ///
    /// Equal to the zoom factor up to the rounding of the scaled size. Both the
    /// compositor and the pointer mapping use these so hit-testing lines up
    /// exactly with what is drawn.
    pub fn scale_factors(&self, image: Size) -> (f32, f32) {
        let scaled = self.scaled_size(image);
        let sx = if image.width == 0 {
            self.zoom
        } else {
            scaled.width as f32 / image.width as f32
        };
        let sy = if image.height == 0 {
            self.zoom
        } else {
            scaled.height as f32 / image.height as f32
        };
        (sx, sy)
    }

    fn axes(&self, bounds: Bounds) -> (Axis, Axis) {
        let scaled = self.scaled_size(bounds.image);
        (
            fit_axis(scaled.width, bounds.view.width, self.pan_x),
            fit_axis(scaled.height, bounds.view.height, self.pan_y),
        )
    }

    /// Clamp the pan so the crop window stays inside the scaled image.
    pub fn clamp(&mut self, bounds: Bounds) {
        let (x, y) = self.axes(bounds);
        self.pan_x = x.pan as i32;
        self.pan_y = y.pan as i32;
    }

    /// Clamped copy of this viewport.
    pub fn clamped(mut self, bounds: Bounds) -> Self {
        self.clamp(bounds);
        self
    }

    /// The crop window in scaled-image space.
    pub fn visible_region(&self, bounds: Bounds) -> Region {
        let (x, y) = self.axes(bounds);
        Region::new(x.pan, y.pan, x.extent, y.extent)
    }

    /// Where the top-left corner of the visible region sits inside the viewport.
    pub fn letterbox_offset(&self, bounds: Bounds) -> (u32, u32) {
        let (x, y) = self.axes(bounds);
        (x.offset, y.offset)
    }

    /// Map a viewport position to the image pixel under it.
    ///
    /// Returns `None` when the position is outside the image, including the
    /// letterbox margins around a centered image.
    pub fn to_image(&self, point: ViewPoint, bounds: Bounds) -> Option<ImagePoint> {
        if bounds.image.is_empty() {
            return None;
        }
        let (ax, ay) = self.axes(bounds);
        let (sx, sy) = self.scale_factors(bounds.image);

        let ix = (point.x - ax.offset as f32 + ax.pan as f32) / sx;
        let iy = (point.y - ay.offset as f32 + ay.pan as f32) / sy;
        if ix.is_nan() || iy.is_nan() || ix < 0.0 || iy < 0.0 {
            return None;
        }

        let pixel = ImagePoint::new(ix as u32, iy as u32);
        bounds.image.contains(pixel).then_some(pixel)
    }

    /// Map an image-space position (fractional pixels) to viewport space.
    pub fn to_view(&self, x: f32, y: f32, bounds: Bounds) -> ViewPoint {
        let (ax, ay) = self.axes(bounds);
        let (sx, sy) = self.scale_factors(bounds.image);
        ViewPoint::new(
            x * sx - ax.pan as f32 + ax.offset as f32,
            y * sy - ay.pan as f32 + ay.offset as f32,
        )
    }

    /// Change the zoom, keeping the image point at the center of the visible
    /// region fixed where the new bounds allow it.
    pub fn set_zoom(&mut self, zoom: f32, bounds: Bounds) {
        let zoom = clamp_zoom(zoom);
        if (zoom - self.zoom).abs() < f32::EPSILON {
            self.clamp(bounds);
            return;
        }

        let region = self.visible_region(bounds);
        let (sx, sy) = self.scale_factors(bounds.image);
        let center_x = (region.x as f32 + region.width as f32 / 2.0) / sx;
        let center_y = (region.y as f32 + region.height as f32 / 2.0) / sy;

        self.zoom = zoom;
        let (nsx, nsy) = self.scale_factors(bounds.image);
        self.pan_x = (center_x * nsx - bounds.view.width as f32 / 2.0).round() as i32;
        self.pan_y = (center_y * nsy - bounds.view.height as f32 / 2.0).round() as i32;
        self.clamp(bounds);

        log::debug!(
            "Zoom {}% centered on ({:.1}, {:.1}), pan ({}, {})",
            self.zoom_percent(),
            center_x,
            center_y,
            self.pan_x,
            self.pan_y
        );
    }

    /// Change the zoom, keeping the image point under `anchor` fixed.
    pub fn zoom_at(&mut self, zoom: f32, anchor: ViewPoint, bounds: Bounds) {
        let zoom = clamp_zoom(zoom);
        let (ax, ay) = self.axes(bounds);
        let (sx, sy) = self.scale_factors(bounds.image);
        let img_x = (anchor.x - ax.offset as f32 + ax.pan as f32) / sx;
        let img_y = (anchor.y - ay.offset as f32 + ay.pan as f32) / sy;

        self.zoom = zoom;
        let (nsx, nsy) = self.scale_factors(bounds.image);
        self.pan_x = (img_x * nsx - anchor.x).round() as i32;
        self.pan_y = (img_y * nsy - anchor.y).round() as i32;
        self.clamp(bounds);
    }

    /// Set the zoom from a percentage, as a zoom spin box would.
    pub fn set_zoom_percent(&mut self, percent: u32, bounds: Bounds) {
        self.set_zoom(percent as f32 / 100.0, bounds);
    }

    pub fn zoom_in(&mut self, bounds: Bounds) {
        let percent = self.zoom_percent() + ZOOM_STEP_PERCENT;
        self.set_zoom_percent(percent, bounds);
    }

    pub fn zoom_out(&mut self, bounds: Bounds) {
        let percent = self.zoom_percent().saturating_sub(ZOOM_STEP_PERCENT);
        self.set_zoom_percent(percent, bounds);
    }

    /// Shift the crop window by a delta in scaled-image pixels.
    pub fn pan_by(&mut self, dx: i32, dy: i32, bounds: Bounds) {
        self.pan_x = self.pan_x.saturating_add(dx);
        self.pan_y = self.pan_y.saturating_add(dy);
        self.clamp(bounds);
    }

    /// Reset to 1:1 with no pan.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}
