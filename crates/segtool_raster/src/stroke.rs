//! Brush stroke rendering into a [`MaskStore`].
//!
//! A stroke is a round-capped, antialiased line segment of width `2 * radius`
//! between two image pixels, each addressed at its center. Painting
//! composites opaque white source-over. Erasing forces every pixel touched by
//! the stroke footprint to fully transparent.

use tiny_skia::{
    FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, PremultipliedColorU8, Transform,
};

use crate::geometry::ImagePoint;
use crate::mask::MaskStore;

/// Smallest brush radius in image pixels.
pub const MIN_RADIUS: f32 = 1.0;
/// Largest brush radius in image pixels.
pub const MAX_RADIUS: f32 = 100.0;
/// Brush radius used when nothing else is configured.
pub const DEFAULT_RADIUS: f32 = 10.0;

/// How a stroke composes with the existing mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrokeMode {
    /// Write opaque coverage.
    #[default]
    Paint,
    /// Clear coverage back to transparent.
    Erase,
}

/// One brush segment in image space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub start: ImagePoint,
    pub end: ImagePoint,
    pub radius: f32,
    pub mode: StrokeMode,
}

impl Stroke {
    pub fn new(start: ImagePoint, end: ImagePoint, radius: f32, mode: StrokeMode) -> Self {
        Self {
            start,
            end,
            radius: clamp_radius(radius),
            mode,
        }
    }

    /// A single dab at one point.
    pub fn dot(point: ImagePoint, radius: f32, mode: StrokeMode) -> Self {
        Self::new(point, point, radius, mode)
    }

    /// Filled outline of the area the stroke covers.
    fn footprint(&self) -> Option<Path> {
        let (x0, y0) = self.start.center();
        let (x1, y1) = self.end.center();

        if self.start == self.end {
            return PathBuilder::from_circle(x0, y0, self.radius);
        }

        let mut builder = PathBuilder::new();
        builder.move_to(x0, y0);
        builder.line_to(x1, y1);
        let line = builder.finish()?;

        let stroke = tiny_skia::Stroke {
            width: self.radius * 2.0,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Default::default()
        };
        line.stroke(&stroke, 1.0)
    }

    /// Render this stroke into `mask`. Returns false if nothing could be drawn.
    pub fn apply(&self, mask: &mut MaskStore) -> bool {
        let Some(path) = self.footprint() else {
            log::trace!("Degenerate stroke footprint: {:?}", self);
            return false;
        };

        match self.mode {
            StrokeMode::Paint => paint(mask, &path),
            StrokeMode::Erase => erase(mask, &path),
        }
        true
    }
}

/// Clamp a brush radius into the supported range.
pub fn clamp_radius(radius: f32) -> f32 {
    if radius.is_finite() {
        radius.clamp(MIN_RADIUS, MAX_RADIUS)
    } else {
        DEFAULT_RADIUS
    }
}

/// Draw one segment into the mask.
///
/// Does nothing when either endpoint is `None`, which is how callers report a
/// pointer that has left the image.
pub fn apply_stroke(
    mask: &mut MaskStore,
    start: Option<ImagePoint>,
    end: Option<ImagePoint>,
    radius: f32,
    mode: StrokeMode,
) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => Stroke::new(start, end, radius, mode).apply(mask),
        _ => false,
    }
}

fn paint(mask: &mut MaskStore, path: &Path) {
    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = true;
    mask.pixmap_mut()
        .fill_path(path, &paint, FillRule::Winding, Transform::identity(), None);
}

fn erase(mask: &mut MaskStore, path: &Path) {
    let size = mask.size();
    let Some(mut coverage) = tiny_skia::Mask::new(size.width, size.height) else {
        return;
    };
    coverage.fill_path(path, FillRule::Winding, true, Transform::identity());

    for (px, &covered) in mask
        .pixmap_mut()
        .pixels_mut()
        .iter_mut()
        .zip(coverage.data())
    {
        if covered > 0 {
            *px = PremultipliedColorU8::TRANSPARENT;
        }
    }
}

/// One pointer-down to pointer-up brush gesture.
///
/// Each reported point is joined to the previous one, so fast pointer motion
/// still produces a continuous line.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeGesture {
    last: Option<ImagePoint>,
    radius: f32,
    mode: StrokeMode,
}

impl StrokeGesture {
    /// Start a gesture, dabbing at the first point if it is inside the image.
    pub fn begin(
        mask: &mut MaskStore,
        point: Option<ImagePoint>,
        radius: f32,
        mode: StrokeMode,
    ) -> Self {
        let gesture = Self {
            last: point,
            radius: clamp_radius(radius),
            mode,
        };
        apply_stroke(mask, point, point, gesture.radius, mode);
        gesture
    }

    /// Continue the gesture to `point`.
    ///
    /// A `None` point breaks the line: the next valid point starts a new
    /// segment instead of bridging across the gap outside the image.
    pub fn extend(&mut self, mask: &mut MaskStore, point: Option<ImagePoint>) {
        let start = self.last.or(point);
        apply_stroke(mask, start, point, self.radius, self.mode);
        self.last = point;
    }

    pub fn mode(&self) -> StrokeMode {
        self.mode
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }
}
