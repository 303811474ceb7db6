//! Raster mask editing engine.
//!
//! Everything needed to paint binary annotation masks over an image without
//! depending on a widget toolkit: the pan/zoom [`viewport`] transform, the
//! [`mask`] buffer, brush [`stroke`] rendering, undo/redo [`history`] and the
//! overlay [`compositor`].

pub mod compositor;
pub mod error;
pub mod geometry;
pub mod history;
pub mod mask;
mod pixels;
pub mod source;
pub mod stroke;
pub mod viewport;

#[cfg(test)]
mod test_support;

pub use compositor::{Frame, Tint, render};
pub use error::{RasterError, Result};
pub use geometry::{ImagePoint, Region, Size, ViewPoint};
pub use history::{HistoryConfig, MaskHistory};
pub use mask::MaskStore;
pub use source::SourceImage;
pub use stroke::{Stroke, StrokeGesture, StrokeMode, apply_stroke};
pub use viewport::{Bounds, Viewport};
