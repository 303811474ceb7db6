//! Overlay compositing of the mask over the source image.
//!
//! The displayed frame is produced in five steps:
//! 1. scale the image by the zoom factor,
//! 2. crop it to the visible region at the current pan,
//! 3. scale and crop the mask identically,
//! 4. build a solid tint and keep it only where the mask fragment has alpha
//!    (destination-in),
//! 5. composite the tint source-over onto the image fragment.
//!
//! Scaling and cropping happen in one resampling pass per layer: each layer
//! is drawn into a frame-sized pixmap through a scale-then-translate
//! transform, which yields exactly the crop of the scaled raster.
//! [`render`] reads nothing but its arguments.

use image::RgbaImage;
use tiny_skia::{
    BlendMode, Color, FilterQuality, Pixmap, PixmapPaint, PremultipliedColorU8, Transform,
};

use crate::error::{RasterError, Result};
use crate::geometry::{ImagePoint, Region, Size};
use crate::mask::MaskStore;
use crate::pixels;
use crate::source::SourceImage;
use crate::viewport::{Bounds, Viewport};

/// Color and opacity used to draw marked mask pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tint {
    pub color: [u8; 3],
    pub alpha: u8,
}

impl Tint {
    pub const fn new(color: [u8; 3], alpha: u8) -> Self {
        Self { color, alpha }
    }
}

impl Default for Tint {
    fn default() -> Self {
        Self::new([255, 0, 0], 128)
    }
}

/// A rendered view of the image with its mask overlay.
#[derive(Clone)]
pub struct Frame {
    pixmap: Pixmap,
    offset: (u32, u32),
    region: Region,
}

impl Frame {
    pub fn size(&self) -> Size {
        pixels::pixmap_size(&self.pixmap)
    }

    /// Position of the frame's top-left corner inside the viewport.
    pub fn offset(&self) -> (u32, u32) {
        self.offset
    }

    /// The part of the scaled image this frame shows.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Premultiplied RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Pixel at frame coordinates, premultiplied.
    pub fn pixel(&self, x: u32, y: u32) -> Option<PremultipliedColorU8> {
        if !self.size().contains(ImagePoint::new(x, y)) {
            return None;
        }
        self.pixmap.pixel(x, y)
    }

    /// Straight-alpha copy for encoding or uploading to a texture.
    pub fn to_rgba_image(&self) -> RgbaImage {
        pixels::pixmap_to_rgba(&self.pixmap)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.size())
            .field("offset", &self.offset)
            .field("region", &self.region)
            .finish()
    }
}

/// Draw the visible part of `source` at the viewport's scale into a pixmap of
/// the region's size.
fn scale_and_crop(source: &Pixmap, scale: (f32, f32), region: Region) -> Result<Pixmap> {
    let mut out = pixels::blank_pixmap(region.size())?;
    let transform = Transform::from_scale(scale.0, scale.1)
        .post_translate(-(region.x as f32), -(region.y as f32));
    let paint = PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..Default::default()
    };
    out.draw_pixmap(0, 0, source.as_ref(), &paint, transform, None);
    Ok(out)
}

/// Compose the displayed frame for the given image, mask and view.
pub fn render(
    image: &SourceImage,
    mask: &MaskStore,
    viewport: &Viewport,
    view: Size,
    tint: Tint,
) -> Result<Frame> {
    let image_size = image.size();
    let mask_size = mask.size();
    if image_size != mask_size {
        return Err(RasterError::SizeMismatch {
            mask_width: mask_size.width,
            mask_height: mask_size.height,
            image_width: image_size.width,
            image_height: image_size.height,
        });
    }

    let bounds = Bounds::new(image_size, view);
    let viewport = viewport.clamped(bounds);
    let region = viewport.visible_region(bounds);
    let scale = viewport.scale_factors(image_size);

    let mut frame = scale_and_crop(image.pixmap(), scale, region)?;
    let mask_fragment = scale_and_crop(mask.pixmap(), scale, region)?;

    let mut overlay = pixels::blank_pixmap(region.size())?;
    let [r, g, b] = tint.color;
    overlay.fill(Color::from_rgba8(r, g, b, tint.alpha));
    let keep_masked = PixmapPaint {
        blend_mode: BlendMode::DestinationIn,
        ..Default::default()
    };
    overlay.draw_pixmap(
        0,
        0,
        mask_fragment.as_ref(),
        &keep_masked,
        Transform::identity(),
        None,
    );

    frame.draw_pixmap(
        0,
        0,
        overlay.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );

    Ok(Frame {
        pixmap: frame,
        offset: viewport.letterbox_offset(bounds),
        region,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{StrokeMode, apply_stroke};
    use image::{DynamicImage, Rgb, RgbImage};

    fn gray_image(w: u32, h: u32, value: u8) -> SourceImage {
        let rgb = RgbImage::from_pixel(w, h, Rgb([value, value, value]));
        SourceImage::from_dynamic(DynamicImage::ImageRgb8(rgb)).unwrap()
    }

    fn painted_mask(w: u32, h: u32) -> MaskStore {
        let mut mask = MaskStore::create(Size::new(w, h)).unwrap();
        apply_stroke(
            &mut mask,
            Some(ImagePoint::new(10, 10)),
            Some(ImagePoint::new(40, 30)),
            6.0,
            StrokeMode::Paint,
        );
        mask
    }

    #[test]
    fn test_render_is_deterministic() {
        let image = gray_image(64, 48, 90);
        let mask = painted_mask(64, 48);
        let viewport = Viewport::new(1.7).with_pan(13, 9);
        let view = Size::new(50, 40);

        let a = render(&image, &mask, &viewport, view, Tint::default()).unwrap();
        let b = render(&image, &mask, &viewport, view, Tint::default()).unwrap();
        assert_eq!(a.data(), b.data());
        assert_eq!(a.offset(), b.offset());
    }

    #[test]
    fn test_unmarked_pixels_show_image_unchanged() {
        let image = gray_image(20, 20, 100);
        let mask = MaskStore::create(Size::new(20, 20)).unwrap();
        let frame = render(&image, &mask, &Viewport::default(), Size::new(20, 20), Tint::default())
            .unwrap();

        for px in frame.data().chunks_exact(4) {
            assert_eq!(px, &[100, 100, 100, 255]);
        }
    }

    #[test]
    fn test_marked_pixels_are_tinted() {
        let image = gray_image(20, 20, 0);
        let mut mask = MaskStore::create(Size::new(20, 20)).unwrap();
        let p = Some(ImagePoint::new(10, 10));
        apply_stroke(&mut mask, p, p, 4.0, StrokeMode::Paint);

        let tint = Tint::new([255, 0, 0], 255);
        let frame = render(&image, &mask, &Viewport::default(), Size::new(20, 20), tint).unwrap();

        let center = frame.pixel(10, 10).unwrap();
        assert_eq!((center.red(), center.green(), center.blue()), (255, 0, 0));
        let corner = frame.pixel(0, 0).unwrap();
        assert_eq!((corner.red(), corner.green(), corner.blue()), (0, 0, 0));
    }

    #[test]
    fn test_frame_pixel_outside_is_none() {
        let image = gray_image(10, 6, 30);
        let mask = MaskStore::create(Size::new(10, 6)).unwrap();
        let frame =
            render(&image, &mask, &Viewport::default(), Size::new(10, 6), Tint::default()).unwrap();
        assert!(frame.pixel(9, 5).is_some());
        assert!(frame.pixel(10, 0).is_none());
        assert!(frame.pixel(0, 6).is_none());
    }

    #[test]
    fn test_half_alpha_tint_blends() {
        let image = gray_image(10, 10, 0);
        let mut mask = MaskStore::create(Size::new(10, 10)).unwrap();
        let p = Some(ImagePoint::new(5, 5));
        apply_stroke(&mut mask, p, p, 3.0, StrokeMode::Paint);

        let frame = render(
            &image,
            &mask,
            &Viewport::default(),
            Size::new(10, 10),
            Tint::new([0, 0, 255], 128),
        )
        .unwrap();
        let px = frame.pixel(5, 5).unwrap();
        assert!((126..=130).contains(&px.blue()));
        assert_eq!(px.alpha(), 255);
    }

    #[test]
    fn test_frame_is_cropped_to_viewport() {
        let image = gray_image(100, 80, 50);
        let mask = MaskStore::create(Size::new(100, 80)).unwrap();
        let viewport = Viewport::new(2.0).with_pan(500, -3);
        let frame = render(&image, &mask, &viewport, Size::new(60, 40), Tint::default()).unwrap();

        assert_eq!(frame.size(), Size::new(60, 40));
        assert_eq!(frame.offset(), (0, 0));
        // Pan is clamped to the scaled 200x160 image.
        assert_eq!(frame.region(), Region::new(140, 0, 60, 40));
    }

    #[test]
    fn test_fitting_frame_is_letterboxed() {
        let image = gray_image(30, 10, 50);
        let mask = MaskStore::create(Size::new(30, 10)).unwrap();
        let frame = render(&image, &mask, &Viewport::default(), Size::new(50, 50), Tint::default())
            .unwrap();
        assert_eq!(frame.size(), Size::new(30, 10));
        assert_eq!(frame.offset(), (10, 20));
    }

    #[test]
    fn test_overlay_follows_pan() {
        // A dab at image (60, 60) rendered at 1:1 with pan (50, 50)
        // must appear at frame (10, 10).
        let image = gray_image(100, 100, 0);
        let mut mask = MaskStore::create(Size::new(100, 100)).unwrap();
        let p = Some(ImagePoint::new(60, 60));
        apply_stroke(&mut mask, p, p, 2.0, StrokeMode::Paint);

        let viewport = Viewport::new(1.0).with_pan(50, 50);
        let tint = Tint::new([0, 255, 0], 255);
        let frame = render(&image, &mask, &viewport, Size::new(30, 30), tint).unwrap();
        assert_eq!(frame.pixel(10, 10).unwrap().green(), 255);
        assert_eq!(frame.pixel(20, 20).unwrap().green(), 0);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let image = gray_image(10, 10, 0);
        let mask = MaskStore::create(Size::new(11, 10)).unwrap();
        let err = render(&image, &mask, &Viewport::default(), Size::new(10, 10), Tint::default())
            .unwrap_err();
        assert!(matches!(err, RasterError::SizeMismatch { .. }));
    }
}
