//! Overlay rasterizer
//!
//! Paints projected detector shapes on a greyscale rendition of the
//! reference image: chip and windows as translucent fills, centerlines as
//! dashed strokes. Shapes arrive in FITS pixel coordinates (y up) and are
//! flipped into raster rows here.

use std::path::Path;

use thiserror::Error;
use tiny_skia::{
    FillRule, Paint, PathBuilder, Pixmap, PremultipliedColorU8, Stroke, StrokeDash, Transform,
};

use crate::geometry::ShapeRole;
use crate::projection::PixelShape;
use crate::reference::ReferenceImage;
use crate::session::Canvas;

/// Errors from rasterizing or saving an overlay.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot rasterize a {width}x{height} image")]
    InvalidSize { width: usize, height: usize },

    #[error("no reference image to draw on")]
    NoImage,

    #[error("failed to save {path}: {source}")]
    Save {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Colours and strokes of the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// RGBA fill of the chip outline.
    pub chip_fill: [u8; 4],
    /// RGBA fill of readout windows.
    pub window_fill: [u8; 4],
    /// RGBA colour of the centerlines.
    pub centerline: [u8; 4],
    /// Centerline width in raster pixels.
    pub centerline_width: f32,
    /// Dash and gap lengths of the centerlines.
    pub dash: [f32; 2],
}

impl Default for OverlayStyle {
    fn default() -> Self {
        // Blue chip and red windows at 30% opacity, red dashed centerlines
        Self {
            chip_fill: [0, 0, 255, 77],
            window_fill: [255, 0, 0, 77],
            centerline: [255, 0, 0, 255],
            centerline_width: 2.0,
            dash: [8.0, 6.0],
        }
    }
}

impl OverlayStyle {
    fn paint_for(&self, rgba: [u8; 4]) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
        paint.anti_alias = true;
        paint
    }
}

/// Draws `shapes` over `image`, returning an RGBA raster.
pub fn render_overlay(
    image: &ReferenceImage,
    shapes: &[PixelShape],
    style: &OverlayStyle,
) -> Result<image::RgbaImage, RenderError> {
    let (width, height) = (image.width(), image.height());
    let invalid = || RenderError::InvalidSize { width, height };
    let mut pixmap = Pixmap::new(width as u32, height as u32).ok_or_else(invalid)?;

    let luma = image.to_luma8();
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(luma.pixels()) {
        let v = src.0[0];
        *dst = PremultipliedColorU8::from_rgba(v, v, v, 255).unwrap_or(*dst);
    }

    let to_raster = |(x, y): (f64, f64)| (x as f32 + 0.5, (height as f64 - 0.5 - y) as f32);

    let mut stroke = Stroke {
        width: style.centerline_width,
        ..Stroke::default()
    };
    stroke.dash = StrokeDash::new(style.dash.to_vec(), 0.0);

    let mut drawn = 0usize;
    for shape in shapes {
        let mut builder = PathBuilder::new();
        let mut points = shape.points.iter().copied().map(to_raster);
        let Some((x0, y0)) = points.next() else {
            continue;
        };
        builder.move_to(x0, y0);
        for (x, y) in points {
            builder.line_to(x, y);
        }
        if shape.closed {
            builder.close();
        }
        let Some(path) = builder.finish() else {
            continue;
        };

        match shape.role {
            ShapeRole::Chip | ShapeRole::Window => {
                let fill = if shape.role == ShapeRole::Chip {
                    style.chip_fill
                } else {
                    style.window_fill
                };
                pixmap.fill_path(
                    &path,
                    &style.paint_for(fill),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
            ShapeRole::Centerline => {
                pixmap.stroke_path(
                    &path,
                    &style.paint_for(style.centerline),
                    &stroke,
                    Transform::identity(),
                    None,
                );
            }
        }
        drawn += 1;
    }
    tracing::debug!(width, height, shapes = drawn, "Rasterized overlay");

    // The background is opaque, so premultiplied and straight alpha agree
    let rgba: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    image::RgbaImage::from_raw(width as u32, height as u32, rgba).ok_or_else(invalid)
}

/// Canvas that keeps the latest image and overlay and rasterizes on demand.
#[derive(Debug, Default)]
pub struct RasterCanvas {
    style: OverlayStyle,
    image: Option<ReferenceImage>,
    shapes: Vec<PixelShape>,
    message: Option<String>,
}

impl RasterCanvas {
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn shapes(&self) -> &[PixelShape] {
        &self.shapes
    }

    /// Rasterizes the current image and overlay.
    pub fn render(&self) -> Result<image::RgbaImage, RenderError> {
        let image = self.image.as_ref().ok_or(RenderError::NoImage)?;
        render_overlay(image, &self.shapes, &self.style)
    }

    /// Rasterizes and writes the result; the format follows the extension.
    pub fn save(&self, path: &Path) -> Result<(), RenderError> {
        self.render()?.save(path).map_err(|source| RenderError::Save {
            path: path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Saved overlay preview");
        Ok(())
    }
}

impl Canvas for RasterCanvas {
    fn show_message(&mut self, message: Option<&str>) {
        self.message = message.map(str::to_string);
    }

    fn display_image(&mut self, image: &ReferenceImage) {
        self.image = Some(image.clone());
        self.shapes.clear();
    }

    fn replace_overlay(&mut self, _tag: &str, shapes: Vec<PixelShape>) {
        self.shapes = shapes;
    }
}
