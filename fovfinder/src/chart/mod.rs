//! Finding charts
//!
//! A finding chart is a copy of the field image with the target name,
//! coordinates and position angle burned into its top-right corner, for use
//! away from the planning tool.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use rusttype::{point, Font, Scale};
use thiserror::Error;

/// Font size the glyph search starts from.
pub const START_FONT_SIZE: f32 = 5.0;

/// Fraction of the image width the widest label line must reach.
pub const LABEL_WIDTH_FRACTION: f32 = 0.3;

/// Largest font size tried before giving up on the width target.
const MAX_FONT_SIZE: f32 = 1000.0;

/// Extension used when the output path has none.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Label font used when none is configured.
const BUNDLED_FONT: &[u8] = include_bytes!("DejaVuSans.ttf");

const LABEL_BOX: [u8; 4] = [255, 255, 255, 200];
const LABEL_TEXT: [u8; 3] = [255, 0, 0];

/// Errors from producing a finding chart.
#[derive(Debug, Error)]
pub enum ChartError {
    /// The bundled font could not be parsed, so no label can be drawn.
    #[error("cannot render finding chart text: {0}")]
    RenderUnavailable(String),

    #[error("unusable font {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("failed to save finding chart {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Loads a TrueType font from a file.
pub fn load_font(path: &Path) -> Result<Font<'static>, ChartError> {
    let data = std::fs::read(path).map_err(|e| ChartError::Font {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Font::try_from_vec(data).ok_or_else(|| ChartError::Font {
        path: path.to_path_buf(),
        reason: "not a TrueType font".to_string(),
    })
}

/// The font shipped with the library.
pub fn bundled_font() -> Result<Font<'static>, ChartError> {
    Font::try_from_bytes(BUNDLED_FONT)
        .ok_or_else(|| ChartError::RenderUnavailable("bundled font is unreadable".to_string()))
}

/// Loads the configured font, falling back to the bundled one.
///
/// A configured font that cannot be loaded is an error rather than a silent
/// fallback.
pub fn find_font(configured: Option<&Path>) -> Result<Font<'static>, ChartError> {
    match configured {
        Some(path) => {
            let font = load_font(path)?;
            tracing::debug!(font = %path.display(), "Using configured chart font");
            Ok(font)
        }
        None => bundled_font(),
    }
}

/// Label text burned into the chart.
pub fn label_text(object_name: &str, ra: &str, dec: &str, pa: f64) -> String {
    format!("{}\n{} {}\nPA = {:.1}", object_name, ra, dec, pa)
}

/// Width of the widest line and the height of one line, in pixels.
fn measure(font: &Font<'_>, scale: Scale, text: &str) -> (f32, f32) {
    let v = font.v_metrics(scale);
    let line_height = v.ascent - v.descent;
    let widest = text
        .lines()
        .map(|line| {
            font.layout(line, scale, point(0.0, 0.0))
                .last()
                .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
                .unwrap_or(0.0)
        })
        .fold(0.0_f32, f32::max);
    (widest, line_height)
}

/// Smallest font size, counting up from [`START_FONT_SIZE`], whose widest
/// line spans [`LABEL_WIDTH_FRACTION`] of `image_width`.
pub fn fit_font_size(font: &Font<'_>, text: &str, image_width: u32) -> f32 {
    let target = LABEL_WIDTH_FRACTION * image_width as f32;
    let mut size = START_FONT_SIZE;
    loop {
        size += 1.0;
        let (w, _) = measure(font, Scale::uniform(size), text);
        if w >= target || size >= MAX_FONT_SIZE {
            return size;
        }
    }
}

fn blend(dst: &mut Rgb<u8>, src: [u8; 3], alpha: f32) {
    for (d, s) in dst.0.iter_mut().zip(src) {
        *d = (f32::from(s) * alpha + f32::from(*d) * (1.0 - alpha)).round() as u8;
    }
}

/// Burns the label into a copy of `image`.
pub fn annotate(image: &RgbImage, font: &Font<'_>, text: &str) -> RgbImage {
    let mut out = image.clone();
    let (width, height) = out.dimensions();

    let size = fit_font_size(font, text, width);
    let scale = Scale::uniform(size);
    let (text_w, text_h) = measure(font, scale, text);

    // Translucent white box in the top-right corner
    let box_w = ((1.1 * text_w) as u32).min(width);
    let box_h = ((4.0 * text_h) as u32).min(height);
    let box_alpha = f32::from(LABEL_BOX[3]) / 255.0;
    for y in 0..box_h {
        for x in width - box_w..width {
            blend(
                out.get_pixel_mut(x, y),
                [LABEL_BOX[0], LABEL_BOX[1], LABEL_BOX[2]],
                box_alpha,
            );
        }
    }

    let v = font.v_metrics(scale);
    let line_advance = v.ascent - v.descent + v.line_gap;
    let x0 = width as f32 - 1.05 * text_w;
    for (i, line) in text.lines().enumerate() {
        let baseline = v.ascent + i as f32 * line_advance;
        for glyph in font.layout(line, scale, point(x0, baseline)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = bb.min.x + gx as i32;
                let py = bb.min.y + gy as i32;
                if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
                    blend(out.get_pixel_mut(px as u32, py as u32), LABEL_TEXT, coverage);
                }
            });
        }
    }

    tracing::debug!(font_size = size, text_w, text_h, "Annotated finding chart");
    out
}

/// Writes a finding chart for `image` to `path`.
///
/// The format follows the extension of `path`; `.jpg` is appended when it
/// has none.
///
/// # Returns
///
/// The path actually written.
pub fn make_finder(
    image: &image::DynamicImage,
    object_name: &str,
    ra: &str,
    dec: &str,
    pa: f64,
    font: &Font<'_>,
    path: &Path,
) -> Result<PathBuf, ChartError> {
    let path = if path.extension().is_none() {
        path.with_extension(DEFAULT_EXTENSION)
    } else {
        path.to_path_buf()
    };

    let text = label_text(object_name, ra, dec, pa);
    let chart = annotate(&image.to_rgb8(), font, &text);
    chart.save(&path).map_err(|source| ChartError::Save {
        path: path.clone(),
        source,
    })?;

    tracing::info!(path = %path.display(), object = object_name, "Saved finding chart");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_text() {
        assert_eq!(
            label_text("M1", "05:34:31.94", "+22:00:52.2", 12.345),
            "M1\n05:34:31.94 +22:00:52.2\nPA = 12.3"
        );
    }

    #[test]
    fn test_missing_configured_font() {
        let result = find_font(Some(Path::new("/nonexistent/font.ttf")));
        assert!(matches!(result, Err(ChartError::Font { .. })));
    }

    #[test]
    fn test_invalid_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(load_font(&path), Err(ChartError::Font { .. })));
    }

    #[test]
    fn test_configured_font_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label.ttf");
        std::fs::write(&path, BUNDLED_FONT).unwrap();
        assert!(find_font(Some(&path)).is_ok());
    }

    #[test]
    fn test_default_is_bundled_font() {
        let font = find_font(None).unwrap();
        assert!(font.glyph_count() > 100);
    }

    #[test]
    fn test_font_size_reaches_width_fraction() {
        let font = bundled_font().unwrap();
        let text = label_text("M1", "05:34:31.94", "+22:00:52.2", 0.0);
        let size = fit_font_size(&font, &text, 600);
        let (w, _) = measure(&font, Scale::uniform(size), &text);
        let (w_smaller, _) = measure(&font, Scale::uniform(size - 1.0), &text);
        assert!(w >= 180.0);
        assert!(size == START_FONT_SIZE + 1.0 || w_smaller < 180.0);
    }

    #[test]
    fn test_make_finder_writes_jpeg() {
        let font = bundled_font().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let image = image::DynamicImage::ImageLuma8(image::GrayImage::new(300, 200));

        let written =
            make_finder(&image, "M1", "05:34:31.94", "+22:00:52.2", 30.0, &font, &dir.path().join("chart"))
                .unwrap();
        assert_eq!(written, dir.path().join("chart.jpg"));

        let chart = image::open(&written).unwrap().to_rgb8();
        // Top-right corner is inside the label box, bottom-left is untouched
        assert!(chart.get_pixel(298, 1).0[1] > 150);
        assert!(chart.get_pixel(1, 198).0[1] < 20);
    }
}
