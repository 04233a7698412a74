//! Reference sky images
//!
//! A [`ReferenceImage`] is the picture the overlay is drawn on: pixel data
//! plus the [`TanWcs`] that places it on the sky. Images come from FITS files
//! fetched by an image server, or from [`ReferenceImage::blank_field`] when
//! working offline.

mod wcs;

pub use wcs::TanWcs;

use std::io::Read;
use std::path::{Path, PathBuf};

use fitrs::{Fits, FitsData, HeaderValue, Hdu};
use thiserror::Error;

use crate::projection::{ProjectionError, SkyToPixel};

/// FITS files are made of blocks of this many bytes.
const FITS_BLOCK: u64 = 2880;

/// Plate scale of synthetic blank fields, in degrees per pixel.
pub const BLANK_FIELD_SCALE_DEG: f64 = 0.000047;

/// Errors from loading a reference image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to read image {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing FITS keyword {0}")]
    MissingKeyword(String),

    #[error("unsupported image: {0}")]
    Unsupported(String),
}

/// Keyword lookup on a FITS header.
pub trait FitsHeader {
    /// Numeric value of a keyword, integer or real.
    fn number(&self, key: &str) -> Option<f64>;

    /// String value of a keyword.
    fn text(&self, key: &str) -> Option<String>;
}

impl FitsHeader for Hdu {
    fn number(&self, key: &str) -> Option<f64> {
        match self.value(key)? {
            HeaderValue::RealFloatingNumber(v) => Some(*v),
            HeaderValue::IntegerNumber(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            HeaderValue::CharacterString(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// A displayed sky image with its astrometric solution.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    width: usize,
    height: usize,
    /// Row-major, first row is the bottom of the image (FITS order).
    data: Vec<f32>,
    wcs: TanWcs,
    source: Option<PathBuf>,
}

impl ReferenceImage {
    /// Builds an image from raw parts.
    ///
    /// `data` must hold exactly `width * height` samples in FITS order.
    pub fn from_parts(
        width: usize,
        height: usize,
        data: Vec<f32>,
        wcs: TanWcs,
    ) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Unsupported(format!(
                "empty image {}x{}",
                width, height
            )));
        }
        if data.len() != width * height {
            return Err(ImageError::Unsupported(format!(
                "{} samples for a {}x{} image",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            wcs,
            source: None,
        })
    }

    /// Reads the primary HDU of a FITS file.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        check_fits_file(path)?;

        let fits = Fits::open(path).map_err(|source| ImageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hdu = fits
            .get(0)
            .ok_or_else(|| ImageError::Unsupported("no primary HDU".to_string()))?;

        let naxis = hdu.number("NAXIS").unwrap_or(0.0) as usize;
        if naxis < 2 {
            return Err(ImageError::Unsupported(format!(
                "primary HDU has {} axes, need 2",
                naxis
            )));
        }
        let width = hdu
            .number("NAXIS1")
            .ok_or_else(|| ImageError::MissingKeyword("NAXIS1".to_string()))? as usize;
        let height = hdu
            .number("NAXIS2")
            .ok_or_else(|| ImageError::MissingKeyword("NAXIS2".to_string()))? as usize;
        let wcs = TanWcs::from_header(&hdu)?;

        let mut data = match hdu.read_data() {
            FitsData::FloatingPoint32(array) => array.data,
            FitsData::FloatingPoint64(array) => array.data.iter().map(|&v| v as f32).collect(),
            FitsData::IntegersI32(array) => array
                .data
                .iter()
                .map(|v| v.map_or(f32::NAN, |v| v as f32))
                .collect(),
            FitsData::IntegersU32(array) => array
                .data
                .iter()
                .map(|v| v.map_or(f32::NAN, |v| v as f32))
                .collect(),
            _ => return Err(ImageError::Unsupported("character data array".to_string())),
        };

        // Cubes keep only their first plane
        data.truncate(width * height);

        let mut image = Self::from_parts(width, height, data, wcs)?;
        image.source = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            width,
            height,
            scale_arcsec = image.wcs.pixel_scale() * 3600.0,
            "Loaded reference image"
        );
        Ok(image)
    }

    /// A featureless field centred on `(ra, dec)`, `fov_deg` across, north up.
    pub fn blank_field(ra: f64, dec: f64, fov_deg: f64, scale_deg: f64) -> Result<Self, ImageError> {
        if !(fov_deg > 0.0 && scale_deg > 0.0) {
            return Err(ImageError::Unsupported(format!(
                "blank field of {} deg at {} deg/pixel",
                fov_deg, scale_deg
            )));
        }
        let size = (fov_deg / scale_deg).ceil().max(1.0) as usize;
        let centre = (size as f64 - 1.0) / 2.0;
        let wcs = TanWcs::north_up(ra, dec, [centre, centre], scale_deg)?;

        tracing::debug!(ra, dec, size, "Created blank field");
        Self::from_parts(size, size, vec![0.0; size * size], wcs)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn wcs(&self) -> &TanWcs {
        &self.wcs
    }

    /// File the image was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// 8-bit greyscale rendition, north up.
    ///
    /// Samples are stretched linearly between the 0.5 and 99.5 percentiles of
    /// the finite values. Image row 0 is the top, so FITS rows are reversed.
    pub fn to_luma8(&self) -> image::GrayImage {
        let mut finite: Vec<f32> = self.data.iter().copied().filter(|v| v.is_finite()).collect();
        let (lo, hi) = if finite.is_empty() {
            (0.0, 1.0)
        } else {
            finite.sort_by(|a, b| a.total_cmp(b));
            let at = |q: f64| finite[((finite.len() - 1) as f64 * q).round() as usize];
            (at(0.005), at(0.995))
        };
        let span = if hi > lo { hi - lo } else { 1.0 };

        image::GrayImage::from_fn(self.width as u32, self.height as u32, |x, row| {
            let y = self.height - 1 - row as usize;
            let v = self.data[y * self.width + x as usize];
            let scaled = if v.is_finite() {
                ((v - lo) / span).clamp(0.0, 1.0) * 255.0
            } else {
                0.0
            };
            image::Luma([scaled as u8])
        })
    }
}

/// Rejects files that are not FITS before handing them to the reader.
///
/// Survey servers answer some failures with an HTML page saved in place of
/// the image.
fn check_fits_file(path: &Path) -> Result<(), ImageError> {
    let io_error = |source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(io_error)?;
    let len = file.metadata().map_err(io_error)?.len();
    if len < FITS_BLOCK {
        return Err(ImageError::Unsupported(format!(
            "{} is {} bytes, shorter than one FITS block",
            path.display(),
            len
        )));
    }

    let mut magic = [0u8; 9];
    file.read_exact(&mut magic).map_err(io_error)?;
    if &magic != b"SIMPLE  =" {
        return Err(ImageError::Unsupported(format!(
            "{} is not a FITS file",
            path.display()
        )));
    }
    Ok(())
}

impl SkyToPixel for ReferenceImage {
    fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<(f64, f64), ProjectionError> {
        self.wcs.sky_to_pixel(ra, dec)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    const BLOCK: usize = FITS_BLOCK as usize;

    /// Writes a minimal single-HDU FITS file of 32-bit floats.
    pub(crate) fn write_test_fits(path: &Path, width: usize, height: usize, extra: &[(&str, String)]) {
        let mut cards = vec![
            ("SIMPLE".to_string(), "T".to_string()),
            ("BITPIX".to_string(), "-32".to_string()),
            ("NAXIS".to_string(), "2".to_string()),
            ("NAXIS1".to_string(), width.to_string()),
            ("NAXIS2".to_string(), height.to_string()),
        ];
        cards.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));

        let mut header = String::new();
        for (key, value) in &cards {
            if value.starts_with('\'') {
                header.push_str(&format!("{:<8}= {:<20}{:50}", key, value, ""));
            } else {
                header.push_str(&format!("{:<8}= {:>20}{:50}", key, value, ""));
            }
        }
        header.push_str(&format!("{:<80}", "END"));
        while header.len() % BLOCK != 0 {
            header.push(' ');
        }

        let mut data = Vec::with_capacity(width * height * 4);
        for i in 0..width * height {
            data.extend_from_slice(&(i as f32).to_be_bytes());
        }
        while data.len() % BLOCK != 0 {
            data.push(0);
        }

        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(header.as_bytes()).unwrap();
        file.write_all(&data).unwrap();
    }

    pub(crate) fn tan_cards(ra: f64, dec: f64) -> Vec<(&'static str, String)> {
        vec![
            ("CTYPE1", "'RA---TAN'".to_string()),
            ("CTYPE2", "'DEC--TAN'".to_string()),
            ("CRVAL1", format!("{:.6}", ra)),
            ("CRVAL2", format!("{:.6}", dec)),
            ("CRPIX1", "16.5".to_string()),
            ("CRPIX2", "8.5".to_string()),
            ("CDELT1", "-0.0002".to_string()),
            ("CDELT2", "0.0002".to_string()),
        ]
    }

    #[test]
    fn test_open_fits_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.fits");
        write_test_fits(&path, 32, 16, &tan_cards(150.0, 2.5));

        let image = ReferenceImage::open(&path).unwrap();
        assert_eq!(image.width(), 32);
        assert_eq!(image.height(), 16);
        assert_eq!(image.source(), Some(path.as_path()));
        assert_eq!(image.data[32 + 3], 35.0);
        assert_eq!(image.wcs().crpix, [15.5, 7.5]);

        let (x, y) = image.sky_to_pixel(150.0, 2.5).unwrap();
        assert!((x - 15.5).abs() < 1e-9);
        assert!((y - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_open_missing_file() {
        let result = ReferenceImage::open(Path::new("/nonexistent/sky.fits"));
        assert!(matches!(result, Err(ImageError::Io { .. })));
    }

    #[test]
    fn test_open_rejects_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.fits");
        std::fs::write(&path, format!("<html>{}</html>", " ".repeat(3000))).unwrap();

        let result = ReferenceImage::open(&path);
        assert!(matches!(result, Err(ImageError::Unsupported(msg)) if msg.contains("not a FITS")));
    }

    #[test]
    fn test_open_rejects_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.fits");
        std::fs::write(&path, b"SIMPLE  =                    T").unwrap();

        assert!(matches!(ReferenceImage::open(&path), Err(ImageError::Unsupported(_))));
    }

    #[test]
    fn test_open_without_wcs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.fits");
        write_test_fits(&path, 4, 4, &[]);

        let result = ReferenceImage::open(&path);
        assert!(matches!(result, Err(ImageError::MissingKeyword(_))));
    }

    #[test]
    fn test_blank_field_centred_on_target() {
        let image = ReferenceImage::blank_field(83.6, 22.0, 0.1, BLANK_FIELD_SCALE_DEG).unwrap();
        assert_eq!(image.width(), 2128);
        assert_eq!(image.width(), image.height());

        let (x, y) = image.sky_to_pixel(83.6, 22.0).unwrap();
        assert!((x - 1063.5).abs() < 1e-9);
        assert!((y - 1063.5).abs() < 1e-9);
        assert!((image.wcs().pixel_scale() - BLANK_FIELD_SCALE_DEG).abs() < 1e-15);
    }

    #[test]
    fn test_blank_field_rejects_bad_size() {
        assert!(ReferenceImage::blank_field(0.0, 0.0, 0.0, BLANK_FIELD_SCALE_DEG).is_err());
        assert!(ReferenceImage::blank_field(0.0, 0.0, 1.0, -1.0).is_err());
    }

    #[test]
    fn test_from_parts_checks_length() {
        let wcs = TanWcs::north_up(0.0, 0.0, [0.0, 0.0], 1e-4).unwrap();
        assert!(ReferenceImage::from_parts(2, 2, vec![0.0; 3], wcs).is_err());
    }

    #[test]
    fn test_luma_is_north_up() {
        let wcs = TanWcs::north_up(0.0, 0.0, [0.0, 0.0], 1e-4).unwrap();
        // Bottom row dark, top row bright
        let image = ReferenceImage::from_parts(2, 2, vec![0.0, 0.0, 10.0, 10.0], wcs).unwrap();
        let luma = image.to_luma8();
        assert_eq!(luma.get_pixel(0, 0).0[0], 255);
        assert_eq!(luma.get_pixel(0, 1).0[0], 0);
    }
}
