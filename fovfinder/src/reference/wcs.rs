//! TAN (gnomonic) world coordinate system

use super::{FitsHeader, ImageError};
use crate::coord::add_offset_radec;
use crate::projection::{ProjectionError, SkyToPixel};

/// TAN (gnomonic) WCS built from FITS header keywords.
///
/// All angles are in degrees. Pixel coordinates are zero-based: the centre
/// of the first stored pixel is `(0, 0)`, one less than the FITS convention.
#[derive(Debug, Clone, PartialEq)]
pub struct TanWcs {
    /// Reference point on sky (RA, Dec).
    pub crval: [f64; 2],
    /// Reference point in zero-based pixel coordinates.
    pub crpix: [f64; 2],
    /// CD matrix mapping pixel offsets to intermediate world coordinates.
    /// `cd[0] = [cd1_1, cd1_2]`, `cd[1] = [cd2_1, cd2_2]`.
    pub cd: [[f64; 2]; 2],
}

impl TanWcs {
    /// Creates a WCS, rejecting a singular CD matrix.
    pub fn new(crval: [f64; 2], crpix: [f64; 2], cd: [[f64; 2]; 2]) -> Result<Self, ImageError> {
        let wcs = Self { crval, crpix, cd };
        let det = wcs.determinant();
        if det == 0.0 || !det.is_finite() {
            return Err(ImageError::Unsupported(format!(
                "singular CD matrix {:?}",
                cd
            )));
        }
        Ok(wcs)
    }

    /// Image-aligned WCS with square pixels and RA increasing to the left.
    pub fn north_up(ra: f64, dec: f64, crpix: [f64; 2], scale_deg: f64) -> Result<Self, ImageError> {
        Self::new([ra, dec], crpix, [[-scale_deg, 0.0], [0.0, scale_deg]])
    }

    /// Reads the WCS from a FITS header.
    ///
    /// The linear part comes from the `CDi_j` matrix when any element is
    /// present, otherwise from `CDELTi` combined with either `PCi_j` or the
    /// classic `CROTA2` rotation.
    pub fn from_header<H: FitsHeader + ?Sized>(header: &H) -> Result<Self, ImageError> {
        for key in ["CTYPE1", "CTYPE2"] {
            if let Some(ctype) = header.text(key) {
                if !ctype.trim().ends_with("-TAN") {
                    return Err(ImageError::Unsupported(format!(
                        "{} = '{}' is not a TAN projection",
                        key,
                        ctype.trim()
                    )));
                }
            }
        }

        let required = |key: &str| {
            header
                .number(key)
                .ok_or_else(|| ImageError::MissingKeyword(key.to_string()))
        };

        let crval = [required("CRVAL1")?, required("CRVAL2")?];
        let crpix = [required("CRPIX1")? - 1.0, required("CRPIX2")? - 1.0];

        let cd_keys = [["CD1_1", "CD1_2"], ["CD2_1", "CD2_2"]];
        let has_cd = cd_keys.iter().flatten().any(|k| header.number(k).is_some());

        let cd = if has_cd {
            cd_keys.map(|row| row.map(|k| header.number(k).unwrap_or(0.0)))
        } else {
            let cdelt = [required("CDELT1")?, required("CDELT2")?];
            let pc_keys = [["PC1_1", "PC1_2"], ["PC2_1", "PC2_2"]];
            let has_pc = pc_keys.iter().flatten().any(|k| header.number(k).is_some());

            if has_pc {
                let identity = [[1.0, 0.0], [0.0, 1.0]];
                let mut cd = [[0.0; 2]; 2];
                for i in 0..2 {
                    for j in 0..2 {
                        let pc = header.number(pc_keys[i][j]).unwrap_or(identity[i][j]);
                        cd[i][j] = cdelt[i] * pc;
                    }
                }
                cd
            } else {
                let (sin_r, cos_r) = header.number("CROTA2").unwrap_or(0.0).to_radians().sin_cos();
                [
                    [cdelt[0] * cos_r, -cdelt[1] * sin_r],
                    [cdelt[0] * sin_r, cdelt[1] * cos_r],
                ]
            }
        };

        Self::new(crval, crpix, cd)
    }

    fn determinant(&self) -> f64 {
        self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
    }

    /// Approximate pixel scale in degrees per pixel.
    pub fn pixel_scale(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    /// Converts zero-based pixel coordinates to (RA, Dec).
    pub fn pixel_to_sky(&self, px: f64, py: f64) -> (f64, f64) {
        let u = px - self.crpix[0];
        let v = py - self.crpix[1];
        let xi = self.cd[0][0] * u + self.cd[0][1] * v;
        let eta = self.cd[1][0] * u + self.cd[1][1] * v;
        add_offset_radec(self.crval[0], self.crval[1], xi, eta)
    }
}

impl SkyToPixel for TanWcs {
    fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<(f64, f64), ProjectionError> {
        let (ra0, dec0) = (self.crval[0].to_radians(), self.crval[1].to_radians());
        let (sin_d0, cos_d0) = dec0.sin_cos();
        let (sin_d, cos_d) = dec.to_radians().sin_cos();
        let d_ra = ra.to_radians() - ra0;
        let cos_dra = d_ra.cos();

        let cos_c = sin_d0 * sin_d + cos_d0 * cos_d * cos_dra;
        if cos_c <= 0.0 {
            return Err(ProjectionError::OutsideDomain {
                ra,
                dec,
                reason: "behind the tangent plane".to_string(),
            });
        }

        let xi = (cos_d * d_ra.sin() / cos_c).to_degrees();
        let eta = ((cos_d0 * sin_d - sin_d0 * cos_d * cos_dra) / cos_c).to_degrees();

        let inv_det = 1.0 / self.determinant();
        let u = inv_det * (self.cd[1][1] * xi - self.cd[0][1] * eta);
        let v = inv_det * (-self.cd[1][0] * xi + self.cd[0][0] * eta);

        let (x, y) = (u + self.crpix[0], v + self.crpix[1]);
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite { ra, dec });
        }
        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {} ~= {} (diff = {})",
            a,
            b,
            (a - b).abs()
        );
    }

    #[derive(Default)]
    struct MapHeader(HashMap<&'static str, f64>, HashMap<&'static str, &'static str>);

    impl FitsHeader for MapHeader {
        fn number(&self, key: &str) -> Option<f64> {
            self.0.get(key).copied()
        }

        fn text(&self, key: &str) -> Option<String> {
            self.1.get(key).map(|s| s.to_string())
        }
    }

    fn arcsec_wcs() -> TanWcs {
        TanWcs::north_up(180.0, 30.0, [511.5, 511.5], 1.0 / 3600.0).unwrap()
    }

    #[test]
    fn test_crval_maps_to_crpix() {
        let wcs = arcsec_wcs();
        let (x, y) = wcs.sky_to_pixel(180.0, 30.0).unwrap();
        assert_close(x, 511.5, 1e-9);
        assert_close(y, 511.5, 1e-9);
    }

    #[test]
    fn test_east_is_left_north_is_up() {
        let wcs = arcsec_wcs();
        let (x_east, _) = wcs.sky_to_pixel(180.01, 30.0).unwrap();
        let (_, y_north) = wcs.sky_to_pixel(180.0, 30.01).unwrap();
        assert!(x_east < 511.5);
        assert_close(y_north, 511.5 + 36.0, 1e-2);
    }

    #[test]
    fn test_roundtrip_pixel_sky() {
        let wcs = TanWcs::new([45.0, -60.0], [100.0, 200.0], [[-2e-4, 5e-5], [4e-5, 2e-4]]).unwrap();
        for &(px, py) in &[(0.0, 0.0), (100.0, 200.0), (1023.0, 17.0), (-50.0, 700.0)] {
            let (ra, dec) = wcs.pixel_to_sky(px, py);
            let (px2, py2) = wcs.sky_to_pixel(ra, dec).unwrap();
            assert_close(px, px2, 1e-6);
            assert_close(py, py2, 1e-6);
        }
    }

    #[test]
    fn test_behind_tangent_plane_is_outside_domain() {
        let wcs = arcsec_wcs();
        let result = wcs.sky_to_pixel(0.0, -30.0);
        assert!(matches!(result, Err(ProjectionError::OutsideDomain { .. })));
    }

    #[test]
    fn test_singular_cd_rejected() {
        let result = TanWcs::new([0.0, 0.0], [0.0, 0.0], [[1.0, 2.0], [2.0, 4.0]]);
        assert!(matches!(result, Err(ImageError::Unsupported(_))));
    }

    #[test]
    fn test_from_header_cd_matrix() {
        let mut header = MapHeader::default();
        header.0.extend([
            ("CRVAL1", 10.0),
            ("CRVAL2", -20.0),
            ("CRPIX1", 51.0),
            ("CRPIX2", 101.0),
            ("CD1_1", -1e-4),
            ("CD2_2", 1e-4),
        ]);
        header.1.insert("CTYPE1", "RA---TAN");

        let wcs = TanWcs::from_header(&header).unwrap();
        assert_eq!(wcs.crpix, [50.0, 100.0]);
        assert_eq!(wcs.cd, [[-1e-4, 0.0], [0.0, 1e-4]]);
    }

    #[test]
    fn test_from_header_cdelt_crota() {
        let mut header = MapHeader::default();
        header.0.extend([
            ("CRVAL1", 10.0),
            ("CRVAL2", -20.0),
            ("CRPIX1", 1.0),
            ("CRPIX2", 1.0),
            ("CDELT1", -1e-4),
            ("CDELT2", 1e-4),
            ("CROTA2", 90.0),
        ]);

        let wcs = TanWcs::from_header(&header).unwrap();
        assert_close(wcs.cd[0][0], 0.0, 1e-15);
        assert_close(wcs.cd[0][1], -1e-4, 1e-15);
        assert_close(wcs.cd[1][0], -1e-4, 1e-15);
        assert_close(wcs.pixel_scale(), 1e-4, 1e-15);
    }

    #[test]
    fn test_from_header_missing_keyword() {
        let mut header = MapHeader::default();
        header.0.extend([("CRVAL1", 10.0), ("CRVAL2", -20.0), ("CRPIX1", 1.0)]);

        let result = TanWcs::from_header(&header);
        assert!(matches!(result, Err(ImageError::MissingKeyword(k)) if k == "CRPIX2"));
    }

    #[test]
    fn test_from_header_rejects_other_projections() {
        let mut header = MapHeader::default();
        header.1.insert("CTYPE1", "RA---SIN");

        let result = TanWcs::from_header(&header);
        assert!(matches!(result, Err(ImageError::Unsupported(_))));
    }
}
