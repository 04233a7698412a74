//! Sky-to-pixel projection and pixel-space rotation
//!
//! Sky shapes are mapped vertex by vertex through an image's astrometric
//! solution, then rotated in pixel space about the target's own projected
//! position. Rotation never happens in sky space because the projection is
//! only locally linear.

use thiserror::Error;

use crate::geometry::{InstrumentConfig, ShapeRole, SkyPolygon, SkyShape};

/// Errors from mapping sky positions onto an image.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// No reference image is loaded.
    #[error("no reference image loaded")]
    NoImage,

    /// The position lies outside the region the image's WCS can represent.
    #[error("position ({ra:.5}, {dec:.5}) is outside the image WCS domain: {reason}")]
    OutsideDomain { ra: f64, dec: f64, reason: String },

    /// The projection produced NaN or infinite pixel coordinates.
    #[error("projection of ({ra:.5}, {dec:.5}) is not finite")]
    NonFinite { ra: f64, dec: f64 },
}

/// An astrometric solution mapping sky positions to image pixels.
pub trait SkyToPixel {
    /// Maps (RA, Dec) in degrees to pixel `(x, y)`.
    fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<(f64, f64), ProjectionError>;
}

impl<T: SkyToPixel + ?Sized> SkyToPixel for &T {
    fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<(f64, f64), ProjectionError> {
        (**self).sky_to_pixel(ra, dec)
    }
}

/// A projected polygon: one pixel vertex per sky vertex, same order.
pub type PixelPolygon = Vec<(f64, f64)>;

/// A shape in image pixel coordinates, ready for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelShape {
    pub role: ShapeRole,
    pub points: Vec<(f64, f64)>,
    /// Closed polygon (true) or open path (false).
    pub closed: bool,
}

/// Projects one sky polygon through an image's WCS.
pub fn project<W: SkyToPixel + ?Sized>(
    polygon: &SkyPolygon,
    image: &W,
) -> Result<PixelPolygon, ProjectionError> {
    polygon
        .vertices()
        .iter()
        .map(|v| image.sky_to_pixel(v.ra, v.dec))
        .collect()
}

/// Projects every shape of a layout.
///
/// All or nothing: the first failing vertex aborts the whole projection.
pub fn project_shapes<W: SkyToPixel + ?Sized>(
    shapes: &[SkyShape],
    image: &W,
) -> Result<Vec<PixelShape>, ProjectionError> {
    shapes
        .iter()
        .map(|shape| {
            let points = shape
                .points()
                .iter()
                .map(|v| image.sky_to_pixel(v.ra, v.dec))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PixelShape {
                role: shape.role,
                points,
                closed: shape.is_closed(),
            })
        })
        .collect()
}

/// Rotation to apply on the image for a requested position angle.
///
/// The instrument's PA offset is removed, and the sense is reversed when PA
/// does not increase from north through east.
pub fn effective_rotation(pa: f64, config: &InstrumentConfig) -> f64 {
    let angle = pa - config.pa_offset;
    if config.e_of_n {
        angle
    } else {
        -angle
    }
}

/// Rotates a single point counterclockwise about a pivot.
#[inline]
pub fn rotate_point(x: f64, y: f64, angle_deg: f64, pivot_x: f64, pivot_y: f64) -> (f64, f64) {
    let (sin_t, cos_t) = angle_deg.to_radians().sin_cos();
    let a = x - pivot_x;
    let b = y - pivot_y;
    (
        a * cos_t - b * sin_t + pivot_x,
        a * sin_t + b * cos_t + pivot_y,
    )
}

/// Rotates every shape in place about `(pivot_x, pivot_y)` by `angle_deg`.
pub fn rotate(shapes: &mut [PixelShape], angle_deg: f64, pivot_x: f64, pivot_y: f64) {
    for shape in shapes.iter_mut() {
        for point in shape.points.iter_mut() {
            *point = rotate_point(point.0, point.1, angle_deg, pivot_x, pivot_y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{build_mode_layout, window_to_sky_polygon, ModeLayout, TargetState, WindowSpec};

    /// Linear test projection: 1 pixel per arcsecond around a reference point.
    struct LinearWcs {
        ra0: f64,
        dec0: f64,
    }

    impl SkyToPixel for LinearWcs {
        fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<(f64, f64), ProjectionError> {
            let x = 500.0 - (ra - self.ra0) * self.dec0.to_radians().cos() * 3600.0;
            let y = 500.0 + (dec - self.dec0) * 3600.0;
            Ok((x, y))
        }
    }

    /// Projection that rejects everything south of a declination.
    struct NorthOnly;

    impl SkyToPixel for NorthOnly {
        fn sky_to_pixel(&self, ra: f64, dec: f64) -> Result<(f64, f64), ProjectionError> {
            if dec < 0.0 {
                return Err(ProjectionError::OutsideDomain {
                    ra,
                    dec,
                    reason: "south of equator".to_string(),
                });
            }
            Ok((ra, dec))
        }
    }

    fn sample_shapes() -> Vec<PixelShape> {
        vec![
            PixelShape {
                role: ShapeRole::Window,
                points: vec![(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)],
                closed: true,
            },
            PixelShape {
                role: ShapeRole::Centerline,
                points: vec![(-3.0, 7.0), (12.0, -4.5)],
                closed: false,
            },
        ]
    }

    #[test]
    fn test_project_preserves_vertex_order() {
        let config = InstrumentConfig::new("test", 1.0, 100, 100);
        let target = TargetState::new(30.0, 0.0);
        let polygon = window_to_sky_polygon(WindowSpec::new(50.0, 50.0, 20.0, 10.0), &target, &config);
        let wcs = LinearWcs { ra0: 30.0, dec0: 0.0 };

        let pixels = project(&polygon, &wcs).unwrap();
        assert_eq!(pixels.len(), 4);
        // East is to the left on the image: +x on the sky is -x in pixels
        assert!((pixels[0].0 - 500.0).abs() < 1e-6);
        assert!((pixels[1].0 - 480.0).abs() < 1e-3);
        assert!((pixels[3].1 - 510.0).abs() < 1e-3);
    }

    #[test]
    fn test_project_shapes_all_or_nothing() {
        let config = InstrumentConfig::new("test", 1.0, 7200, 7200);
        // The chip straddles the equator, so some vertices fail
        let target = TargetState::new(10.0, 0.5);
        let shapes = build_mode_layout(&target, &config, &ModeLayout::FullFrame);

        let result = project_shapes(&shapes, &NorthOnly);
        assert!(matches!(result, Err(ProjectionError::OutsideDomain { .. })));
    }

    #[test]
    fn test_project_shapes_keeps_roles() {
        let config = InstrumentConfig::default();
        let target = TargetState::new(10.0, 10.0);
        let shapes = build_mode_layout(&target, &config, &"drift:10,1500,20,100,100".parse().unwrap());
        let wcs = LinearWcs { ra0: 10.0, dec0: 10.0 };

        let pixels = project_shapes(&shapes, &wcs).unwrap();
        assert_eq!(pixels.len(), shapes.len());
        for (sky, pix) in shapes.iter().zip(&pixels) {
            assert_eq!(sky.role, pix.role);
            assert_eq!(sky.points().len(), pix.points.len());
            assert_eq!(sky.is_closed(), pix.closed);
        }
    }

    #[test]
    fn test_effective_rotation_conventions() {
        let config = InstrumentConfig::default().with_pa_offset(10.0);
        assert_eq!(effective_rotation(40.0, &config), 30.0);

        let reversed = config.with_e_of_n(false);
        assert_eq!(effective_rotation(40.0, &reversed), -30.0);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let (x, y) = rotate_point(2.0, 1.0, 90.0, 1.0, 1.0);
        assert!((x - 1.0).abs() < 1e-12);
        assert!((y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_pivot_is_fixed() {
        let mut shapes = vec![PixelShape {
            role: ShapeRole::Window,
            points: vec![(3.0, 4.0)],
            closed: true,
        }];
        rotate(&mut shapes, 123.0, 3.0, 4.0);
        assert_eq!(shapes[0].points[0], (3.0, 4.0));
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let mut shapes = sample_shapes();
        rotate(&mut shapes, 0.0, 100.0, -50.0);
        assert_eq!(shapes, sample_shapes());
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_rotate_inverse_property(
                angle in -720.0..720.0_f64,
                cx in -5000.0..5000.0_f64,
                cy in -5000.0..5000.0_f64
            ) {
                let original = sample_shapes();
                let mut shapes = original.clone();
                rotate(&mut shapes, angle, cx, cy);
                rotate(&mut shapes, -angle, cx, cy);

                for (a, b) in original.iter().zip(&shapes) {
                    for (p, q) in a.points.iter().zip(&b.points) {
                        prop_assert!((p.0 - q.0).abs() < 1e-7, "x {} vs {}", p.0, q.0);
                        prop_assert!((p.1 - q.1).abs() < 1e-7, "y {} vs {}", p.1, q.1);
                    }
                }
            }

            #[test]
            fn test_rotate_preserves_distance_to_pivot(
                angle in -360.0..360.0_f64,
                x in -100.0..100.0_f64,
                y in -100.0..100.0_f64
            ) {
                let (rx, ry) = rotate_point(x, y, angle, 5.0, -5.0);
                let before = (x - 5.0).hypot(y + 5.0);
                let after = (rx - 5.0).hypot(ry + 5.0);
                prop_assert!((before - after).abs() < 1e-9);
            }
        }
    }
}
