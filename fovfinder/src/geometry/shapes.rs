//! Sky-plane shapes produced by the geometry engine

use crate::coord::SkyPoint;

/// What a shape represents in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeRole {
    /// Outline of the whole detector.
    Chip,
    /// An active readout window.
    Window,
    /// Dashed quadrant marker through the detector center.
    Centerline,
}

/// A detector window in sky coordinates.
///
/// Always four vertices: lower-left, +x, +x+y, +y. The order is
/// counterclockwise in the detector frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPolygon {
    vertices: [SkyPoint; 4],
}

impl SkyPolygon {
    pub(crate) fn from_corners(corners: [(f64, f64); 4]) -> Self {
        Self {
            vertices: corners.map(SkyPoint::from),
        }
    }

    pub fn vertices(&self) -> &[SkyPoint; 4] {
        &self.vertices
    }

    pub fn lower_left(&self) -> SkyPoint {
        self.vertices[0]
    }

    /// Signed area (square degrees) in the detector frame.
    ///
    /// Vertices are placed on a local tangent plane at the lower-left corner,
    /// with the east-west axis mirrored back when the instrument does not
    /// flip east-west. Positive means counterclockwise.
    pub fn detector_frame_area(&self, flip_ew: bool) -> f64 {
        let origin = self.vertices[0];
        let cos_dec = origin.dec.to_radians().cos();
        let local: Vec<(f64, f64)> = self
            .vertices
            .iter()
            .map(|v| {
                let mut d_ra = v.ra - origin.ra;
                if d_ra > 180.0 {
                    d_ra -= 360.0;
                } else if d_ra < -180.0 {
                    d_ra += 360.0;
                }
                let x = d_ra * cos_dec;
                let x = if flip_ew { x } else { -x };
                (x, v.dec - origin.dec)
            })
            .collect();

        let mut twice_area = 0.0;
        for i in 0..local.len() {
            let (x0, y0) = local[i];
            let (x1, y1) = local[(i + 1) % local.len()];
            twice_area += x0 * y1 - x1 * y0;
        }
        twice_area / 2.0
    }
}

/// An open polyline in sky coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyPath {
    points: Vec<SkyPoint>,
}

impl SkyPath {
    pub fn new(points: Vec<SkyPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[SkyPoint] {
        &self.points
    }
}

/// Closed polygon or open path.
#[derive(Debug, Clone, PartialEq)]
pub enum SkyOutline {
    Polygon(SkyPolygon),
    Path(SkyPath),
}

/// A shape in the overlay, in sky coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyShape {
    pub role: ShapeRole,
    pub outline: SkyOutline,
}

impl SkyShape {
    pub fn polygon(role: ShapeRole, polygon: SkyPolygon) -> Self {
        Self {
            role,
            outline: SkyOutline::Polygon(polygon),
        }
    }

    pub fn path(role: ShapeRole, path: SkyPath) -> Self {
        Self {
            role,
            outline: SkyOutline::Path(path),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.outline, SkyOutline::Polygon(_))
    }

    /// Vertices in drawing order.
    pub fn points(&self) -> &[SkyPoint] {
        match &self.outline {
            SkyOutline::Polygon(polygon) => &polygon.vertices()[..],
            SkyOutline::Path(path) => path.points(),
        }
    }

    pub fn as_polygon(&self) -> Option<&SkyPolygon> {
        match &self.outline {
            SkyOutline::Polygon(polygon) => Some(polygon),
            SkyOutline::Path(_) => None,
        }
    }
}
