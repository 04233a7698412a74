//! Instrument, target and readout window types

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::coord::{normalize_degrees, pixels_to_degrees};

/// Errors from instrument configuration and readout layout handling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// An instrument parameter has an unusable value.
    #[error("invalid instrument parameter {name}: {reason}")]
    InvalidInstrument { name: &'static str, reason: String },

    /// Readout layout text could not be parsed.
    #[error("invalid readout layout '{input}': {reason}")]
    InvalidLayout { input: String, reason: String },
}

/// Immutable description of the instrument for a session.
///
/// All pixel quantities are in unbinned detector pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    /// Instrument name, used in logs and chart labels.
    pub name: String,
    /// Plate scale in arcseconds per pixel.
    pub px_scale: f64,
    /// Detector width in pixels.
    pub nx_total: u32,
    /// Detector height in pixels.
    pub ny_total: u32,
    /// Rotator center x position in pixels.
    pub rotcen_x: f64,
    /// Rotator center y position in pixels.
    pub rotcen_y: f64,
    /// Whether the image is flipped east-west.
    pub flip_ew: bool,
    /// Whether increasing PA rotates from north towards east.
    pub e_of_n: bool,
    /// Rotator position in degrees when the chip runs north-south.
    pub pa_offset: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            name: "hipercam".to_string(),
            px_scale: 0.081,
            nx_total: 2048,
            ny_total: 1024,
            rotcen_x: 1024.0,
            rotcen_y: 512.0,
            flip_ew: true,
            e_of_n: true,
            pa_offset: 0.0,
        }
    }
}

impl InstrumentConfig {
    /// Create a configuration for the given plate scale and detector size.
    ///
    /// The rotator center defaults to the detector center.
    pub fn new(name: impl Into<String>, px_scale: f64, nx_total: u32, ny_total: u32) -> Self {
        Self {
            name: name.into(),
            px_scale,
            nx_total,
            ny_total,
            rotcen_x: nx_total as f64 / 2.0,
            rotcen_y: ny_total as f64 / 2.0,
            flip_ew: true,
            e_of_n: true,
            pa_offset: 0.0,
        }
    }

    /// Set the rotator center.
    pub fn with_rotator_center(mut self, x: f64, y: f64) -> Self {
        self.rotcen_x = x;
        self.rotcen_y = y;
        self
    }

    /// Set the east-west flip flag.
    pub fn with_flip_ew(mut self, flip_ew: bool) -> Self {
        self.flip_ew = flip_ew;
        self
    }

    /// Set the east-of-north flag.
    pub fn with_e_of_n(mut self, e_of_n: bool) -> Self {
        self.e_of_n = e_of_n;
        self
    }

    /// Set the position angle offset.
    pub fn with_pa_offset(mut self, pa_offset: f64) -> Self {
        self.pa_offset = pa_offset;
        self
    }

    /// Field of view along the detector x axis, in degrees.
    pub fn fov_x(&self) -> f64 {
        pixels_to_degrees(self.nx_total as f64, self.px_scale)
    }

    /// Field of view along the detector y axis, in degrees.
    pub fn fov_y(&self) -> f64 {
        pixels_to_degrees(self.ny_total as f64, self.px_scale)
    }

    /// Check that the configuration can produce a sensible overlay.
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !(self.px_scale.is_finite() && self.px_scale > 0.0) {
            return Err(GeometryError::InvalidInstrument {
                name: "px_scale",
                reason: format!("{} is not a positive plate scale", self.px_scale),
            });
        }
        if self.nx_total == 0 || self.ny_total == 0 {
            return Err(GeometryError::InvalidInstrument {
                name: "nxtot/nytot",
                reason: format!(
                    "detector size {}x{} is empty",
                    self.nx_total, self.ny_total
                ),
            });
        }
        if !(self.rotcen_x.is_finite() && self.rotcen_y.is_finite()) {
            return Err(GeometryError::InvalidInstrument {
                name: "rotcen",
                reason: "rotator center is not finite".to_string(),
            });
        }
        if !self.pa_offset.is_finite() {
            return Err(GeometryError::InvalidInstrument {
                name: "pa_off",
                reason: "position angle offset is not finite".to_string(),
            });
        }
        Ok(())
    }
}

/// The pointing the overlay is drawn for.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetState {
    /// Object name, if the target was resolved or named.
    pub name: Option<String>,
    /// Target right ascension in degrees.
    pub ra: f64,
    /// Target declination in degrees.
    pub dec: f64,
    /// Requested telescope position angle in degrees, [0, 360).
    pub pa: f64,
}

impl Default for TargetState {
    fn default() -> Self {
        Self {
            name: None,
            ra: 0.0,
            dec: 0.0,
            pa: 0.0,
        }
    }
}

impl TargetState {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self {
            name: None,
            ra,
            dec,
            pa: 0.0,
        }
    }

    /// Set the position angle, normalized into [0, 360).
    pub fn with_pa(mut self, pa: f64) -> Self {
        self.pa = normalize_degrees(pa);
        self
    }
}

/// One readout window in detector pixels.
///
/// Sizes may be negative, meaning the window extends from its anchor towards
/// lower pixel values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSpec {
    pub x: f64,
    pub y: f64,
    pub nx: f64,
    pub ny: f64,
}

impl WindowSpec {
    pub const fn new(x: f64, y: f64, nx: f64, ny: f64) -> Self {
        Self { x, y, nx, ny }
    }

    /// The same pixel area anchored at its lower-left corner with positive sizes.
    pub fn normalized(self) -> Self {
        let (x, nx) = if self.nx < 0.0 {
            (self.x + self.nx, -self.nx)
        } else {
            (self.x, self.nx)
        };
        let (y, ny) = if self.ny < 0.0 {
            (self.y + self.ny, -self.ny)
        } else {
            (self.y, self.ny)
        };
        Self { x, y, nx, ny }
    }
}

/// A windowed-mode pair: lower-left, upper-left, lower-right and upper-right
/// x starts sharing a y start and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPair {
    pub xsll: f64,
    pub xsul: f64,
    pub xslr: f64,
    pub xsur: f64,
    pub ys: f64,
    pub nx: f64,
    pub ny: f64,
}

/// A drift-mode pair: left and right windows sharing a y start and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftPair {
    pub xsl: f64,
    pub xsr: f64,
    pub ys: f64,
    pub nx: f64,
    pub ny: f64,
}

/// Readout layout of the detector.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModeLayout {
    /// Whole detector read out; no extra windows.
    #[default]
    FullFrame,
    /// Windowed readout through both output ports.
    Windowed(Vec<WindowPair>),
    /// Drift mode with left/right sub-windows.
    Drift(Vec<DriftPair>),
}

impl ModeLayout {
    pub fn is_full_frame(&self) -> bool {
        matches!(self, ModeLayout::FullFrame)
    }

    pub fn is_drift(&self) -> bool {
        matches!(self, ModeLayout::Drift(_))
    }

    /// Number of window pairs in the layout.
    pub fn pair_count(&self) -> usize {
        match self {
            ModeLayout::FullFrame => 0,
            ModeLayout::Windowed(pairs) => pairs.len(),
            ModeLayout::Drift(pairs) => pairs.len(),
        }
    }
}

impl fmt::Display for ModeLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeLayout::FullFrame => write!(f, "full"),
            ModeLayout::Windowed(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|p| {
                        format!(
                            "{},{},{},{},{},{},{}",
                            p.xsll, p.xsul, p.xslr, p.xsur, p.ys, p.nx, p.ny
                        )
                    })
                    .collect();
                write!(f, "windowed:{}", pairs.join(";"))
            }
            ModeLayout::Drift(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|p| format!("{},{},{},{},{}", p.xsl, p.xsr, p.ys, p.nx, p.ny))
                    .collect();
                write!(f, "drift:{}", pairs.join(";"))
            }
        }
    }
}

impl FromStr for ModeLayout {
    type Err = GeometryError;

    /// Parses `full`, `windowed:xsll,xsul,xslr,xsur,ys,nx,ny;...` or
    /// `drift:xsl,xsr,ys,nx,ny;...`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| GeometryError::InvalidLayout {
            input: s.to_string(),
            reason,
        };

        let trimmed = s.trim();
        let (mode, body) = match trimmed.split_once(':') {
            Some((mode, body)) => (mode.trim().to_lowercase(), body.trim()),
            None => (trimmed.to_lowercase(), ""),
        };

        match mode.as_str() {
            "full" | "fullframe" | "ff" => {
                if !body.is_empty() {
                    return Err(invalid("full frame takes no windows".to_string()));
                }
                Ok(ModeLayout::FullFrame)
            }
            "windowed" | "win" => {
                let pairs = parse_pairs(body, 7).map_err(invalid)?;
                if pairs.is_empty() {
                    return Err(invalid("windowed mode needs at least one pair".to_string()));
                }
                Ok(ModeLayout::Windowed(
                    pairs
                        .into_iter()
                        .map(|v| WindowPair {
                            xsll: v[0],
                            xsul: v[1],
                            xslr: v[2],
                            xsur: v[3],
                            ys: v[4],
                            nx: v[5],
                            ny: v[6],
                        })
                        .collect(),
                ))
            }
            "drift" => {
                let pairs = parse_pairs(body, 5).map_err(invalid)?;
                if pairs.is_empty() {
                    return Err(invalid("drift mode needs at least one pair".to_string()));
                }
                Ok(ModeLayout::Drift(
                    pairs
                        .into_iter()
                        .map(|v| DriftPair {
                            xsl: v[0],
                            xsr: v[1],
                            ys: v[2],
                            nx: v[3],
                            ny: v[4],
                        })
                        .collect(),
                ))
            }
            other => Err(invalid(format!("unknown mode '{}'", other))),
        }
    }
}

fn parse_pairs(body: &str, fields: usize) -> Result<Vec<Vec<f64>>, String> {
    body.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let values = pair
                .split(',')
                .map(|v| {
                    v.trim()
                        .parse::<f64>()
                        .map_err(|_| format!("'{}' is not a number", v.trim()))
                })
                .collect::<Result<Vec<f64>, String>>()?;
            if values.len() != fields {
                return Err(format!(
                    "pair '{}' has {} values, expected {}",
                    pair,
                    values.len(),
                    fields
                ));
            }
            Ok(values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_instrument_is_valid() {
        let config = InstrumentConfig::default();
        assert!(config.validate().is_ok());
        assert!((config.fov_x() - 2048.0 * 0.081 / 3600.0).abs() < 1e-12);
    }

    #[test]
    fn test_instrument_builder() {
        let config = InstrumentConfig::new("test", 0.1, 1024, 1024)
            .with_rotator_center(500.0, 520.0)
            .with_flip_ew(false)
            .with_e_of_n(false)
            .with_pa_offset(12.5);

        assert_eq!(config.rotcen_x, 500.0);
        assert_eq!(config.rotcen_y, 520.0);
        assert!(!config.flip_ew);
        assert!(!config.e_of_n);
        assert_eq!(config.pa_offset, 12.5);
    }

    #[test]
    fn test_invalid_plate_scale() {
        let config = InstrumentConfig::new("bad", 0.0, 1024, 1024);
        assert!(matches!(
            config.validate(),
            Err(GeometryError::InvalidInstrument { name: "px_scale", .. })
        ));
    }

    #[test]
    fn test_empty_detector() {
        let config = InstrumentConfig::new("bad", 0.1, 0, 1024);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_pa_normalized() {
        let target = TargetState::new(10.0, 20.0).with_pa(-90.0);
        assert_eq!(target.pa, 270.0);
    }

    #[test]
    fn test_window_normalized_negative_height() {
        let window = WindowSpec::new(100.0, 924.0, 50.0, -60.0).normalized();
        assert_eq!(window, WindowSpec::new(100.0, 864.0, 50.0, 60.0));
    }

    #[test]
    fn test_window_normalized_positive_unchanged() {
        let window = WindowSpec::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(window.normalized(), window);
    }

    #[test]
    fn test_parse_full_frame() {
        let layout: ModeLayout = "full".parse().unwrap();
        assert!(layout.is_full_frame());
        assert_eq!(layout.pair_count(), 0);
    }

    #[test]
    fn test_parse_windowed() {
        let layout: ModeLayout = "windowed: 100,100,1100,1100,50,200,100; 300,300,1300,1300,400,64,64"
            .parse()
            .unwrap();
        match &layout {
            ModeLayout::Windowed(pairs) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0].xsur, 1100.0);
                assert_eq!(pairs[1].ny, 64.0);
            }
            other => panic!("expected windowed layout, got {:?}", other),
        }
        assert!(!layout.is_drift());
    }

    #[test]
    fn test_parse_drift() {
        let layout: ModeLayout = "drift:10,1500,20,100,100".parse().unwrap();
        assert!(layout.is_drift());
        assert_eq!(layout.pair_count(), 1);
    }

    #[test]
    fn test_parse_layout_errors() {
        assert!("circus".parse::<ModeLayout>().is_err());
        assert!("drift:".parse::<ModeLayout>().is_err());
        assert!("drift:1,2,3".parse::<ModeLayout>().is_err());
        assert!("windowed:1,2,3,4,5,6,x".parse::<ModeLayout>().is_err());
        assert!("full:1,2".parse::<ModeLayout>().is_err());
    }

    #[test]
    fn test_layout_display_parses_back() {
        let layout = ModeLayout::Drift(vec![DriftPair {
            xsl: 10.0,
            xsr: 1500.0,
            ys: 20.0,
            nx: 100.0,
            ny: 90.0,
        }]);
        let text = layout.to_string();
        assert_eq!(text, "drift:10,1500,20,100,90");
        assert_eq!(text.parse::<ModeLayout>().unwrap(), layout);
    }
}
