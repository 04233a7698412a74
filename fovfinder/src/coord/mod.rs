//! Angle and unit utilities
//!
//! Provides conversions between detector pixels and sky angles, sexagesimal
//! text handling, and the small amount of spherical trigonometry needed to
//! place detector windows on the sky.

mod sexagesimal;
mod types;

pub use sexagesimal::{format_sexagesimal, parse_sexagesimal, validate_leading_field};
pub use types::{
    AngleUnit, CoordError, SkyPoint, ARCSEC_PER_DEG, MAX_DEC_DEG_FIELD, MAX_RA_HOURS_FIELD,
    MIN_DEC_DEG_FIELD,
};

use std::f64::consts::TAU;

/// Converts a pixel distance to degrees on the sky.
///
/// Uses the small-angle plate-scale approximation: every pixel subtends
/// `plate_scale` arcseconds.
///
/// # Arguments
///
/// * `pixel_value` - Distance in detector pixels (may be negative)
/// * `plate_scale` - Plate scale in arcseconds per pixel
#[inline]
pub fn pixels_to_degrees(pixel_value: f64, plate_scale: f64) -> f64 {
    pixel_value * plate_scale / ARCSEC_PER_DEG
}

/// Converts an angle in degrees to a pixel distance.
///
/// Exact inverse of [`pixels_to_degrees`] for the same plate scale.
#[inline]
pub fn degrees_to_pixels(degrees: f64, plate_scale: f64) -> f64 {
    degrees * ARCSEC_PER_DEG / plate_scale
}

/// Applies a tangent-plane offset to a sky position.
///
/// `delta_ra` and `delta_dec` are offsets in degrees measured on the tangent
/// plane at (`ra`, `dec`), so the RA change is declination-corrected. The
/// returned RA is normalized into [0, 360).
///
/// # Returns
///
/// The offset position as `(ra, dec)` in degrees.
pub fn add_offset_radec(ra: f64, dec: f64, delta_ra: f64, delta_dec: f64) -> (f64, f64) {
    let x = delta_ra.to_radians();
    let y = delta_dec.to_radians();
    let ra0 = ra.to_radians();
    let dec0 = dec.to_radians();

    let (sin_dec0, cos_dec0) = dec0.sin_cos();
    let d = cos_dec0 - y * sin_dec0;

    let ra2 = (x.atan2(d) + ra0) % TAU;
    let dec2 = (sin_dec0 + y * cos_dec0).atan2((x * x + d * d).sqrt());

    (normalize_degrees(ra2.to_degrees()), dec2.to_degrees())
}

/// Great-circle distance between two sky positions, in degrees.
pub fn angular_separation(ra1: f64, dec1: f64, ra2: f64, dec2: f64) -> f64 {
    let (ra1, dec1, ra2, dec2) = (
        ra1.to_radians(),
        dec1.to_radians(),
        ra2.to_radians(),
        dec2.to_radians(),
    );
    let d_ra = ra2 - ra1;
    let (sin_d1, cos_d1) = dec1.sin_cos();
    let (sin_d2, cos_d2) = dec2.sin_cos();

    // Vincenty form, well conditioned at all separations
    let num_a = cos_d2 * d_ra.sin();
    let num_b = cos_d1 * sin_d2 - sin_d1 * cos_d2 * d_ra.cos();
    let den = sin_d1 * sin_d2 + cos_d1 * cos_d2 * d_ra.cos();
    num_a.hypot(num_b).atan2(den).to_degrees()
}

/// Parses a combined "RA Dec" coordinate string.
///
/// Accepts `"HH:MM:SS.s +DD:MM:SS.s"`, six whitespace-separated fields
/// (`"12 30 00 -45 30 00"`), or two decimal numbers. RA is always read in
/// hours and Dec in degrees. The whole hours and degrees are held to the
/// input limits of [`validate_leading_field`], so RA hours lie in [0, 23]
/// and Dec degrees in [-89, 89].
///
/// # Returns
///
/// `(ra, dec)` in degrees.
pub fn parse_coordinates(text: &str) -> Result<(f64, f64), CoordError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let (ra, dec) = match tokens.len() {
        2 if tokens.iter().any(|t| t.contains(':')) => {
            validate_leading_field(tokens[0], AngleUnit::Hours)?;
            validate_leading_field(tokens[1], AngleUnit::Degrees)?;
            (
                parse_sexagesimal(tokens[0], AngleUnit::Hours)?,
                parse_sexagesimal(tokens[1], AngleUnit::Degrees)?,
            )
        }
        2 => {
            let hours = parse_decimal_field(text, tokens[0], AngleUnit::Hours)?;
            let degrees = parse_decimal_field(text, tokens[1], AngleUnit::Degrees)?;
            (hours * AngleUnit::Hours.degrees_per_unit(), degrees)
        }
        6 => {
            validate_leading_field(tokens[0], AngleUnit::Hours)?;
            validate_leading_field(tokens[3], AngleUnit::Degrees)?;
            (
                parse_sexagesimal(&tokens[..3].join(" "), AngleUnit::Hours)?,
                parse_sexagesimal(&tokens[3..].join(" "), AngleUnit::Degrees)?,
            )
        }
        n => {
            return Err(CoordError::parse(
                text,
                format!("expected RA and Dec, found {} fields", n),
            ))
        }
    };

    if !(0.0..360.0).contains(&ra) {
        return Err(CoordError::parse(text, format!("RA {} outside [0, 24h)", ra / 15.0)));
    }
    if !(-90.0..=90.0).contains(&dec) {
        return Err(CoordError::parse(text, format!("Dec {} outside [-90, 90]", dec)));
    }
    Ok((ra, dec))
}

/// A decimal hours or degrees value whose whole part obeys the field limits.
fn parse_decimal_field(input: &str, token: &str, unit: AngleUnit) -> Result<f64, CoordError> {
    let value: f64 = token
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| CoordError::parse(input, format!("'{}' is not a number", token)))?;

    let (min, max) = unit.field_limits();
    let whole = value.trunc();
    if whole < f64::from(min) || whole > f64::from(max) {
        return Err(CoordError::FieldOutOfRange {
            unit,
            value: whole as i32,
            min,
            max,
        });
    }
    Ok(value)
}

/// Normalizes an angle in degrees into [0, 360).
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}
