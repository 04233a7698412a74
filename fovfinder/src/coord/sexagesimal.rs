//! Sexagesimal (`HH:MM:SS.sss` / `+-DD:MM:SS.sss`) parsing and formatting.

use super::types::{AngleUnit, CoordError};

/// Parses a three-field sexagesimal string into decimal degrees.
///
/// Fields may be separated by `:` or whitespace. A leading sign applies to
/// the whole value, so `"-00:30:00"` is -0.5 degrees. Only the shape and the
/// minute/second ranges are validated here; limits on the leading field are
/// an input-level concern (see [`validate_leading_field`]).
///
/// # Examples
///
/// ```
/// use fovfinder::coord::{parse_sexagesimal, AngleUnit};
///
/// assert_eq!(parse_sexagesimal("12:30:00.0", AngleUnit::Hours).unwrap(), 187.5);
/// assert_eq!(parse_sexagesimal("-45:30:00.0", AngleUnit::Degrees).unwrap(), -45.5);
/// ```
pub fn parse_sexagesimal(text: &str, unit: AngleUnit) -> Result<f64, CoordError> {
    let trimmed = text.trim();
    let fields: Vec<&str> = trimmed
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();

    if fields.len() != 3 {
        return Err(CoordError::parse(
            text,
            format!("expected 3 fields, found {}", fields.len()),
        ));
    }

    let (negative, lead) = split_sign(fields[0]);
    let lead: u32 = lead
        .parse()
        .map_err(|_| CoordError::parse(text, format!("'{}' is not a whole number", fields[0])))?;

    let minutes: u32 = fields[1]
        .parse()
        .map_err(|_| CoordError::parse(text, format!("'{}' is not a whole number", fields[1])))?;
    if minutes > 59 {
        return Err(CoordError::parse(
            text,
            format!("minutes {} outside [0, 59]", minutes),
        ));
    }

    let seconds: f64 = fields[2]
        .parse()
        .map_err(|_| CoordError::parse(text, format!("'{}' is not a number", fields[2])))?;
    if !(0.0..60.0).contains(&seconds) {
        return Err(CoordError::parse(
            text,
            format!("seconds {} outside [0, 60)", seconds),
        ));
    }

    let magnitude = lead as f64 + minutes as f64 / 60.0 + seconds / 3600.0;
    let value = if negative { -magnitude } else { magnitude };
    Ok(value * unit.degrees_per_unit())
}

/// Formats decimal degrees as a sexagesimal string.
///
/// Hours are wrapped into [0, 24) and carry no sign; degrees always carry an
/// explicit sign. `precision` is the number of decimals on the seconds field.
///
/// # Examples
///
/// ```
/// use fovfinder::coord::{format_sexagesimal, AngleUnit};
///
/// assert_eq!(format_sexagesimal(187.5, AngleUnit::Hours, 2), "12:30:00.00");
/// assert_eq!(format_sexagesimal(-45.5, AngleUnit::Degrees, 1), "-45:30:00.0");
/// ```
pub fn format_sexagesimal(degrees: f64, unit: AngleUnit, precision: usize) -> String {
    let value = degrees / unit.degrees_per_unit();
    let negative = value < 0.0;

    // Round once on the smallest printed unit so carries propagate upward.
    let scale = 10u64.pow(precision as u32);
    let total = (value.abs() * 3600.0 * scale as f64).round() as u64;
    let seconds_scaled = total % (60 * scale);
    let whole_minutes = total / (60 * scale);
    let minutes = whole_minutes % 60;
    let mut lead = whole_minutes / 60;

    let seconds_int = seconds_scaled / scale;
    let seconds_frac = seconds_scaled % scale;
    let seconds = if precision == 0 {
        format!("{:02}", seconds_int)
    } else {
        format!(
            "{:02}.{:0width$}",
            seconds_int,
            seconds_frac,
            width = precision
        )
    };

    match unit {
        AngleUnit::Hours => {
            lead %= 24;
            format!("{:02}:{:02}:{}", lead, minutes, seconds)
        }
        AngleUnit::Degrees => {
            let sign = if negative && total > 0 { '-' } else { '+' };
            format!("{}{:02}:{:02}:{}", sign, lead, minutes, seconds)
        }
    }
}

/// Checks the leading field of a sexagesimal string against input limits.
///
/// Right ascension hours must lie in [0, 23] and declination degrees in
/// [-89, 89].
pub fn validate_leading_field(text: &str, unit: AngleUnit) -> Result<(), CoordError> {
    let first = text
        .trim()
        .split(|c: char| c == ':' || c.is_whitespace())
        .find(|f| !f.is_empty())
        .ok_or_else(|| CoordError::parse(text, "empty input"))?;

    let value: i32 = first
        .trim_start_matches('+')
        .parse()
        .map_err(|_| CoordError::parse(text, format!("'{}' is not a whole number", first)))?;

    let (min, max) = unit.field_limits();
    if value < min || value > max {
        return Err(CoordError::FieldOutOfRange {
            unit,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn split_sign(field: &str) -> (bool, &str) {
    if let Some(rest) = field.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = field.strip_prefix('+') {
        (false, rest)
    } else {
        (false, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hours() {
        let ra = parse_sexagesimal("12:30:00.0", AngleUnit::Hours).unwrap();
        assert_eq!(ra, 187.5);
    }

    #[test]
    fn test_parse_negative_degrees() {
        let dec = parse_sexagesimal("-45:30:00.0", AngleUnit::Degrees).unwrap();
        assert_eq!(dec, -45.5);
    }

    #[test]
    fn test_parse_negative_zero_degrees() {
        // Sign lives on the whole value, not just the degrees field
        let dec = parse_sexagesimal("-00:30:00", AngleUnit::Degrees).unwrap();
        assert!((dec + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_whitespace_separated() {
        let dec = parse_sexagesimal("+10 15 36", AngleUnit::Degrees).unwrap();
        assert!((dec - 10.26).abs() < 1e-12);
    }

    #[test]
    fn test_parse_wrong_field_count() {
        let result = parse_sexagesimal("12:30", AngleUnit::Hours);
        assert!(matches!(result, Err(CoordError::Parse { .. })));

        let result = parse_sexagesimal("12:30:00:00", AngleUnit::Hours);
        assert!(matches!(result, Err(CoordError::Parse { .. })));
    }

    #[test]
    fn test_parse_minutes_out_of_range() {
        let result = parse_sexagesimal("12:60:00", AngleUnit::Hours);
        assert!(matches!(result, Err(CoordError::Parse { .. })));
    }

    #[test]
    fn test_parse_seconds_out_of_range() {
        assert!(parse_sexagesimal("12:00:60.0", AngleUnit::Hours).is_err());
        assert!(parse_sexagesimal("12:00:-1.0", AngleUnit::Hours).is_err());
        assert!(parse_sexagesimal("12:00:59.999", AngleUnit::Hours).is_ok());
    }

    #[test]
    fn test_parse_non_numeric() {
        let result = parse_sexagesimal("12:ab:00", AngleUnit::Hours);
        match result {
            Err(CoordError::Parse { reason, .. }) => assert!(reason.contains("ab")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parser_does_not_limit_leading_field() {
        // 95 degrees is rejected by the input, not the parser
        assert!(parse_sexagesimal("95:00:00", AngleUnit::Degrees).is_ok());
        assert!(validate_leading_field("95:00:00", AngleUnit::Degrees).is_err());
    }

    #[test]
    fn test_validate_leading_field_limits() {
        assert!(validate_leading_field("-89:00:00", AngleUnit::Degrees).is_ok());
        assert!(validate_leading_field("+89:59:59", AngleUnit::Degrees).is_ok());
        assert!(matches!(
            validate_leading_field("-90:00:00", AngleUnit::Degrees),
            Err(CoordError::FieldOutOfRange { value: -90, .. })
        ));
        assert!(validate_leading_field("23:59:59", AngleUnit::Hours).is_ok());
        assert!(validate_leading_field("24:00:00", AngleUnit::Hours).is_err());
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_sexagesimal(187.5, AngleUnit::Hours, 2), "12:30:00.00");
        assert_eq!(format_sexagesimal(0.0, AngleUnit::Hours, 1), "00:00:00.0");
    }

    #[test]
    fn test_format_degrees_sign() {
        assert_eq!(format_sexagesimal(-45.5, AngleUnit::Degrees, 1), "-45:30:00.0");
        assert_eq!(format_sexagesimal(45.5, AngleUnit::Degrees, 0), "+45:30:00");
        assert_eq!(format_sexagesimal(-0.5, AngleUnit::Degrees, 0), "-00:30:00");
    }

    #[test]
    fn test_format_carries_rounded_seconds() {
        // 59.9999 seconds rounds into the minutes field
        let degrees = (10.0 + 59.0 / 60.0 + 59.9999 / 3600.0) * 1.0;
        assert_eq!(format_sexagesimal(degrees, AngleUnit::Degrees, 2), "+11:00:00.00");
    }

    #[test]
    fn test_format_wraps_hours() {
        assert_eq!(
            format_sexagesimal(359.999_999_9, AngleUnit::Hours, 1),
            "00:00:00.0"
        );
    }

    #[test]
    fn test_format_then_parse() {
        let text = format_sexagesimal(-20.123456, AngleUnit::Degrees, 3);
        let back = parse_sexagesimal(&text, AngleUnit::Degrees).unwrap();
        assert!((back + 20.123456).abs() < 1e-6);
    }
}
