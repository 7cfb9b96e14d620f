//! Celestial coordinate text parsing.
//!
//! Accepts the formats observers actually type:
//!
//! ```text
//! Decimal:          10.6847        41.2687
//! Colon separated:  0:42:44.3      41:16:07
//! Letter markers:   0h42m44.3s     41d16m07s
//! ```
//!
//! Right ascension without unit markers is interpreted as hours when the
//! value is at most 24, otherwise as degrees. Parsing is deliberately
//! permissive: malformed input degrades to a best-effort numeric value
//! (0.0 on total failure) rather than an error, because callers always
//! want a usable position to point at.

use once_cell::sync::Lazy;
use regex::Regex;

/// A position on the celestial sphere, J2000 equatorial.
#[derive(Debug, Clone, PartialEq)]
pub struct SkyPosition {
    /// Right ascension in degrees, `[0, 360)`.
    pub ra_deg: f64,
    /// Declination in degrees, `[-90, 90]`.
    pub dec_deg: f64,
    pub name: String,
    pub description: String,
}

impl SkyPosition {
    pub fn new(ra_deg: f64, dec_deg: f64, name: impl Into<String>) -> Self {
        SkyPosition {
            ra_deg,
            dec_deg,
            name: name.into(),
            description: String::new(),
        }
    }

    /// The sentinel returned when a pixel-to-coordinate conversion fails.
    /// Callers check for it with [`SkyPosition::is_error`].
    pub fn error() -> Self {
        SkyPosition {
            ra_deg: 0.0,
            dec_deg: 0.0,
            name: "Error".to_string(),
            description: "HEALPix conversion failed".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.name == "Error"
    }
}

static HMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)h(?:(\d+(?:\.\d+)?)m)?(?:(\d+(?:\.\d+)?)s)?").unwrap()
});

static DMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)d(?:(\d+(?:\.\d+)?)m)?(?:(\d+(?:\.\d+)?)s)?").unwrap()
});

/// Parse an RA/Dec text pair into a [`SkyPosition`].
pub fn parse_position(ra_text: &str, dec_text: &str, name: &str) -> SkyPosition {
    SkyPosition {
        ra_deg: parse_ra(ra_text),
        dec_deg: parse_dec(dec_text),
        name: name.to_string(),
        description: "User-defined coordinates".to_string(),
    }
}

/// Parse right ascension text to degrees.
///
/// Colon or `h/m/s` sexagesimal is always hours. A bare number is hours
/// when it is at most 24, degrees otherwise.
pub fn parse_ra(text: &str) -> f64 {
    let clean = text.trim();

    if clean.contains(':') {
        if let Some((h, m, s)) = split_colon(clean) {
            return (h + m / 60.0 + s / 3600.0) * 15.0;
        }
    }

    if clean.contains('h') {
        if let Some(caps) = HMS_RE.captures(clean) {
            let (h, m, s) = captured_fields(&caps);
            return (h + m / 60.0 + s / 3600.0) * 15.0;
        }
    }

    let value: f64 = clean.parse().unwrap_or(0.0);
    if value <= 24.0 {
        value * 15.0
    } else {
        value
    }
}

/// Parse declination text to degrees. The sign is stripped before the
/// magnitude is parsed and re-applied afterwards.
pub fn parse_dec(text: &str) -> f64 {
    let mut clean = text.trim();
    let negative = clean.starts_with('-');
    clean = clean.trim_start_matches(['-', '+']);

    let magnitude = if clean.contains(':') {
        match split_colon(clean) {
            Some((d, m, s)) => d + m / 60.0 + s / 3600.0,
            None => clean.parse().unwrap_or(0.0),
        }
    } else if clean.contains('d') {
        match DMS_RE.captures(clean) {
            Some(caps) => {
                let (d, m, s) = captured_fields(&caps);
                d + m / 60.0 + s / 3600.0
            }
            None => clean.parse().unwrap_or(0.0),
        }
    } else {
        clean.parse().unwrap_or(0.0)
    };

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Split `A:B[:C]` into three numeric fields; the seconds field defaults
/// to zero. Returns `None` when there are fewer than two fields.
fn split_colon(text: &str) -> Option<(f64, f64, f64)> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() < 2 {
        return None;
    }
    let a = parts[0].trim().parse().unwrap_or(0.0);
    let b = parts[1].trim().parse().unwrap_or(0.0);
    let c = if parts.len() > 2 {
        parts[2].trim().parse().unwrap_or(0.0)
    } else {
        0.0
    };
    Some((a, b, c))
}

fn captured_fields(caps: &regex::Captures) -> (f64, f64, f64) {
    let field = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().parse().unwrap_or(0.0))
            .unwrap_or(0.0)
    };
    (field(1), field(2), field(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    #[test]
    fn ra_decimal_degrees() {
        assert_close(parse_ra("83.0"), 83.0, 1e-12);
        assert_close(parse_ra("266.4"), 266.4, 1e-12);
    }

    #[test]
    fn ra_decimal_hours() {
        // At most 24 with no markers means hours
        assert_close(parse_ra("12"), 180.0, 1e-12);
        assert_close(parse_ra("0.7123"), 10.6845, 1e-9);
        assert_close(parse_ra("24.0"), 360.0, 1e-12);
    }

    #[test]
    fn ra_colon_sexagesimal() {
        // M31: 0h42m44.3s
        assert_close(parse_ra("0:42:44.3"), 10.684583333, 1e-8);
        assert_close(parse_ra("12:00:00"), 180.0, 1e-12);
        // Seconds optional
        assert_close(parse_ra("6:30"), 97.5, 1e-12);
    }

    #[test]
    fn ra_letter_sexagesimal() {
        assert_close(parse_ra("0h42m44.3s"), 10.684583333, 1e-8);
        assert_close(parse_ra("12h"), 180.0, 1e-12);
        assert_close(parse_ra("5h30m"), 82.5, 1e-12);
    }

    #[test]
    fn dec_decimal() {
        assert_close(parse_dec("41.2687"), 41.2687, 1e-12);
        assert_close(parse_dec("-5.4"), -5.4, 1e-12);
        assert_close(parse_dec("+12.5"), 12.5, 1e-12);
    }

    #[test]
    fn dec_colon_sexagesimal() {
        assert_close(parse_dec("41:16:07"), 41.268611111, 1e-8);
        assert_close(parse_dec("-5:30:00"), -5.5, 1e-12);
        assert_close(parse_dec("-0:30"), -0.5, 1e-12);
    }

    #[test]
    fn dec_letter_sexagesimal() {
        assert_close(parse_dec("41d16m07s"), 41.268611111, 1e-8);
        assert_close(parse_dec("-5d30m00s"), -5.5, 1e-12);
    }

    #[test]
    fn malformed_degrades_to_zero() {
        assert_close(parse_ra("not a number"), 0.0, 1e-12);
        assert_close(parse_dec("galaxy"), 0.0, 1e-12);
        assert_close(parse_dec(""), 0.0, 1e-12);
    }

    #[test]
    fn position_carries_name() {
        let pos = parse_position("10.6847", "41.2687", "M31");
        assert_eq!(pos.name, "M31");
        assert_close(pos.ra_deg, 10.6847 * 15.0, 1e-9); // 10.6847 <= 24: hours
    }

    #[test]
    fn error_sentinel() {
        let err = SkyPosition::error();
        assert!(err.is_error());
        assert_eq!(err.ra_deg, 0.0);
        assert_eq!(err.dec_deg, 0.0);
        assert!(!SkyPosition::new(0.0, 0.0, "M31").is_error());
    }
}
