//! Great-circle geometry on (RA, Dec) pairs.

use crate::coords::SkyPosition;

/// Haversine angular distance between two sky positions, in radians.
///
/// Numerically stable for the small separations between adjacent tile
/// centers, where the naive dot-product form loses precision.
pub fn angular_distance(a: &SkyPosition, b: &SkyPosition) -> f64 {
    let ra1 = a.ra_deg.to_radians();
    let dec1 = a.dec_deg.to_radians();
    let ra2 = b.ra_deg.to_radians();
    let dec2 = b.dec_deg.to_radians();

    let dra = ra2 - ra1;
    let ddec = dec2 - dec1;

    let h = (ddec / 2.0).sin().powi(2) + dec1.cos() * dec2.cos() * (dra / 2.0).sin().powi(2);
    2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Signed RA difference `ra - ra_ref` in degrees, wrapped into `[-180, 180)`.
///
/// Keeps offsets across the 0h/24h seam small instead of near ±360.
pub fn delta_ra_deg(ra: f64, ra_ref: f64) -> f64 {
    let mut d = (ra - ra_ref).rem_euclid(360.0);
    if d >= 180.0 {
        d -= 360.0;
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-10;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!(
            (a - b).abs() < tol,
            "expected {a} ~= {b} (diff = {})",
            (a - b).abs()
        );
    }

    fn pos(ra: f64, dec: f64) -> SkyPosition {
        SkyPosition::new(ra, dec, "test")
    }

    #[test]
    fn distance_zero_for_identical() {
        let p = pos(10.6847, 41.2687);
        assert_close(angular_distance(&p, &p), 0.0, EPS);
    }

    #[test]
    fn distance_known_separations() {
        // Quarter circle along the equator
        let d = angular_distance(&pos(0.0, 0.0), &pos(90.0, 0.0));
        assert_close(d, std::f64::consts::FRAC_PI_2, EPS);

        // Pole to pole
        let d = angular_distance(&pos(0.0, 90.0), &pos(0.0, -90.0));
        assert_close(d, std::f64::consts::PI, EPS);

        // One degree in declination
        let d = angular_distance(&pos(50.0, 10.0), &pos(50.0, 11.0));
        assert_close(d, 1.0_f64.to_radians(), EPS);
    }

    #[test]
    fn distance_symmetric() {
        let a = pos(83.0, -5.4);
        let b = pos(84.2, -4.9);
        assert_close(angular_distance(&a, &b), angular_distance(&b, &a), EPS);
    }

    #[test]
    fn distance_ra_compressed_at_high_dec() {
        // One degree of RA spans less sky near the pole
        let equator = angular_distance(&pos(0.0, 0.0), &pos(1.0, 0.0));
        let high = angular_distance(&pos(0.0, 80.0), &pos(1.0, 80.0));
        let ratio = high / equator;
        assert_close(ratio, 80.0_f64.to_radians().cos(), 1e-4);
    }

    #[test]
    fn delta_ra_wraps_seam() {
        assert_close(delta_ra_deg(1.0, 359.0), 2.0, EPS);
        assert_close(delta_ra_deg(359.0, 1.0), -2.0, EPS);
        assert_close(delta_ra_deg(10.0, 4.0), 6.0, EPS);
        assert_close(delta_ra_deg(4.0, 10.0), -6.0, EPS);
    }
}
