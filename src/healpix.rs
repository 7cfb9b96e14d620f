//! Nested HEALPix indexing for HiPS tile addressing.
//!
//! HEALPix (Hierarchical Equal Area isoLatitude Pixelisation) divides the
//! sphere into 12 base faces, each subdivided into `nside × nside` cells
//! where `nside = 2^order`. HiPS tile servers address tiles by nested
//! pixel index, so this mapping must reproduce the standard nested
//! convention bit for bit.
//!
//! Base face layout:
//! - 0–3: north polar cap
//! - 4–7: equatorial belt
//! - 8–11: south polar cap
//!
//! Within a face, `x` increases to the northeast and `y` to the northwest.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

use crate::coords::SkyPosition;

/// Largest supported order; beyond this the pixel arithmetic would
/// overflow. Conversions at higher orders report the sentinel.
pub const MAX_ORDER: u8 = 29;

/// Linear subdivision factor per base face: `2^order`.
pub fn nside(order: u8) -> u64 {
    1u64 << order
}

/// Total pixel count at an order: `12 * nside^2`.
pub fn npix(order: u8) -> u64 {
    12 * nside(order) * nside(order)
}

/// Approximate angular side of one pixel, in degrees.
///
/// `sqrt(4π / (12 nside²))` converted to degrees; the quantity HiPS
/// clients use to predict tile footprints.
pub fn pixel_size_deg(order: u8) -> f64 {
    (4.0 * PI / npix(order) as f64).sqrt().to_degrees()
}

/// Map a sky position to its nested pixel at `order`.
///
/// Total over all (ra, dec); the only failure is an unsupported order,
/// reported as the sentinel `-1` rather than an error type, since pixel
/// ids travel as plain integers (URLs, filenames). Callers must check.
pub fn coord_to_pixel(pos: &SkyPosition, order: u8) -> i64 {
    if order > MAX_ORDER {
        return -1;
    }
    let lon = pos.ra_deg.to_radians();
    let lat = pos.dec_deg.clamp(-90.0, 90.0).to_radians();
    ang_to_pixel(lon, lat, order) as i64
}

/// Map a nested pixel back to the sky position of its center.
///
/// A pixel inconsistent with the order yields the documented error
/// position (ra=0, dec=0, name="Error") instead of propagating a fault;
/// callers check with [`SkyPosition::is_error`].
pub fn pixel_to_coord(pixel: u64, order: u8) -> SkyPosition {
    if order > MAX_ORDER || pixel >= npix(order) {
        return SkyPosition::error();
    }
    let (lon, lat) = pixel_to_ang(pixel, order);
    SkyPosition {
        ra_deg: lon.to_degrees(),
        dec_deg: lat.to_degrees(),
        name: format!("HEALPix_{pixel}"),
        description: format!("Order {order} pixel {pixel}"),
    }
}

/// Nested pixel for (lon, lat) in radians. `lon` may be any angle; it is
/// wrapped into `[0, 2π)`.
pub fn ang_to_pixel(lon: f64, lat: f64, order: u8) -> u64 {
    FaceCoord::project(lon, lat, nside(order) as f64).to_pixel(order)
}

/// Center (lon, lat) in radians of a nested pixel.
pub fn pixel_to_ang(pixel: u64, order: u8) -> (f64, f64) {
    let fc = FaceCoord::from_pixel(pixel, order);
    unproject(
        fc.face,
        fc.x as f64 + 0.5,
        fc.y as f64 + 0.5,
        nside(order) as f64,
    )
}

/// Offsets probed by the neighbour query, in face coordinates. The
/// position in this table is the raw index reported with each result.
const NEIGHBOUR_OFFSETS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// The up-to-8 nested neighbours of a pixel, each paired with its raw
/// index in the native probe ordering.
///
/// Pixels at the face corners where no diagonal face exists have only
/// seven neighbours; a missing direction is simply absent from the
/// result, never an error. Compass direction is not implied by the raw
/// index — callers infer it geometrically.
pub fn neighbours(pixel: u64, order: u8) -> Vec<(u64, usize)> {
    let ns = nside(order) as i64;
    let center = FaceCoord::from_pixel(pixel, order);
    let x = center.x as i64;
    let y = center.y as i64;

    let mut result = Vec::with_capacity(8);

    for (raw, &(dx, dy)) in NEIGHBOUR_OFFSETS.iter().enumerate() {
        let nx = x + dx;
        let ny = y + dy;

        if nx >= 0 && nx < ns && ny >= 0 && ny < ns {
            // Same face
            let fc = FaceCoord {
                face: center.face,
                x: nx as u64,
                y: ny as u64,
            };
            result.push((fc.to_pixel(order), raw));
            continue;
        }

        let cross_x = nx < 0 || nx >= ns;
        let cross_y = ny < 0 || ny >= ns;

        let adjacent = if cross_x && cross_y {
            face_neighbour(center.face, dx.signum(), dy.signum())
        } else if cross_x {
            face_neighbour(center.face, dx.signum(), 0)
        } else {
            face_neighbour(center.face, 0, dy.signum())
        };

        let Some(to_face) = adjacent else {
            continue;
        };

        let (fx, fy) = remap_across_faces(center.face, to_face, nx, ny, ns);

        if fx >= 0 && fx < ns && fy >= 0 && fy < ns {
            let fc = FaceCoord {
                face: to_face,
                x: fx as u64,
                y: fy as u64,
            };
            result.push((fc.to_pixel(order), raw));
        }
    }

    result
}

// ---------------------------------------------------------------------------
// Face decomposition
// ---------------------------------------------------------------------------

/// A pixel expressed as (base face, x, y) within that face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FaceCoord {
    face: u64,
    x: u64,
    y: u64,
}

impl FaceCoord {
    /// Compose the nested index: face selector plus bit-interleaved (x, y).
    fn to_pixel(self, order: u8) -> u64 {
        let ns2 = nside(order) * nside(order);
        self.face * ns2 + interleave(self.x, self.y)
    }

    fn from_pixel(pixel: u64, order: u8) -> FaceCoord {
        let ns2 = nside(order) * nside(order);
        let (x, y) = deinterleave(pixel % ns2);
        FaceCoord {
            face: pixel / ns2,
            x,
            y,
        }
    }

    /// Project (lon, lat) in radians onto a face and its discrete cell.
    fn project(lon: f64, lat: f64, ns: f64) -> FaceCoord {
        let z = lat.sin();
        let mut phi = lon % TAU;
        if phi < 0.0 {
            phi += TAU;
        }

        let phi_t = phi % FRAC_PI_2;
        let column = ((phi / FRAC_PI_2).floor() as i64).rem_euclid(4) as u64;

        if z.abs() >= 2.0 / 3.0 {
            // Polar cap: HEALPix paper eqns 19/20 solved for the distance
            // from the pole corner, kx = ns - x and ky = ns - y.
            let north = z >= 0.0;
            let zsign = if north { 1.0 } else { -1.0 };

            let root_x = (1.0 - z * zsign) * 3.0 * (ns * (2.0 * phi_t - PI) / PI).powi(2);
            let kx = if root_x <= 0.0 { 0.0 } else { root_x.sqrt() };

            let root_y = (1.0 - z * zsign) * 3.0 * (ns * 2.0 * phi_t / PI).powi(2);
            let ky = if root_y <= 0.0 { 0.0 } else { root_y.sqrt() };

            let (xx, yy) = if north { (ns - kx, ns - ky) } else { (ky, kx) };

            FaceCoord {
                face: if north { column } else { 8 + column },
                x: (xx.floor() as u64).min(ns as u64 - 1),
                y: (yy.floor() as u64).min(ns as u64 - 1),
            }
        } else {
            // Equatorial belt: rotate into the 45-degree (u1, u2) frame
            let zunits = (z + 2.0 / 3.0) / (4.0 / 3.0);
            let phiunits = phi_t / FRAC_PI_2;

            let mut xx = (zunits + phiunits) * ns;
            let mut yy = (zunits - phiunits + 1.0) * ns;

            let face = if xx >= ns {
                xx -= ns;
                if yy >= ns {
                    yy -= ns;
                    column // north polar face
                } else {
                    ((column + 1) % 4) + 4 // next equatorial face east
                }
            } else if yy >= ns {
                yy -= ns;
                column + 4
            } else {
                8 + column // south polar face
            };

            FaceCoord {
                face,
                x: (xx.floor() as u64).min(ns as u64 - 1),
                y: (yy.floor() as u64).min(ns as u64 - 1),
            }
        }
    }
}

fn is_north_face(face: u64) -> bool {
    face <= 3
}

fn is_south_face(face: u64) -> bool {
    face >= 8
}

/// Inverse of [`FaceCoord::project`] for continuous (x, y) within a face.
fn unproject(face: u64, x: f64, y: f64, ns: f64) -> (f64, f64) {
    let x_norm = x / ns;
    let y_norm = y / ns;

    let in_polar_regime = if is_north_face(face) {
        (x_norm + y_norm) > 1.0
    } else if is_south_face(face) {
        (x_norm + y_norm) < 1.0
    } else {
        false
    };

    if !in_polar_regime {
        let (phi_off, z_off, column) = if face <= 3 {
            (1.0, 0.0, face)
        } else if face <= 7 {
            (0.0, -1.0, face - 4)
        } else {
            (1.0, -2.0, face - 8)
        };

        let z = (2.0 / 3.0) * (x_norm + y_norm + z_off);
        let phi = FRAC_PI_4 * (x_norm - y_norm + phi_off + 2.0 * column as f64);

        (wrap_lon(phi), z.clamp(-1.0, 1.0).asin())
    } else {
        // Polar regime: invert eqns 19/20. South faces are flipped into
        // the north-polar convention first.
        let north = is_north_face(face);
        let zsign = if north { 1.0 } else { -1.0 };

        let (px, py) = if north { (x, y) } else { (ns - y, ns - x) };

        let kx = ns - px;
        let ky = ns - py;

        let phi_t = if kx + ky == 0.0 {
            0.0
        } else {
            PI * ky / (2.0 * (kx + ky))
        };

        // Two branches of the inverse keep the denominator away from
        // zero on either side of phi_t = pi/4.
        let z = if phi_t < FRAC_PI_4 {
            let denom = (2.0 * phi_t - PI) * ns;
            if denom.abs() < 1e-15 {
                zsign
            } else {
                let v = PI * kx / denom;
                (1.0 - v * v / 3.0) * zsign
            }
        } else {
            let denom = 2.0 * phi_t * ns;
            if denom.abs() < 1e-15 {
                zsign
            } else {
                let v = PI * ky / denom;
                (1.0 - v * v / 3.0) * zsign
            }
        };

        let column = if is_south_face(face) { face - 8 } else { face };
        let phi = FRAC_PI_2 * column as f64 + phi_t;

        (wrap_lon(phi), z.clamp(-1.0, 1.0).asin())
    }
}

fn wrap_lon(mut lon: f64) -> f64 {
    if lon < 0.0 {
        lon += TAU;
    }
    if lon >= TAU {
        lon -= TAU;
    }
    lon
}

// ---------------------------------------------------------------------------
// Bit interleaving (x even bits, y odd bits)
// ---------------------------------------------------------------------------

fn interleave(x: u64, y: u64) -> u64 {
    let mut result = 0u64;
    let mut xx = x;
    let mut yy = y;
    let mut bit = 0;
    while xx > 0 || yy > 0 {
        result |= (xx & 1) << bit;
        bit += 1;
        result |= (yy & 1) << bit;
        bit += 1;
        xx >>= 1;
        yy >>= 1;
    }
    result
}

fn deinterleave(sub: u64) -> (u64, u64) {
    let mut x = 0u64;
    let mut y = 0u64;
    let mut s = sub;
    let mut bit = 0;
    while s > 0 {
        x |= (s & 1) << bit;
        s >>= 1;
        y |= (s & 1) << bit;
        s >>= 1;
        bit += 1;
    }
    (x, y)
}

// ---------------------------------------------------------------------------
// Base face adjacency
// ---------------------------------------------------------------------------

/// The face adjacent to `face` in direction (dx, dy), each in {-1, 0, 1}.
/// `None` where the rhombic face lattice has no diagonal neighbour.
fn face_neighbour(face: u64, dx: i64, dy: i64) -> Option<u64> {
    if dx == 0 && dy == 0 {
        return Some(face);
    }

    let f = face as i64;

    if is_north_face(face) {
        let col = f; // 0..3
        match (dx, dy) {
            (1, 0) => Some(((col + 1) % 4) as u64),
            (0, 1) => Some(((col + 3) % 4) as u64),
            (1, 1) => Some(((col + 2) % 4) as u64), // across the pole
            (-1, 0) => Some((col + 4) as u64),
            (0, -1) => Some((4 + (col + 1) % 4) as u64),
            (-1, -1) => Some((col + 8) as u64),
            _ => None,
        }
    } else if is_south_face(face) {
        let col = f - 8; // 0..3
        match (dx, dy) {
            (1, 0) => Some((4 + (col + 1) % 4) as u64),
            (0, 1) => Some((col + 4) as u64),
            (1, 1) => Some(col as u64), // up to the north cap
            (-1, 0) => Some((8 + (col + 3) % 4) as u64),
            (0, -1) => Some((8 + (col + 1) % 4) as u64),
            (-1, -1) => Some((8 + (col + 2) % 4) as u64), // across the pole
            _ => None,
        }
    } else {
        let col = f - 4; // 0..3
        match (dx, dy) {
            (1, 0) => Some(col as u64),
            (0, 1) => Some(((col + 3) % 4) as u64),
            (-1, 0) => Some((8 + (col + 3) % 4) as u64),
            (0, -1) => Some((col + 8) as u64),
            (1, -1) => Some((4 + (col + 1) % 4) as u64),
            (-1, 1) => Some((4 + (col + 3) % 4) as u64),
            _ => None, // equatorial faces have no (1,1)/(-1,-1) neighbour
        }
    }
}

/// Remap out-of-range face coordinates into the adjacent face's frame.
///
/// Crossings within the equatorial belt, or between the belt and a cap,
/// wrap directly. Crossings between two faces of the same polar cap swap
/// the axes against the shared edge.
fn remap_across_faces(from_face: u64, to_face: u64, nx: i64, ny: i64, ns: i64) -> (i64, i64) {
    let crossed_x = nx < 0 || nx >= ns;
    let crossed_y = ny < 0 || ny >= ns;

    let mut fx = nx.rem_euclid(ns);
    let mut fy = ny.rem_euclid(ns);

    if is_north_face(from_face) && is_north_face(to_face) {
        if crossed_x && !crossed_y {
            fx = ny;
            fy = ns - 1;
        } else if crossed_y && !crossed_x {
            fy = nx;
            fx = ns - 1;
        } else {
            // Pole corner: the diagonal face meets at its own pole corner
            fx = ns - 1;
            fy = ns - 1;
        }
    } else if is_south_face(from_face) && is_south_face(to_face) {
        if crossed_x && !crossed_y {
            fx = ny.rem_euclid(ns);
            fy = 0;
        } else if crossed_y && !crossed_x {
            fy = nx.rem_euclid(ns);
            fx = 0;
        } else {
            fx = 0;
            fy = 0;
        }
    }

    (fx, fy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nside_and_npix() {
        assert_eq!(nside(0), 1);
        assert_eq!(nside(1), 2);
        assert_eq!(nside(8), 256);

        assert_eq!(npix(0), 12);
        assert_eq!(npix(1), 48);
        assert_eq!(npix(8), 786_432);
    }

    #[test]
    fn pixel_sizes_halve_per_order() {
        for order in 0..12 {
            let ratio = pixel_size_deg(order) / pixel_size_deg(order + 1);
            assert!(
                (ratio - 2.0).abs() < 1e-12,
                "order {order}: ratio = {ratio}"
            );
        }
        // Order 8 tiles are ~0.229 degrees on a side (the 1.61"/px scale
        // for 512-pixel tiles depends on this).
        assert!((pixel_size_deg(8) - 0.229).abs() < 0.001);
    }

    #[test]
    fn roundtrip_within_pixel() {
        let positions = [
            (0.0, 0.0),
            (180.0, 0.0),
            (10.6847, 41.2687), // M31
            (83.0, -5.4),       // Orion
            (266.4, -29.0),     // galactic center
            (0.0, 85.0),
            (200.0, -85.0),
        ];

        for order in 1..10u8 {
            let size = pixel_size_deg(order);
            for &(ra, dec) in &positions {
                let pos = SkyPosition::new(ra, dec, "fixture");
                let pixel = coord_to_pixel(&pos, order);
                assert!(pixel >= 0);
                assert!((pixel as u64) < npix(order));

                let center = pixel_to_coord(pixel as u64, order);
                assert!(!center.is_error());

                let dra = crate::sphere::delta_ra_deg(center.ra_deg, ra).abs();
                let ddec = (center.dec_deg - dec).abs();
                assert!(
                    dra < size * 3.0 && ddec < size * 3.0,
                    "order {order} ({ra}, {dec}) -> {pixel} -> ({}, {}): dra={dra} ddec={ddec}",
                    center.ra_deg,
                    center.dec_deg
                );
            }
        }
    }

    #[test]
    fn all_pixels_reachable_at_low_order() {
        for order in 0..4u8 {
            let mut seen = vec![false; npix(order) as usize];
            let n = 400;
            for i in 0..n {
                let lon = TAU * i as f64 / n as f64;
                for j in 0..n {
                    let lat = -FRAC_PI_2 + PI * j as f64 / (n - 1) as f64;
                    seen[ang_to_pixel(lon, lat, order) as usize] = true;
                }
            }
            let covered = seen.iter().filter(|&&v| v).count();
            assert_eq!(
                covered,
                npix(order) as usize,
                "order {order}: {covered}/{} pixels covered",
                npix(order)
            );
        }
    }

    #[test]
    fn interleave_roundtrip() {
        for x in 0..32 {
            for y in 0..32 {
                let sub = interleave(x, y);
                assert_eq!(deinterleave(sub), (x, y));
            }
        }
    }

    #[test]
    fn invalid_order_sentinel() {
        let pos = SkyPosition::new(10.0, 10.0, "fixture");
        assert_eq!(coord_to_pixel(&pos, MAX_ORDER + 1), -1);
        assert!(coord_to_pixel(&pos, 8) >= 0);
    }

    #[test]
    fn out_of_range_pixel_sentinel() {
        assert!(pixel_to_coord(npix(4), 4).is_error());
        assert!(pixel_to_coord(u64::MAX, 8).is_error());
        assert!(!pixel_to_coord(0, 4).is_error());
        assert!(pixel_to_coord(12, 8).description.contains("Order 8"));
    }

    #[test]
    fn interior_pixel_has_eight_neighbours() {
        for order in 2..7u8 {
            let ns = nside(order);
            let pixel = FaceCoord {
                face: 4,
                x: ns / 2,
                y: ns / 2,
            }
            .to_pixel(order);
            let nbrs = neighbours(pixel, order);
            assert_eq!(nbrs.len(), 8, "order {order}");

            // Raw indices are distinct and in range
            for &(_, raw) in &nbrs {
                assert!(raw < 8);
            }
        }
    }

    #[test]
    fn equatorial_corner_has_seven_neighbours() {
        // The south corner of an equatorial face has no diagonal face
        for order in 1..6u8 {
            let pixel = FaceCoord { face: 4, x: 0, y: 0 }.to_pixel(order);
            let nbrs = neighbours(pixel, order);
            assert_eq!(nbrs.len(), 7, "order {order}");
        }
    }

    #[test]
    fn neighbours_symmetric() {
        for order in 1..5u8 {
            for pixel in 0..npix(order) {
                for (n, _) in neighbours(pixel, order) {
                    let back: Vec<u64> =
                        neighbours(n, order).into_iter().map(|(p, _)| p).collect();
                    assert!(
                        back.contains(&pixel),
                        "order {order}: {pixel} lists {n} but not vice versa"
                    );
                }
            }
        }
    }

    #[test]
    fn neighbours_in_range_no_self_loop() {
        for order in 0..5u8 {
            let np = npix(order);
            for pixel in 0..np {
                for (n, _) in neighbours(pixel, order) {
                    assert!(n < np, "order {order}, pixel {pixel}: neighbour {n}");
                    assert_ne!(n, pixel, "order {order}: self-loop at {pixel}");
                }
            }
        }
    }

    #[test]
    fn poles_map_to_cap_faces() {
        for order in 1..8u8 {
            let north = coord_to_pixel(&SkyPosition::new(0.0, 90.0, "np"), order) as u64;
            assert!(pixel_to_coord(north, order).dec_deg > 57.0);

            let south = coord_to_pixel(&SkyPosition::new(0.0, -90.0, "sp"), order) as u64;
            assert!(pixel_to_coord(south, order).dec_deg < -57.0);
        }
    }
}
