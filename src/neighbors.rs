//! Compass-direction neighbour resolution and 3×3 grid assembly.
//!
//! HEALPix neighbours come back in a native probe order that says nothing
//! about where each neighbour sits on the sky, and the cells are rhombi,
//! not squares. To lay tiles out on a raster we classify each neighbour
//! by the angular offset of its center from the query pixel's center:
//! mostly-vertical offsets become N/S, mostly-horizontal become E/W, and
//! the rest combine into diagonals. The 2× dominance thresholds were
//! calibrated against real tile grids; near face boundaries the
//! classification is approximate but the grid stays usable.

use std::collections::BTreeMap;

use tracing::debug;

use crate::healpix;
use crate::sphere::delta_ra_deg;

/// The eight compass directions of a raster neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::NE => "NE",
            Direction::E => "E",
            Direction::SE => "SE",
            Direction::S => "S",
            Direction::SW => "SW",
            Direction::W => "W",
            Direction::NW => "NW",
        }
    }
}

/// Classify an angular offset (degrees, RA already cos-dec corrected)
/// into a compass direction.
///
/// Vertical wins when `|Δdec| > 2|Δra|`, horizontal when
/// `|Δra| > 2|Δdec|`, anything between is a diagonal.
pub fn classify_offset(delta_ra: f64, delta_dec: f64) -> Direction {
    if delta_dec.abs() > delta_ra.abs() * 2.0 {
        if delta_dec > 0.0 {
            Direction::N
        } else {
            Direction::S
        }
    } else if delta_ra.abs() > delta_dec.abs() * 2.0 {
        if delta_ra > 0.0 {
            Direction::E
        } else {
            Direction::W
        }
    } else {
        match (delta_dec > 0.0, delta_ra > 0.0) {
            (true, true) => Direction::NE,
            (true, false) => Direction::NW,
            (false, true) => Direction::SE,
            (false, false) => Direction::SW,
        }
    }
}

/// Mapping from compass direction to neighbour pixel, built fresh per
/// query. Directions whose native neighbour is missing (edge of
/// coverage) are absent.
pub type NeighborSet = BTreeMap<Direction, u64>;

/// Resolve the directional neighbours of `center_pixel` at `order`.
pub fn directional_neighbors(center_pixel: u64, order: u8) -> NeighborSet {
    let center = healpix::pixel_to_coord(center_pixel, order);
    if center.is_error() {
        return NeighborSet::new();
    }
    let cos_dec = center.dec_deg.to_radians().cos();

    let mut set = NeighborSet::new();
    for (pixel, raw) in healpix::neighbours(center_pixel, order) {
        let coord = healpix::pixel_to_coord(pixel, order);
        if coord.is_error() {
            continue;
        }

        let delta_ra = delta_ra_deg(coord.ra_deg, center.ra_deg) * cos_dec;
        let delta_dec = coord.dec_deg - center.dec_deg;
        let dir = classify_offset(delta_ra, delta_dec);

        if let Some(prev) = set.insert(dir, pixel) {
            debug!(
                center = center_pixel,
                raw,
                direction = dir.label(),
                displaced = prev,
                "duplicate direction classification"
            );
        }
    }
    set
}

/// A 3×3 grid of pixel ids. Row 0 is the north row, row 2 the south row;
/// column 0 is west, column 2 east. Cell (1,1) is always the center
/// pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid3x3 {
    cells: [[u64; 3]; 3],
}

impl Grid3x3 {
    /// Cell at grid column `x` (west to east) and row `y` (north to
    /// south).
    pub fn cell(&self, x: usize, y: usize) -> u64 {
        self.cells[y][x]
    }

    pub fn center(&self) -> u64 {
        self.cells[1][1]
    }

    pub fn rows(&self) -> &[[u64; 3]; 3] {
        &self.cells
    }

    /// Cells in row-major order with their grid coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, u64)> + '_ {
        (0..3).flat_map(move |y| (0..3).map(move |x| (x, y, self.cells[y][x])))
    }
}

/// Build the 3×3 grid around `center_pixel`.
///
/// Any direction without a resolved neighbour falls back to the center
/// pixel. At the edge of sky coverage this duplicates the center tile in
/// the grid — accepted behavior, the mosaic stays structurally complete.
pub fn build_grid(center_pixel: u64, order: u8) -> Grid3x3 {
    let set = directional_neighbors(center_pixel, order);
    let at = |dir: Direction| set.get(&dir).copied().unwrap_or(center_pixel);

    Grid3x3 {
        cells: [
            [at(Direction::NW), at(Direction::N), at(Direction::NE)],
            [at(Direction::W), center_pixel, at(Direction::E)],
            [at(Direction::SW), at(Direction::S), at(Direction::SE)],
        ],
    }
}
