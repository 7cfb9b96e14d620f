//! Tile grid planning: which tiles to fetch, from where, to where.
//!
//! Planning is pure bookkeeping — no network or filesystem I/O happens
//! here. The fetch step fills in `image`/`downloaded` later.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::coords::SkyPosition;
use crate::healpix;
use crate::neighbors::{self, Grid3x3};
use crate::survey::HipsSurvey;

/// Default HiPS order for mosaics: 512-pixel tiles at order 8 give a
/// field of view of roughly 0.7 degrees for the 3×3 grid.
pub const DEFAULT_ORDER: u8 = 8;

/// One cell of the 3×3 mosaic grid.
#[derive(Debug, Clone)]
pub struct Tile {
    /// Grid column, 0 (west) to 2 (east).
    pub grid_x: u32,
    /// Grid row, 0 (north) to 2 (south).
    pub grid_y: u32,
    /// Nested HEALPix pixel id at the plan's order.
    pub pixel: u64,
    /// Sky position of this tile's own center.
    pub sky: SkyPosition,
    pub url: String,
    pub path: PathBuf,
    /// Raster data, present once fetched or loaded from cache.
    pub image: Option<RgbImage>,
    pub downloaded: bool,
}

/// A planned 3×3 mosaic: the target, the grid, and the nine tiles in
/// row-major order (north row first).
#[derive(Debug, Clone)]
pub struct TilePlan {
    pub target: SkyPosition,
    pub order: u8,
    pub center_pixel: u64,
    pub grid: Grid3x3,
    pub tiles: Vec<Tile>,
}

impl TilePlan {
    /// Tiles carrying usable raster data.
    pub fn downloaded_count(&self) -> usize {
        self.tiles
            .iter()
            .filter(|t| t.downloaded && t.image.is_some())
            .count()
    }
}

/// Plan the 3×3 tile grid around `target`.
///
/// Returns `None` when the pixel index reports its sentinel for the
/// order, or when the order is deeper than the survey publishes — the
/// two failures the planner must surface to callers.
pub fn plan_grid(
    target: &SkyPosition,
    order: u8,
    survey: &HipsSurvey,
    output_dir: &Path,
) -> Option<TilePlan> {
    if order > survey.max_order {
        debug!(order, max_order = survey.max_order, "order beyond survey depth");
        return None;
    }
    let center_pixel = healpix::coord_to_pixel(target, order);
    if center_pixel < 0 {
        return None;
    }
    let center_pixel = center_pixel as u64;

    let grid = neighbors::build_grid(center_pixel, order);

    let mut tiles = Vec::with_capacity(9);
    for (x, y, pixel) in grid.iter() {
        let sky = healpix::pixel_to_coord(pixel, order);
        let url = survey.tile_url(pixel, order);
        let path = output_dir.join(format!("tile_pixel{}.{}", pixel, survey.format));

        debug!(
            grid_x = x,
            grid_y = y,
            pixel,
            ra = sky.ra_deg,
            dec = sky.dec_deg,
            "planned tile"
        );

        tiles.push(Tile {
            grid_x: x as u32,
            grid_y: y as u32,
            pixel,
            sky,
            url,
            path,
            image: None,
            downloaded: false,
        });
    }

    Some(TilePlan {
        target: target.clone(),
        order,
        center_pixel,
        grid,
        tiles,
    })
}
