//! Mosaic assembly and coordinate-centered cropping.
//!
//! Tiles are pasted onto a raw 3×3 canvas, the target coordinate is
//! located inside that canvas by angular-offset arithmetic from the
//! nearest tile center, and the canvas is cropped so the target lands on
//! the output's center pixel. The crop window slides back flush against
//! the canvas edges rather than padding or scaling, so a target within
//! half a crop of the canvas boundary ends up slightly off-center —
//! documented policy, not a defect.

use image::{imageops, Rgb, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::coords::SkyPosition;
use crate::plan::{Tile, TilePlan};
use crate::sphere::{angular_distance, delta_ra_deg};

/// Edge length of one HiPS tile in pixels, promised by the tile server.
pub const TILE_SIZE: u32 = 512;

/// Edge length of the raw 3×3 canvas.
pub const RAW_SIZE: u32 = 3 * TILE_SIZE;

/// Default edge length of the centered output crop.
pub const DEFAULT_CROP_SIZE: u32 = 1200;

/// Calibrated plate scale of order-8 512-pixel tiles, arcsec per pixel.
/// (An order-8 HEALPix cell is ~0.229° ≈ 824″ across, 824/512 ≈ 1.61.)
pub const ARCSEC_PER_PIXEL: f64 = 1.61;

#[derive(Debug, Error)]
pub enum MosaicError {
    /// Not one of the nine tiles carried usable raster data.
    #[error("no tiles with valid image data")]
    NoTiles,
    /// The pixel index rejected the requested order.
    #[error("invalid HEALPix order {0}")]
    InvalidOrder(u8),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A finished coordinate-centered mosaic.
#[derive(Debug, Clone)]
pub struct Mosaic {
    /// The cropped output raster.
    pub image: RgbImage,
    /// Where the target coordinate fell in raw-canvas pixels.
    pub target_pixel: (u32, u32),
    /// Origin of the crop window in raw-canvas pixels.
    pub crop_origin: (u32, u32),
}

impl Mosaic {
    pub fn output_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Assemble the tiles of a plan into a centered mosaic.
///
/// Missing tiles leave black cells in the output; only a plan with zero
/// usable tiles fails.
pub fn assemble(plan: &TilePlan, crop_size: u32) -> Result<Mosaic, MosaicError> {
    let usable = plan.downloaded_count();
    if usable == 0 {
        return Err(MosaicError::NoTiles);
    }
    info!(
        target = %plan.target.name,
        usable,
        "assembling coordinate-centered mosaic"
    );

    let raw = compose_raw(&plan.tiles);
    let target_pixel = target_pixel_position(plan);
    debug!(x = target_pixel.0, y = target_pixel.1, "target in raw canvas");

    let (image, crop_origin) = crop_to_center(&raw, target_pixel, crop_size);

    Ok(Mosaic {
        image,
        target_pixel,
        crop_origin,
    })
}

/// Paste every tile with data onto the raw 3T×3T canvas at
/// `(grid_x·T, grid_y·T)`. Cells without data stay black.
fn compose_raw(tiles: &[Tile]) -> RgbImage {
    let mut canvas = RgbImage::new(RAW_SIZE, RAW_SIZE);

    for tile in tiles {
        let Some(img) = tile.image.as_ref() else {
            debug!(x = tile.grid_x, y = tile.grid_y, "skipping empty cell");
            continue;
        };
        imageops::replace(
            &mut canvas,
            img,
            (tile.grid_x * TILE_SIZE) as i64,
            (tile.grid_y * TILE_SIZE) as i64,
        );
    }

    canvas
}

/// Locate the target coordinate in raw-canvas pixels.
///
/// The tile whose center is angularly closest to the target anchors a
/// local linear approximation: angular offsets in arcsec (RA corrected
/// by cos dec for meridian convergence) divide by the plate scale into
/// pixel offsets from that tile's geometric center. The Dec offset is
/// negated because row index grows downward while declination grows
/// upward.
pub fn target_pixel_position(plan: &TilePlan) -> (u32, u32) {
    let Some(anchor) = nearest_tile(plan) else {
        warn!("no anchor tile; using geometric center");
        return (RAW_SIZE / 2, RAW_SIZE / 2);
    };

    let target = &plan.target;
    let offset_ra_arcsec = delta_ra_deg(target.ra_deg, anchor.sky.ra_deg)
        * 3600.0
        * target.dec_deg.to_radians().cos();
    let offset_dec_arcsec = (target.dec_deg - anchor.sky.dec_deg) * 3600.0;

    let offset_x = offset_ra_arcsec / ARCSEC_PER_PIXEL;
    let offset_y = -offset_dec_arcsec / ARCSEC_PER_PIXEL;

    debug!(
        anchor_x = anchor.grid_x,
        anchor_y = anchor.grid_y,
        offset_ra_arcsec,
        offset_dec_arcsec,
        "target offset from anchor tile center"
    );

    let center_x = (anchor.grid_x * TILE_SIZE + TILE_SIZE / 2) as i64;
    let center_y = (anchor.grid_y * TILE_SIZE + TILE_SIZE / 2) as i64;

    let x = (center_x + offset_x.round() as i64).clamp(0, RAW_SIZE as i64 - 1);
    let y = (center_y + offset_y.round() as i64).clamp(0, RAW_SIZE as i64 - 1);

    (x as u32, y as u32)
}

/// The tile whose own center is angularly closest to the plan's target.
fn nearest_tile(plan: &TilePlan) -> Option<&Tile> {
    plan.tiles
        .iter()
        .map(|t| (t, angular_distance(&plan.target, &t.sky)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(t, _)| t)
}

/// Crop `raw` to a `size × size` window centered on `target_pixel`,
/// sliding the window back inside the canvas where it would overhang.
/// `size` is capped at the canvas dimensions; never padded or scaled.
fn crop_to_center(raw: &RgbImage, target_pixel: (u32, u32), size: u32) -> (RgbImage, (u32, u32)) {
    let (width, height) = raw.dimensions();
    let crop = size.min(width).min(height);

    let mut x = target_pixel.0 as i64 - (crop / 2) as i64;
    let mut y = target_pixel.1 as i64 - (crop / 2) as i64;

    x = x.clamp(0, (width - crop) as i64);
    y = y.clamp(0, (height - crop) as i64);

    let (x, y) = (x as u32, y as u32);
    (imageops::crop_imm(raw, x, y, crop, crop).to_image(), (x, y))
}

/// Decorated copy with a crosshair at the center pixel and coordinate
/// labels beside it: the target name, its RA/Dec, and a caption line.
/// Presentation only — the returned image is for saving, the mosaic
/// itself stays unmarked.
pub fn annotate(mosaic: &Mosaic, target: &SkyPosition) -> RgbImage {
    const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
    const ARM: i64 = 30;
    const HALF_WIDTH: i64 = 1;

    let mut img = mosaic.image.clone();
    let (w, h) = img.dimensions();
    let cx = (w / 2) as i64;
    let cy = (h / 2) as i64;

    {
        let mut put = |x: i64, y: i64| {
            if x >= 0 && y >= 0 && x < w as i64 && y < h as i64 {
                img.put_pixel(x as u32, y as u32, YELLOW);
            }
        };

        for d in -ARM..=ARM {
            for t in -HALF_WIDTH..=HALF_WIDTH {
                put(cx + d, cy + t);
                put(cx + t, cy + d);
            }
        }
    }

    let coord_text = format!("RA:{:.4}° DEC:{:.4}°", target.ra_deg, target.dec_deg);
    let label_x = cx + ARM + 10;
    draw_text(&mut img, label_x, cy - 38, &target.name, YELLOW);
    draw_text(&mut img, label_x, cy - 8, &coord_text, YELLOW);
    draw_text(&mut img, label_x, cy + 22, "COORDINATE CENTERED", YELLOW);

    img
}

/// Glyph cell dimensions of the built-in label font: 5×7 bitmaps drawn
/// at 2× with a one-cell gap, so each character advances 12 px.
const GLYPH_SCALE: i64 = 2;
const GLYPH_ADVANCE: i64 = 6 * GLYPH_SCALE;

/// Render `text` onto `img` with the built-in font, top-left at (x, y).
/// Lowercase letters are drawn as uppercase; characters without a glyph
/// advance as blanks.
fn draw_text(img: &mut RgbImage, x: i64, y: i64, text: &str, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    let mut pen_x = x;

    for c in text.chars() {
        let rows = glyph(c.to_ascii_uppercase());
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..5 {
                if bits & (0b10000 >> col) == 0 {
                    continue;
                }
                for dy in 0..GLYPH_SCALE {
                    for dx in 0..GLYPH_SCALE {
                        let px = pen_x + col as i64 * GLYPH_SCALE + dx;
                        let py = y + row as i64 * GLYPH_SCALE + dy;
                        if px >= 0 && py >= 0 && px < w as i64 && py < h as i64 {
                            img.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE;
    }
}

/// 5×7 bitmap for one character, one byte per row, bit 4 the left
/// column. Covers the characters the annotation lines use.
fn glyph(c: char) -> [u8; 7] {
    match c {
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        '°' => [0b01100, 0b10010, 0b10010, 0b01100, 0b00000, 0b00000, 0b00000],
        _ => [0; 7],
    }
}
