//! Sequential mosaic workflow.
//!
//! Tiles are fetched strictly one at a time with a settling delay
//! between requests — politeness toward the tile server, not a
//! throughput concern. The workflow is an explicit state machine:
//!
//! ```text
//! Planning -> Fetching(0) -> ... -> Fetching(8) -> Assembling -> Done
//!                                                            \-> Failed
//! ```
//!
//! Every planned tile is attempted exactly once before assembly begins;
//! a tile that fails stays a hole in the mosaic. Abandoning the workflow
//! early is equivalent to the partial-coverage case.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::coords::{self, SkyPosition};
use crate::fetch::{is_cached_tile, TileFetcher};
use crate::mosaic::{self, Mosaic, MosaicError, DEFAULT_CROP_SIZE};
use crate::plan::{self, Tile, TilePlan, DEFAULT_ORDER};
use crate::survey::HipsSurvey;

/// Where the workflow currently is; diagnostic, updated as it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Planning,
    Fetching(usize),
    Assembling,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub order: u8,
    pub survey: HipsSurvey,
    pub output_dir: PathBuf,
    pub crop_size: u32,
    /// Pause after each network fetch.
    pub settle_delay: Duration,
    /// Shorter pause after a cache hit.
    pub reuse_delay: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            order: DEFAULT_ORDER,
            survey: HipsSurvey::default(),
            output_dir: PathBuf::from("mosaics"),
            crop_size: DEFAULT_CROP_SIZE,
            settle_delay: Duration::from_millis(500),
            reuse_delay: Duration::from_millis(100),
        }
    }
}

/// The mosaic engine's front door: owns the tile list for the duration
/// of a run, keeps the most recent result.
pub struct MosaicCreator<F: TileFetcher> {
    config: WorkflowConfig,
    fetcher: F,
    state: WorkflowState,
    target: Option<SkyPosition>,
    last_mosaic: Option<Mosaic>,
}

impl<F: TileFetcher> MosaicCreator<F> {
    pub fn new(fetcher: F, config: WorkflowConfig) -> Self {
        MosaicCreator {
            config,
            fetcher,
            state: WorkflowState::Idle,
            target: None,
            last_mosaic: None,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Parse raw coordinate text and remember it as the current target.
    pub fn set_coordinates(&mut self, ra_text: &str, dec_text: &str, name: &str) -> SkyPosition {
        let target = coords::parse_position(ra_text, dec_text, name);
        info!(
            name,
            ra = target.ra_deg,
            dec = target.dec_deg,
            "target coordinates set"
        );
        self.target = Some(target.clone());
        target
    }

    pub fn target(&self) -> Option<&SkyPosition> {
        self.target.as_ref()
    }

    /// The most recently assembled mosaic, if any run has succeeded.
    pub fn last_mosaic(&self) -> Option<&Mosaic> {
        self.last_mosaic.as_ref()
    }

    /// Run the full workflow for `target`: plan, fetch each tile once,
    /// assemble, write the report. Returns the finished mosaic.
    pub fn create_mosaic(&mut self, target: &SkyPosition) -> Result<&Mosaic, MosaicError> {
        self.state = WorkflowState::Planning;
        fs::create_dir_all(&self.config.output_dir)?;

        let mut plan = plan::plan_grid(
            target,
            self.config.order,
            &self.config.survey,
            &self.config.output_dir,
        )
        .ok_or(MosaicError::InvalidOrder(self.config.order))?;

        info!(
            target = %target.name,
            order = plan.order,
            center_pixel = plan.center_pixel,
            "planned 3x3 tile grid"
        );

        for i in 0..plan.tiles.len() {
            self.state = WorkflowState::Fetching(i);
            let reused = self.acquire_tile(&mut plan.tiles[i]);
            let delay = if reused {
                self.config.reuse_delay
            } else {
                self.config.settle_delay
            };
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        self.state = WorkflowState::Assembling;
        match mosaic::assemble(&plan, self.config.crop_size) {
            Ok(mosaic) => {
                let report = self.report_path(&target.name);
                if let Err(e) = write_report(&plan, &report) {
                    warn!(path = %report.display(), error = %e, "report not written");
                }
                self.state = WorkflowState::Done;
                info!(
                    downloaded = plan.downloaded_count(),
                    size = self.config.crop_size,
                    "mosaic complete"
                );
                Ok(self.last_mosaic.insert(mosaic))
            }
            Err(e) => {
                self.state = WorkflowState::Failed;
                warn!(target = %target.name, error = %e, "mosaic assembly failed");
                Err(e)
            }
        }
    }

    /// Fill in one tile, preferring a validated local copy over the
    /// network. Returns true when the cache satisfied it.
    fn acquire_tile(&self, tile: &mut Tile) -> bool {
        if is_cached_tile(&tile.path) {
            match image::open(&tile.path) {
                Ok(img) => {
                    tile.image = Some(img.to_rgb8());
                    tile.downloaded = true;
                    info!(pixel = tile.pixel, path = %tile.path.display(), "reusing tile");
                    return true;
                }
                Err(e) => {
                    warn!(path = %tile.path.display(), error = %e, "cached tile unreadable");
                }
            }
        }

        match self.fetcher.fetch(&tile.url) {
            Ok(bytes) => match image::load_from_memory(&bytes) {
                Ok(img) => {
                    if let Err(e) = fs::write(&tile.path, &bytes) {
                        warn!(path = %tile.path.display(), error = %e, "tile not saved");
                    }
                    info!(
                        pixel = tile.pixel,
                        bytes = bytes.len(),
                        width = img.width(),
                        height = img.height(),
                        "tile downloaded"
                    );
                    tile.image = Some(img.to_rgb8());
                    tile.downloaded = true;
                }
                Err(e) => {
                    warn!(pixel = tile.pixel, error = %e, "tile bytes not decodable");
                }
            },
            Err(e) => {
                warn!(pixel = tile.pixel, url = %tile.url, error = %e, "tile fetch failed");
            }
        }
        false
    }

    pub fn report_path(&self, target_name: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}_centered_report.txt", safe_name(target_name)))
    }

    pub fn mosaic_path(&self, target_name: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}_centered_mosaic.png", safe_name(target_name)))
    }
}

/// Filesystem-safe form of a target name.
pub fn safe_name(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .replace(['(', ')'], "")
}

/// Write the per-mosaic report: one delimited row per grid cell.
pub fn write_report(plan: &TilePlan, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{} Coordinate-Centered Mosaic Report", plan.target.name)?;
    writeln!(
        out,
        "Target: RA {:.6} deg, Dec {:.6} deg, order {}",
        plan.target.ra_deg, plan.target.dec_deg, plan.order
    )?;
    writeln!(out)?;
    writeln!(
        out,
        "Grid_X,Grid_Y,HEALPix_Pixel,Tile_RA,Tile_Dec,Downloaded,ImageSize,Filename"
    )?;

    for tile in &plan.tiles {
        let (w, h) = tile
            .image
            .as_ref()
            .map(|img| img.dimensions())
            .unwrap_or((0, 0));
        writeln!(
            out,
            "{},{},{},{:.6},{:.6},{},{}x{},{}",
            tile.grid_x,
            tile.grid_y,
            tile.pixel,
            tile.sky.ra_deg,
            tile.sky.dec_deg,
            if tile.downloaded { "YES" } else { "NO" },
            w,
            h,
            tile.path.display()
        )?;
    }

    out.flush()
}
