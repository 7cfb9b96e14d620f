use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tessella::coords;
use tessella::fetch::HttpFetcher;
use tessella::healpix;
use tessella::neighbors;
use tessella::sphere;
use tessella::survey::HipsSurvey;
use tessella::workflow::{MosaicCreator, WorkflowConfig};

#[derive(Parser)]
#[command(name = "tessella", about = "Coordinate-centered HiPS sky mosaics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the 3x3 tile grid around a target and assemble a centered mosaic.
    Create {
        /// Right ascension: decimal degrees, "0:42:44.3", or "0h42m44.3s".
        ra: String,

        /// Declination: decimal degrees or "+41:16:07".
        dec: String,

        /// Target name, used for output file names.
        #[arg(short, long, default_value = "target")]
        name: String,

        /// HiPS order of the tiles.
        #[arg(long, default_value = "8")]
        order: u8,

        /// Survey base URL.
        #[arg(long, default_value = "http://alasky.u-strasbg.fr/DSS/DSSColor")]
        survey_url: String,

        /// Tile file extension served by the survey.
        #[arg(long, default_value = "jpg")]
        format: String,

        /// Deepest order the survey publishes.
        #[arg(long, default_value = "11")]
        survey_max_order: u8,

        /// Directory for tiles, the mosaic, and the report.
        #[arg(short, long, default_value = "mosaics")]
        output_dir: PathBuf,

        /// Edge length of the cropped output in pixels.
        #[arg(long, default_value = "1200")]
        crop_size: u32,

        /// Delay between tile downloads in milliseconds.
        #[arg(long, default_value = "500")]
        delay_ms: u64,

        /// Skip the crosshair marker at the target position.
        #[arg(long)]
        no_marker: bool,
    },

    /// Print the HEALPix pixel, tile center, and tile URL for coordinates.
    Locate {
        /// Right ascension (same forms as `create`).
        ra: String,

        /// Declination (same forms as `create`).
        dec: String,

        /// Lowest order to report.
        #[arg(long, default_value = "6")]
        min_order: u8,

        /// Highest order to report.
        #[arg(long, default_value = "11")]
        max_order: u8,
    },

    /// Print the 3x3 neighbour grid around coordinates.
    Grid {
        /// Right ascension (same forms as `create`).
        ra: String,

        /// Declination (same forms as `create`).
        dec: String,

        /// HiPS order of the grid.
        #[arg(long, default_value = "8")]
        order: u8,
    },
}

#[allow(clippy::too_many_arguments)]
fn cmd_create(
    ra: &str,
    dec: &str,
    name: &str,
    order: u8,
    survey_url: &str,
    format: &str,
    survey_max_order: u8,
    output_dir: PathBuf,
    crop_size: u32,
    delay_ms: u64,
    no_marker: bool,
) {
    let survey = HipsSurvey {
        name: "custom".to_string(),
        base_url: survey_url.trim_end_matches('/').to_string(),
        format: format.to_string(),
        max_order: survey_max_order,
    };
    if order > survey.max_order {
        eprintln!("Order {order} exceeds the survey's deepest published order {survey_max_order}");
        process::exit(1);
    }
    let config = WorkflowConfig {
        order,
        survey,
        output_dir,
        crop_size,
        settle_delay: Duration::from_millis(delay_ms),
        reuse_delay: Duration::from_millis(delay_ms.min(100)),
    };

    let fetcher = HttpFetcher::new().unwrap_or_else(|e| {
        eprintln!("Failed to build HTTP client: {e}");
        process::exit(1);
    });
    let mut creator = MosaicCreator::new(fetcher, config);

    let target = creator.set_coordinates(ra, dec, name);
    eprintln!(
        "Target: {} at RA {:.4} deg, Dec {:+.4} deg",
        target.name, target.ra_deg, target.dec_deg
    );

    let mosaic_path = creator.mosaic_path(name);
    let report_path = creator.report_path(name);

    match creator.create_mosaic(&target) {
        Ok(mosaic) => {
            let (w, h) = mosaic.output_size();
            let image = if no_marker {
                mosaic.image.clone()
            } else {
                tessella::mosaic::annotate(mosaic, &target)
            };
            if let Err(e) = image.save(&mosaic_path) {
                eprintln!("Failed to save mosaic {}: {e}", mosaic_path.display());
                process::exit(1);
            }
            println!("Mosaic: {} ({w} x {h})", mosaic_path.display());
            println!("Report: {}", report_path.display());
        }
        Err(e) => {
            eprintln!("Mosaic failed: {e}");
            process::exit(1);
        }
    }
}

fn cmd_locate(ra: &str, dec: &str, min_order: u8, max_order: u8) {
    let target = coords::parse_position(ra, dec, "target");
    println!(
        "RA {:.6} deg, Dec {:+.6} deg",
        target.ra_deg, target.dec_deg
    );

    let survey = HipsSurvey::dss2_color();
    for order in min_order..=max_order.min(survey.max_order) {
        let pixel = healpix::coord_to_pixel(&target, order);
        if pixel < 0 {
            eprintln!("Order {order}: invalid");
            continue;
        }
        let pixel = pixel as u64;
        let center = healpix::pixel_to_coord(pixel, order);
        let sep = sphere::angular_distance(&target, &center).to_degrees() * 60.0;
        println!(
            "Order {:2}: pixel {:10}  center RA {:9.4} Dec {:+8.4}  offset {:.2}'",
            order, pixel, center.ra_deg, center.dec_deg, sep
        );
        println!("          {}", survey.tile_url(pixel, order));
    }
}

fn cmd_grid(ra: &str, dec: &str, order: u8) {
    let target = coords::parse_position(ra, dec, "target");
    let center = healpix::coord_to_pixel(&target, order);
    if center < 0 {
        eprintln!("Order {order} is out of range");
        process::exit(1);
    }
    let center = center as u64;
    let center_sky = healpix::pixel_to_coord(center, order);
    let grid = neighbors::build_grid(center, order);

    println!(
        "3x3 grid at order {} around pixel {} (RA {:.4}, Dec {:+.4})",
        order, center, center_sky.ra_deg, center_sky.dec_deg
    );
    for y in 0..3 {
        for x in 0..3 {
            let pixel = grid.cell(x, y);
            let sky = healpix::pixel_to_coord(pixel, order);
            let d_ra = sphere::delta_ra_deg(sky.ra_deg, center_sky.ra_deg)
                * center_sky.dec_deg.to_radians().cos();
            let d_dec = sky.dec_deg - center_sky.dec_deg;
            print!(
                "  [{:10}] dRA {:+7.3} dDec {:+7.3}",
                pixel,
                d_ra,
                d_dec
            );
        }
        println!();
    }

    let mut pixels: Vec<u64> = grid.iter().map(|(_, _, p)| p).collect();
    pixels.sort_unstable();
    pixels.dedup();
    if pixels.len() < 9 {
        println!(
            "Note: {} duplicate cell(s) fall back to the center pixel",
            9 - pixels.len()
        );
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            ra,
            dec,
            name,
            order,
            survey_url,
            format,
            survey_max_order,
            output_dir,
            crop_size,
            delay_ms,
            no_marker,
        } => {
            cmd_create(
                &ra,
                &dec,
                &name,
                order,
                &survey_url,
                &format,
                survey_max_order,
                output_dir,
                crop_size,
                delay_ms,
                no_marker,
            );
        }
        Commands::Locate {
            ra,
            dec,
            min_order,
            max_order,
        } => cmd_locate(&ra, &dec, min_order, max_order),
        Commands::Grid { ra, dec, order } => cmd_grid(&ra, &dec, order),
    }
}
