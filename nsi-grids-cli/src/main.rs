use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nsi_grids::map_sets::{PHOSPHORUS, POTASSIUM};
use nsi_grids::{CompositeConfig, MapSets, PngWriter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding `<CODE>_grid.txt` files
    #[arg(long, value_name = "DIR", default_value = "NSI_GRIDS")]
    grid_dir: PathBuf,

    /// Land-use colour image aligned with the grids
    #[arg(long, value_name = "PNG", default_value = "land_use_aligned_cropped.png")]
    land_use: PathBuf,

    /// Material codes to load
    #[arg(long, value_delimiter = ',', default_value = "K,P")]
    materials: Vec<String>,

    /// Load `<CODE>_map.json` snapshots from this directory instead of the text grids
    #[arg(long, value_name = "DIR")]
    from_json: Option<PathBuf>,

    /// Write `<CODE>_map.json` snapshots into the output directory
    #[arg(long)]
    save_json: bool,

    /// Output directory
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Potassium deficiency cutoff
    #[arg(long, default_value_t = 0.6)]
    k_threshold: f32,

    /// Phosphorus deficiency cutoff
    #[arg(long, default_value_t = 0.06)]
    p_threshold: f32,

    /// Mask values below this are treated as non-arable
    #[arg(long, default_value_t = 50)]
    arability_cut: u8,

    /// Derive both cutoffs from this percentile of each raster instead
    #[arg(long, value_name = "PERCENTILE")]
    use_percentile: Option<f64>,

    /// Also write a single-material overlay masked to arable land
    #[arg(long, value_name = "MATERIAL")]
    overlay: Option<String>,

    /// Values below this are tinted in the overlay
    #[arg(long, default_value_t = 0.0)]
    floor: f64,

    /// Also write the enhanced land-use image
    #[arg(long)]
    enhanced_land_use: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let start_time = std::time::Instant::now();

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {:?}", args.output))?;

    let map_sets = match &args.from_json {
        Some(dir) => {
            info!("Loading JSON snapshots from {:?}", dir);
            MapSets::from_json_files(dir, args.materials.as_slice(), &args.land_use)
        }
        None => {
            info!("Loading grids from {:?}", args.grid_dir);
            MapSets::from_source_files(&args.grid_dir, args.materials.as_slice(), &args.land_use)
        }
    }
    .context("Failed to load map sets")?;

    if args.save_json {
        for path in map_sets.save_json(&args.output)? {
            info!("Written JSON: {:?}", path);
        }
    }

    if let Some(material) = &args.overlay {
        let image = map_sets.composite(material, args.floor)?;
        let output_path = args.output.join(format!("{}_arable_overlay.png", material));
        PngWriter::new().write(&image, &output_path)?;
        info!("Written overlay: {:?}", output_path);
    }

    if args.enhanced_land_use {
        let output_path = args.output.join("land_use_enhanced.png");
        map_sets.save_enhanced_land_use(&output_path)?;
        info!("Written enhanced land use: {:?}", output_path);
    }

    let config = composite_config(&args, &map_sets)?;
    let output_path = args.output.join("PK_Combined_map.png");
    let mut counters = map_sets.save_master_map(&output_path, &config)?;
    println!("{}", counters.render());
    info!("Written composite: {:?}", output_path);

    info!("Total processing time: {:?}", start_time.elapsed());

    Ok(())
}

fn composite_config(args: &Args, map_sets: &MapSets) -> Result<CompositeConfig> {
    let mut config = CompositeConfig {
        k_threshold: args.k_threshold,
        p_threshold: args.p_threshold,
        arability_cut: args.arability_cut,
        ..CompositeConfig::default()
    };

    if let Some(percentile) = args.use_percentile {
        let k = map_sets.percentile(POTASSIUM, percentile)?;
        let p = map_sets.percentile(PHOSPHORUS, percentile)?;
        match (k, p) {
            (Some(k), Some(p)) => {
                info!("Percentile {} thresholds: K {} P {}", percentile, k, p);
                config.k_threshold = k as f32;
                config.p_threshold = p as f32;
            }
            _ => {
                error!("Percentile {} threshold unavailable (K: {:?}, P: {:?})", percentile, k, p);
                anyhow::bail!("Could not derive thresholds from percentile {}", percentile);
            }
        }
    }

    Ok(config)
}
