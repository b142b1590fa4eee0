use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use tracing::{info, warn};

use crate::composite::{build_composite, CategoryGrid, CompositeConfig};
use crate::counters::CounterSet;
use crate::error::{GridError, Result};
use crate::land_use::LandUseMask;
use crate::model::Raster;
use crate::parser::parse_grid_file;
use crate::persist;
use crate::stats::percentile_threshold;
use crate::writer::{masked_overlay, raster_image, PngWriter};

/// Material code of the potassium grid.
pub const POTASSIUM: &str = "K";
/// Material code of the phosphorus grid.
pub const PHOSPHORUS: &str = "P";

/// Nutrient rasters keyed by material code, plus the land-use mask they are
/// classified against.
#[derive(Debug, Clone)]
pub struct MapSets {
    rasters: HashMap<String, Raster>,
    mask: LandUseMask,
    enhanced_land_use: RgbaImage,
}

impl MapSets {
    /// Parses `<grid_dir>/<code>_grid.txt` for each code and derives the mask
    /// from the land-use image.
    pub fn from_source_files<S: AsRef<str>>(
        grid_dir: &Path,
        materials: &[S],
        land_use_path: &Path,
    ) -> Result<Self> {
        let rasters = materials
            .iter()
            .map(|code| parse_grid_file(grid_dir, code.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::with_land_use_file(rasters, land_use_path)
    }

    /// Loads `<dir>/<code>_map.json` snapshots instead of the text grids.
    pub fn from_json_files<S: AsRef<str>>(
        dir: &Path,
        materials: &[S],
        land_use_path: &Path,
    ) -> Result<Self> {
        let rasters = materials
            .iter()
            .map(|code| persist::load_json(dir, code.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::with_land_use_file(rasters, land_use_path)
    }

    fn with_land_use_file(rasters: Vec<Raster>, land_use_path: &Path) -> Result<Self> {
        info!("Reading land-use image {:?}", land_use_path);
        let land_use = image::open(land_use_path)?.to_rgba8();
        Ok(Self::from_parts(rasters, &land_use))
    }

    /// Builds the collection from already-loaded rasters and a land-use image.
    pub fn from_parts(rasters: Vec<Raster>, land_use: &RgbaImage) -> Self {
        let (mask, enhanced_land_use) = LandUseMask::from_image(land_use);
        let rasters = rasters
            .into_iter()
            .map(|raster| (raster.material_code.clone(), raster))
            .collect();
        Self {
            rasters,
            mask,
            enhanced_land_use,
        }
    }

    pub fn raster(&self, material_code: &str) -> Result<&Raster> {
        self.rasters
            .get(material_code)
            .ok_or_else(|| GridError::UnknownMaterial(material_code.to_string()))
    }

    /// Loaded material codes, sorted.
    pub fn materials(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.rasters.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    pub fn mask(&self) -> &LandUseMask {
        &self.mask
    }

    /// Land-use image with arable land whitened and other land darkened.
    pub fn enhanced_land_use(&self) -> &RgbaImage {
        &self.enhanced_land_use
    }

    /// Percentile threshold of one material, `None` when no bin qualifies.
    pub fn percentile(&self, material_code: &str, percentile: f64) -> Result<Option<f64>> {
        Ok(percentile_threshold(self.raster(material_code)?, percentile))
    }

    /// Four-way K/P sufficiency classification over the potassium raster's extent.
    pub fn master_map(&self, config: &CompositeConfig) -> Result<(CategoryGrid, CounterSet)> {
        let k_raster = self.raster(POTASSIUM)?;
        let p_raster = self.raster(PHOSPHORUS)?;

        for raster in [k_raster, p_raster] {
            match percentile_threshold(raster, 10.0) {
                Some(threshold) => info!(
                    "{} tenpercentile= {}",
                    raster.material_code, threshold
                ),
                None => warn!("{} tenpercentile unavailable", raster.material_code),
            }
        }

        build_composite(
            k_raster,
            p_raster,
            &self.mask,
            k_raster.width,
            k_raster.height,
            config,
        )
    }

    /// One material rendered against `floor`, visible only on arable land.
    pub fn composite(&self, material_code: &str, floor: f64) -> Result<RgbaImage> {
        let raster = self.raster(material_code)?;
        masked_overlay(&raster_image(raster, floor), &self.mask)
    }

    /// Classifies, logs the tally table and writes the composite PNG.
    pub fn save_master_map(&self, output_path: &Path, config: &CompositeConfig) -> Result<CounterSet> {
        let (grid, mut counters) = self.master_map(config)?;
        info!("Category counts:\n{}", counters.render());
        PngWriter::new().write_composite(&grid, &config.palette, output_path)?;
        Ok(counters)
    }

    /// Writes the enhanced land-use image as a PNG.
    pub fn save_enhanced_land_use(&self, output_path: &Path) -> Result<()> {
        PngWriter::new().write(&self.enhanced_land_use, output_path)
    }

    /// Writes a JSON snapshot of every raster into `dir`.
    pub fn save_json(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        self.materials()
            .into_iter()
            .map(|code| persist::save_json(&self.rasters[code], dir))
            .collect()
    }
}
