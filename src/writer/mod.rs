use std::path::Path;

use image::{Rgba, RgbaImage};
use tracing::info;

use crate::composite::{CategoryGrid, CategoryPalette};
use crate::error::{GridError, Result};
use crate::land_use::LandUseMask;
use crate::model::Raster;

/// Background of single-raster images; no-data cells keep it.
const BACKGROUND: [u8; 4] = [0, 0, 0, 1];

/// Brightness of a cell: `700 * (v - min) / (max - min)`, clamped to a byte.
fn intensity(value: f32, min_value: f64, max_value: f64) -> u8 {
    let range = max_value - min_value;
    if range <= 0.0 {
        return 0;
    }
    let scaled = (700.0 * (value as f64 - min_value) / range).floor();
    scaled.clamp(0.0, 255.0) as u8
}

/// Cyan-ramp rendering of one raster. Cells below `floor` get a red tint.
pub fn raster_image(raster: &Raster, floor: f64) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(raster.width as u32, raster.height as u32, Rgba(BACKGROUND));

    for row in 0..raster.height {
        for col in 0..raster.width {
            if raster.is_no_data(row, col) {
                continue;
            }
            let value = raster.get(row, col);
            let prop = intensity(value, raster.min_value, raster.max_value);
            let red = if (value as f64) < floor { 100 } else { 0 };
            image.put_pixel(col as u32, row as u32, Rgba([red, prop, prop, 255]));
        }
    }

    image
}

/// Pastes `image` onto a transparent canvas using the mask as alpha, so only
/// arable land shows through.
pub fn masked_overlay(image: &RgbaImage, mask: &LandUseMask) -> Result<RgbaImage> {
    let (width, height) = image.dimensions();
    if (width as usize, height as usize) != (mask.width, mask.height) {
        return Err(GridError::dimension_mismatch(
            "overlay mask",
            format!("{}x{}", width, height),
            format!("{}x{}", mask.width, mask.height),
        ));
    }

    Ok(RgbaImage::from_fn(width, height, |x, y| {
        let alpha = mask.get(y as usize, x as usize) as u32;
        let Rgba(pixel) = *image.get_pixel(x, y);
        Rgba(pixel.map(|channel| ((channel as u32 * alpha + 127) / 255) as u8))
    }))
}

#[derive(Default)]
pub struct PngWriter {}

impl PngWriter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn write(&self, image: &RgbaImage, output_path: &Path) -> Result<()> {
        let (width, height) = image.dimensions();
        info!("Writing {} x {} PNG to {:?}", width, height, output_path);
        image.save_with_format(output_path, image::ImageFormat::Png)?;
        Ok(())
    }

    pub fn write_composite(
        &self,
        grid: &CategoryGrid,
        palette: &CategoryPalette,
        output_path: &Path,
    ) -> Result<()> {
        self.write(&grid.to_image(palette), output_path)
    }

    pub fn write_raster(&self, raster: &Raster, floor: f64, output_path: &Path) -> Result<()> {
        self.write(&raster_image(raster, floor), output_path)
    }
}
