use image::{Rgba, RgbaImage};
use tracing::info;

use crate::counters::CounterSet;
use crate::error::{GridError, Result};
use crate::land_use::LandUseMask;
use crate::model::Raster;

/// Joint potassium/phosphorus class of one pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// K is no-data: open water, drawn transparent.
    Sea,
    /// Land the mask marks as not arable.
    NonArable,
    OkBoth,
    LowKOnly,
    LowPOnly,
    LowBoth,
}

impl Category {
    /// The four counted categories, in legend order.
    pub const COUNTED: [Category; 4] = [
        Category::OkBoth,
        Category::LowKOnly,
        Category::LowPOnly,
        Category::LowBoth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Sea => "SEA",
            Category::NonArable => "NON ARABLE",
            Category::OkBoth => "OK BOTH",
            Category::LowKOnly => "LOW K ONLY",
            Category::LowPOnly => "LOW P ONLY",
            Category::LowBoth => "LOW BOTH",
        }
    }

    pub fn is_counted(self) -> bool {
        !matches!(self, Category::Sea | Category::NonArable)
    }

    /// Classifies an arable pixel. Both comparisons are strict, so a value equal
    /// to its threshold counts as deficient.
    pub fn from_levels(k: f32, p: f32, k_threshold: f32, p_threshold: f32) -> Self {
        let k_ok = k > k_threshold;
        let p_ok = p > p_threshold;
        match (k_ok, p_ok) {
            (true, true) => Category::OkBoth,
            (false, false) => Category::LowBoth,
            (false, true) => Category::LowKOnly,
            (true, false) => Category::LowPOnly,
        }
    }
}

/// Display colour per category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryPalette {
    pub ok_both: [u8; 4],
    pub low_k_only: [u8; 4],
    pub low_p_only: [u8; 4],
    pub low_both: [u8; 4],
    pub sea: [u8; 4],
    pub non_arable: [u8; 4],
}

impl Default for CategoryPalette {
    fn default() -> Self {
        Self {
            ok_both: [50, 255, 50, 255],
            low_k_only: [130, 80, 0, 255],
            low_p_only: [0, 120, 100, 255],
            low_both: [255, 0, 0, 255],
            sea: [0, 0, 0, 0],
            non_arable: [0, 7, 0, 255],
        }
    }
}

impl CategoryPalette {
    pub fn color(&self, category: Category) -> [u8; 4] {
        match category {
            Category::Sea => self.sea,
            Category::NonArable => self.non_arable,
            Category::OkBoth => self.ok_both,
            Category::LowKOnly => self.low_k_only,
            Category::LowPOnly => self.low_p_only,
            Category::LowBoth => self.low_both,
        }
    }
}

/// Thresholds and colours for a composite run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeConfig {
    /// Potassium at or below this is deficient.
    pub k_threshold: f32,
    /// Phosphorus at or below this is deficient.
    pub p_threshold: f32,
    /// Mask values below this are non-arable.
    pub arability_cut: u8,
    pub palette: CategoryPalette,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            k_threshold: 0.6,
            p_threshold: 0.06,
            arability_cut: 50,
            palette: CategoryPalette::default(),
        }
    }
}

/// Row-major per-pixel classification.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGrid {
    pub width: usize,
    pub height: usize,
    pub categories: Vec<Category>,
}

impl CategoryGrid {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Category {
        self.categories[row * self.width + col]
    }

    pub fn to_image(&self, palette: &CategoryPalette) -> RgbaImage {
        RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Rgba(palette.color(self.get(y as usize, x as usize)))
        })
    }
}

/// Fresh counter set over the four counted category labels.
pub fn category_counters() -> CounterSet {
    CounterSet::new(Category::COUNTED.iter().map(|c| c.label()))
}

/// Classifies every pixel of the `width`x`height` area from the top-left
/// corner and tallies the arable categories.
pub fn build_composite(
    k_raster: &Raster,
    p_raster: &Raster,
    mask: &LandUseMask,
    width: usize,
    height: usize,
    config: &CompositeConfig,
) -> Result<(CategoryGrid, CounterSet)> {
    check_extent(&k_raster.material_code, k_raster.width, k_raster.height, width, height)?;
    check_extent(&p_raster.material_code, p_raster.width, p_raster.height, width, height)?;
    check_extent("land-use mask", mask.width, mask.height, width, height)?;

    let mut counters = category_counters();
    let mut categories = Vec::with_capacity(width * height);

    for row in 0..height {
        for col in 0..width {
            let category = if k_raster.is_no_data(row, col) {
                Category::Sea
            } else if mask.get(row, col) < config.arability_cut {
                Category::NonArable
            } else {
                Category::from_levels(
                    k_raster.get(row, col),
                    p_raster.get(row, col),
                    config.k_threshold,
                    config.p_threshold,
                )
            };

            if category.is_counted() {
                counters.increment(category.label())?;
            }
            categories.push(category);
        }
    }

    info!(
        "Classified {}x{} composite: {} arable pixels",
        width,
        height,
        counters.total()
    );

    let grid = CategoryGrid {
        width,
        height,
        categories,
    };
    Ok((grid, counters))
}

fn check_extent(what: &str, have_width: usize, have_height: usize, width: usize, height: usize) -> Result<()> {
    if have_width < width || have_height < height {
        return Err(GridError::dimension_mismatch(
            what,
            format!("at least {}x{}", width, height),
            format!("{}x{}", have_width, have_height),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster(code: &str, width: usize, height: usize, cells: Vec<f32>) -> Raster {
        Raster::new(code, width, height, 0.0, 0.0, 1.0, -9999.0, 0.0, 1.0, cells).unwrap()
    }

    fn classify(k: f32, p: f32) -> (Category, CounterSet) {
        let k_raster = raster("K", 1, 1, vec![k]);
        let p_raster = raster("P", 1, 1, vec![p]);
        let mask = LandUseMask::new(1, 1, vec![255]).unwrap();
        let (grid, counters) =
            build_composite(&k_raster, &p_raster, &mask, 1, 1, &CompositeConfig::default())
                .unwrap();
        (grid.get(0, 0), counters)
    }

    #[test]
    fn test_sea_and_non_arable_are_not_counted() {
        let k_raster = raster("K", 2, 1, vec![-9999.0, 0.9]);
        let p_raster = raster("P", 2, 1, vec![0.5, 0.5]);
        let mask = LandUseMask::new(2, 1, vec![255, 30]).unwrap();

        let (grid, counters) =
            build_composite(&k_raster, &p_raster, &mask, 2, 1, &CompositeConfig::default())
                .unwrap();

        assert_eq!(grid.get(0, 0), Category::Sea);
        assert_eq!(grid.get(0, 1), Category::NonArable);
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_four_categories() {
        assert_eq!(classify(0.7, 0.10).0, Category::OkBoth);
        assert_eq!(classify(0.7, 0.04).0, Category::LowPOnly);
        assert_eq!(classify(0.5, 0.04).0, Category::LowBoth);
        assert_eq!(classify(0.5, 0.10).0, Category::LowKOnly);
    }

    #[test]
    fn test_threshold_equality_is_deficient() {
        assert_eq!(classify(0.6, 0.10).0, Category::LowKOnly);
        assert_eq!(classify(0.7, 0.06).0, Category::LowPOnly);
    }

    #[test]
    fn test_counts_match_categories() {
        let (_, counters) = classify(0.7, 0.10);
        assert_eq!(counters.count("OK BOTH"), Some(1));
        assert_eq!(counters.count("LOW BOTH"), Some(0));
        assert_eq!(counters.total(), 1);
    }

    #[test]
    fn test_mask_cut_is_configurable() {
        let k_raster = raster("K", 1, 1, vec![0.7]);
        let p_raster = raster("P", 1, 1, vec![0.1]);
        let mask = LandUseMask::new(1, 1, vec![50]).unwrap();

        let config = CompositeConfig::default();
        let (grid, _) = build_composite(&k_raster, &p_raster, &mask, 1, 1, &config).unwrap();
        assert_eq!(grid.get(0, 0), Category::OkBoth);

        let config = CompositeConfig {
            arability_cut: 51,
            ..CompositeConfig::default()
        };
        let (grid, _) = build_composite(&k_raster, &p_raster, &mask, 1, 1, &config).unwrap();
        assert_eq!(grid.get(0, 0), Category::NonArable);
    }

    #[test]
    fn test_extent_larger_than_mask_is_rejected() {
        let k_raster = raster("K", 2, 2, vec![0.7; 4]);
        let p_raster = raster("P", 2, 2, vec![0.1; 4]);
        let mask = LandUseMask::new(1, 2, vec![255; 2]).unwrap();

        let result = build_composite(&k_raster, &p_raster, &mask, 2, 2, &CompositeConfig::default());
        assert!(matches!(result, Err(GridError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_to_image_uses_palette() {
        let grid = CategoryGrid {
            width: 2,
            height: 1,
            categories: vec![Category::Sea, Category::LowBoth],
        };
        let image = grid.to_image(&CategoryPalette::default());
        assert_eq!(image.get_pixel(0, 0), &Rgba([0, 0, 0, 0]));
        assert_eq!(image.get_pixel(1, 0), &Rgba([255, 0, 0, 255]));
    }
}
