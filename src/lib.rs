pub mod composite;
pub mod counters;
pub mod error;
pub mod land_use;
pub mod map_sets;
pub mod model;
pub mod parser;
pub mod persist;
pub mod stats;
pub mod writer;

pub use composite::{build_composite, Category, CategoryGrid, CategoryPalette, CompositeConfig};
pub use counters::CounterSet;
pub use error::{GridError, Result};
pub use land_use::{build_mask, classify_pixel, enhance_pixel, LandClass, LandUseMask};
pub use map_sets::MapSets;
pub use model::Raster;
pub use parser::{parse_grid, parse_grid_file};
pub use stats::{percentile_threshold, Histogram};
pub use writer::PngWriter;
