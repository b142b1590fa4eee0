use std::fmt;

use crate::error::{GridError, Result};

/// Header parameter names in the order they appear in a grid file.
pub const PARAM_NAMES: [&str; 6] = [
    "ncols",
    "nrows",
    "xllcorner",
    "yllcorner",
    "cellsize",
    "NODATA_value",
];

/// Starting value of the running minimum; stays put when no cell is above no-data.
pub const MIN_SENTINEL: f64 = 1e20;
/// Starting value of the running maximum.
pub const MAX_SENTINEL: f64 = -1e20;

/// One parsed nutrient grid.
///
/// Cells are stored row-major: `cells[row * width + col]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub material_code: String,
    pub width: usize,
    pub height: usize,
    pub x_origin: f64,
    pub y_origin: f64,
    pub cell_size: f64,
    pub no_data_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub cells: Vec<f32>,
    /// Tokens that failed numeric parsing and were left at 0.0.
    pub skipped_tokens: usize,
}

impl Raster {
    /// Builds a raster and checks the structural invariants.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        material_code: impl Into<String>,
        width: usize,
        height: usize,
        x_origin: f64,
        y_origin: f64,
        cell_size: f64,
        no_data_value: f64,
        min_value: f64,
        max_value: f64,
        cells: Vec<f32>,
    ) -> Result<Self> {
        let material_code = material_code.into();

        if width == 0 || height == 0 {
            return Err(GridError::format(
                &material_code,
                format!("grid must be non-empty, got {}x{}", width, height),
            ));
        }
        if cell_size.is_nan() || cell_size <= 0.0 {
            return Err(GridError::format(
                &material_code,
                format!("cellsize must be positive, got {}", cell_size),
            ));
        }
        if width.checked_mul(height) != Some(cells.len()) {
            return Err(GridError::dimension_mismatch(
                format!("cells of {}", material_code),
                format!("{}x{}", width, height),
                cells.len(),
            ));
        }

        Ok(Self {
            material_code,
            width,
            height,
            x_origin,
            y_origin,
            cell_size,
            no_data_value,
            min_value,
            max_value,
            cells,
            skipped_tokens: 0,
        })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.cells[row * self.width + col]
    }

    #[inline]
    pub fn is_no_data(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == self.no_data_value as f32
    }

    /// Number of "land" cells, i.e. cells strictly greater than no-data.
    pub fn land_count(&self) -> usize {
        self.cells
            .iter()
            .filter(|&&v| v as f64 > self.no_data_value)
            .count()
    }

    /// Header value by its grid-file parameter name.
    pub fn param(&self, name: &str) -> Option<f64> {
        match name {
            "ncols" => Some(self.width as f64),
            "nrows" => Some(self.height as f64),
            "xllcorner" => Some(self.x_origin),
            "yllcorner" => Some(self.y_origin),
            "cellsize" => Some(self.cell_size),
            "NODATA_value" => Some(self.no_data_value),
            _ => None,
        }
    }
}

impl fmt::Display for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = PARAM_NAMES
            .iter()
            .filter_map(|name| self.param(name).map(|v| format!("{}\t:\t{}", name, v)))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}
