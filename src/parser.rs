use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{GridError, Result};
use crate::model::{Raster, MAX_SENTINEL, MIN_SENTINEL, PARAM_NAMES};

/// Upper bound on cells reserved up front; larger grids grow row by row.
const MAX_PREALLOCATED_CELLS: usize = 1 << 22;

/// Path of the source grid for a material code: `<dir>/<code>_grid.txt`.
pub fn grid_path(dir: &Path, material_code: &str) -> PathBuf {
    dir.join(format!("{}_grid.txt", material_code))
}

/// Opens `<dir>/<code>_grid.txt` and parses it.
pub fn parse_grid_file(dir: &Path, material_code: &str) -> Result<Raster> {
    let path = grid_path(dir, material_code);
    info!("Loading grid for {} from {:?}", material_code, path);
    let file = File::open(&path)?;
    parse_grid(BufReader::new(file), material_code)
}

/// Parses an ASCII grid: six `<name> <value>` header lines followed by
/// `nrows` lines of `ncols` whitespace-separated values.
///
/// Header or row-shape problems abort the load. A single token that is not a
/// number is tolerated: the cell stays at 0.0 and is counted in
/// [`Raster::skipped_tokens`], so a damaged grid can still load silently
/// short of data.
pub fn parse_grid<R: BufRead>(mut reader: R, material_code: &str) -> Result<Raster> {
    let header = read_header(&mut reader, material_code)?;

    let width = dimension(&header, "ncols", material_code)?;
    let height = dimension(&header, "nrows", material_code)?;
    let no_data_value = header["NODATA_value"];

    info!("Creating array ({},{}) for {}", width, height, material_code);

    let cell_count = width.checked_mul(height).ok_or_else(|| {
        GridError::format(
            material_code,
            format!("{} x {} cells does not fit in memory", width, height),
        )
    })?;

    // Rows are appended as they are read, so a truncated file fails before
    // the declared size is ever allocated.
    let mut cells: Vec<f32> = Vec::with_capacity(cell_count.min(MAX_PREALLOCATED_CELLS));
    let mut min_value = MIN_SENTINEL;
    let mut max_value = MAX_SENTINEL;
    let mut skipped_tokens = 0usize;
    let mut line = String::new();

    for row in 0..height {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(GridError::format(
                material_code,
                format!("expected {} data rows, found {}", height, row),
            ));
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != width {
            return Err(GridError::format(
                material_code,
                format!(
                    "row {} has {} values, expected {}",
                    row,
                    tokens.len(),
                    width
                ),
            ));
        }

        for token in tokens {
            match token.parse::<f64>() {
                Ok(parsed) => {
                    // Bounds are taken from the stored f32, so every stored
                    // land cell lies inside [min_value, max_value].
                    let value = parsed as f32;
                    let stored = value as f64;
                    // No-data is a lower bound here, not an equality test.
                    if stored > no_data_value {
                        min_value = min_value.min(stored);
                        max_value = max_value.max(stored);
                    }
                    cells.push(value);
                }
                Err(_) => {
                    debug!("Skipping: '{}' at row {}", token, row);
                    skipped_tokens += 1;
                    cells.push(0.0);
                }
            }
        }
    }

    if skipped_tokens > 0 {
        warn!(
            "{}: {} malformed values were skipped and left at 0",
            material_code, skipped_tokens
        );
    }

    let mut raster = Raster::new(
        material_code,
        width,
        height,
        header["xllcorner"],
        header["yllcorner"],
        header["cellsize"],
        no_data_value,
        min_value,
        max_value,
        cells,
    )?;
    raster.skipped_tokens = skipped_tokens;

    debug!(
        "{}: min {} max {} over {} land cells",
        material_code,
        raster.min_value,
        raster.max_value,
        raster.land_count()
    );

    Ok(raster)
}

fn read_header<R: BufRead>(reader: &mut R, material_code: &str) -> Result<HashMap<&'static str, f64>> {
    let mut params = HashMap::new();
    let mut line = String::new();

    for index in 0..PARAM_NAMES.len() {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(GridError::format(
                material_code,
                format!(
                    "header ended after {} lines, expected {}",
                    index,
                    PARAM_NAMES.len()
                ),
            ));
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let (Some(name), Some(raw_value)) = (tokens.first(), tokens.last()) else {
            return Err(GridError::format(
                material_code,
                format!("empty header line {}", index + 1),
            ));
        };

        let value: f64 = raw_value.parse().map_err(|_| {
            GridError::format(
                material_code,
                format!("header value '{}' for {} is not a number", raw_value, name),
            )
        })?;

        match PARAM_NAMES.iter().find(|&&known| known == *name) {
            Some(&known) => {
                params.insert(known, value);
            }
            None => error!("Unexpected parameter in the file: {}", name),
        }
    }

    if let Some(missing) = PARAM_NAMES.iter().find(|name| !params.contains_key(*name)) {
        return Err(GridError::missing_parameter(*missing, material_code));
    }

    Ok(params)
}

fn dimension(header: &HashMap<&'static str, f64>, name: &str, material_code: &str) -> Result<usize> {
    let value = header[name];
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(GridError::format(
            material_code,
            format!("{} must be a positive whole number, got {}", name, value),
        ));
    }
    Ok(value as usize)
}
