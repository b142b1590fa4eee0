//! JSON snapshot of a parsed raster, so the slow text grids only need parsing once.
//!
//! Cells are stored column-major (`dataset[col][row]`) and rounded to three
//! decimals. JSON has no NaN or infinity, so non-finite values are written as
//! the strings `"NaN"`, `"Infinity"` and `"-Infinity"`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::error::{GridError, Result};
use crate::model::Raster;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterRecord {
    pub mineral: String,
    pub ncols: f64,
    pub nrows: f64,
    #[serde(with = "json_float")]
    pub xllcorner: f64,
    #[serde(with = "json_float")]
    pub yllcorner: f64,
    #[serde(with = "json_float")]
    pub cellsize: f64,
    #[serde(rename = "NODATA_value", with = "json_float")]
    pub nodata_value: f64,
    #[serde(with = "json_float")]
    pub max_value: f64,
    #[serde(with = "json_float")]
    pub min_value: f64,
    #[serde(with = "json_grid")]
    pub dataset: Vec<Vec<f32>>,
}

/// A JSON number, or one of the non-finite spellings.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonFloat {
    Number(f64),
    Text(String),
}

impl JsonFloat {
    fn into_f64(self) -> std::result::Result<f64, String> {
        match self {
            JsonFloat::Number(value) => Ok(value),
            JsonFloat::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                other => Err(format!("expected a number, got \"{}\"", other)),
            },
        }
    }
}

fn non_finite_name(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

mod json_float {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(non_finite_name(*value))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
        JsonFloat::deserialize(deserializer)?
            .into_f64()
            .map_err(D::Error::custom)
    }
}

/// One cell, kept as `f32` so finite values print in their short form.
struct Cell(f32);

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f32(self.0)
        } else {
            serializer.serialize_str(non_finite_name(self.0 as f64))
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = JsonFloat::deserialize(deserializer)?
            .into_f64()
            .map_err(D::Error::custom)?;
        Ok(Cell(value as f32))
    }
}

mod json_grid {
    use super::*;

    pub fn serialize<S: Serializer>(
        grid: &[Vec<f32>],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(
            grid.iter()
                .map(|column| column.iter().map(|&v| Cell(v)).collect::<Vec<_>>()),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<Vec<f32>>, D::Error> {
        let grid = Vec::<Vec<Cell>>::deserialize(deserializer)?;
        Ok(grid
            .into_iter()
            .map(|column| column.into_iter().map(|Cell(v)| v).collect())
            .collect())
    }
}

fn round3(value: f32) -> f32 {
    ((value as f64 * 1000.0).round() / 1000.0) as f32
}

impl From<&Raster> for RasterRecord {
    fn from(raster: &Raster) -> Self {
        let dataset = (0..raster.width)
            .map(|col| {
                (0..raster.height)
                    .map(|row| round3(raster.get(row, col)))
                    .collect()
            })
            .collect();

        Self {
            mineral: raster.material_code.clone(),
            ncols: raster.width as f64,
            nrows: raster.height as f64,
            xllcorner: raster.x_origin,
            yllcorner: raster.y_origin,
            cellsize: raster.cell_size,
            nodata_value: raster.no_data_value,
            max_value: raster.max_value,
            min_value: raster.min_value,
            dataset,
        }
    }
}

impl RasterRecord {
    pub fn into_raster(self) -> Result<Raster> {
        let width = whole(self.ncols, "ncols", &self.mineral)?;
        let height = whole(self.nrows, "nrows", &self.mineral)?;

        if self.dataset.len() != width {
            return Err(GridError::dimension_mismatch(
                format!("dataset columns of {}", self.mineral),
                width,
                self.dataset.len(),
            ));
        }

        if let Some((col, column)) = self
            .dataset
            .iter()
            .enumerate()
            .find(|(_, column)| column.len() != height)
        {
            return Err(GridError::dimension_mismatch(
                format!("dataset column {} of {}", col, self.mineral),
                height,
                column.len(),
            ));
        }

        // Both dimensions now match the dataset, so the product is its length.
        let mut cells = vec![0.0f32; width * height];
        for (col, column) in self.dataset.iter().enumerate() {
            for (row, &value) in column.iter().enumerate() {
                cells[row * width + col] = value;
            }
        }

        Raster::new(
            self.mineral,
            width,
            height,
            self.xllcorner,
            self.yllcorner,
            self.cellsize,
            self.nodata_value,
            self.min_value,
            self.max_value,
            cells,
        )
    }
}

fn whole(value: f64, name: &str, material: &str) -> Result<usize> {
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
        return Err(GridError::format(
            material,
            format!("{} must be a positive whole number, got {}", name, value),
        ));
    }
    Ok(value as usize)
}

/// `<dir>/<code>_map.json`
pub fn json_path(dir: &Path, material_code: &str) -> PathBuf {
    dir.join(format!("{}_map.json", material_code))
}

pub fn to_json(raster: &Raster) -> Result<String> {
    Ok(serde_json::to_string_pretty(&RasterRecord::from(raster))?)
}

pub fn from_json(text: &str) -> Result<Raster> {
    let record: RasterRecord = serde_json::from_str(text)?;
    record.into_raster()
}

pub fn save_json(raster: &Raster, dir: &Path) -> Result<PathBuf> {
    let path = json_path(dir, &raster.material_code);
    fs::write(&path, to_json(raster)?)?;
    info!("Saved {} to {:?}", raster.material_code, path);
    Ok(path)
}

/// Loads `<dir>/<code>_map.json`; the raster takes `material_code` as its code.
pub fn load_json(dir: &Path, material_code: &str) -> Result<Raster> {
    let path = json_path(dir, material_code);
    info!("Loading {} from {:?}", material_code, path);
    let mut raster = from_json(&fs::read_to_string(&path)?)?;
    raster.material_code = material_code.to_string();
    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MAX_SENTINEL, MIN_SENTINEL};
    use crate::parser::parse_grid;
    use tempfile::TempDir;

    fn sample() -> Raster {
        Raster::new(
            "K",
            3,
            2,
            123456.5,
            654321.25,
            50.0,
            -9999.0,
            0.123,
            0.98765,
            vec![-9999.0, 0.123_456, 0.5, 0.25, 0.987_65, 0.000_4],
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_keeps_header_and_rounds_cells() {
        let original = sample();
        let restored = from_json(&to_json(&original).unwrap()).unwrap();

        assert_eq!(restored.material_code, original.material_code);
        assert_eq!(restored.width, original.width);
        assert_eq!(restored.height, original.height);
        assert_eq!(restored.x_origin, original.x_origin);
        assert_eq!(restored.y_origin, original.y_origin);
        assert_eq!(restored.cell_size, original.cell_size);
        assert_eq!(restored.no_data_value, original.no_data_value);
        assert_eq!(restored.min_value, original.min_value);
        assert_eq!(restored.max_value, original.max_value);

        for (a, b) in original.cells.iter().zip(&restored.cells) {
            assert!((a - b).abs() < 0.0005, "{} vs {}", a, b);
        }
        assert_eq!(restored.get(0, 1), 0.123);
    }

    #[test]
    fn test_record_keys_and_column_major_dataset() {
        let value: serde_json::Value = serde_json::from_str(&to_json(&sample()).unwrap()).unwrap();

        assert_eq!(value["mineral"], "K");
        assert_eq!(value["NODATA_value"], -9999.0);
        assert_eq!(value["ncols"], 3.0);
        let dataset = value["dataset"].as_array().unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset[0].as_array().unwrap().len(), 2);
        assert_eq!(dataset[1][1].as_f64().unwrap() as f32, 0.988);
    }

    #[test]
    fn test_integer_dimensions_are_accepted() {
        let text = r#"{"mineral":"P","ncols":2,"nrows":1,"xllcorner":0,"yllcorner":0,
            "cellsize":1,"NODATA_value":-9999,"max_value":0.2,"min_value":0.1,
            "dataset":[[0.1],[0.2]]}"#;
        let raster = from_json(text).unwrap();
        assert_eq!(raster.cells, vec![0.1, 0.2]);
    }

    #[test]
    fn test_ragged_dataset_is_rejected() {
        let text = r#"{"mineral":"P","ncols":2,"nrows":2,"xllcorner":0,"yllcorner":0,
            "cellsize":1,"NODATA_value":-9999,"max_value":0.2,"min_value":0.1,
            "dataset":[[0.1,0.2],[0.2]]}"#;
        assert!(matches!(from_json(text), Err(GridError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_oversized_nrows_is_rejected_before_allocating() {
        let text = r#"{"mineral":"P","ncols":1,"nrows":1e15,"xllcorner":0,"yllcorner":0,
            "cellsize":1,"NODATA_value":-9999,"max_value":0.2,"min_value":0.1,
            "dataset":[[0.1]]}"#;
        assert!(matches!(from_json(text), Err(GridError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_sentinel_range_survives() {
        let mut raster = sample();
        raster.min_value = MIN_SENTINEL;
        raster.max_value = MAX_SENTINEL;
        let restored = from_json(&to_json(&raster).unwrap()).unwrap();
        assert_eq!(restored.min_value, MIN_SENTINEL);
        assert_eq!(restored.max_value, MAX_SENTINEL);
    }

    #[test]
    fn test_non_finite_values_round_trip() {
        let mut raster = sample();
        raster.cells[1] = f32::NAN;
        raster.cells[2] = f32::INFINITY;
        raster.cells[3] = f32::NEG_INFINITY;
        raster.max_value = f64::INFINITY;

        let text = to_json(&raster).unwrap();
        assert!(text.contains("\"NaN\""));
        let restored = from_json(&text).unwrap();

        assert!(restored.cells[1].is_nan());
        assert_eq!(restored.cells[2], f32::INFINITY);
        assert_eq!(restored.cells[3], f32::NEG_INFINITY);
        assert_eq!(restored.max_value, f64::INFINITY);
        assert_eq!(restored.min_value, raster.min_value);
    }

    #[test]
    fn test_parsed_nan_token_survives_snapshot() {
        let text = "ncols 3\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\nNODATA_value -9999\n0.1 nan 0.3\n";
        let raster = parse_grid(std::io::Cursor::new(text), "P").unwrap();
        assert!(raster.cells[1].is_nan());

        let restored = from_json(&to_json(&raster).unwrap()).unwrap();
        assert!(restored.cells[1].is_nan());
        assert_eq!(restored.cells[2], 0.3);
    }

    #[test]
    fn test_unknown_text_value_is_rejected() {
        let text = r#"{"mineral":"P","ncols":1,"nrows":1,"xllcorner":0,"yllcorner":0,
            "cellsize":1,"NODATA_value":-9999,"max_value":0.2,"min_value":0.1,
            "dataset":[["lots"]]}"#;
        assert!(matches!(from_json(text), Err(GridError::Json(_))));
    }

    #[test]
    fn test_save_and_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = save_json(&sample(), temp_dir.path()).unwrap();
        assert_eq!(path, temp_dir.path().join("K_map.json"));

        let loaded = load_json(temp_dir.path(), "K").unwrap();
        assert_eq!(loaded.width, 3);
        assert_eq!(loaded.material_code, "K");
    }
}
