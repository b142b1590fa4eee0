use thiserror::Error;

/// Errors raised while loading, classifying or saving nutrient grids.
#[derive(Debug, Error)]
pub enum GridError {
    /// A required header parameter was never seen in the header block.
    #[error("Could not find parameter: {param} in the file for {material}")]
    MissingParameter { param: String, material: String },

    /// Structural problem in the grid text (header value, row shape, premature end).
    #[error("Malformed grid for {material}: {reason}")]
    Format { material: String, reason: String },

    /// Counter increment for a category that was not registered up front.
    #[error("Unknown counter category: {0}")]
    UnknownCategory(String),

    /// No raster loaded for the requested material code.
    #[error("No raster loaded for material: {0}")]
    UnknownMaterial(String),

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: String,
        expected: String,
        found: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl GridError {
    pub fn format(material: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            material: material.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_parameter(param: impl Into<String>, material: impl Into<String>) -> Self {
        Self::MissingParameter {
            param: param.into(),
            material: material.into(),
        }
    }

    pub fn dimension_mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Self::DimensionMismatch {
            what: what.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GridError>;
