use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use crate::error::{GridError, Result};

/// Reference colour of arable land in the land-use image.
pub const ARABLE_REFERENCE: [u8; 4] = [129, 207, 56, 255];
/// Pixels closer than this (L1 over RGBA) to the reference are arable.
pub const ARABLE_DISTANCE: i32 = 20;

/// Mask value written for arable pixels.
pub const MASK_ARABLE: u8 = 255;
/// Mask value written for sea and non-arable pixels.
pub const MASK_OTHER: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandClass {
    Sea,
    NonArable,
    Arable,
}

/// Transparent pixels are sea; everything near the arable reference colour is arable.
pub fn classify_pixel(pixel: [u8; 4]) -> LandClass {
    if pixel[3] == 0 {
        return LandClass::Sea;
    }

    let distance: i32 = pixel
        .iter()
        .zip(ARABLE_REFERENCE.iter())
        .map(|(&p, &r)| (p as i32 - r as i32).abs())
        .sum();

    if distance < ARABLE_DISTANCE {
        LandClass::Arable
    } else {
        LandClass::NonArable
    }
}

/// Display colour for a classified pixel: sea untouched, arable white,
/// other land darkened to a quarter and made opaque.
pub fn enhance_pixel(pixel: [u8; 4], class: LandClass) -> [u8; 4] {
    match class {
        LandClass::Sea => pixel,
        LandClass::Arable => [255, 255, 255, 255],
        LandClass::NonArable => [pixel[0] / 4, pixel[1] / 4, pixel[2] / 4, 255],
    }
}

/// Per-pixel arability, row-major, 0-255.
#[derive(Debug, Clone, PartialEq)]
pub struct LandUseMask {
    pub width: usize,
    pub height: usize,
    pub values: Vec<u8>,
}

impl LandUseMask {
    pub fn new(width: usize, height: usize, values: Vec<u8>) -> Result<Self> {
        if values.len() != width * height {
            return Err(GridError::dimension_mismatch(
                "land-use mask",
                width * height,
                values.len(),
            ));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.values[row * self.width + col]
    }

    /// Mask over the whole land-use image.
    pub fn from_image(image: &RgbaImage) -> (Self, RgbaImage) {
        let (width, height) = image.dimensions();
        build_mask(image, width as usize, height as usize)
    }
}

/// Classifies every pixel of a `width`x`height` area of `image`.
///
/// Returns the mask and an enhanced copy of the image. Positions outside the
/// source image are logged and skipped; their mask value stays 0.
pub fn build_mask(image: &RgbaImage, width: usize, height: usize) -> (LandUseMask, RgbaImage) {
    let mut values = vec![0u8; width * height];
    let mut enhanced = image.clone();
    let mut skipped = 0usize;

    for y in 0..height {
        for x in 0..width {
            let Some(&Rgba(pixel)) = image.get_pixel_checked(x as u32, y as u32) else {
                debug!("Skipping pixel {:?}", (x, y));
                skipped += 1;
                continue;
            };

            let class = classify_pixel(pixel);
            enhanced.put_pixel(x as u32, y as u32, Rgba(enhance_pixel(pixel, class)));
            values[y * width + x] = if class == LandClass::Arable {
                MASK_ARABLE
            } else {
                MASK_OTHER
            };
        }
    }

    info!(
        "Built {}x{} land-use mask ({} pixels outside the source image)",
        width, height, skipped
    );

    let mask = LandUseMask {
        width,
        height,
        values,
    };
    (mask, enhanced)
}
