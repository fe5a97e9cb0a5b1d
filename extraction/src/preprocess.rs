//! Image clean-up applied to rendered pages before OCR.

use std::path::Path;

use anyhow::{Context, Result};
use image::GrayImage;
use imageproc::{
    contrast::{ThresholdType, threshold},
    morphology::{Mask, grayscale_erode},
};

use crate::config::ExtractConfig;

/// Binarisation and erosion parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cleanup {
    pub threshold: u8,
    pub erosion_kernel: u8,
    pub erosion_iterations: u32,
}

impl From<&ExtractConfig> for Cleanup {
    fn from(config: &ExtractConfig) -> Self {
        Self {
            threshold: config.threshold,
            erosion_kernel: config.erosion_kernel,
            erosion_iterations: config.erosion_iterations,
        }
    }
}

impl Cleanup {
    /// Opens the image at `path` as 8-bit luma and cleans it up.
    pub fn load_and_apply(&self, path: &Path) -> Result<GrayImage> {
        let img = image::open(path)
            .with_context(|| format!("opening page image {:?}", path))?
            .into_luma8();
        Ok(self.apply(&img))
    }

    /// Thresholds `img` to black and white, then erodes it.
    pub fn apply(&self, img: &GrayImage) -> GrayImage {
        let mut cleaned = threshold(img, self.threshold, ThresholdType::Binary);
        if self.erosion_kernel == 0 {
            return cleaned;
        }
        let mask = square_mask(self.erosion_kernel);
        for _ in 0..self.erosion_iterations {
            cleaned = grayscale_erode(&cleaned, &mask);
        }
        cleaned
    }
}

/// Square all-ones structuring element of side `size`, anchored at its centre
/// pixel. For even sizes the anchor sits right of and below the centre point,
/// so a 2x2 kernel covers the pixel and its left, upper and upper-left
/// neighbours.
fn square_mask(size: u8) -> Mask {
    let kernel = GrayImage::from_pixel(size as u32, size as u32, image::Luma([255]));
    let anchor = size / 2;
    Mask::from_image(&kernel, anchor, anchor)
}
