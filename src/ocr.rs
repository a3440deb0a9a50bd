use crate::config::OcrConfig;
use crate::error::{Error, Result};
use crate::types::BoundingRegion;
use image::{DynamicImage, GenericImageView};
use log::debug;
use std::path::PathBuf;
use std::process::Command;

const PLATE_CHARACTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Reads the text of one cropped plate. Returns the first candidate, if any.
pub trait OcrEngine: Send + Sync {
    fn read(&self, crop: &DynamicImage) -> Result<Option<String>>;
}

/// Cuts `region` out of `image`, clipped to the image bounds. `None` when
/// nothing is left to read.
pub fn crop(image: &DynamicImage, region: &BoundingRegion) -> Option<DynamicImage> {
    let region = region.clamp_to(image.width(), image.height());
    if !region.has_positive_area() {
        return None;
    }
    Some(image.crop_imm(
        region.x0 as u32,
        region.y0 as u32,
        region.width(),
        region.height(),
    ))
}

/// Runs the `tesseract` CLI on each crop, treating it as a single text line.
pub struct TesseractOcr {
    executable: PathBuf,
    language: String,
}

impl TesseractOcr {
    pub fn new(config: &OcrConfig) -> Self {
        TesseractOcr {
            executable: config.tesseract.clone(),
            language: config.language.clone(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn read(&self, crop: &DynamicImage) -> Result<Option<String>> {
        // Removed when dropped.
        let input = tempfile::Builder::new()
            .prefix("plate-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| Error::unavailable("ocr", e))?;
        crop.save(input.path())
            .map_err(|e| Error::unavailable("ocr", e))?;

        let output = Command::new(&self.executable)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("7")
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", PLATE_CHARACTERS))
            .output()
            .map_err(|e| Error::unavailable("ocr", format!("{:?}: {}", self.executable, e)))?;

        if !output.status.success() {
            return Err(Error::unavailable(
                "ocr",
                format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("tesseract output: {:?}", stdout);
        Ok(first_candidate(&stdout))
    }
}

fn first_candidate(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
