use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 8402;
pub const DEFAULT_DETECTOR_URL: &str = "https://detect.roboflow.com";
pub const DEFAULT_DETECTOR_MODEL: &str = "numberplate_data_v1/1";

/// Settings read once at startup and handed to `Session::from_config`.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub detector: DetectorConfig,
    pub ocr: OcrConfig,
    /// Persistence is off when unset.
    pub database: Option<PathBuf>,
    pub plates_dir: PathBuf,
    /// Annotated images are only written when this is set.
    pub plates_url: Option<String>,
    pub location: String,
    pub reference_list: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectorConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
    /// Only predictions with this class label are kept, e.g. `license_plate`.
    pub class: Option<String>,
    /// Minimum confidence in percent.
    pub confidence: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OcrConfig {
    pub tesseract: PathBuf,
    pub language: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let confidence: u8 = parsed(&var, "DETECTOR_CONFIDENCE", 40)?;
        if confidence > 100 {
            return Err(Error::invalid_input(format!(
                "DETECTOR_CONFIDENCE is a percentage, got {}",
                confidence
            )));
        }
        Ok(Config {
            port: parsed(&var, "PORT", DEFAULT_PORT)?,
            detector: DetectorConfig {
                url: var("DETECTOR_URL").unwrap_or_else(|| DEFAULT_DETECTOR_URL.to_string()),
                model: var("DETECTOR_MODEL").unwrap_or_else(|| DEFAULT_DETECTOR_MODEL.to_string()),
                api_key: var("ROBOFLOW_API_KEY").ok_or(Error::MissingSetting("ROBOFLOW_API_KEY"))?,
                class: var("DETECTOR_CLASS"),
                confidence,
            },
            ocr: OcrConfig {
                tesseract: var("TESSERACT_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("tesseract")),
                language: var("OCR_LANG").unwrap_or_else(|| "eng".to_string()),
            },
            database: var("PLATES_DB").map(PathBuf::from),
            plates_dir: var("PLATES_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/plates")),
            plates_url: var("PLATES_URL"),
            location: var("PLATES_LOCATION").unwrap_or_else(|| "unknown".to_string()),
            reference_list: var("REFERENCE_LIST").map(PathBuf::from),
        })
    }
}

fn parsed<F, T>(var: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::invalid_input(format!("{} is not a valid number: {}", name, value))),
        None => Ok(default),
    }
}
