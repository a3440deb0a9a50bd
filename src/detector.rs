use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::types::BoundingRegion;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use log::{debug, info};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use serde::Deserialize;
use url::Url;

/// Finds candidate plate regions in an image, in the detector's own order.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<BoundingRegion>>;
}

/// Body of a hosted object-detection response.
#[derive(Debug, Deserialize)]
pub struct InferenceResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

/// One box, as center point plus size.
#[derive(Debug, Deserialize)]
pub struct Prediction {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub class: String,
}

/// Converts predictions to corner-pair regions clipped to the image,
/// keeping response order. With `class` set, other labels are dropped.
pub fn regions_from_response(
    response: &InferenceResponse,
    class: Option<&str>,
    width: u32,
    height: u32,
) -> Vec<BoundingRegion> {
    response
        .predictions
        .iter()
        .filter(|p| class.map_or(true, |class| p.class == class))
        .map(|p| BoundingRegion::from_center(p.x, p.y, p.width, p.height).clamp_to(width, height))
        .collect()
}

/// Calls a Roboflow-style hosted model with the image as a multipart upload.
pub struct RoboflowDetector {
    client: Client,
    endpoint: Url,
    class: Option<String>,
}

impl RoboflowDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let mut endpoint = Url::parse(&config.url)
            .map_err(|e| Error::invalid_input(format!("bad detector url {}: {}", config.url, e)))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| Error::invalid_input(format!("bad detector url {}", config.url)))?
            .pop_if_empty()
            .extend(config.model.split('/').filter(|s| !s.is_empty()));
        endpoint
            .query_pairs_mut()
            .append_pair("api_key", &config.api_key)
            .append_pair("confidence", &config.confidence.to_string());
        let client = Client::builder()
            .build()
            .map_err(|e| Error::unavailable("detector", e))?;
        info!("Using detector model {}", config.model);
        Ok(RoboflowDetector {
            client,
            endpoint,
            class: config.class.clone(),
        })
    }
}

impl Detector for RoboflowDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<BoundingRegion>> {
        let mut jpeg: Vec<u8> = vec![];
        DynamicImage::ImageRgb8(image.to_rgb())
            .write_to(&mut jpeg, ImageOutputFormat::Jpeg(90))
            .map_err(|e| Error::invalid_input(format!("unable to encode image: {}", e)))?;
        let part = Part::bytes(jpeg)
            .file_name("image.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| Error::unavailable("detector", e))?;

        let response: InferenceResponse = self
            .client
            .post(self.endpoint.clone())
            .multipart(Form::new().part("file", part))
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| Error::unavailable("detector", e))?;

        for p in &response.predictions {
            debug!(
                "Prediction {:?} at ({}, {}) confidence {:.2}",
                p.class, p.x, p.y, p.confidence
            );
        }
        let (width, height) = image.dimensions();
        let regions = regions_from_response(&response, self.class.as_deref(), width, height);
        debug!(
            "Detector returned {} predictions, kept {}",
            response.predictions.len(),
            regions.len()
        );
        Ok(regions)
    }
}
