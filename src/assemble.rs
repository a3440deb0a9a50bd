use crate::plate::canonicalize;
use crate::registry::AuthorizationRegistry;
use crate::types::{BoundingRegion, CanonicalPlate, DetectionResult, RegionStatus};
use log::{debug, warn};
use std::fmt::Display;

/// Produces one result per region, in order. A bad crop or a failed OCR call
/// is recorded on that region's result and the loop moves on.
pub fn assemble<F, E>(
    regions: &[BoundingRegion],
    mut ocr_for_region: F,
    registry: &AuthorizationRegistry,
) -> Vec<DetectionResult>
where
    F: FnMut(&BoundingRegion) -> Result<Option<String>, E>,
    E: Display,
{
    let mut results = Vec::with_capacity(regions.len());
    for (offset, region) in regions.iter().enumerate() {
        let index = offset + 1;
        if !region.has_positive_area() {
            warn!("Detection {}: unable to crop plate region {:?}", index, region);
            results.push(failed(index, *region, RegionStatus::CropFailure));
            continue;
        }

        let raw_text = match ocr_for_region(region) {
            Ok(Some(text)) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("Plate #{}: OCR failed to detect text", index);
                results.push(failed(index, *region, RegionStatus::OcrFailure));
                continue;
            }
            Err(e) => {
                warn!("Plate #{}: OCR error: {}", index, e);
                results.push(failed(index, *region, RegionStatus::OcrFailure));
                continue;
            }
        };

        let canonical = canonicalize(&raw_text);
        let authorized = registry.is_authorized(&canonical);
        debug!(
            "Plate #{}: read {:?} as {} (authorized: {})",
            index, raw_text, canonical, authorized
        );
        results.push(DetectionResult {
            index,
            region: *region,
            raw_text,
            canonical,
            authorized,
            status: RegionStatus::Recognized,
        });
    }
    results
}

fn failed(index: usize, region: BoundingRegion, status: RegionStatus) -> DetectionResult {
    DetectionResult {
        index,
        region,
        raw_text: String::new(),
        canonical: CanonicalPlate::default(),
        authorized: false,
        status,
    }
}
