use crate::types::DetectionResult;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use log::{info, warn};
use std::path::PathBuf;
use uuid::Uuid;

const AUTHORIZED: Rgb<u8> = Rgb([0, 200, 0]);
const UNAUTHORIZED: Rgb<u8> = Rgb([220, 0, 0]);
const BORDER: i32 = 3;

/// Draws a box around every region that could be cropped: green when the
/// plate is authorized, red otherwise.
pub fn annotate(image: &DynamicImage, results: &[DetectionResult]) -> RgbImage {
    let mut canvas = image.to_rgb();
    let (width, height) = canvas.dimensions();
    for result in results {
        let color = if result.authorized {
            AUTHORIZED
        } else {
            UNAUTHORIZED
        };
        let region = result.region.clamp_to(width, height);
        for inset in 0..BORDER {
            let (w, h) = (region.width() as i32 - 2 * inset, region.height() as i32 - 2 * inset);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(region.x0 + inset, region.y0 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut canvas, rect, color);
        }
    }
    canvas
}

/// Publishes annotated images into a directory served under `base_url`.
#[derive(Clone, Debug)]
pub struct Renderer {
    dir: PathBuf,
    base_url: String,
}

impl Renderer {
    pub fn new(dir: PathBuf, base_url: String) -> Self {
        Renderer { dir, base_url }
    }

    /// Saves the image and returns its URL. Failures are logged, never fatal.
    pub fn publish(&self, annotated: &RgbImage) -> Option<String> {
        let name = format!("{:x}.jpeg", Uuid::new_v4().to_simple());
        let path = self.dir.join(&name);
        match annotated.save(&path) {
            Ok(_) => {
                info!("Saved annotated image to {:?}", path);
                Some(self.base_url.clone() + &name)
            }
            Err(e) => {
                warn!("Error saving image to {:?}: {:?}", path, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::canonicalize;
    use crate::types::{BoundingRegion, RegionStatus};

    fn result(region: BoundingRegion, authorized: bool, status: RegionStatus) -> DetectionResult {
        DetectionResult {
            index: 1,
            region,
            raw_text: String::new(),
            canonical: canonicalize("AB12"),
            authorized,
            status,
        }
    }

    #[test]
    fn boxes_are_colored_by_verdict() {
        let image = DynamicImage::new_rgb8(100, 60);
        let annotated = annotate(
            &image,
            &[
                result(BoundingRegion::new(10, 10, 40, 30), true, RegionStatus::Recognized),
                result(BoundingRegion::new(50, 10, 90, 30), false, RegionStatus::Recognized),
            ],
        );
        assert_eq!(*annotated.get_pixel(10, 10), AUTHORIZED);
        assert_eq!(*annotated.get_pixel(12, 20), AUTHORIZED);
        assert_eq!(*annotated.get_pixel(25, 20), Rgb([0, 0, 0]));
        assert_eq!(*annotated.get_pixel(89, 29), UNAUTHORIZED);
    }

    #[test]
    fn degenerate_regions_are_skipped() {
        let image = DynamicImage::new_rgb8(20, 20);
        let annotated = annotate(
            &image,
            &[
                result(BoundingRegion::new(5, 5, 5, 15), false, RegionStatus::CropFailure),
                result(BoundingRegion::new(30, 30, 50, 50), false, RegionStatus::CropFailure),
            ],
        );
        assert!(annotated.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn publish_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(dir.path().to_path_buf(), "http://example.test/plates/".to_string());
        let url = renderer.publish(&RgbImage::new(8, 8)).unwrap();
        let name = url.trim_start_matches("http://example.test/plates/");
        assert!(name.ends_with(".jpeg"));
        assert!(dir.path().join(name).exists());
    }

    #[test]
    fn publish_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(dir.path().join("missing"), "http://example.test/".to_string());
        assert_eq!(renderer.publish(&RgbImage::new(8, 8)), None);
    }
}
