use serde::Serialize;

/// Axis-aligned rectangle in pixel coordinates, as corner pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingRegion {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl BoundingRegion {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        BoundingRegion { x0, y0, x1, y1 }
    }

    /// Converts a center+size box, the convention most hosted detectors use.
    /// Coordinates are truncated toward zero.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        BoundingRegion::new(
            (cx - width / 2.0) as i32,
            (cy - height / 2.0) as i32,
            (cx + width / 2.0) as i32,
            (cy + height / 2.0) as i32,
        )
    }

    /// Clips the region to an image of the given size. A region entirely
    /// outside the image ends up with zero area.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let w = width.min(i32::MAX as u32) as i32;
        let h = height.min(i32::MAX as u32) as i32;
        BoundingRegion {
            x0: self.x0.max(0).min(w),
            y0: self.y0.max(0).min(h),
            x1: self.x1.max(0).min(w),
            y1: self.y1.max(0).min(h),
        }
    }

    pub fn has_positive_area(&self) -> bool {
        self.x0 < self.x1 && self.y0 < self.y1
    }

    pub fn width(&self) -> u32 {
        (self.x1 - self.x0).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y1 - self.y0).max(0) as u32
    }
}

/// Uppercase, `[A-Z0-9]`-only plate identifier. Built by `plate::canonicalize`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CanonicalPlate(pub(crate) String);

impl CanonicalPlate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CanonicalPlate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStatus {
    Recognized,
    CropFailure,
    OcrFailure,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionResult {
    /// 1-based, in detector order.
    pub index: usize,
    pub region: BoundingRegion,
    pub raw_text: String,
    pub canonical: CanonicalPlate,
    pub authorized: bool,
    pub status: RegionStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionLogEntry {
    pub timestamp: f64,
    pub location: String,
    pub plate_number: String,
    pub authorized: bool,
}
