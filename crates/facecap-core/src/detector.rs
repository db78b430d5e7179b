use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::cascade::{group_rectangles, CascadeError, HaarCascade, GROUP_EPS};
use crate::quality::to_gray;

/// Bounding box of a detected face, in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pluggable face detection backend.
///
/// The pipeline only asks whether any region was found; the bounds are kept
/// for the optional face-size gate and for logging.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in an 8-bit grayscale image.
    fn detect(&self, gray: &GrayImage) -> Vec<FaceBounds>;
}

/// Multi-scale frontal-face detector backed by a Haar cascade.
#[derive(Debug, Clone)]
pub struct CascadeDetector {
    cascade: HaarCascade,
    scale_factor: f64,
    min_neighbors: u32,
    min_size: (u32, u32),
}

impl CascadeDetector {
    pub const DEFAULT_SCALE_FACTOR: f64 = 1.3;
    pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;

    pub fn new(
        cascade: HaarCascade,
        scale_factor: f64,
        min_neighbors: u32,
    ) -> Result<Self, CascadeError> {
        if !(scale_factor > 1.0) {
            return Err(CascadeError::InvalidScaleFactor(scale_factor));
        }
        Ok(Self {
            cascade,
            scale_factor,
            min_neighbors,
            min_size: (0, 0),
        })
    }

    /// Load the cascade XML at `path` and wrap it with the given parameters.
    pub fn from_file(
        path: &Path,
        scale_factor: f64,
        min_neighbors: u32,
    ) -> Result<Self, CascadeError> {
        Self::new(HaarCascade::load(path)?, scale_factor, min_neighbors)
    }

    /// Ignore candidate windows smaller than `(width, height)`.
    pub fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_size = (width, height);
        self
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn min_neighbors(&self) -> u32 {
        self.min_neighbors
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceBounds> {
        // Scale factor is validated on construction.
        let hits = match self.cascade.scan(gray, self.scale_factor, self.min_size) {
            Ok(hits) => hits,
            Err(e) => {
                tracing::error!(error = %e, "cascade scan failed");
                return Vec::new();
            }
        };
        let faces = group_rectangles(&hits, self.min_neighbors, GROUP_EPS);
        tracing::debug!(raw_hits = hits.len(), faces = faces.len(), "cascade detection");
        faces
    }
}

/// Grayscale the capture and report whether at least one face is present.
pub fn detect_face(img: &RgbImage, detector: &dyn FaceDetector) -> bool {
    !detector.detect(&to_gray(img)).is_empty()
}
