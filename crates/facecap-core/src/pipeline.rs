//! Capture verification: decode, face presence, quality gates, persist.
//!
//! [`run_pipeline`] returns a typed error per stage; [`verify_liveness`]
//! flattens that into the JSON-facing [`VerificationOutcome`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::{decode_base64_image, DecodeError};
use crate::detector::{CascadeDetector, FaceDetector};
use crate::persist::{save_image, PersistError};
use crate::quality::{face_area_ok, laplacian_variance, mean_brightness, to_gray};

pub const SUCCESS_MESSAGE: &str = "Face validated and saved successfully";

/// Tunable inputs of the pipeline.
///
/// `scale_factor` and `min_neighbors` are read when the detector is built
/// (see [`CascadeDetector::new`]); [`run_pipeline`] uses the detector it is
/// given and ignores them.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Mean grayscale intensity must exceed this (0-255).
    pub brightness_threshold: f64,
    /// Laplacian variance must exceed this.
    pub blur_threshold: f64,
    /// Detector pyramid step, applied at detector construction.
    pub scale_factor: f64,
    /// Detector grouping threshold, applied at detector construction.
    pub min_neighbors: u32,
    /// Largest face must cover more than this fraction of the frame.
    /// Zero disables the gate.
    pub min_face_area_ratio: f64,
    /// Where accepted captures are written.
    pub capture_dir: PathBuf,
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            brightness_threshold: 80.0,
            blur_threshold: 120.0,
            scale_factor: CascadeDetector::DEFAULT_SCALE_FACTOR,
            min_neighbors: CascadeDetector::DEFAULT_MIN_NEIGHBORS,
            min_face_area_ratio: 0.0,
            capture_dir: PathBuf::from("captured_faces"),
            jpeg_quality: 95,
        }
    }
}

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("{0}")]
    Decode(#[from] DecodeError),
    #[error("no face detected")]
    NoFace,
    #[error("face covers less than {min_ratio} of the frame")]
    FaceTooSmall { min_ratio: f64 },
    #[error("mean brightness {brightness:.1} is not above {threshold}")]
    TooDark { brightness: f64, threshold: f64 },
    #[error("laplacian variance {variance:.1} is not above {threshold}")]
    TooBlurry { variance: f64, threshold: f64 },
    #[error("{0}")]
    Persist(#[from] PersistError),
}

impl VerifyError {
    /// The message placed in the response `error` field.
    pub fn public_message(&self) -> String {
        match self {
            Self::Decode(e) => format!("Invalid image: {e}"),
            Self::NoFace => "No face detected".to_string(),
            Self::FaceTooSmall { .. } => "Face too small".to_string(),
            Self::TooDark { .. } => "Image too dark".to_string(),
            Self::TooBlurry { .. } => "Image too blurry".to_string(),
            Self::Persist(e) => format!("Processing error: {e}"),
        }
    }
}

/// Response contract returned to the browser widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerificationOutcome {
    pub fn accepted(path: &std::path::Path) -> Self {
        Self {
            success: true,
            path: Some(path.to_string_lossy().into_owned()),
            error: None,
            message: Some(SUCCESS_MESSAGE.to_string()),
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            path: None,
            error: Some(error.into()),
            message: None,
        }
    }
}

impl From<Result<PathBuf, VerifyError>> for VerificationOutcome {
    fn from(result: Result<PathBuf, VerifyError>) -> Self {
        match result {
            Ok(path) => Self::accepted(&path),
            Err(e) => Self::rejected(e.public_message()),
        }
    }
}

/// Run every stage in order and stop at the first failure.
pub fn run_pipeline(
    input: &str,
    detector: &dyn FaceDetector,
    config: &PipelineConfig,
) -> Result<PathBuf, VerifyError> {
    let img = decode_base64_image(input)?;
    let gray = to_gray(&img);

    let faces = detector.detect(&gray);
    if faces.is_empty() {
        return Err(VerifyError::NoFace);
    }
    if !face_area_ok(&faces, img.width(), img.height(), config.min_face_area_ratio) {
        return Err(VerifyError::FaceTooSmall {
            min_ratio: config.min_face_area_ratio,
        });
    }

    let brightness = mean_brightness(&gray);
    if brightness <= config.brightness_threshold {
        return Err(VerifyError::TooDark {
            brightness,
            threshold: config.brightness_threshold,
        });
    }

    let variance = laplacian_variance(&gray);
    if variance <= config.blur_threshold {
        return Err(VerifyError::TooBlurry {
            variance,
            threshold: config.blur_threshold,
        });
    }

    tracing::debug!(faces = faces.len(), brightness, variance, "capture passed checks");
    Ok(save_image(&img, &config.capture_dir, config.jpeg_quality)?)
}

/// Validate a base64 / data-URL capture and persist it when it passes.
pub fn verify_liveness(
    input: &str,
    detector: &dyn FaceDetector,
    config: &PipelineConfig,
) -> VerificationOutcome {
    let result = run_pipeline(input, detector, config);
    match &result {
        Ok(path) => tracing::info!(path = %path.display(), "saved validated face"),
        Err(e @ VerifyError::Decode(_)) => tracing::warn!(error = %e, "image decode failed"),
        Err(e @ VerifyError::Persist(_)) => {
            tracing::error!(error = %e, "error during verification")
        }
        Err(e) => tracing::info!(reason = %e, "capture rejected"),
    }
    result.into()
}
