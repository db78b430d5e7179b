//! facecap-core: single-frame capture validation.
//!
//! A browser sends one photo as base64 (optionally a `data:` URL). The
//! pipeline decodes it, requires at least one frontal face from a Haar
//! cascade, gates on brightness and Laplacian sharpness, and writes the
//! accepted frame to disk as JPEG.
//!
//! This is a static quality gate, not a motion-based liveness model.

pub mod cascade;
pub mod decode;
pub mod detector;
pub mod persist;
pub mod pipeline;
pub mod quality;

use std::path::PathBuf;

pub use cascade::{CascadeError, HaarCascade};
pub use decode::{decode_base64_image, DecodeError};
pub use detector::{detect_face, CascadeDetector, FaceBounds, FaceDetector};
pub use persist::{save_image, PersistError};
pub use pipeline::{run_pipeline, verify_liveness, PipelineConfig, VerificationOutcome, VerifyError};
pub use quality::{is_bright_enough, is_not_blurry, laplacian_variance, mean_brightness, to_gray};

/// File name of the stock OpenCV frontal-face cascade.
pub const CASCADE_FILE: &str = "haarcascade_frontalface_default.xml";

/// Default model directory: `$XDG_DATA_HOME/facecap/models`, falling back to
/// `~/.local/share/facecap/models`.
pub fn default_model_dir() -> PathBuf {
    let data_home = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        });
    data_home.join("facecap/models")
}
