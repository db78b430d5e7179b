//! `facecap check`: run the capture pipeline on a local file.

use anyhow::{Context, Result};
use facecap_core::decode::to_data_url;
use facecap_core::{verify_liveness, CascadeDetector, PipelineConfig};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CheckArgs {
    pub file: PathBuf,
    pub cascade: Option<PathBuf>,
    pub capture_dir: PathBuf,
    pub brightness: f64,
    pub blur: f64,
}

/// Encode a file as a data URL, guessing the MIME type from its extension.
pub fn file_data_url(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime = image::ImageFormat::from_path(path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");
    Ok(to_data_url(mime, &bytes))
}

/// Prints the outcome JSON and returns whether the capture was accepted.
pub fn run(args: &CheckArgs) -> Result<bool> {
    let cascade = args
        .cascade
        .clone()
        .unwrap_or_else(|| facecap_core::default_model_dir().join(facecap_core::CASCADE_FILE));

    let config = PipelineConfig {
        brightness_threshold: args.brightness,
        blur_threshold: args.blur,
        capture_dir: args.capture_dir.clone(),
        ..PipelineConfig::default()
    };

    let detector = CascadeDetector::from_file(&cascade, config.scale_factor, config.min_neighbors)
        .with_context(|| {
            format!(
                "failed to load cascade {} (run `facecap setup`)",
                cascade.display()
            )
        })?;

    let input = file_data_url(&args.file)?;
    let outcome = verify_liveness(&input, &detector, &config);

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.success)
}
