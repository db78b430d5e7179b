use std::net::SocketAddr;
use std::path::PathBuf;

use facecap_core::PipelineConfig;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Directory holding the cascade XML.
    pub model_dir: PathBuf,
    /// Path to the frontal-face Haar cascade.
    pub cascade_path: PathBuf,
    /// Expected SHA-256 of the cascade file. When unset only presence is checked.
    pub cascade_sha256: Option<String>,
    /// Thresholds, detector parameters and capture directory.
    pub pipeline: PipelineConfig,
    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
    /// Timeout in seconds for a single verification.
    pub verify_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `FACECAP_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unset or unparseable
    /// values fall back to their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let model_dir = get("FACECAP_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(facecap_core::default_model_dir);

        let cascade_path = get("FACECAP_CASCADE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| model_dir.join(facecap_core::CASCADE_FILE));

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            brightness_threshold: parse_finite_or(
                &get,
                "FACECAP_BRIGHTNESS_THRESHOLD",
                defaults.brightness_threshold,
            ),
            blur_threshold: parse_finite_or(
                &get,
                "FACECAP_BLUR_THRESHOLD",
                defaults.blur_threshold,
            ),
            scale_factor: parse_finite_or(&get, "FACECAP_SCALE_FACTOR", defaults.scale_factor),
            min_neighbors: parse_or(&get, "FACECAP_MIN_NEIGHBORS", defaults.min_neighbors),
            min_face_area_ratio: parse_finite_or(
                &get,
                "FACECAP_MIN_FACE_AREA_RATIO",
                defaults.min_face_area_ratio,
            ),
            capture_dir: get("FACECAP_CAPTURE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.capture_dir),
            jpeg_quality: parse_or(&get, "FACECAP_JPEG_QUALITY", defaults.jpeg_quality),
        };

        Self {
            listen_addr: parse_or(
                &get,
                "FACECAP_LISTEN_ADDR",
                SocketAddr::from(([127, 0, 0, 1], 8000)),
            ),
            model_dir,
            cascade_path,
            cascade_sha256: get("FACECAP_CASCADE_SHA256").filter(|v| !v.trim().is_empty()),
            pipeline,
            max_body_bytes: parse_or(&get, "FACECAP_MAX_BODY_BYTES", 10 * 1024 * 1024),
            verify_timeout_secs: parse_or(&get, "FACECAP_VERIFY_TIMEOUT_SECS", 10),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match get(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparseable setting");
                default
            }
        },
        None => default,
    }
}

/// Like [`parse_or`], but NaN and infinities also fall back.
fn parse_finite_or(get: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    let value = parse_or(get, key, default);
    if value.is_finite() {
        value
    } else {
        tracing::warn!(key, value, "ignoring non-finite setting");
        default
    }
}
