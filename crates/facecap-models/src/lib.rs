use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Model file descriptor: download URL and expected file name.
///
/// URLs point at a release tag so the file behind them does not move.
/// OpenCV publishes no checksums for its data files; `facecap setup` prints
/// the digest of what it fetched so deployments can pin it through
/// `FACECAP_CASCADE_SHA256`.
pub struct ModelFile {
    pub name: &'static str,
    pub url: &'static str,
    pub size_display: &'static str,
}

pub const FRONTAL_FACE: ModelFile = ModelFile {
    name: "haarcascade_frontalface_default.xml",
    url: concat!(
        "https://raw.githubusercontent.com/opencv/opencv/4.10.0/",
        "data/haarcascades/haarcascade_frontalface_default.xml"
    ),
    size_display: "~0.9 MB",
};

pub const MODELS: &[ModelFile] = &[FRONTAL_FACE];

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("model file not found: {name} ({path})")]
    MissingModel { name: String, path: PathBuf },

    #[error("failed to open model file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read model file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "model checksum mismatch for {name} ({path})\n  expected: {expected}\n  got:      {got}"
    )]
    ChecksumMismatch {
        name: String,
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file_hex(path: &Path) -> Result<String, ModelIntegrityError> {
    let mut file = fs::File::open(path).map_err(|source| ModelIntegrityError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|source| ModelIntegrityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Check that `path` exists and, when `expected_sha256` is given, that its
/// digest matches (case-insensitive hex).
pub fn verify_file_sha256(
    name: &str,
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<(), ModelIntegrityError> {
    if !path.exists() {
        return Err(ModelIntegrityError::MissingModel {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    let Some(expected) = expected_sha256 else {
        return Ok(());
    };

    let digest = sha256_file_hex(path)?;
    if !digest.eq_ignore_ascii_case(expected.trim()) {
        return Err(ModelIntegrityError::ChecksumMismatch {
            name: name.to_string(),
            path: path.to_path_buf(),
            expected: expected.trim().to_string(),
            got: digest,
        });
    }

    Ok(())
}

/// Verify every manifest file is present in `model_dir`.
pub fn verify_models_dir(model_dir: &Path) -> Result<(), ModelIntegrityError> {
    for model in MODELS {
        let path = model_dir.join(model.name);
        verify_file_sha256(model.name, &path, None)?;
    }

    Ok(())
}
