use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to create capture directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode JPEG: {0}")]
    Encode(#[from] image::ImageError),
}

/// Random 32-hex-digit filename with a `.jpg` extension.
pub fn random_filename() -> String {
    format!("{}.jpg", uuid::Uuid::new_v4().simple())
}

/// Write `img` as JPEG into `dir` under a random name and return the path.
///
/// The directory is created if needed. The returned path is `dir` joined
/// with the filename, so a relative `dir` yields a relative path.
pub fn save_image(img: &RgbImage, dir: &Path, quality: u8) -> Result<PathBuf, PersistError> {
    std::fs::create_dir_all(dir).map_err(|source| PersistError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(random_filename());
    let file = File::create(&path).map_err(|source| PersistError::Create {
        path: path.clone(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).encode_image(img)?;
    writer.flush().map_err(|source| PersistError::Write {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), quality, "image persisted");
    Ok(path)
}
