//! `facecap setup`: downloads the Haar cascade used for face detection.

use anyhow::{Context, Result};
use facecap_models::{ModelFile, ModelIntegrityError, MODELS};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Determine the model directory.
///
/// When running as root (UID 0), defaults to `/var/lib/facecap/models` (system-wide).
/// Otherwise defaults to `$XDG_DATA_HOME/facecap/models` (~/.local/share/facecap/models).
fn default_model_dir() -> PathBuf {
    if is_root() {
        PathBuf::from("/var/lib/facecap/models")
    } else {
        facecap_core::default_model_dir()
    }
}

fn is_root() -> bool {
    // SAFETY: geteuid is always safe to call.
    unsafe { libc::geteuid() == 0 }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Download a single model file with progress output.
fn download_model(model: &ModelFile, dest: &Path, expected_sha256: Option<&str>) -> Result<()> {
    let tmp_path = part_path(dest);

    println!("  downloading {} ({})...", model.name, model.size_display);
    tracing::debug!(url = model.url, dest = %dest.display(), "downloading model");

    let resp = ureq::get(model.url)
        .call()
        .with_context(|| format!("failed to download {}", model.url))?;

    let content_length = resp
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = resp.into_body().into_reader();
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut buf = [0u8; 65536];
    let mut total: u64 = 0;
    let mut last_pct: u64 = 0;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        total += n as u64;

        if let Some(len) = content_length.filter(|&len| len > 0) {
            let pct = (total * 100) / len;
            if pct / 10 > last_pct / 10 {
                print!("  {pct}%\r");
                io::stdout().flush().ok();
                last_pct = pct;
            }
        }
    }

    file.flush()?;
    drop(file);

    if expected_sha256.is_some() {
        print!("  verifying checksum... ");
        io::stdout().flush().ok();
    }
    if let Err(e) = facecap_models::verify_file_sha256(model.name, &tmp_path, expected_sha256) {
        fs::remove_file(&tmp_path).ok();
        return Err(e.into());
    }
    if expected_sha256.is_some() {
        println!("ok");
    } else {
        let digest = facecap_models::sha256_file_hex(&tmp_path)?;
        println!("  sha256 {digest}");
        println!("  set FACECAP_CASCADE_SHA256={digest} to pin this file");
    }

    // Atomic rename
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to rename {} -> {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    Ok(())
}

/// Run the setup command: download the cascade unless a usable copy exists.
pub fn run(model_dir: Option<PathBuf>, expected_sha256: Option<&str>) -> Result<()> {
    let dir = model_dir.unwrap_or_else(default_model_dir);

    println!("Model directory: {}", dir.display());

    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    let mut downloaded = 0;
    let mut skipped = 0;

    for model in MODELS {
        let dest = dir.join(model.name);
        match facecap_models::verify_file_sha256(model.name, &dest, expected_sha256) {
            Ok(()) => {
                println!("  {} already present", model.name);
                skipped += 1;
                continue;
            }
            Err(ModelIntegrityError::MissingModel { .. }) => {}
            Err(ModelIntegrityError::ChecksumMismatch { .. }) => {
                println!("  {} exists but checksum differs, re-downloading", model.name);
            }
            Err(_) => {
                println!("  {} exists but unreadable, re-downloading", model.name);
            }
        }

        download_model(model, &dest, expected_sha256)?;
        downloaded += 1;
    }

    facecap_models::verify_models_dir(&dir)?;

    println!();
    if downloaded > 0 {
        println!("Setup complete: {downloaded} file(s) downloaded, {skipped} already present.");
    } else {
        println!("All files already present. Nothing to download.");
    }
    if dir != facecap_core::default_model_dir() {
        println!("Start facecapd with FACECAP_MODEL_DIR={}", dir.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_path_appends_suffix() {
        let dest = Path::new("/models/haarcascade_frontalface_default.xml");
        assert_eq!(
            part_path(dest),
            PathBuf::from("/models/haarcascade_frontalface_default.xml.part")
        );
    }

    #[test]
    fn run_skips_existing_cascade() {
        let tmp = tempfile::tempdir().unwrap();
        for model in MODELS {
            fs::write(tmp.path().join(model.name), b"<opencv_storage/>").unwrap();
        }
        run(Some(tmp.path().to_path_buf()), None).unwrap();
        assert!(!part_path(&tmp.path().join(MODELS[0].name)).exists());
    }
}
