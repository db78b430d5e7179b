//! Base64 / data-URL decoding into an RGB bitmap.

use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use image::RgbImage;
use thiserror::Error;

/// Accepts payloads with or without trailing `=` padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid image data: empty payload")]
    Empty,
    #[error("Invalid image data: expected a base64 string, found {0}")]
    NotText(&'static str),
    #[error("Invalid image data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid image data: could not decode image ({0})")]
    Image(#[from] image::ImageError),
}

/// Strip a `data:<mime>;base64,` header if present.
///
/// Everything up to and including the first comma is dropped, so any
/// comma-delimited prefix is treated as a header.
pub fn strip_data_url(input: &str) -> &str {
    match input.split_once(',') {
        Some((_, payload)) => payload,
        None => input,
    }
}

/// Decode raw base64 text (no header) into bytes, ignoring ASCII whitespace.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(LENIENT.decode(compact.as_bytes())?)
}

/// Decode an encoded image container (JPEG, PNG, WebP, ...) into 8-bit RGB.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Convert the string a browser sends (data URL or bare base64) into a bitmap.
pub fn decode_base64_image(input: &str) -> Result<RgbImage, DecodeError> {
    let bytes = decode_base64(strip_data_url(input))?;
    let img = decode_image_bytes(&bytes)?;
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        encoded_len = bytes.len(),
        "image decoded"
    );
    Ok(img)
}

/// Encode bytes as a `data:<mime>;base64,` URL. Used by the CLI and tests.
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}
