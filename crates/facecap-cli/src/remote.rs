//! `facecap verify` / `facecap status`: talk to a running facecapd.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;

use crate::check::file_data_url;

fn endpoint(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// Error statuses carry JSON bodies, so they are returned rather than raised.
fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(30)))
        .build()
        .into()
}

fn print_body(text: &str) -> Option<serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| text.to_string())
            );
            Some(value)
        }
        Err(_) => {
            println!("{text}");
            None
        }
    }
}

/// POST `file` to `/upload/` and print the outcome.
pub fn verify(file: &Path, base_url: &str) -> Result<bool> {
    let url = endpoint(base_url, "/upload/");
    let body = serde_json::json!({ "image": file_data_url(file)? }).to_string();
    tracing::debug!(%url, bytes = body.len(), "sending capture");

    let mut resp = agent()
        .post(&url)
        .header("Content-Type", "application/json")
        .send(body.as_str())
        .with_context(|| format!("failed to reach {url}"))?;

    let status = resp.status();
    let text = resp.body_mut().read_to_string()?;
    let accepted = print_body(&text)
        .and_then(|v| v.get("success").and_then(|s| s.as_bool()))
        .unwrap_or(false);

    if !status.is_success() {
        eprintln!("facecapd returned {status}");
    }
    Ok(status.is_success() && accepted)
}

/// GET `/health` and print it.
pub fn status(base_url: &str) -> Result<bool> {
    let url = endpoint(base_url, "/health");

    let mut resp = agent()
        .get(&url)
        .call()
        .with_context(|| format!("failed to reach {url}"))?;

    let status = resp.status();
    let text = resp.body_mut().read_to_string()?;
    print_body(&text);
    Ok(status.is_success())
}
