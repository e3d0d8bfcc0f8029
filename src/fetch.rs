//! HTTP downloads for templates, configuration files and genome resources.

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::debug;

use crate::error::{Result, SetupError};

const TIMEOUT_SECS: u64 = 60;

fn client() -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECS))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| SetupError::Download {
            url: String::new(),
            reason: format!("Failed to create HTTP client: {}", e),
        })
}

/// Fetches `url` as text. Non-success status codes are errors.
pub fn fetch_text(url: &str) -> Result<String> {
    debug!("GET {}", url);
    let download_error = |reason: String| SetupError::Download {
        url: url.to_string(),
        reason,
    };

    let response = client()?
        .get(url)
        .send()
        .map_err(|e| download_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(download_error(format!("HTTP {}", status)));
    }

    response.text().map_err(|e| download_error(e.to_string()))
}

/// Downloads `url` to `dest`, creating parent directories.
pub fn fetch_to_file(url: &str, dest: &Path) -> Result<()> {
    let text = fetch_text(url)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, text)?;
    Ok(())
}
