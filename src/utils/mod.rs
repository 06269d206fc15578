use url::Url;

use crate::config::DownloaderConfig;
use crate::{Error, Result};

/// Validate a URL and return normalized version
pub fn validate_and_normalize_url(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|_| Error::InvalidUrl(format!("Invalid URL format: {}", url)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::InvalidUrl(format!(
            "URL must use HTTP or HTTPS protocol: {}",
            url
        )));
    }

    Ok(parsed.to_string())
}

/// Check a trim boundary: `HH:MM:SS`, `MM:SS` or plain seconds, optionally fractional
pub fn validate_timestamp(value: &str) -> Result<()> {
    let invalid = || Error::InvalidTimestamp(value.to_string());

    let parts: Vec<&str> = value.trim().split(':').collect();
    if parts.len() > 3 {
        return Err(invalid());
    }

    let (seconds, leading) = parts.split_last().ok_or_else(invalid)?;

    let is_number = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    let (whole, fraction) = seconds.split_once('.').unwrap_or((seconds, "0"));
    if !is_number(whole) || !is_number(fraction) {
        return Err(invalid());
    }

    if !leading.iter().all(|part| is_number(part)) {
        return Err(invalid());
    }

    // Minutes and seconds only overflow into the next unit when a larger unit is present
    if !leading.is_empty() {
        let secs: u32 = whole.parse().map_err(|_| invalid())?;
        if secs >= 60 {
            return Err(invalid());
        }
    }
    if leading.len() == 2 {
        let minutes: u32 = leading[1].parse().map_err(|_| invalid())?;
        if minutes >= 60 {
            return Err(invalid());
        }
    }

    Ok(())
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            match c {
                // Keep alphanumeric characters, spaces, hyphens, underscores, and dots
                c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
                // Replace everything else with underscore
                _ => '_',
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Check if the current environment has required tools
pub async fn check_dependencies(config: &DownloaderConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&config.yt_dlp_path, "--version").await {
        missing.push(format!(
            "{} - required for downloads and transcripts",
            config.yt_dlp_path
        ));
    }

    // yt-dlp resolves ffmpeg on its own when no location is configured
    let ffmpeg = match &config.ffmpeg_location {
        Some(location) if location.is_dir() => {
            location.join("ffmpeg").to_string_lossy().into_owned()
        }
        Some(location) => location.to_string_lossy().into_owned(),
        None => "ffmpeg".to_string(),
    };
    if !check_command_available(&ffmpeg, "-version").await {
        missing.push("ffmpeg - required for audio extraction and trimming".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
