use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// yt-dlp invocation settings
    pub downloader: DownloaderConfig,

    /// Transcript retrieval settings
    pub transcript: TranscriptConfig,

    /// QR code image settings
    pub qr: QrConfig,

    /// URL shortening service settings
    pub shortener: ShortenerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Path or name of the yt-dlp executable
    pub yt_dlp_path: String,

    /// Directory or binary path handed to yt-dlp as `--ffmpeg-location`
    pub ffmpeg_location: Option<PathBuf>,

    /// Codec used when extracting audio only
    pub audio_codec: String,

    /// Bitrate (kbps) used when extracting audio only
    pub audio_quality: String,

    /// Container the file is converted to before trimming
    pub trim_container: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Preferred transcript languages, in priority order
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Pixel size of a single QR module
    pub box_size: u32,

    /// Quiet zone width, in modules
    pub border: u32,

    /// Logo pasted over the center of the code when the file exists
    pub logo_path: PathBuf,

    /// TrueType font used for captions; system fonts are used when missing
    pub font_path: PathBuf,

    /// Caption font size in pixels
    pub font_size: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    /// TinyURL-compatible creation endpoint
    pub endpoint: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_location: None,
            audio_codec: "mp3".to_string(),
            audio_quality: "192".to_string(),
            trim_container: "mp4".to_string(),
        }
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            box_size: 10,
            border: 4,
            logo_path: PathBuf::from("youtube_logo.png"),
            font_path: PathBuf::from("arial.ttf"),
            font_size: 20.0,
        }
    }
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://tinyurl.com/api-create.php".to_string(),
        }
    }
}

/// Pixels per QR module
const MAX_BOX_SIZE: u32 = 50;
/// Quiet zone modules on each side
const MAX_BORDER: u32 = 20;

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config = Self::from_yaml(&content)?;
            tracing::debug!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    /// Parse and validate a YAML configuration document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("tubekit").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.downloader.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("downloader.yt_dlp_path must not be empty");
        }

        if !(1..=MAX_BOX_SIZE).contains(&self.qr.box_size) {
            anyhow::bail!("qr.box_size must be between 1 and {}", MAX_BOX_SIZE);
        }

        if self.qr.border > MAX_BORDER {
            anyhow::bail!("qr.border must be at most {}", MAX_BORDER);
        }

        if !(self.qr.font_size.is_finite() && self.qr.font_size > 0.0) {
            anyhow::bail!("qr.font_size must be a positive number");
        }

        if self.transcript.languages.is_empty() {
            anyhow::bail!("transcript.languages must list at least one language");
        }

        crate::utils::validate_and_normalize_url(&self.shortener.endpoint)
            .context("shortener.endpoint is not a valid URL")?;

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  yt-dlp: {}", self.downloader.yt_dlp_path);
        if let Some(ffmpeg) = &self.downloader.ffmpeg_location {
            println!("  ffmpeg: {}", ffmpeg.display());
        }
        println!(
            "  Audio: {} @ {}k",
            self.downloader.audio_codec, self.downloader.audio_quality
        );
        println!("  Transcript languages: {}", self.transcript.languages.join(", "));
        println!(
            "  QR: box {}px, border {}, logo {}, font {} ({}px)",
            self.qr.box_size,
            self.qr.border,
            self.qr.logo_path.display(),
            self.qr.font_path.display(),
            self.qr.font_size
        );
        println!("  Shortener: {}", self.shortener.endpoint);
    }
}
