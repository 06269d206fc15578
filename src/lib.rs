//! Tubekit - A Rust CLI tool for downloading media and sharing it
//!
//! This library downloads videos, audio tracks, playlists and transcripts through `yt-dlp`,
//! shortens URLs through TinyURL, and composes QR code images with an optional logo and caption.

pub mod cli;
pub mod config;
pub mod download;
pub mod qr;
pub mod shortener;
pub mod transcript;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use download::{
    DownloadMode, DownloadOrchestrator, DownloadRequest, DownloadStatus, MediaDownloader,
    StatusSink, VideoOptions,
};
pub use qr::{QrCompositor, QrRequest};
pub use shortener::{Shortened, UrlShortener};
pub use transcript::{TranscriptApi, TranscriptFetcher, TranscriptOutcome};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types specific to tubekit
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid timestamp '{0}': expected HH:MM:SS, MM:SS or seconds")]
    InvalidTimestamp(String),

    #[error("{0}")]
    Downloader(String),

    #[error("QR encoding failed: {0}")]
    QrEncode(#[from] qrcode::types::QrError),

    #[error("QR image too large: {0}")]
    QrSize(String),

    #[error("Image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("URL shortening failed: {0}")]
    Shortener(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
