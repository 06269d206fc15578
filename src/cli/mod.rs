use clap::{Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tubekit",
    about = "Tubekit - Download videos, audio, playlists and transcripts, shorten URLs, and make QR codes",
    version,
    long_about = "A CLI tool for working with online videos in the classroom: download a video or just its audio, trim it to a time range, grab its transcript, download whole playlists, and share links as shortened URLs or captioned QR codes. Downloads are handled by yt-dlp."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a single video, or only its audio
    Video {
        /// Video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Download directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Download audio only
        #[arg(long)]
        audio_only: bool,

        /// Also download the transcript
        #[arg(long)]
        transcript: bool,

        /// Trim start, e.g. 00:01:00
        #[arg(long, value_name = "TIME")]
        start: Option<String>,

        /// Trim end, e.g. 00:02:00
        #[arg(long, value_name = "TIME")]
        end: Option<String>,
    },

    /// Download every video of a playlist
    Playlist {
        /// Playlist URL
        #[arg(value_name = "URL")]
        url: String,

        /// Download directory
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Index of the first video to download (1-based)
        #[arg(long, value_name = "N", default_value = "1")]
        start_index: NonZeroUsize,
    },

    /// Download only the transcript of a video
    Transcript {
        /// Video URL (must contain `v=<id>`)
        #[arg(value_name = "URL")]
        url: String,

        /// Directory the transcript file is written to
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Shorten a URL with TinyURL
    Shorten {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Generate a QR code PNG for a URL
    Qr {
        /// Data to encode
        #[arg(value_name = "URL")]
        url: String,

        /// Caption printed above the code
        #[arg(short, long, value_name = "TEXT")]
        title: Option<String>,

        /// Shorten the URL before encoding it
        #[arg(long)]
        shorten: bool,

        /// Output PNG file
        #[arg(short, long, value_name = "FILE", default_value = "qr_code.png")]
        output: PathBuf,
    },

    /// Show or locate the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that yt-dlp and ffmpeg are installed
    Check,
}
