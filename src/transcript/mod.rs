use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod youtube;

pub use youtube::YtDlpTranscripts;

/// One caption line with its start offset
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    /// Start time in seconds
    pub start: f64,

    /// Caption text
    pub text: String,
}

/// Answer of a transcript source for one video
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptResponse {
    Success(Vec<TranscriptEntry>),
    /// The uploader turned captions off
    Disabled,
    /// Captions exist, but not in any requested language
    NotFound,
    Other(String),
}

/// Source of timed captions, keyed by bare video identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptApi: Send + Sync {
    async fn fetch(&self, video_id: &str) -> TranscriptResponse;
}

/// Result of fetching and saving a transcript
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    Saved { path: PathBuf, entries: usize },
    Disabled,
    NotFound,
    Failed(String),
}

impl TranscriptOutcome {
    /// Message shown to the user
    pub fn message(&self) -> String {
        match self {
            TranscriptOutcome::Saved { path, .. } => {
                format!("Transcript downloaded successfully: {}", path.display())
            }
            TranscriptOutcome::Disabled => "Transcripts are disabled for this video.".to_string(),
            TranscriptOutcome::NotFound => "No transcript found for this video.".to_string(),
            TranscriptOutcome::Failed(reason) => {
                format!("Error occurred while downloading transcript: {}", reason)
            }
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, TranscriptOutcome::Saved { .. })
    }
}

/// Pull the video identifier out of a watch URL.
///
/// Takes whatever follows the last `v=` up to the next `&`. Share links such as
/// `https://youtu.be/<id>` have no `v=` and come back unchanged (minus any `&...` tail),
/// which later fails when the transcript file name is built from it.
pub fn extract_video_id(video_url: &str) -> String {
    let after = video_url.rsplit("v=").next().unwrap_or(video_url);
    after.split('&').next().unwrap_or(after).to_string()
}

/// Render entries as `<start> - <text>` lines
pub fn format_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{:.2} - {}\n", entry.start, entry.text))
        .collect()
}

/// Fetches a transcript and writes it next to the downloaded media
pub struct TranscriptFetcher<T> {
    api: T,
}

impl<T: TranscriptApi> TranscriptFetcher<T> {
    pub fn new(api: T) -> Self {
        Self { api }
    }

    /// Fetch the transcript for `video_url` into `<directory>/<video_id>_transcript.txt`
    pub async fn fetch(&self, video_url: &str, directory: &Path) -> TranscriptOutcome {
        let video_id = extract_video_id(video_url);
        tracing::debug!("Fetching transcript for video id {}", video_id);

        match self.api.fetch(&video_id).await {
            TranscriptResponse::Success(entries) => {
                let path = directory.join(format!("{}_transcript.txt", video_id));
                match fs_err::write(&path, format_transcript(&entries)) {
                    Ok(()) => {
                        tracing::info!("Transcript downloaded successfully: {}", path.display());
                        TranscriptOutcome::Saved {
                            path,
                            entries: entries.len(),
                        }
                    }
                    Err(e) => {
                        tracing::error!("An error occurred while downloading transcript: {}", e);
                        TranscriptOutcome::Failed(e.to_string())
                    }
                }
            }
            TranscriptResponse::Disabled => {
                tracing::warn!("Transcripts are disabled for this video.");
                TranscriptOutcome::Disabled
            }
            TranscriptResponse::NotFound => {
                tracing::warn!("No transcript found for this video.");
                TranscriptOutcome::NotFound
            }
            TranscriptResponse::Other(reason) => {
                tracing::error!("An error occurred while downloading transcript: {}", reason);
                TranscriptOutcome::Failed(reason)
            }
        }
    }
}
