use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub mod progress;
pub mod ytdlp;

pub use progress::{ProgressEvent, ProgressTracker};
pub use ytdlp::YtDlp;

use crate::config::DownloaderConfig;
use crate::transcript::{TranscriptApi, TranscriptFetcher, TranscriptOutcome};
use crate::utils::{sanitize_filename, validate_timestamp};
use crate::Result;

/// What the user asked to download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Video or playlist URL
    pub source_url: String,

    /// Directory the media is written to
    pub destination: PathBuf,

    /// Single video or whole playlist, with the options valid for each
    pub mode: DownloadMode,
}

#[derive(Debug, Clone)]
pub enum DownloadMode {
    Video(VideoOptions),
    Playlist { start_index: NonZeroUsize },
}

/// Options that only apply to single video downloads
#[derive(Debug, Clone, Default)]
pub struct VideoOptions {
    pub audio_only: bool,
    pub want_transcript: bool,
    /// Trim start, e.g. `00:01:00`
    pub start_time: Option<String>,
    /// Trim end, e.g. `00:02:00`
    pub end_time: Option<String>,
}

/// Progress and message shown to the user while a download runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadStatus {
    /// 0-100
    pub progress_percent: u8,
    pub message: String,
}

impl DownloadStatus {
    pub fn new(progress_percent: u8, message: impl Into<String>) -> Self {
        Self {
            progress_percent: progress_percent.min(100),
            message: message.into(),
        }
    }
}

/// Receives every intermediate status of a running download
pub trait StatusSink: Send {
    fn update(&mut self, status: &DownloadStatus);
}

impl<F> StatusSink for F
where
    F: FnMut(&DownloadStatus) + Send,
{
    fn update(&mut self, status: &DownloadStatus) {
        self(status)
    }
}

/// Audio extraction post-processing step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: String,
    /// Bitrate in kbps
    pub quality: String,
}

/// Downloader directives for a single media item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Output path template with `%(title)s`-style placeholders
    pub output_template: String,

    /// Format selector, e.g. `bestaudio`
    pub format: Option<String>,

    pub extract_audio: Option<AudioExtraction>,

    /// Container to convert to after download
    pub convert_to: Option<String>,

    /// Raw ffmpeg arguments applied by post-processors (`-ss`, `-to`)
    pub postprocessor_args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub title: Option<String>,
    pub entries: Vec<PlaylistEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
}

/// External program that fetches media from the web
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download one item, reporting every progress callback
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut (dyn FnMut(ProgressEvent) + Send),
    ) -> Result<()>;

    /// Read playlist metadata without downloading anything
    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo>;
}

/// Keeps the latest status and forwards every change to the sink
struct StatusRelay<'a> {
    sink: &'a mut dyn StatusSink,
    current: DownloadStatus,
}

impl<'a> StatusRelay<'a> {
    fn new(sink: &'a mut dyn StatusSink) -> Self {
        Self {
            sink,
            current: DownloadStatus::new(0, "Starting download..."),
        }
    }

    fn publish(&mut self) {
        self.sink.update(&self.current);
    }

    fn set(&mut self, progress_percent: u8, message: impl Into<String>) {
        self.current = DownloadStatus::new(progress_percent, message);
        self.publish();
    }

    fn set_progress(&mut self, progress_percent: u8) {
        self.current.progress_percent = progress_percent.min(100);
        self.publish();
    }

    fn finish(mut self, message: impl Into<String>) -> DownloadStatus {
        self.current.message = message.into();
        self.publish();
        self.current
    }
}

/// Runs downloads and the optional transcript step, turning every failure into a status
pub struct DownloadOrchestrator<D, T> {
    downloader: D,
    transcripts: TranscriptFetcher<T>,
    audio: AudioExtraction,
    trim_container: String,
}

impl<D: MediaDownloader, T: TranscriptApi> DownloadOrchestrator<D, T> {
    pub fn new(downloader: D, transcripts: TranscriptFetcher<T>) -> Self {
        Self::from_config(downloader, transcripts, &DownloaderConfig::default())
    }

    pub fn from_config(
        downloader: D,
        transcripts: TranscriptFetcher<T>,
        config: &DownloaderConfig,
    ) -> Self {
        Self {
            downloader,
            transcripts,
            audio: AudioExtraction {
                codec: config.audio_codec.clone(),
                quality: config.audio_quality.clone(),
            },
            trim_container: config.trim_container.clone(),
        }
    }

    /// Run a download request to completion
    pub async fn download(
        &self,
        request: &DownloadRequest,
        sink: &mut dyn StatusSink,
    ) -> DownloadStatus {
        match &request.mode {
            DownloadMode::Video(options) => {
                self.download_video(&request.source_url, &request.destination, options, sink)
                    .await
            }
            DownloadMode::Playlist { start_index } => {
                self.download_playlist(
                    &request.source_url,
                    &request.destination,
                    *start_index,
                    sink,
                )
                .await
            }
        }
    }

    /// Download a single video (or its audio), then optionally its transcript
    pub async fn download_video(
        &self,
        url: &str,
        destination: &Path,
        options: &VideoOptions,
        sink: &mut dyn StatusSink,
    ) -> DownloadStatus {
        let mut relay = StatusRelay::new(sink);
        relay.publish();

        match self.run_video(url, destination, options, &mut relay).await {
            Ok(message) => relay.finish(message),
            Err(e) => {
                tracing::error!("An error occurred: {}", e);
                relay.finish(format!("Error occurred: {}", e))
            }
        }
    }

    /// Download playlist entries one after another, starting at `start_index` (1-based)
    pub async fn download_playlist(
        &self,
        url: &str,
        destination: &Path,
        start_index: NonZeroUsize,
        sink: &mut dyn StatusSink,
    ) -> DownloadStatus {
        let mut relay = StatusRelay::new(sink);
        relay.publish();

        match self.run_playlist(url, destination, start_index, &mut relay).await {
            Ok(()) => relay.finish("Download complete."),
            Err(e) => {
                tracing::error!("An error occurred: {}", e);
                relay.finish(format!("Error occurred: {}", e))
            }
        }
    }

    /// Downloader directives for a single video request
    pub fn video_options(&self, destination: &Path, options: &VideoOptions) -> DownloadOptions {
        let mut directives = DownloadOptions {
            output_template: output_template(destination, "%(title)s.%(ext)s"),
            ..DownloadOptions::default()
        };

        if options.audio_only {
            directives.format = Some("bestaudio".to_string());
            directives.extract_audio = Some(self.audio.clone());
        }

        let start = non_empty(options.start_time.as_deref());
        let end = non_empty(options.end_time.as_deref());
        if start.is_some() || end.is_some() {
            // Trimming happens on the downloaded file, not on the stream
            directives.convert_to = Some(self.trim_container.clone());
            if let Some(start) = start {
                directives.postprocessor_args.extend(["-ss".to_string(), start.to_string()]);
            }
            if let Some(end) = end {
                directives.postprocessor_args.extend(["-to".to_string(), end.to_string()]);
            }
        }

        directives
    }

    async fn run_video(
        &self,
        url: &str,
        destination: &Path,
        options: &VideoOptions,
        relay: &mut StatusRelay<'_>,
    ) -> Result<String> {
        for time in [&options.start_time, &options.end_time] {
            if let Some(time) = non_empty(time.as_deref()) {
                validate_timestamp(time)?;
            }
        }

        let directives = self.video_options(destination, options);
        tracing::info!("Downloading {} into {}", url, destination.display());

        let mut tracker = ProgressTracker::new();
        self.downloader
            .download(url, &directives, &mut |event| {
                if let Some(percent) = tracker.observe(&event) {
                    relay.set_progress(percent);
                }
            })
            .await?;

        if !options.want_transcript {
            return Ok("Download complete.".to_string());
        }

        let percent = relay.current.progress_percent;
        relay.set(percent, "Downloading transcript...");
        let outcome = self.transcripts.fetch(url, destination).await;
        Ok(match outcome {
            TranscriptOutcome::Saved { path, .. } => {
                format!("Download complete. Transcript saved to {}", path.display())
            }
            other => other.message(),
        })
    }

    async fn run_playlist(
        &self,
        url: &str,
        destination: &Path,
        start_index: NonZeroUsize,
        relay: &mut StatusRelay<'_>,
    ) -> Result<()> {
        let playlist = self.downloader.extract_playlist(url).await?;
        let folder_name = playlist
            .title
            .as_deref()
            .map(sanitize_filename)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "playlist".to_string());
        let folder = destination.join(folder_name);

        tracing::info!(
            "Playlist has {} entries, starting at {}",
            playlist.entries.len(),
            start_index
        );

        for (index, entry) in playlist
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i + 1, entry))
            .skip(start_index.get() - 1)
        {
            relay.set(0, format!("Downloading video {}: {}", index, entry.title));

            let directives = DownloadOptions {
                output_template: output_template(
                    &folder,
                    &format!("{} - %(title)s.%(ext)s", index),
                ),
                ..DownloadOptions::default()
            };

            let mut tracker = ProgressTracker::new();
            self.downloader
                .download(&entry.url, &directives, &mut |event| {
                    if let Some(percent) = tracker.observe(&event) {
                        relay.set_progress(percent);
                    }
                })
                .await?;
        }

        Ok(())
    }
}

fn output_template(directory: &Path, file_pattern: &str) -> String {
    directory.join(file_pattern).to_string_lossy().into_owned()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{MockTranscriptApi, TranscriptEntry, TranscriptResponse};
    use crate::Error;
    use std::sync::Mutex;

    /// Replays scripted progress events and fails chosen URLs
    #[derive(Default)]
    struct ScriptedDownloader {
        events: Vec<ProgressEvent>,
        playlist: Option<PlaylistInfo>,
        failing_url: Option<String>,
        calls: Mutex<Vec<(String, DownloadOptions)>>,
    }

    impl ScriptedDownloader {
        fn calls(&self) -> Vec<(String, DownloadOptions)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaDownloader for ScriptedDownloader {
        async fn download(
            &self,
            url: &str,
            options: &DownloadOptions,
            on_progress: &mut (dyn FnMut(ProgressEvent) + Send),
        ) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), options.clone()));
            for event in &self.events {
                on_progress(event.clone());
            }
            if self.failing_url.as_deref() == Some(url) {
                return Err(Error::Downloader(format!("yt-dlp failed: {} is unavailable", url)));
            }
            Ok(())
        }

        async fn extract_playlist(&self, _url: &str) -> Result<PlaylistInfo> {
            self.playlist
                .clone()
                .ok_or_else(|| Error::Downloader("URL does not point to a playlist".to_string()))
        }
    }

    fn five_entry_playlist() -> PlaylistInfo {
        PlaylistInfo {
            title: Some("Course: Week 1".to_string()),
            entries: (1..=5)
                .map(|i| PlaylistEntry {
                    title: format!("Lesson {}", i),
                    url: format!("https://www.youtube.com/watch?v=lesson{}", i),
                })
                .collect(),
        }
    }

    fn build(
        downloader: ScriptedDownloader,
        api: MockTranscriptApi,
    ) -> DownloadOrchestrator<ScriptedDownloader, MockTranscriptApi> {
        DownloadOrchestrator::new(downloader, TranscriptFetcher::new(api))
    }

    #[tokio::test]
    async fn test_video_progress_is_monotonic_and_bounded() {
        let downloader = ScriptedDownloader {
            events: vec![
                ProgressEvent::downloading(0, Some(1000)),
                ProgressEvent::downloading(400, Some(1000)),
                ProgressEvent::downloading(100, Some(500)),
                ProgressEvent::downloading(1000, Some(1000)),
            ],
            ..ScriptedDownloader::default()
        };
        let orchestrator = build(downloader, MockTranscriptApi::new());

        let mut seen = Vec::new();
        let mut sink = |status: &DownloadStatus| seen.push(status.clone());
        let status = orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=abc",
                Path::new("."),
                &VideoOptions::default(),
                &mut sink,
            )
            .await;

        assert_eq!(status.message, "Download complete.");
        assert_eq!(status.progress_percent, 100);
        let percents: Vec<u8> = seen.iter().map(|s| s.progress_percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert!(percents.iter().all(|p| *p <= 100));
        assert_eq!(seen.first().unwrap().message, "Starting download...");
    }

    #[tokio::test]
    async fn test_unknown_total_does_not_fault() {
        let downloader = ScriptedDownloader {
            events: vec![
                ProgressEvent::downloading(0, None),
                ProgressEvent::downloading(4096, None),
                ProgressEvent::downloading(8192, Some(0)),
            ],
            ..ScriptedDownloader::default()
        };
        let orchestrator = build(downloader, MockTranscriptApi::new());

        let status = orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=abc",
                Path::new("."),
                &VideoOptions::default(),
                &mut |_: &DownloadStatus| {},
            )
            .await;

        assert_eq!(status.message, "Download complete.");
        assert_eq!(status.progress_percent, 100);
    }

    #[tokio::test]
    async fn test_video_options_for_audio_and_trim() {
        let downloader = ScriptedDownloader::default();
        let orchestrator = build(downloader, MockTranscriptApi::new());
        let options = VideoOptions {
            audio_only: true,
            want_transcript: false,
            start_time: Some("00:01:00".to_string()),
            end_time: Some("  ".to_string()),
        };

        orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=abc",
                Path::new("out"),
                &options,
                &mut |_: &DownloadStatus| {},
            )
            .await;

        let calls = orchestrator.downloader.calls();
        assert_eq!(calls.len(), 1);
        let directives = &calls[0].1;
        assert_eq!(
            directives.output_template,
            Path::new("out").join("%(title)s.%(ext)s").to_string_lossy()
        );
        assert_eq!(directives.format.as_deref(), Some("bestaudio"));
        assert_eq!(
            directives.extract_audio,
            Some(AudioExtraction {
                codec: "mp3".to_string(),
                quality: "192".to_string()
            })
        );
        assert_eq!(directives.convert_to.as_deref(), Some("mp4"));
        assert_eq!(directives.postprocessor_args, vec!["-ss", "00:01:00"]);
    }

    #[tokio::test]
    async fn test_invalid_trim_time_never_reaches_downloader() {
        let orchestrator = build(ScriptedDownloader::default(), MockTranscriptApi::new());
        let options = VideoOptions {
            end_time: Some("two minutes".to_string()),
            ..VideoOptions::default()
        };

        let status = orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=abc",
                Path::new("."),
                &options,
                &mut |_: &DownloadStatus| {},
            )
            .await;

        assert!(status.message.starts_with("Error occurred: Invalid timestamp 'two minutes'"));
        assert!(orchestrator.downloader.calls().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_becomes_status() {
        let downloader = ScriptedDownloader {
            events: vec![ProgressEvent::downloading(30, Some(100))],
            failing_url: Some("https://www.youtube.com/watch?v=gone".to_string()),
            ..ScriptedDownloader::default()
        };
        let orchestrator = build(downloader, MockTranscriptApi::new());

        let status = orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=gone",
                Path::new("."),
                &VideoOptions::default(),
                &mut |_: &DownloadStatus| {},
            )
            .await;

        assert_eq!(
            status.message,
            "Error occurred: yt-dlp failed: https://www.youtube.com/watch?v=gone is unavailable"
        );
        assert_eq!(status.progress_percent, 30);
    }

    #[tokio::test]
    async fn test_transcript_result_overrides_final_message() {
        let dir = tempfile::tempdir().unwrap();

        let mut api = MockTranscriptApi::new();
        api.expect_fetch()
            .withf(|id| id == "abc")
            .times(1)
            .returning(|_| {
                TranscriptResponse::Success(vec![TranscriptEntry {
                    start: 0.0,
                    text: "hello".to_string(),
                }])
            });
        let orchestrator = build(ScriptedDownloader::default(), api);
        let options = VideoOptions {
            want_transcript: true,
            ..VideoOptions::default()
        };

        let status = orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=abc",
                dir.path(),
                &options,
                &mut |_: &DownloadStatus| {},
            )
            .await;

        let expected = dir.path().join("abc_transcript.txt");
        assert_eq!(
            status.message,
            format!("Download complete. Transcript saved to {}", expected.display())
        );
        assert!(expected.exists());

        let mut api = MockTranscriptApi::new();
        api.expect_fetch().returning(|_| TranscriptResponse::Disabled);
        let orchestrator = build(ScriptedDownloader::default(), api);
        let status = orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=abc",
                dir.path(),
                &options,
                &mut |_: &DownloadStatus| {},
            )
            .await;
        assert_eq!(status.message, "Transcripts are disabled for this video.");
    }

    #[tokio::test]
    async fn test_transcript_skipped_when_download_fails() {
        let mut api = MockTranscriptApi::new();
        api.expect_fetch().times(0);
        let downloader = ScriptedDownloader {
            failing_url: Some("https://www.youtube.com/watch?v=abc".to_string()),
            ..ScriptedDownloader::default()
        };
        let orchestrator = build(downloader, api);
        let options = VideoOptions {
            want_transcript: true,
            ..VideoOptions::default()
        };

        let status = orchestrator
            .download_video(
                "https://www.youtube.com/watch?v=abc",
                Path::new("."),
                &options,
                &mut |_: &DownloadStatus| {},
            )
            .await;
        assert!(status.message.starts_with("Error occurred:"));
    }

    #[tokio::test]
    async fn test_playlist_starts_at_index() {
        let downloader = ScriptedDownloader {
            playlist: Some(five_entry_playlist()),
            ..ScriptedDownloader::default()
        };
        let orchestrator = build(downloader, MockTranscriptApi::new());

        let mut messages = Vec::new();
        let mut sink = |status: &DownloadStatus| messages.push(status.message.clone());
        let status = orchestrator
            .download_playlist(
                "https://www.youtube.com/playlist?list=PL1",
                Path::new("downloads"),
                NonZeroUsize::new(3).unwrap(),
                &mut sink,
            )
            .await;

        assert_eq!(status.message, "Download complete.");
        let urls: Vec<String> = orchestrator
            .downloader
            .calls()
            .into_iter()
            .map(|(url, _)| url)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=lesson3",
                "https://www.youtube.com/watch?v=lesson4",
                "https://www.youtube.com/watch?v=lesson5",
            ]
        );
        assert!(messages.contains(&"Downloading video 3: Lesson 3".to_string()));
        assert!(messages.contains(&"Downloading video 5: Lesson 5".to_string()));

        let calls = orchestrator.downloader.calls();
        assert_eq!(
            calls[0].1.output_template,
            Path::new("downloads")
                .join("Course_ Week 1")
                .join("3 - %(title)s.%(ext)s")
                .to_string_lossy()
        );
    }

    #[tokio::test]
    async fn test_playlist_halts_on_first_failure() {
        let downloader = ScriptedDownloader {
            playlist: Some(five_entry_playlist()),
            failing_url: Some("https://www.youtube.com/watch?v=lesson3".to_string()),
            ..ScriptedDownloader::default()
        };
        let orchestrator = build(downloader, MockTranscriptApi::new());

        let status = orchestrator
            .download_playlist(
                "https://www.youtube.com/playlist?list=PL1",
                Path::new("."),
                NonZeroUsize::new(3).unwrap(),
                &mut |_: &DownloadStatus| {},
            )
            .await;

        assert!(status.message.starts_with("Error occurred:"));
        assert_eq!(orchestrator.downloader.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_playlist_start_past_end_downloads_nothing() {
        let downloader = ScriptedDownloader {
            playlist: Some(five_entry_playlist()),
            ..ScriptedDownloader::default()
        };
        let orchestrator = build(downloader, MockTranscriptApi::new());

        let status = orchestrator
            .download_playlist(
                "https://www.youtube.com/playlist?list=PL1",
                Path::new("."),
                NonZeroUsize::new(9).unwrap(),
                &mut |_: &DownloadStatus| {},
            )
            .await;

        assert_eq!(status.message, "Download complete.");
        assert!(orchestrator.downloader.calls().is_empty());
    }

    #[tokio::test]
    async fn test_request_dispatches_on_mode() {
        let downloader = ScriptedDownloader::default();
        let orchestrator = build(downloader, MockTranscriptApi::new());
        let request = DownloadRequest {
            source_url: "https://www.youtube.com/playlist?list=PL1".to_string(),
            destination: PathBuf::from("."),
            mode: DownloadMode::Playlist {
                start_index: NonZeroUsize::new(1).unwrap(),
            },
        };

        let status = orchestrator.download(&request, &mut |_: &DownloadStatus| {}).await;
        assert_eq!(status.message, "Error occurred: URL does not point to a playlist");
    }
}
