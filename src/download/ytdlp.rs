use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::progress::{parse_progress_line, ProgressEvent, PROGRESS_TEMPLATE};
use super::{DownloadOptions, MediaDownloader, PlaylistEntry, PlaylistInfo};
use crate::config::DownloaderConfig;
use crate::{Error, Result};

/// Media downloader backed by the yt-dlp executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    yt_dlp_path: String,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlp {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_location: None,
        }
    }

    pub fn from_config(config: &DownloaderConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
        }
    }

    /// Build the full yt-dlp argument list for a download
    pub fn download_args(&self, url: &str, options: &DownloadOptions) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--progress".into(),
            "--progress-template".into(),
            PROGRESS_TEMPLATE.into(),
            "--no-playlist".into(),
            "--output".into(),
            options.output_template.clone(),
        ];

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        if let Some(format) = &options.format {
            args.push("--format".into());
            args.push(format.clone());
        }

        if let Some(audio) = &options.extract_audio {
            args.extend([
                "--extract-audio".into(),
                "--audio-format".into(),
                audio.codec.clone(),
                "--audio-quality".into(),
                format!("{}K", audio.quality),
            ]);
        }

        if let Some(container) = &options.convert_to {
            args.push("--recode-video".into());
            args.push(container.clone());
        }

        if !options.postprocessor_args.is_empty() {
            args.push("--postprocessor-args".into());
            args.push(format!("ffmpeg:{}", options.postprocessor_args.join(" ")));
        }

        args.push("--".into());
        args.push(url.to_string());
        args
    }

    /// Run yt-dlp in metadata mode and parse the JSON document it prints
    pub async fn dump_json(&self, args: &[&str], target: &str) -> Result<Value> {
        tracing::debug!("yt-dlp {} -- {}", args.join(" "), target);

        let output = Command::new(&self.yt_dlp_path)
            .args(args)
            .arg("--")
            .arg(target)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Downloader(format!(
                "yt-dlp failed: {}",
                summarize_stderr(&stderr)
            )));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn spawn_error(&self, err: std::io::Error) -> Error {
        if err.kind() == ErrorKind::NotFound {
            Error::Downloader(format!(
                "{} is not available. Please install it: https://github.com/yt-dlp/yt-dlp",
                self.yt_dlp_path
            ))
        } else {
            Error::Io(err)
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDownloader for YtDlp {
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut (dyn FnMut(ProgressEvent) + Send),
    ) -> Result<()> {
        let args = self.download_args(url, options);
        tracing::debug!("yt-dlp {}", args.join(" "));

        let mut child = Command::new(&self.yt_dlp_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Downloader("yt-dlp stdout was not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Downloader("yt-dlp stderr was not captured".to_string()))?;

        let read_progress = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                match parse_progress_line(&line) {
                    Some(event) => on_progress(event),
                    None => tracing::debug!("yt-dlp: {}", line),
                }
            }
            Ok::<_, std::io::Error>(())
        };

        // stderr is drained alongside stdout so a chatty child cannot block on a full pipe
        let read_errors = async {
            let mut buf = String::new();
            stderr.read_to_string(&mut buf).await.map(|_| buf)
        };

        let (progress, errors) = tokio::join!(read_progress, read_errors);
        progress?;
        let errors = errors?;

        let status = child.wait().await?;
        if !status.success() {
            let reason = if errors.trim().is_empty() {
                format!("yt-dlp exited with {}", status)
            } else {
                summarize_stderr(&errors)
            };
            return Err(Error::Downloader(format!("yt-dlp failed: {}", reason)));
        }

        Ok(())
    }

    async fn extract_playlist(&self, url: &str) -> Result<PlaylistInfo> {
        tracing::info!("Extracting playlist information for: {}", url);
        let info = self
            .dump_json(&["--flat-playlist", "--dump-single-json"], url)
            .await?;
        parse_playlist(&info)
    }
}

/// Convert a `--flat-playlist --dump-single-json` document into a `PlaylistInfo`
pub fn parse_playlist(info: &Value) -> Result<PlaylistInfo> {
    let entries = info["entries"]
        .as_array()
        .ok_or_else(|| Error::Downloader("URL does not point to a playlist".to_string()))?;

    let entries = entries
        .iter()
        .filter_map(|entry| {
            let url = entry["webpage_url"]
                .as_str()
                .or_else(|| entry["url"].as_str())
                .or_else(|| entry["id"].as_str())?
                .to_string();
            let title = entry["title"]
                .as_str()
                .or_else(|| entry["id"].as_str())
                .unwrap_or("Untitled")
                .to_string();
            Some(PlaylistEntry { title, url })
        })
        .collect();

    Ok(PlaylistInfo {
        title: info["title"].as_str().map(|s| s.to_string()),
        entries,
    })
}

/// Reduce yt-dlp's stderr to the lines worth showing a user
fn summarize_stderr(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .filter_map(|line| line.strip_prefix("ERROR:"))
        .map(str::trim)
        .collect();

    if !errors.is_empty() {
        return errors.join("; ");
    }

    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("unknown error")
        .to_string()
}
