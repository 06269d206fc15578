use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{TranscriptApi, TranscriptEntry, TranscriptResponse};
use crate::config::{DownloaderConfig, TranscriptConfig};
use crate::download::YtDlp;
use crate::Result;

/// Transcript source that reads YouTube caption tracks through yt-dlp
pub struct YtDlpTranscripts {
    ytdlp: YtDlp,
    languages: Vec<String>,
    client: Client,
}

/// Which caption track, if any, can serve a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelection {
    Found { language: String, url: String },
    Disabled,
    NotFound,
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

impl YtDlpTranscripts {
    pub fn new(ytdlp: YtDlp, languages: Vec<String>) -> Self {
        Self {
            ytdlp,
            languages,
            client: Client::new(),
        }
    }

    pub fn from_config(downloader: &DownloaderConfig, transcript: &TranscriptConfig) -> Self {
        Self::new(YtDlp::from_config(downloader), transcript.languages.clone())
    }

    async fn fetch_entries(&self, video_id: &str) -> Result<TranscriptResponse> {
        let info = self
            .ytdlp
            .dump_json(&["--dump-json", "--skip-download", "--no-playlist"], video_id)
            .await?;

        let (language, url) = match select_track(&info, &self.languages) {
            TrackSelection::Found { language, url } => (language, url),
            TrackSelection::Disabled => return Ok(TranscriptResponse::Disabled),
            TrackSelection::NotFound => return Ok(TranscriptResponse::NotFound),
        };

        tracing::info!("Downloading {} captions for {}", language, video_id);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;

        Ok(TranscriptResponse::Success(parse_json3(&body)?))
    }
}

#[async_trait]
impl TranscriptApi for YtDlpTranscripts {
    async fn fetch(&self, video_id: &str) -> TranscriptResponse {
        match self.fetch_entries(video_id).await {
            Ok(response) => response,
            Err(e) => TranscriptResponse::Other(e.to_string()),
        }
    }
}

/// Pick a `json3` caption track, preferring uploaded subtitles over automatic captions
pub fn select_track(info: &Value, languages: &[String]) -> TrackSelection {
    let manual = info.get("subtitles").and_then(Value::as_object);
    let automatic = info.get("automatic_captions").and_then(Value::as_object);

    let has_any_track = [manual, automatic]
        .iter()
        .flatten()
        .any(|tracks| !tracks.is_empty());
    if !has_any_track {
        return TrackSelection::Disabled;
    }

    for tracks in [manual, automatic].into_iter().flatten() {
        for language in languages {
            if let Some(found) = find_json3_track(tracks, language) {
                return found;
            }
        }
    }

    TrackSelection::NotFound
}

fn find_json3_track(tracks: &Map<String, Value>, language: &str) -> Option<TrackSelection> {
    let regional = format!("{}-", language);
    tracks
        .iter()
        .filter(|(code, _)| code.as_str() == language || code.starts_with(&regional))
        .find_map(|(code, formats)| {
            let url = formats
                .as_array()?
                .iter()
                .find(|format| format["ext"] == "json3")?["url"]
                .as_str()?;
            Some(TrackSelection::Found {
                language: code.clone(),
                url: url.to_string(),
            })
        })
}

/// Parse a YouTube `json3` caption document into transcript entries
pub fn parse_json3(body: &str) -> Result<Vec<TranscriptEntry>> {
    let document: Json3 = serde_json::from_str(body)?;

    Ok(document
        .events
        .into_iter()
        .filter_map(|event| {
            let text: String = event.segs.iter().map(|seg| seg.utf8.as_str()).collect();
            let text = text.replace('\n', " ").trim().to_string();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptEntry {
                start: event.start_ms as f64 / 1000.0,
                text,
            })
        })
        .collect())
}
