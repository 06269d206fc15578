/// Marker that starts every progress line printed through `--progress-template`
pub const PROGRESS_MARKER: &str = "tubekit-progress";

/// yt-dlp progress template producing `tubekit-progress <status> <downloaded> <total>` lines.
/// Unknown values are printed as `NA`.
pub const PROGRESS_TEMPLATE: &str = concat!(
    "download:tubekit-progress ",
    "%(progress.status)s %(progress.downloaded_bytes)s %(progress.total_bytes)s"
);

/// A single progress callback reported by the downloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Downloader sub-status (`downloading`, `finished`, `error`)
    pub status: String,

    /// Bytes received so far
    pub downloaded_bytes: Option<u64>,

    /// Expected size in bytes, when the server reports it
    pub total_bytes: Option<u64>,
}

impl ProgressEvent {
    pub fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self {
            status: "downloading".to_string(),
            downloaded_bytes: Some(downloaded_bytes),
            total_bytes,
        }
    }

    pub fn is_downloading(&self) -> bool {
        self.status == "downloading"
    }
}

/// Parse one stdout line of yt-dlp. Returns `None` for lines that are not progress reports.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?;
    let mut fields = rest.split_whitespace();

    let status = fields.next()?.to_string();
    let downloaded_bytes = fields.next().and_then(parse_byte_count);
    let total_bytes = fields.next().and_then(parse_byte_count);

    Some(ProgressEvent {
        status,
        downloaded_bytes,
        total_bytes,
    })
}

fn parse_byte_count(field: &str) -> Option<u64> {
    if let Ok(value) = field.parse::<u64>() {
        return Some(value);
    }

    // Estimated sizes are occasionally printed as floats
    field
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value >= 0.0)
        .map(|value| value as u64)
}

/// Integer percentage of `downloaded` over `total`, rounded down and capped at 100.
/// A zero total is treated as 1.
pub fn percent_of(downloaded: u64, total: u64) -> u8 {
    let total = total.max(1) as u128;
    let percent = (downloaded as u128 * 100) / total;
    percent.min(100) as u8
}

/// Turns raw progress events into a bounded, non-decreasing percentage for one download
#[derive(Debug, Default)]
pub struct ProgressTracker {
    high_water: u8,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the percentage to display, or `None` for events that carry no progress
    pub fn observe(&mut self, event: &ProgressEvent) -> Option<u8> {
        if !event.is_downloading() {
            return None;
        }

        let percent = percent_of(
            event.downloaded_bytes.unwrap_or(0),
            event.total_bytes.unwrap_or(1),
        );
        self.high_water = self.high_water.max(percent);
        Some(self.high_water)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        let event = parse_progress_line("tubekit-progress downloading 1024 4096").unwrap();
        assert_eq!(event, ProgressEvent::downloading(1024, Some(4096)));

        let event = parse_progress_line("  tubekit-progress finished 4096 4096\r").unwrap();
        assert_eq!(event.status, "finished");
    }

    #[test]
    fn test_parse_progress_line_with_unknown_sizes() {
        let event = parse_progress_line("tubekit-progress downloading 2048 NA").unwrap();
        assert_eq!(event.downloaded_bytes, Some(2048));
        assert_eq!(event.total_bytes, None);

        let event = parse_progress_line("tubekit-progress downloading NA NA").unwrap();
        assert_eq!(event.downloaded_bytes, None);
    }

    #[test]
    fn test_non_progress_lines_are_ignored() {
        assert!(parse_progress_line("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress_line("").is_none());
        assert!(parse_progress_line("tubekit-progress").is_none());
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(0, 100), 0);
        assert_eq!(percent_of(999, 1000), 99);
        assert_eq!(percent_of(1000, 1000), 100);
        assert_eq!(percent_of(5, 0), 100);
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(u64::MAX, 1), 100);
    }

    #[test]
    fn test_tracker_is_monotonic_and_bounded() {
        let mut tracker = ProgressTracker::new();
        let events = [
            ProgressEvent::downloading(10, Some(100)),
            ProgressEvent::downloading(50, Some(100)),
            // second stream (audio after video) starts over
            ProgressEvent::downloading(5, Some(100)),
            ProgressEvent::downloading(80, Some(100)),
            ProgressEvent::downloading(500, None),
        ];

        let seen: Vec<u8> = events.iter().filter_map(|e| tracker.observe(e)).collect();
        assert_eq!(seen, vec![10, 50, 50, 80, 100]);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_tracker_ignores_other_statuses() {
        let mut tracker = ProgressTracker::new();
        let finished = ProgressEvent {
            status: "finished".to_string(),
            downloaded_bytes: Some(100),
            total_bytes: Some(100),
        };
        assert_eq!(tracker.observe(&finished), None);
        assert_eq!(tracker.observe(&ProgressEvent::downloading(5, Some(100))), Some(5));
    }
}
