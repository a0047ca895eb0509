//! yt-dlp backed resolver
//!
//! Runs `yt-dlp --dump-single-json` for the query and reads title, page URL,
//! duration and direct stream URL from its output. Search results arrive as
//! a playlist; the first entry wins.

use super::{ResolveError, ResolvedTrack, TrackResolver};
use crate::transport::StreamRef;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound on a single lookup
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Subset of yt-dlp's info dictionary
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
    entries: Option<Vec<YtDlpInfo>>,
}

/// Resolver that shells out to yt-dlp
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
    timeout: Duration,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolveError> {
        debug!("Resolving '{}' with {}", query, self.program);

        let run = Command::new(&self.program)
            .args([
                "--dump-single-json",
                "--no-playlist",
                "--format",
                "bestaudio/best",
                "--default-search",
                "auto",
                "--no-warnings",
                "--quiet",
                "--",
                query,
            ])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| ResolveError::Timeout)?
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.trim();
            warn!("yt-dlp failed for '{}': {}", query, reason);
            return Err(ResolveError::NotFound(if reason.is_empty() {
                query.to_string()
            } else {
                reason.to_string()
            }));
        }

        parse_info(&output.stdout, query)
    }
}

/// Extract a track from yt-dlp JSON output
fn parse_info(bytes: &[u8], query: &str) -> Result<ResolvedTrack, ResolveError> {
    let mut info: YtDlpInfo =
        serde_json::from_slice(bytes).map_err(|e| ResolveError::Malformed(e.to_string()))?;

    if let Some(entries) = info.entries.take() {
        info = entries
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;
    }

    let stream_url = info
        .url
        .ok_or_else(|| ResolveError::Malformed("missing stream url".to_string()))?;
    let duration_secs = info.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0);

    Ok(ResolvedTrack {
        title: info.title.unwrap_or_else(|| "Unknown Title".to_string()),
        canonical_url: info.webpage_url.unwrap_or_else(|| query.to_string()),
        duration_secs,
        stream: StreamRef {
            url: stream_url,
            duration_secs,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_video() {
        let json = br#"{
            "title": "Song A",
            "webpage_url": "https://www.youtube.com/watch?v=abc",
            "duration": 212.4,
            "url": "https://cdn.example/stream.webm"
        }"#;

        let track = parse_info(json, "song a").unwrap();
        assert_eq!(track.title, "Song A");
        assert_eq!(track.canonical_url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(track.duration_secs, 212);
        assert_eq!(track.stream.url, "https://cdn.example/stream.webm");
    }

    #[test]
    fn test_parse_search_takes_first_entry() {
        let json = br#"{
            "title": "ytsearch results",
            "entries": [
                {"title": "First", "url": "https://cdn.example/1", "duration": 60},
                {"title": "Second", "url": "https://cdn.example/2"}
            ]
        }"#;

        let track = parse_info(json, "first").unwrap();
        assert_eq!(track.title, "First");
        // Missing page URL falls back to the query
        assert_eq!(track.canonical_url, "first");
        assert_eq!(track.duration_secs, 60);
    }

    #[test]
    fn test_parse_empty_search() {
        let json = br#"{"entries": []}"#;
        assert_eq!(
            parse_info(json, "nothing"),
            Err(ResolveError::NotFound("nothing".to_string()))
        );
    }

    #[test]
    fn test_parse_defaults_for_missing_metadata() {
        let json = br#"{"url": "https://cdn.example/x"}"#;
        let track = parse_info(json, "x").unwrap();
        assert_eq!(track.title, "Unknown Title");
        assert_eq!(track.duration_secs, 0);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_info(b"not json", "q"),
            Err(ResolveError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp-binary");
        let result = resolver.resolve("anything").await;
        assert!(matches!(result, Err(ResolveError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_lookup_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("slow-yt-dlp");
        std::fs::write(&program, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = YtDlpResolver::new(program.to_string_lossy())
            .with_timeout(Duration::from_millis(200));
        let result = resolver.resolve("anything").await;
        assert!(matches!(result, Err(ResolveError::Timeout)));
    }
}
