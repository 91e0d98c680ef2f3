//! Announcement audio download.
//!
//! Fetches the full byte payload of a remote audio reference so playback
//! does not depend on network availability afterwards. Flaky TTS hosting
//! makes single-shot fetches unreliable: each reference gets up to three
//! attempts with a growing per-attempt timeout (10s, 15s, 20s) and a
//! fresh cache-busting query string per attempt. Payloads are validated
//! before they are accepted -- an empty or truncated file is retried,
//! not cached.

use std::time::Duration;

use rand::Rng;
use url::Url;

use crate::error::AudioError;

/// Smallest payload accepted as plausibly-complete audio.
pub const MIN_PAYLOAD_BYTES: usize = 1000;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub max_attempts: u32,
    /// Timeout for the first attempt; grows by `timeout_step` per retry.
    pub attempt_timeout: Duration,
    pub timeout_step: Duration,
    /// Pause between attempts.
    pub retry_pause: Duration,
    pub min_payload_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            timeout_step: Duration::from_secs(5),
            retry_pause: Duration::from_secs(1),
            min_payload_bytes: MIN_PAYLOAD_BYTES,
        }
    }
}

/// Downloads remote announcement audio into memory.
#[derive(Debug, Clone)]
pub struct ClipFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl ClipFetcher {
    pub fn new() -> Self {
        Self::with_config(FetchConfig::default())
    }

    pub fn with_config(config: FetchConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Download the full payload at `reference`.
    ///
    /// Returns the validated bytes, or `DownloadExhausted` once every
    /// attempt has failed.
    pub async fn download(&self, reference: &str) -> Result<Vec<u8>, AudioError> {
        let mut last_error = String::new();

        for attempt in 0..self.config.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_pause).await;
            }

            let url = cache_busted(reference);
            let timeout = self.config.attempt_timeout + self.config.timeout_step * attempt;
            tracing::debug!(attempt = attempt + 1, %url, ?timeout, "downloading announcement audio");

            match tokio::time::timeout(timeout, self.fetch_once(&url)).await {
                Ok(Ok(bytes)) => return Ok(bytes),
                Ok(Err(e)) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "audio download attempt failed");
                    last_error = e.to_string();
                }
                Err(_) => {
                    tracing::warn!(attempt = attempt + 1, ?timeout, "audio download timed out");
                    last_error = format!("timed out after {:?}", timeout);
                }
            }
        }

        Err(AudioError::DownloadExhausted {
            attempts: self.config.max_attempts,
            message: last_error,
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, AudioError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AudioError::Backend(format!(
                "download failed with status {}",
                response.status()
            )));
        }

        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("audio/") && !content_type.contains("application/octet-stream")
            {
                tracing::warn!(content_type, "unexpected content type for announcement audio");
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        if bytes.len() < self.config.min_payload_bytes {
            return Err(AudioError::PayloadTooSmall { size: bytes.len() });
        }

        Ok(bytes.to_vec())
    }
}

impl Default for ClipFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Append cache-busting `t` (timestamp) and `r` (random) parameters.
///
/// Applies only to remote http(s) references. Anything else -- already a
/// local resource -- is returned unchanged.
pub fn cache_busted(reference: &str) -> String {
    if !reference.starts_with("http://") && !reference.starts_with("https://") {
        return reference.to_string();
    }
    let Ok(mut url) = Url::parse(reference) else {
        return reference.to_string();
    };
    let t = chrono::Utc::now().timestamp_millis();
    let r: u32 = rand::thread_rng().gen_range(0..1_000_000);
    url.query_pairs_mut()
        .append_pair("t", &t.to_string())
        .append_pair("r", &r.to_string());
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> FetchConfig {
        FetchConfig {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(5),
            timeout_step: Duration::from_secs(0),
            retry_pause: Duration::from_millis(0),
            min_payload_bytes: 100,
        }
    }

    #[test]
    fn cache_buster_applies_to_remote_urls_only() {
        let busted = cache_busted("https://cdn.example.com/audio.mp3?v=1");
        assert!(busted.contains("v=1"));
        assert!(busted.contains("t="));
        assert!(busted.contains("r="));

        // Local references pass through untouched.
        assert_eq!(cache_busted("clip:6a1f"), "clip:6a1f");
    }

    #[test]
    fn cache_buster_varies_between_calls() {
        let a = cache_busted("https://cdn.example.com/audio.mp3");
        let b = cache_busted("https://cdn.example.com/audio.mp3");
        // Random component makes collisions vanishingly unlikely.
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn download_succeeds_on_first_attempt() {
        let mut server = mockito::Server::new_async().await;
        let body = vec![0u8; 4096];
        let mock = server
            .mock("GET", "/clip.mp3")
            .match_query(mockito::Matcher::Any)
            .with_header("content-type", "audio/mpeg")
            .with_body(body.clone())
            .create_async()
            .await;

        let fetcher = ClipFetcher::with_config(quick_config());
        let got = fetcher
            .download(&format!("{}/clip.mp3", server.url()))
            .await
            .unwrap();

        assert_eq!(got, body);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn truncated_payload_is_retried() {
        let mut server = mockito::Server::new_async().await;
        // First attempt: implausibly small file.
        let small = server
            .mock("GET", "/clip.mp3")
            .match_query(mockito::Matcher::Any)
            .with_body(vec![0u8; 10])
            .expect(1)
            .create_async()
            .await;
        let full = server
            .mock("GET", "/clip.mp3")
            .match_query(mockito::Matcher::Any)
            .with_body(vec![1u8; 2048])
            .expect(1)
            .create_async()
            .await;

        let fetcher = ClipFetcher::with_config(quick_config());
        let got = fetcher
            .download(&format!("{}/clip.mp3", server.url()))
            .await
            .unwrap();

        assert_eq!(got.len(), 2048);
        small.assert_async().await;
        full.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_attempts_surface_download_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/clip.mp3")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let fetcher = ClipFetcher::with_config(quick_config());
        let err = fetcher
            .download(&format!("{}/clip.mp3", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AudioError::DownloadExhausted { attempts: 3, .. }
        ));
        mock.assert_async().await;
    }
}
