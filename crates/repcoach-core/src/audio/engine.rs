//! Announcement audio delivery engine.
//!
//! One engine per announcement. It owns that announcement's lifecycle
//! state and walks the delivery chain: materialize the remote reference
//! as a local clip, attempt guarded autoplay, retry element-style
//! playback on explicit user gestures, and fall back to raw-bytes decode
//! as a last resort. Exhausted playback degrades to a logged `Error`
//! status -- nothing here ever propagates a fault to the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::announce::AnnouncementKey;
use crate::audio::fetch::{cache_busted, ClipFetcher};
use crate::audio::player::AnnouncementPlayer;
use crate::audio::resource::{AudioStatus, DeliveryStage, PlaybackInput, PlaybackState};
use crate::audio::store::ClipStore;
use crate::error::AudioError;

/// Pause between user-triggered play retries.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub struct AudioEngine {
    key: AnnouncementKey,
    state: RwLock<PlaybackState>,
    /// Remote audio reference, once known.
    reference: RwLock<Option<String>>,
    store: Arc<RwLock<ClipStore>>,
    fetcher: Arc<ClipFetcher>,
    player: Arc<dyn AnnouncementPlayer>,
    retry_backoff: Duration,
    /// Set when this announcement is superseded or the session ends;
    /// in-flight loads become inert instead of committing stale clips.
    cancelled: AtomicBool,
}

impl AudioEngine {
    pub fn new(
        key: AnnouncementKey,
        store: Arc<RwLock<ClipStore>>,
        fetcher: Arc<ClipFetcher>,
        player: Arc<dyn AnnouncementPlayer>,
    ) -> Self {
        Self {
            key,
            state: RwLock::new(PlaybackState::new()),
            reference: RwLock::new(None),
            store,
            fetcher,
            player,
            retry_backoff: RETRY_BACKOFF,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Shrink the retry backoff (tests).
    pub fn set_retry_backoff(&mut self, backoff: Duration) {
        self.retry_backoff = backoff;
    }

    pub fn key(&self) -> &AnnouncementKey {
        &self.key
    }

    pub async fn status(&self) -> AudioStatus {
        self.state.read().await.status().clone()
    }

    /// True when autoplay was blocked and a user gesture is needed.
    pub async fn awaiting_gesture(&self) -> bool {
        self.state.read().await.awaiting_gesture()
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Resolve `reference` into a locally playable clip.
    ///
    /// On download failure the engine stays usable in streaming mode;
    /// the remote reference is retried at play time.
    pub async fn load(&self, reference: &str) {
        if self.cancelled.load(Ordering::Acquire) {
            return;
        }
        self.apply(PlaybackInput::LoadStarted).await;
        *self.reference.write().await = Some(reference.to_string());

        match self.fetcher.download(reference).await {
            Ok(bytes) => {
                if self.cancelled.load(Ordering::Acquire) {
                    // Superseded while downloading; drop the payload.
                    return;
                }
                self.store.write().await.insert(self.key.clone(), bytes);
                self.apply(PlaybackInput::ClipMaterialized).await;
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "clip materialization failed, streaming directly");
                self.apply(PlaybackInput::StreamingOnly).await;
            }
        }
    }

    /// Mark this announcement as unavailable (synthesis failed upstream).
    pub async fn mark_unavailable(&self, message: &str) {
        tracing::warn!(key = %self.key, message, "announcement unavailable");
        self.apply(PlaybackInput::LoadFailed(message.to_string()))
            .await;
    }

    // ── Playback ─────────────────────────────────────────────────────

    /// Guarded autoplay: one attempt, no retries. Rejection is expected
    /// (no user gesture yet) and surfaces as "tap to play", not an error.
    pub async fn autoplay(&self) {
        if self.state.read().await.is_terminal_error() {
            return;
        }
        match self.attempt_element_play().await {
            Ok(()) => self.apply(PlaybackInput::PlaybackStarted).await,
            Err(e) => {
                tracing::debug!(key = %self.key, error = %e, "autoplay blocked");
                self.apply(PlaybackInput::AutoplayBlocked).await;
            }
        }
    }

    /// User-triggered playback: up to three element-style attempts with
    /// backoff, then the raw-bytes decode fallback. Never returns an
    /// error -- terminal failure lands in the `Error` status.
    pub async fn play(&self) {
        if self.state.read().await.is_terminal_error() {
            return;
        }
        loop {
            if !self.state.read().await.can_retry_play() {
                break;
            }
            match self.attempt_element_play().await {
                Ok(()) => {
                    self.apply(PlaybackInput::PlaybackStarted).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "play attempt failed");
                    self.apply(PlaybackInput::PlayAttemptFailed(e.to_string()))
                        .await;
                }
            }
            if self.state.read().await.can_retry_play() {
                tokio::time::sleep(self.retry_backoff).await;
            }
        }
        self.decode_fallback().await;
    }

    /// Pause this announcement. The backend is only touched when this
    /// engine is the one playing, so a stale engine cannot silence
    /// another key's output.
    pub async fn pause(&self) {
        let playing = matches!(*self.state.read().await.status(), AudioStatus::Playing);
        if playing {
            self.player.pause();
        }
        self.apply(PlaybackInput::Paused).await;
    }

    /// The presentation adapter reports natural end of playback here.
    pub async fn playback_ended(&self) {
        self.apply(PlaybackInput::PlaybackEnded).await;
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Release this announcement's local clip and make in-flight loads
    /// inert. Other keys are unaffected.
    pub async fn release(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.store.write().await.release(&self.key);
        self.apply(PlaybackInput::Released).await;
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn apply(&self, input: PlaybackInput) {
        self.state.write().await.apply(input);
    }

    /// One element-style play attempt via the current delivery stage.
    async fn attempt_element_play(&self) -> Result<(), AudioError> {
        let stage = self.state.read().await.stage();
        if stage == DeliveryStage::LocalClip {
            if let Some(clip) = self.store.read().await.get(&self.key) {
                return self.player.play_clip(&clip);
            }
            // Handle was released under us; fall through to streaming.
        }
        let reference = self.reference.read().await.clone();
        match reference {
            Some(url) => self.player.play_remote(&cache_busted(&url)),
            None => Err(AudioError::Backend("no audio reference".into())),
        }
    }

    /// Last resort: decode raw bytes through the low-level audio path.
    async fn decode_fallback(&self) {
        let bytes = match self.store.read().await.get(&self.key) {
            Some(clip) => Some(clip.bytes().to_vec()),
            None => {
                // Clip gone -- re-fetch the raw payload once.
                let reference = self.reference.read().await.clone();
                match reference {
                    Some(url) => self.fetcher.download(&url).await.ok(),
                    None => None,
                }
            }
        };

        let Some(bytes) = bytes else {
            self.apply(PlaybackInput::DecodeFallbackFailed(
                "no audio bytes available".into(),
            ))
            .await;
            tracing::error!(key = %self.key, "all playback attempts failed; announcement degrades to silence");
            return;
        };

        match self.player.decode_and_play(&bytes) {
            Ok(()) => {
                tracing::debug!(key = %self.key, "decode fallback playing");
                self.apply(PlaybackInput::PlaybackStarted).await;
            }
            Err(e) => {
                self.apply(PlaybackInput::DecodeFallbackFailed(e.to_string()))
                    .await;
                tracing::error!(key = %self.key, error = %e, "decode fallback failed; announcement degrades to silence");
            }
        }
    }
}
