//! Playback lifecycle state machine.
//!
//! The delivery chain (direct streaming, local materialization, guarded
//! autoplay, manual retries, decode fallback) involves several external
//! events arriving in awkward orders. Rather than a web of callbacks,
//! the lifecycle is a single state machine with one mutation entry point
//! (`apply`), so the whole retry/fallback chain is testable as pure
//! transitions. The async engine drives I/O and feeds inputs in.

use serde::{Deserialize, Serialize};

/// Manual play attempts before escalating to the decode fallback.
pub const MAX_PLAY_ATTEMPTS: u32 = 3;

/// Observable status of one announcement's audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AudioStatus {
    Unrequested,
    Loading,
    Ready,
    Playing,
    Paused,
    Error { message: String },
}

/// Which delivery stage playback would currently use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStage {
    /// Streaming straight from the remote reference.
    DirectStream,
    /// Playing a locally materialized clip.
    LocalClip,
    /// Raw-bytes decode path, the last resort.
    DecodeFallback,
}

/// External events that drive the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackInput {
    /// A load of the remote reference began.
    LoadStarted,
    /// Full payload downloaded and wrapped as a local clip.
    ClipMaterialized,
    /// Materialization failed but the remote reference is still usable
    /// for direct streaming.
    StreamingOnly,
    /// No usable reference at all.
    LoadFailed(String),
    /// The environment rejected playback without a user gesture.
    /// Expected, not fatal: surfaces "tap to play".
    AutoplayBlocked,
    /// Playback actually began.
    PlaybackStarted,
    /// A user-triggered play attempt failed.
    PlayAttemptFailed(String),
    /// The decode fallback also failed. Terminal for this announcement.
    DecodeFallbackFailed(String),
    PlaybackEnded,
    Paused,
    /// The clip handle was released (superseded or session end).
    Released,
}

/// Lifecycle state for one announcement's audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackState {
    status: AudioStatus,
    stage: DeliveryStage,
    /// Failed user-triggered play attempts since the last success.
    play_attempts: u32,
    /// Autoplay was blocked; a user gesture is needed.
    awaiting_gesture: bool,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self {
            status: AudioStatus::Unrequested,
            stage: DeliveryStage::DirectStream,
            play_attempts: 0,
            awaiting_gesture: false,
        }
    }

    pub fn status(&self) -> &AudioStatus {
        &self.status
    }

    pub fn stage(&self) -> DeliveryStage {
        self.stage
    }

    pub fn awaiting_gesture(&self) -> bool {
        self.awaiting_gesture
    }

    pub fn play_attempts(&self) -> u32 {
        self.play_attempts
    }

    /// Whether another element-style play attempt is allowed before the
    /// engine escalates to the decode fallback.
    pub fn can_retry_play(&self) -> bool {
        self.play_attempts < MAX_PLAY_ATTEMPTS
    }

    pub fn is_terminal_error(&self) -> bool {
        matches!(self.status, AudioStatus::Error { .. })
    }

    /// Single mutation entry point.
    pub fn apply(&mut self, input: PlaybackInput) {
        match input {
            PlaybackInput::LoadStarted => {
                self.status = AudioStatus::Loading;
                self.awaiting_gesture = false;
                self.play_attempts = 0;
            }
            PlaybackInput::ClipMaterialized => {
                self.status = AudioStatus::Ready;
                self.stage = DeliveryStage::LocalClip;
            }
            PlaybackInput::StreamingOnly => {
                self.status = AudioStatus::Ready;
                self.stage = DeliveryStage::DirectStream;
            }
            PlaybackInput::LoadFailed(message) => {
                self.status = AudioStatus::Error { message };
            }
            PlaybackInput::AutoplayBlocked => {
                // Not an error: the clip is ready, it just needs a tap.
                self.status = AudioStatus::Ready;
                self.awaiting_gesture = true;
            }
            PlaybackInput::PlaybackStarted => {
                self.status = AudioStatus::Playing;
                self.awaiting_gesture = false;
                self.play_attempts = 0;
            }
            PlaybackInput::PlayAttemptFailed(message) => {
                self.play_attempts += 1;
                if self.play_attempts >= MAX_PLAY_ATTEMPTS {
                    // Retries exhausted: the engine escalates to the
                    // decode fallback. Keep Ready so the UI stays usable.
                    self.stage = DeliveryStage::DecodeFallback;
                    self.status = AudioStatus::Ready;
                    let _ = message;
                } else {
                    self.status = AudioStatus::Ready;
                }
            }
            PlaybackInput::DecodeFallbackFailed(message) => {
                self.status = AudioStatus::Error { message };
            }
            PlaybackInput::PlaybackEnded => {
                self.status = AudioStatus::Ready;
            }
            PlaybackInput::Paused => {
                if self.status == AudioStatus::Playing {
                    self.status = AudioStatus::Paused;
                }
            }
            PlaybackInput::Released => {
                self.status = AudioStatus::Unrequested;
                self.stage = DeliveryStage::DirectStream;
                self.play_attempts = 0;
                self.awaiting_gesture = false;
            }
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}
