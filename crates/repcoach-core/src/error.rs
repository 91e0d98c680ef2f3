//! Core error types for repcoach-core.
//!
//! This module defines the error hierarchy using thiserror. Plan errors
//! are fatal to session start; audio errors are never fatal -- they are
//! logged and degrade playback to silence.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for repcoach-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Plan validation errors
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Backend API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Audio delivery errors
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Errors raised while validating a workout plan.
///
/// All of these are construction-time failures: no session is created
/// from a plan that fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The routine exists but has no exercises
    #[error("Routine '{routine}' has no exercises")]
    EmptyPlan { routine: String },

    /// An exercise has a zero set count
    #[error("Exercise '{exercise}' has zero sets")]
    ZeroSets { exercise: String },
}

/// Errors from the backend REST collaborator.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("API request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected envelope
    #[error("Unexpected response shape from {endpoint}: {message}")]
    BadEnvelope { endpoint: String, message: String },

    /// The TTS endpoint returned no audio reference
    #[error("No audio URL returned for announcement")]
    MissingAudioUrl,

    /// Invalid base URL in configuration
    #[error("Invalid API base URL: {0}")]
    BadBaseUrl(#[from] url::ParseError),
}

/// Errors from the audio delivery chain.
///
/// These never propagate into session transitions; they terminate in the
/// engine's `Error` status after the fallback chain is exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// Download failed after all attempts
    #[error("Download failed after {attempts} attempts: {message}")]
    DownloadExhausted { attempts: u32, message: String },

    /// Downloaded payload is empty or implausibly small
    #[error("Audio payload too small: {size} bytes")]
    PayloadTooSmall { size: usize },

    /// Playback rejected by the environment (autoplay block)
    #[error("Playback rejected without a user gesture")]
    PlaybackRejected,

    /// Playback failed after manual retries and the decode fallback
    #[error("All playback attempts failed: {0}")]
    PlaybackExhausted(String),

    /// The backend player reported a failure
    #[error("Player backend error: {0}")]
    Backend(String),

    /// The referenced clip handle no longer exists (released)
    #[error("Clip handle released: {0}")]
    HandleReleased(uuid::Uuid),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to create the configuration directory
    #[error("Failed to create configuration directory {path}: {message}")]
    DirCreateFailed { path: PathBuf, message: String },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
