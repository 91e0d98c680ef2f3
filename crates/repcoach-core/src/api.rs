//! HTTP client for the workout backend.
//!
//! Thin typed wrapper over the REST API: routine/exercise reads plus the
//! two TTS synthesis endpoints the announcement resolver uses. Responses
//! arrive in single-field envelopes (`{"routines": [...]}` and friends).

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::error::ApiError;
use crate::plan::{ExerciseRecord, Routine};

const USER_AGENT: &str = concat!("repcoach/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
struct RoutinesEnvelope {
    routines: Vec<Routine>,
}

#[derive(Deserialize)]
struct RoutineEnvelope {
    routine: Routine,
}

#[derive(Deserialize)]
struct ExercisesEnvelope {
    exercises: Vec<ExerciseRecord>,
}

#[derive(Deserialize)]
struct AudioUrlEnvelope {
    #[serde(default)]
    audio_url: Option<String>,
}

impl ApiClient {
    /// `base_url` should point at the API root, e.g.
    /// `http://localhost:5002/api`.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| ApiError::BadEnvelope {
                endpoint: path.to_string(),
                message: "base URL cannot be a base".to_string(),
            })?;
            segments.pop_if_empty();
            for part in path.split('/') {
                segments.push(part);
            }
        }
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            url,
            status: status.as_u16(),
            body,
        })
    }

    pub async fn list_routines(&self) -> Result<Vec<Routine>, ApiError> {
        let url = self.endpoint("routines")?;
        let response = Self::check(self.client.get(url).send().await?).await?;
        let envelope: RoutinesEnvelope = response.json().await?;
        Ok(envelope.routines)
    }

    /// `Ok(None)` when the routine does not exist.
    pub async fn fetch_routine(&self, routine_id: &str) -> Result<Option<Routine>, ApiError> {
        let url = self.endpoint(&format!("routines/{routine_id}"))?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        let envelope: RoutineEnvelope = response.json().await?;
        Ok(Some(envelope.routine))
    }

    /// All exercise records attached to a routine, in backend order.
    pub async fn fetch_exercises(&self, routine_id: &str) -> Result<Vec<ExerciseRecord>, ApiError> {
        let mut url = self.endpoint("exercises")?;
        url.query_pairs_mut().append_pair("routine_id", routine_id);
        let response = Self::check(self.client.get(url).send().await?).await?;
        let envelope: ExercisesEnvelope = response.json().await?;
        Ok(envelope.exercises)
    }

    /// Ask the backend to synthesize the routine's intro narration.
    pub async fn request_intro_audio(&self, routine_id: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&format!("routines/{routine_id}/generate-intro"))?;
        let response = Self::check(self.client.post(url).send().await?).await?;
        let envelope: AudioUrlEnvelope = response.json().await?;
        envelope.audio_url.ok_or(ApiError::MissingAudioUrl)
    }

    /// Ask the backend to synthesize one announcement line.
    pub async fn request_announcement_audio(&self, text: &str) -> Result<String, ApiError> {
        let url = self.endpoint("announcements/generate")?;
        let response = Self::check(
            self.client
                .post(url)
                .json(&serde_json::json!({ "text": text }))
                .send()
                .await?,
        )
        .await?;
        let envelope: AudioUrlEnvelope = response.json().await?;
        envelope.audio_url.ok_or(ApiError::MissingAudioUrl)
    }
}
