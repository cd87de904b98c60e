//! Speech synthesis.
//!
//! [`VoicevoxClient`] talks to a VOICEVOX engine over its REST API:
//! - `POST /audio_query` builds a synthesis query for a text and style id
//! - the query's scales are overridden from the character's voice
//! - `POST /synthesis` turns the query into a WAV
//! - `POST /user_dict_word` registers a pronunciation override
//!
//! Connection failures, timeouts, 429 and 5xx responses are reported as
//! transient so the pipeline's retry policy can try again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};

use talkreel_media::AudioClip;
use talkreel_models::{CharacterProfile, UserDictWord, UserDictionary};

use crate::error::{PipelineError, PipelineResult};

/// Produces speech for one line of dialogue.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, character: &CharacterProfile) -> PipelineResult<AudioClip>;

    /// Register pronunciation overrides before any line is synthesized.
    ///
    /// Returns how many words the engine accepted. Engines without a user
    /// dictionary accept none.
    async fn register_user_dict(&self, _dict: &UserDictionary) -> PipelineResult<usize> {
        Ok(0)
    }
}

/// VOICEVOX engine client.
#[derive(Debug, Clone)]
pub struct VoicevoxClient {
    http: Client,
    base_url: String,
}

impl VoicevoxClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("talkreel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn audio_query(&self, text: &str, speaker: u32) -> PipelineResult<Value> {
        let response = self
            .http
            .post(format!("{}/audio_query", self.base_url))
            .query(&[("text", text.to_string()), ("speaker", speaker.to_string())])
            .send()
            .await
            .map_err(request_error)?;

        let response = check_status(response, "audio_query").await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::synthesis_fatal(format!("invalid audio_query response: {}", e)))
    }

    async fn add_user_dict_word(&self, word: &UserDictWord) -> PipelineResult<()> {
        let response = self
            .http
            .post(format!("{}/user_dict_word", self.base_url))
            .query(word)
            .send()
            .await
            .map_err(request_error)?;

        check_status(response, "user_dict_word").await?;
        Ok(())
    }

    async fn synthesis(&self, query: &Value, speaker: u32) -> PipelineResult<Vec<u8>> {
        let response = self
            .http
            .post(format!("{}/synthesis", self.base_url))
            .query(&[("speaker", speaker.to_string())])
            .json(query)
            .send()
            .await
            .map_err(request_error)?;

        let response = check_status(response, "synthesis").await?;
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for VoicevoxClient {
    async fn synthesize(&self, text: &str, character: &CharacterProfile) -> PipelineResult<AudioClip> {
        let span = info_span!("voicevox", speaker = %character.name, style_id = character.speaker_id);

        async {
            let mut query = self.audio_query(text, character.speaker_id).await?;
            apply_voice(&mut query, character)?;

            let wav = self.synthesis(&query, character.speaker_id).await?;
            let clip = AudioClip::from_wav_bytes(&wav)
                .map_err(|e| PipelineError::synthesis_fatal(format!("undecodable audio: {}", e)))?;

            if clip.is_empty() {
                return Err(PipelineError::synthesis_fatal("engine returned empty audio"));
            }

            debug!(
                samples = clip.len(),
                sample_rate = clip.sample_rate(),
                duration_secs = clip.duration_secs(),
                "Synthesized speech"
            );
            Ok(clip)
        }
        .instrument(span)
        .await
    }

    /// A word the engine rejects is logged and skipped.
    async fn register_user_dict(&self, dict: &UserDictionary) -> PipelineResult<usize> {
        let mut registered = 0;
        for word in &dict.words {
            match self.add_user_dict_word(word).await {
                Ok(()) => {
                    debug!(surface = %word.surface, pronunciation = %word.pronunciation, "Registered user dictionary word");
                    registered += 1;
                }
                Err(e) => warn!(surface = %word.surface, error = %e, "Failed to register user dictionary word"),
            }
        }

        info!(registered = registered, total = dict.len(), "User dictionary registered");
        Ok(registered)
    }
}

/// Override the query's scales with the character's voice.
fn apply_voice(query: &mut Value, character: &CharacterProfile) -> PipelineResult<()> {
    let object = query
        .as_object_mut()
        .ok_or_else(|| PipelineError::synthesis_fatal("audio_query did not return an object"))?;

    let voice = &character.voice;
    for (key, value) in [
        ("speedScale", voice.speed_scale),
        ("pitchScale", voice.pitch_scale),
        ("intonationScale", voice.intonation_scale),
        ("volumeScale", voice.volume_scale),
    ] {
        object.insert(key.to_string(), Value::from(value as f64));
    }
    Ok(())
}

fn request_error(e: reqwest::Error) -> PipelineError {
    if e.is_builder() {
        PipelineError::synthesis_fatal(e.to_string())
    } else {
        PipelineError::synthesis_transient(e.to_string())
    }
}

async fn check_status(response: reqwest::Response, endpoint: &str) -> PipelineResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{} returned {}: {}", endpoint, status, body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(PipelineError::synthesis_transient(message))
    } else {
        Err(PipelineError::synthesis_fatal(message))
    }
}
