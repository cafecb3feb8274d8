use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, info};

use super::ensure_success;
use crate::{audio::AudioSource, error::ServiceError};

const TTS_TIMEOUT: Duration = Duration::from_secs(15);
const TTS_MODEL: &str = "gpt-4o-mini-tts";

/// Cliente del endpoint de síntesis de voz.
///
/// Cada síntesis produce un `.mp3` temporal que pasa a ser responsabilidad
/// del scheduler (lo borra tras reproducirlo).
#[derive(Clone)]
pub struct SpeechClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl SpeechClient {
    pub fn new(http: reqwest::Client, url: String, api_key: String) -> Self {
        Self { http, url, api_key }
    }

    pub async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        instructions: &str,
    ) -> Result<AudioSource, ServiceError> {
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&speech_body(text, voice, instructions))
            .timeout(TTS_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                error!("Error de red con el TTS: {}", e);
                ServiceError::from(e)
            })?;

        let audio = ensure_success(response).await?.bytes().await?;
        if audio.is_empty() {
            return Err(ServiceError::EmptyReply);
        }

        let file = tempfile::Builder::new()
            .prefix("jokebox-tts-")
            .suffix(".mp3")
            .tempfile()?;
        tokio::fs::write(file.path(), &audio).await?;
        let path = file.into_temp_path().keep().map_err(|e| e.error)?;

        info!("🗣️ Audio TTS generado en {}", path.display());
        Ok(AudioSource::Temporary(path))
    }
}

fn speech_body(text: &str, voice: &str, instructions: &str) -> Value {
    json!({
        "input": text,
        "model": TTS_MODEL,
        "voice": voice,
        "response_format": "mp3",
        "speed": 1.0,
        "instructions": instructions
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_speech_body() {
        let body = speech_body("Bonjour", "alloy", "Parle lentement");

        assert_eq!(
            body,
            json!({
                "input": "Bonjour",
                "model": "gpt-4o-mini-tts",
                "voice": "alloy",
                "response_format": "mp3",
                "speed": 1.0,
                "instructions": "Parle lentement"
            })
        );
    }
}
