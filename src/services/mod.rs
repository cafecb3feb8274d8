//! Clientes de Azure OpenAI: chat (GPT) y síntesis de voz (TTS).
//!
//! Ambos se autentican con la cabecera `api-key`.

pub mod chat;
pub mod speech;

pub use chat::ChatClient;
pub use speech::SpeechClient;

use crate::error::ServiceError;

/// Convierte una respuesta no exitosa en [`ServiceError::Status`].
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status { status, body })
}
