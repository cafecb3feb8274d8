use serenity::model::id::UserId;
use std::{fmt, path::PathBuf};
use thiserror::Error;

/// Etapa de la sesión de voz en la que se agotó el tiempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStage {
    /// Esperando turno en la cola del servidor
    Queue,
    /// Conexión o cambio de canal
    Connect,
    /// Reproducción del clip
    Play,
    /// Desconexión al terminar
    Disconnect,
}

impl fmt::Display for VoiceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceStage::Queue => "queue",
            VoiceStage::Connect => "connect",
            VoiceStage::Play => "play",
            VoiceStage::Disconnect => "disconnect",
        };
        f.write_str(name)
    }
}

/// Resultado fallido de una petición de reproducción.
///
/// Todas las variantes son terminales para la petición que las produjo y
/// solo se comunican a través de su ticket; ninguna detiene el worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// Alguien presente en el canal bloqueó al bot
    #[error("blocked by {} user(s) in the target channel", .users.len())]
    Blocked { users: Vec<UserId> },

    #[error("voice playback failed: {cause}")]
    PlaybackFailed { cause: String },

    #[error("voice {stage} timed out")]
    Timeout { stage: VoiceStage },

    #[error("audio source not found: {}", .path.display())]
    SourceMissing { path: PathBuf },
}

/// Errores de los clientes HTTP (Reddit, chat y TTS).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response had no usable content")]
    EmptyReply,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
