use serenity::model::id::{ChannelId, GuildId};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{PlaybackError, VoiceStage};

/// Resultado que recibe quien envió la petición.
pub type PlaybackOutcome = Result<(), PlaybackError>;

/// Audio listo para reproducir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Archivo existente (clips de `AUDIO_DIR`), nunca se borra
    Stored(PathBuf),
    /// Archivo generado por el bot (TTS); se elimina después de reproducirlo
    Temporary(PathBuf),
}

impl AudioSource {
    pub fn path(&self) -> &Path {
        match self {
            AudioSource::Stored(path) | AudioSource::Temporary(path) => path,
        }
    }
}

/// Canal de voz destino.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceTarget {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

impl VoiceTarget {
    pub fn new(guild_id: GuildId, channel_id: ChannelId) -> Self {
        Self {
            guild_id,
            channel_id,
        }
    }
}

/// Unidad de trabajo del scheduler: un audio y el canal donde sonará.
#[derive(Debug)]
pub struct PlaybackRequest {
    pub source: AudioSource,
    pub target: VoiceTarget,
    pub(crate) completion: oneshot::Sender<PlaybackOutcome>,
}

impl PlaybackRequest {
    /// Crea la petición junto con el ticket que resolverá el worker.
    pub fn new(source: AudioSource, target: VoiceTarget) -> (Self, PlaybackTicket) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            source,
            target,
            completion: tx,
        };
        (request, PlaybackTicket { rx })
    }
}

/// Lado del solicitante de una [`PlaybackRequest`].
///
/// Soltar el ticket antes de que la petición llegue al frente de la cola
/// hace que el worker la descarte sin tocar la conexión de voz.
#[derive(Debug)]
pub struct PlaybackTicket {
    rx: oneshot::Receiver<PlaybackOutcome>,
}

impl PlaybackTicket {
    pub async fn wait(self) -> PlaybackOutcome {
        self.rx.await.unwrap_or_else(|_| {
            Err(PlaybackError::PlaybackFailed {
                cause: "playback queue closed without settling the request".to_string(),
            })
        })
    }

    /// Espera como mucho `limit`. Si vence, el ticket se suelta y la
    /// petición queda abandonada en la cola.
    pub async fn wait_timeout(self, limit: Duration) -> PlaybackOutcome {
        match tokio::time::timeout(limit, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!("⌛ Ticket abandonado tras {:?}", limit);
                Err(PlaybackError::Timeout {
                    stage: VoiceStage::Queue,
                })
            }
        }
    }
}
