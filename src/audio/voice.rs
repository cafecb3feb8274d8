use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId, UserId},
};
use songbird::{
    error::JoinError,
    input::File,
    tracks::PlayMode,
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{
    collections::HashSet,
    path::Path,
    sync::{Arc, OnceLock},
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::request::VoiceTarget;

/// Operaciones de voz que necesita el scheduler.
///
/// `play` debe resolverse cuando el clip termina de sonar.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId>;

    async fn connect(&self, target: VoiceTarget) -> Result<()>;

    async fn move_to(&self, target: VoiceTarget) -> Result<()>;

    async fn play(&self, guild_id: GuildId, source: &Path) -> Result<()>;

    async fn disconnect(&self, guild_id: GuildId) -> Result<()>;
}

/// Usuarios humanos presentes en un canal de voz.
#[cfg_attr(test, mockall::automock)]
pub trait ChannelOccupancy: Send + Sync {
    fn occupants(&self, guild_id: GuildId, channel_id: ChannelId) -> HashSet<UserId>;
}

/// [`VoiceGateway`] sobre el gestor de Songbird.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }

    async fn join(&self, target: VoiceTarget) -> Result<()> {
        let call = self
            .manager
            .join(target.guild_id, target.channel_id)
            .await
            .map_err(|e| anyhow!("Error al conectar al canal de voz: {e:?}"))?;

        let mut handler = call.lock().await;
        if !handler.is_deaf() {
            if let Err(e) = handler.deafen(true).await {
                // No impide reproducir
                warn!("No se pudo ensordecer al bot: {:?}", e);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let call = self.manager.get(guild_id)?;
        let handler = call.lock().await;
        handler
            .current_channel()
            .map(|channel_id| ChannelId::from(channel_id.0))
    }

    async fn connect(&self, target: VoiceTarget) -> Result<()> {
        self.join(target).await?;
        info!(
            "🔊 Conectado al canal {} en guild {}",
            target.channel_id, target.guild_id
        );
        Ok(())
    }

    async fn move_to(&self, target: VoiceTarget) -> Result<()> {
        // join sobre una llamada existente cambia de canal
        self.join(target).await?;
        info!(
            "🔀 Movido al canal {} en guild {}",
            target.channel_id, target.guild_id
        );
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, source: &Path) -> Result<()> {
        let call = self
            .manager
            .get(guild_id)
            .ok_or_else(|| anyhow!("Sin conexión de voz en guild {guild_id}"))?;

        let (tx, rx) = oneshot::channel();
        let notifier = TrackEndNotifier::new(tx);

        let track = {
            let mut handler = call.lock().await;
            handler.stop();
            handler.play_input(File::new(source.to_path_buf()).into())
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            if let Err(e) = track.add_event(Event::Track(event), notifier.clone()) {
                debug!("La pista terminó antes de registrar eventos: {:?}", e);
                return Err(anyhow!(TRACK_DROPPED));
            }
        }

        let outcome = track_outcome(rx.await);
        if outcome.is_err() {
            warn!("🔌 La pista no terminó correctamente en guild {}", guild_id);
        }
        outcome
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<()> {
        match self.manager.remove(guild_id).await {
            Ok(()) => {
                info!("👋 Desconectado del canal de voz en guild {}", guild_id);
                Ok(())
            }
            Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(anyhow!("Error al desconectar: {e:?}")),
        }
    }
}

const TRACK_DROPPED: &str = "track dropped before finishing";

/// Traduce el aviso de fin de pista: sin aviso, la pista no terminó.
fn track_outcome(received: Result<Result<(), String>, oneshot::error::RecvError>) -> Result<()> {
    match received {
        Ok(Ok(())) => Ok(()),
        Ok(Err(cause)) => Err(anyhow!(cause)),
        Err(_) => Err(anyhow!(TRACK_DROPPED)),
    }
}

/// Avisa una sola vez cuando la pista termina o falla.
#[derive(Clone)]
struct TrackEndNotifier {
    tx: Arc<Mutex<Option<oneshot::Sender<Result<(), String>>>>>,
}

impl TrackEndNotifier {
    fn new(tx: oneshot::Sender<Result<(), String>>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let mut outcome = Ok(());
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    outcome = Err(format!("Error en la pista: {e:?}"));
                }
            }
        }

        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send(outcome);
        }

        Some(Event::Cancel)
    }
}

/// [`ChannelOccupancy`] leyendo los estados de voz de la caché de Serenity.
///
/// La caché se adjunta después de construir el cliente; hasta entonces el
/// canal se considera vacío.
#[derive(Default)]
pub struct CacheOccupancy {
    cache: OnceLock<Arc<Cache>>,
}

impl CacheOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, cache: Arc<Cache>) {
        if self.cache.set(cache).is_err() {
            warn!("La caché de ocupación ya estaba adjunta");
        }
    }
}

impl ChannelOccupancy for CacheOccupancy {
    fn occupants(&self, guild_id: GuildId, channel_id: ChannelId) -> HashSet<UserId> {
        let Some(cache) = self.cache.get() else {
            warn!("Caché no disponible, canal {} considerado vacío", channel_id);
            return HashSet::new();
        };

        let bot_id = cache.current_user().id;
        let Some(guild) = cache.guild(guild_id) else {
            return HashSet::new();
        };

        guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .filter(|state| state.user_id != bot_id)
            .filter(|state| {
                let is_bot = state
                    .member
                    .as_ref()
                    .map(|member| member.user.bot)
                    .or_else(|| guild.members.get(&state.user_id).map(|m| m.user.bot))
                    .unwrap_or(false);
                !is_bot
            })
            .map(|state| state.user_id)
            .collect()
    }
}
