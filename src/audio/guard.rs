use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, info};

/// Vencimiento usado cuando `now + duration` no cabe en un `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 3600);

type ChannelKey = (GuildId, ChannelId);

/// Bloqueos temporales por canal de voz.
///
/// Cada usuario puede impedir que el bot entre en un canal concreto
/// mientras él esté dentro. Las entradas vencidas se eliminan al consultar
/// ese canal, no hay barrido periódico.
#[derive(Debug, Default)]
pub struct AccessGuard {
    blocks: DashMap<ChannelKey, HashMap<UserId, Instant>>,
}

impl AccessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bloquea (o renueva) al usuario en el canal. Devuelve el vencimiento.
    pub fn block(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        user_id: UserId,
        duration: Duration,
    ) -> Instant {
        let now = Instant::now();
        let expires_at = now
            .checked_add(duration)
            .unwrap_or_else(|| now + FAR_FUTURE);

        self.blocks
            .entry((guild_id, channel_id))
            .or_default()
            .insert(user_id, expires_at);

        info!(
            "🚫 Usuario {} bloquea el canal {} en guild {} durante {:?}",
            user_id, channel_id, guild_id, duration
        );
        expires_at
    }

    /// Quita el bloqueo. Devuelve `true` solo si había uno vigente.
    pub fn unblock(&self, guild_id: GuildId, channel_id: ChannelId, user_id: UserId) -> bool {
        let key = (guild_id, channel_id);
        let now = Instant::now();

        let removed = match self.blocks.get_mut(&key) {
            Some(mut users) => users
                .remove(&user_id)
                .is_some_and(|expires_at| expires_at > now),
            None => false,
        };
        self.blocks.remove_if(&key, |_, users| users.is_empty());

        if removed {
            info!(
                "✅ Usuario {} desbloquea el canal {} en guild {}",
                user_id, channel_id, guild_id
            );
        }
        removed
    }

    /// Usuarios de `candidates` que bloquean el canal ahora mismo, ordenados.
    pub fn blocking_users(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        candidates: &HashSet<UserId>,
    ) -> Vec<UserId> {
        let key = (guild_id, channel_id);
        let now = Instant::now();

        let mut blocking = match self.blocks.get_mut(&key) {
            Some(mut users) => {
                let before = users.len();
                users.retain(|_, expires_at| *expires_at > now);
                if users.len() < before {
                    debug!(
                        "🧹 {} bloqueos vencidos eliminados en canal {}",
                        before - users.len(),
                        channel_id
                    );
                }

                candidates
                    .iter()
                    .filter(|user_id| users.contains_key(user_id))
                    .copied()
                    .collect::<Vec<_>>()
            }
            None => Vec::new(),
        };
        self.blocks.remove_if(&key, |_, users| users.is_empty());

        blocking.sort();
        blocking
    }
}
