use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Qué texto de configuración sobrescribe el servidor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideKind {
    /// Prompt de sistema de `/gpt`
    GptPrompt,
    /// Instrucciones de voz de `/say_vc`
    SayVcInstructions,
}

/// Textos temporales por servidor. Caducan tras `ttl` y se purgan al leerlos.
pub struct PromptOverrides {
    ttl: Duration,
    entries: DashMap<(GuildId, OverrideKind), (String, Instant)>,
}

impl PromptOverrides {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Reemplaza el texto y reinicia su vigencia.
    pub fn set(&self, guild_id: GuildId, kind: OverrideKind, text: impl Into<String>) -> Instant {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .insert((guild_id, kind), (text.into(), expires_at));

        info!("📝 {:?} actualizado para guild {}", kind, guild_id);
        expires_at
    }

    /// Texto vigente, si lo hay.
    pub fn current(&self, guild_id: GuildId, kind: OverrideKind) -> Option<String> {
        let key = (guild_id, kind);
        let now = Instant::now();

        if let Some(entry) = self.entries.get(&key) {
            let (text, expires_at) = entry.value();
            if *expires_at > now {
                return Some(text.clone());
            }
        }

        if self
            .entries
            .remove_if(&key, |_, (_, expires_at)| *expires_at <= now)
            .is_some()
        {
            debug!("⌛ {:?} caducado para guild {}", kind, guild_id);
        }
        None
    }

    pub fn resolve(&self, guild_id: GuildId, kind: OverrideKind, default: &str) -> String {
        self.current(guild_id, kind)
            .unwrap_or_else(|| default.to_string())
    }
}
