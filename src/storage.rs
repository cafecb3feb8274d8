use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// Voces aceptadas por el endpoint de TTS.
pub const TTS_VOICES: &[&str] = &[
    "alloy", "ash", "ballad", "coral", "echo", "fable", "nova", "onyx", "sage", "shimmer",
];

/// Configuración de servidor almacenada en JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub guild_id: u64,
    /// Duración por defecto de `/block`; `None` usa la global
    #[serde(default)]
    pub block_duration_secs: Option<u64>,
    /// Voz de `/say_vc`; `None` usa la global
    #[serde(default)]
    pub tts_voice: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ServerConfig {
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            block_duration_secs: None,
            tts_voice: None,
            updated_at: Utc::now(),
        }
    }

    pub fn block_duration(&self, fallback: Duration) -> Duration {
        self.block_duration_secs
            .map(Duration::from_secs)
            .unwrap_or(fallback)
    }

    pub fn voice<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.tts_voice.as_deref().unwrap_or(fallback)
    }
}

/// Manager de almacenamiento basado en archivos JSON
pub struct JsonStorage {
    data_dir: PathBuf,
    servers_cache: HashMap<u64, ServerConfig>,
}

impl JsonStorage {
    pub async fn new(data_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(data_dir.join("servers")).await?;
        info!("📁 Storage inicializado en: {}", data_dir.display());

        let mut storage = Self {
            data_dir,
            servers_cache: HashMap::new(),
        };
        storage.load_all_servers().await?;

        Ok(storage)
    }

    /// Obtiene la configuración de un servidor, creándola si no existe.
    pub async fn get_server_config(&mut self, guild_id: u64) -> Result<ServerConfig> {
        if let Some(config) = self.servers_cache.get(&guild_id) {
            return Ok(config.clone());
        }

        // Solo un archivo ausente se reemplaza; uno ilegible se reporta tal cual
        let config = match self.load_server_config(guild_id).await {
            Ok(config) => config,
            Err(e) if !is_not_found(&e) => return Err(e),
            Err(_) => {
                let config = ServerConfig::new(guild_id);
                self.save_server_config(&config).await?;
                info!("📝 Configuración por defecto creada para guild {}", guild_id);
                config
            }
        };

        self.servers_cache.insert(guild_id, config.clone());
        Ok(config)
    }

    pub async fn update_server_config(&mut self, mut config: ServerConfig) -> Result<()> {
        config.updated_at = Utc::now();
        self.save_server_config(&config).await?;

        info!("💾 Configuración actualizada para guild {}", config.guild_id);
        self.servers_cache.insert(config.guild_id, config);
        Ok(())
    }

    pub async fn set_block_duration(&mut self, guild_id: u64, duration: Duration) -> Result<()> {
        let mut config = self.get_server_config(guild_id).await?;
        config.block_duration_secs = Some(duration.as_secs());
        self.update_server_config(config).await
    }

    pub async fn set_tts_voice(&mut self, guild_id: u64, voice: &str) -> Result<()> {
        if !TTS_VOICES.contains(&voice) {
            anyhow::bail!("Voix inconnue : {voice}");
        }

        let mut config = self.get_server_config(guild_id).await?;
        config.tts_voice = Some(voice.to_string());
        self.update_server_config(config).await
    }

    pub fn list_servers(&self) -> Vec<u64> {
        let mut guilds: Vec<u64> = self.servers_cache.keys().copied().collect();
        guilds.sort_unstable();
        guilds
    }

    async fn load_server_config(&self, guild_id: u64) -> Result<ServerConfig> {
        let content = fs::read_to_string(self.server_file_path(guild_id)).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_server_config(&self, config: &ServerConfig) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(self.server_file_path(config.guild_id), content).await?;
        Ok(())
    }

    async fn load_all_servers(&mut self) -> Result<()> {
        let mut files = fs::read_dir(self.data_dir.join("servers")).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let guild_id = path
                .file_stem()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok());
            let Some(guild_id) = guild_id else {
                continue;
            };

            match self.load_server_config(guild_id).await {
                Ok(config) => {
                    self.servers_cache.insert(guild_id, config);
                    loaded_count += 1;
                }
                Err(e) => {
                    warn!("Error cargando configuración para guild {}: {}", guild_id, e);
                }
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} configuraciones de servidor", loaded_count);
        }
        Ok(())
    }

    fn server_file_path(&self, guild_id: u64) -> PathBuf {
        self.data_dir
            .join("servers")
            .join(format!("guild_{}.json", guild_id))
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
}
