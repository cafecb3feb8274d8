use anyhow::Result;
use serenity::{
    model::{gateway::GatewayIntents, id::ApplicationId},
    Client,
};
use songbird::{SerenityInit, Songbird};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod jokes;
mod services;
mod storage;
mod ui;

use crate::audio::{
    voice::{CacheOccupancy, SongbirdGateway},
    AccessGuard, ClipLibrary, PlaybackScheduler,
};
use crate::bot::{JokeBot, Services};
use crate::config::Config;
use crate::jokes::RedditClient;
use crate::services::{ChatClient, SpeechClient};
use crate::storage::JsonStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jokebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎙️ Iniciando Jokebox v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config.audio_dir).await;
    }

    info!("{}", config.summary());

    let storage = Arc::new(tokio::sync::Mutex::new(
        JsonStorage::new(config.data_dir.clone()).await?,
    ));
    let clips = ClipLibrary::scan(&config.audio_dir).await?;

    // Voz: Songbird se crea antes que el cliente para compartirlo con el scheduler
    let songbird = Songbird::serenity();
    let voice = Arc::new(SongbirdGateway::new(songbird.clone()));
    let occupancy = Arc::new(CacheOccupancy::new());
    let guard = Arc::new(AccessGuard::new());
    let scheduler = PlaybackScheduler::new(
        guard,
        voice.clone(),
        occupancy.clone(),
        config.voice_timeouts(),
    );

    let http = reqwest::Client::new();
    let services = Services {
        reddit: RedditClient::new()?,
        chat: ChatClient::new(http.clone(), config.gpt_url.clone(), config.api_key.clone()),
        speech: SpeechClient::new(http, config.tts_url.clone(), config.api_key.clone()),
    };
    if !config.azure_enabled() {
        info!("🔇 Azure OpenAI sin configurar: /gpt y los comandos TTS fallarán");
    }

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES;

    let token = config.discord_token.clone();
    let application_id = config.application_id;
    let handler = JokeBot::new(config, storage, scheduler, voice, clips, services);

    let mut builder = Client::builder(&token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird);
    if let Some(id) = application_id {
        builder = builder.application_id(ApplicationId::new(id));
    }
    let mut client = builder.await?;

    occupancy.attach(client.cache.clone());

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check(audio_dir: &Path) -> Result<()> {
    let clips = ClipLibrary::scan(audio_dir).await?;

    if clips.is_empty() {
        anyhow::bail!("Ningún .mp3 en {}", audio_dir.display());
    }

    println!("OK");
    Ok(())
}
