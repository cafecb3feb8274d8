//! # Bot Module
//!
//! Discord event handling for Jokebox.
//!
//! [`JokeBot`] implements Serenity's [`EventHandler`]. Every audio command
//! goes through the [`PlaybackScheduler`], which serializes voice usage per
//! guild and honors the channel blocks kept by the [`AccessGuard`].

use anyhow::Result;
use serenity::{
    all::{ActivityData, Context, EventHandler, GuildId, Interaction, Ready},
    async_trait,
    builder::{CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod overrides;

use crate::{
    audio::{voice::SongbirdGateway, AccessGuard, ClipLibrary, PlaybackScheduler},
    config::Config,
    jokes::{JokeBook, RedditClient},
    services::{ChatClient, SpeechClient},
    storage::JsonStorage,
    ui::embeds::create_error_embed,
};
use overrides::PromptOverrides;

const JOKE_PRELOAD_DELAY: Duration = Duration::from_secs(2);

/// Main Discord handler.
///
/// Shared state is behind [`Arc`]: the joke book is swapped in by the
/// background preload while commands keep reading it.
pub struct JokeBot {
    config: Arc<Config>,
    pub storage: Arc<tokio::sync::Mutex<JsonStorage>>,
    pub scheduler: PlaybackScheduler,
    pub guard: Arc<AccessGuard>,
    pub voice: Arc<SongbirdGateway>,
    pub overrides: PromptOverrides,
    pub clips: ClipLibrary,
    pub jokes: Arc<parking_lot::RwLock<JokeBook>>,
    reddit: Arc<RedditClient>,
    pub chat: ChatClient,
    pub speech: SpeechClient,
    jokes_requested: AtomicBool,
}

/// Servicios externos del bot.
pub struct Services {
    pub reddit: RedditClient,
    pub chat: ChatClient,
    pub speech: SpeechClient,
}

impl JokeBot {
    pub fn new(
        config: Config,
        storage: Arc<tokio::sync::Mutex<JsonStorage>>,
        scheduler: PlaybackScheduler,
        voice: Arc<SongbirdGateway>,
        clips: ClipLibrary,
        services: Services,
    ) -> Self {
        let overrides = PromptOverrides::new(config.override_ttl);

        Self {
            config: Arc::new(config),
            storage,
            guard: scheduler.guard().clone(),
            scheduler,
            voice,
            overrides,
            clips,
            jokes: Arc::new(parking_lot::RwLock::new(JokeBook::default())),
            reddit: Arc::new(services.reddit),
            chat: services.chat,
            speech: services.speech,
            jokes_requested: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Descarga los chistes en segundo plano, una sola vez por proceso.
    fn preload_jokes(&self) {
        if self.jokes_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        let reddit = self.reddit.clone();
        let jokes = self.jokes.clone();
        let subreddits = self.config.joke_subreddits.clone();
        let posts_per_sub = self.config.joke_posts_per_sub;
        let max_len = self.config.joke_max_length;

        tokio::spawn(async move {
            tokio::time::sleep(JOKE_PRELOAD_DELAY).await;
            info!("📥 Precargando chistes de {} subreddits", subreddits.len());

            let mut posts = Vec::new();
            for subreddit in &subreddits {
                posts.extend(reddit.fetch_top(subreddit, posts_per_sub).await);
            }

            let book = JokeBook::from_posts(posts, max_len);
            if book.is_empty() {
                warn!("⚠️ No se pudo cargar ningún chiste");
            }
            *jokes.write() = book;
        });
    }
}

#[async_trait]
impl EventHandler for JokeBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        ctx.set_activity(Some(ActivityData::playing("Tape /help")));
        self.preload_jokes();
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        if let Err(e) = handlers::handle_command(&ctx, &command, self).await {
            error!("Error manejando comando /{}: {:?}", command.data.name, e);

            // La interacción puede estar ya respondida (defer): probar ambas vías
            let embed = create_error_embed("Erreur dans la commande", &e.to_string());
            let response = CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed.clone())
                    .ephemeral(true),
            );
            if command.create_response(&ctx.http, response).await.is_err() {
                let followup = CreateInteractionResponseFollowup::new()
                    .embed(embed)
                    .ephemeral(true);
                if let Err(e) = command.create_followup(&ctx.http, followup).await {
                    warn!("No se pudo notificar el error al usuario: {:?}", e);
                }
            }
        }
    }
}
