use anyhow::{anyhow, Result};
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::time::Duration;
use tracing::{info, warn};

use crate::{
    audio::{
        voice::VoiceGateway, AudioSource, PlaybackOutcome, PlaybackRequest, VoiceTarget,
    },
    bot::{overrides::OverrideKind, JokeBot},
    error::{PlaybackError, VoiceStage},
    jokes::speakable,
    ui::embeds,
};

const JOKE_VOICE: &str = "ash";
const JOKE_INSTRUCTIONS: &str =
    "Read this joke with a comic tone, as if you are a stand-up comedian.";
const ALT_VOICE: &str = "alloy";
const GPT_READ_INSTRUCTIONS: &str =
    "Lis la réponse comme un assistant vocal naturel avec un ton informatif.";
/// Caracteres de la respuesta de GPT que se leen en voz alta
const GPT_SPOKEN_CHARS: usize = 500;

const NOT_IN_VOICE: &str = "Vous devez être dans un salon vocal pour faire cela.";

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow!("Commande utilisable uniquement sur un serveur"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "ping" => reply(ctx, command, "Pong !", false).await?,
        "jokeqc" => handle_jokeqc(ctx, command, bot, guild_id).await?,
        "special" => handle_special(ctx, command, bot, guild_id).await?,
        "joke" => handle_joke(ctx, command, bot, guild_id).await?,
        "say_tc" => handle_say_tc(ctx, command).await?,
        "say_vc" => handle_say_vc(ctx, command, bot, guild_id).await?,
        "say_vc_alt" => handle_say_vc_alt(ctx, command, bot, guild_id).await?,
        "say_vc_instructions" => {
            handle_override(ctx, command, bot, guild_id, OverrideKind::SayVcInstructions).await?
        }
        "gpt" => handle_gpt(ctx, command, bot, guild_id).await?,
        "gpt_prompt" => {
            handle_override(ctx, command, bot, guild_id, OverrideKind::GptPrompt).await?
        }
        "block" => handle_block(ctx, command, bot, guild_id).await?,
        "unblock" => handle_unblock(ctx, command, bot, guild_id).await?,
        "leave" => handle_leave(ctx, command, bot, guild_id).await?,
        "help" => handle_help(ctx, command).await?,
        "config" => handle_config(ctx, command, bot, guild_id).await?,
        _ => reply(ctx, command, "❌ Commande inconnue", true).await?,
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_jokeqc(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, NOT_IN_VOICE, true).await;
    };

    let clip = bot
        .clips
        .random(&mut rand::thread_rng())
        .map(|path| path.to_path_buf());
    let Some(clip) = clip else {
        return reply(ctx, command, "❌ Aucun fichier audio disponible.", true).await;
    };

    defer(ctx, command).await?;
    let outcome = play_and_wait(
        bot,
        AudioSource::Stored(clip),
        VoiceTarget::new(guild_id, channel_id),
    )
    .await;

    edit(ctx, command, outcome_message(&outcome, "🎙️ Blague québécoise jouée !")).await
}

async fn handle_special(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, NOT_IN_VOICE, true).await;
    };

    defer(ctx, command).await?;
    let clip = bot.clips.named(&bot.config().special_sound);
    let outcome = play_and_wait(
        bot,
        AudioSource::Stored(clip),
        VoiceTarget::new(guild_id, channel_id),
    )
    .await;

    edit(ctx, command, outcome_message(&outcome, "🔊 Son spécial joué !")).await
}

async fn handle_joke(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, "Vous devez être dans un vocal pour entendre la blague.", true)
            .await;
    };

    let joke = bot.jokes.read().pick(&mut rand::thread_rng()).cloned();
    let Some(joke) = joke else {
        return reply(
            ctx,
            command,
            "Aucune blague disponible pour le moment, réessaie dans quelques secondes.",
            true,
        )
        .await;
    };

    defer(ctx, command).await?;
    let source = match bot
        .speech
        .synthesize(&speakable(&joke.text), JOKE_VOICE, JOKE_INSTRUCTIONS)
        .await
    {
        Ok(source) => source,
        Err(e) => {
            warn!("Error generando el TTS del chiste: {}", e);
            return edit(ctx, command, "❌ Erreur lors de la génération audio de la blague.").await;
        }
    };

    let outcome = play_and_wait(bot, source, VoiceTarget::new(guild_id, channel_id)).await;
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new()
                .content(outcome_message(&outcome, "😂 Blague jouée !"))
                .embed(embeds::create_joke_embed(&joke)),
        )
        .await?;

    Ok(())
}

async fn handle_say_tc(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let message = string_option(command, "message")?;
    reply(ctx, command, message, false).await
}

async fn handle_say_vc(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let voice = {
        let mut storage = bot.storage.lock().await;
        let server = storage.get_server_config(guild_id.get()).await?;
        server.voice(&bot.config().tts_voice).to_string()
    };
    let instructions = bot.overrides.resolve(
        guild_id,
        OverrideKind::SayVcInstructions,
        &bot.config().say_vc_instructions,
    );

    say_in_voice(ctx, command, bot, guild_id, &voice, &instructions).await
}

async fn handle_say_vc_alt(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let instructions = bot.config().say_vc_alt_instructions.clone();
    say_in_voice(ctx, command, bot, guild_id, ALT_VOICE, &instructions).await
}

async fn say_in_voice(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
    voice: &str,
    instructions: &str,
) -> Result<()> {
    let message = string_option(command, "message")?;
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, NOT_IN_VOICE, true).await;
    };

    defer(ctx, command).await?;
    let source = match bot.speech.synthesize(message, voice, instructions).await {
        Ok(source) => source,
        Err(e) => {
            warn!("Error generando TTS: {}", e);
            return edit(ctx, command, "❌ Erreur lors de la génération audio.").await;
        }
    };

    let outcome = play_and_wait(bot, source, VoiceTarget::new(guild_id, channel_id)).await;
    edit(ctx, command, outcome_message(&outcome, "🗣️ Message lu en vocal !")).await
}

async fn handle_override(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
    kind: OverrideKind,
) -> Result<()> {
    let (option, label) = match kind {
        OverrideKind::SayVcInstructions => ("instructions", "Nouvelles instructions pour /say_vc"),
        OverrideKind::GptPrompt => ("prompt", "Nouveau prompt système pour /gpt"),
    };
    let text = string_option(command, option)?;

    bot.overrides.set(guild_id, kind, text);
    info!("{:?} cambiado por {} en guild {}", kind, command.user.name, guild_id);

    let content = format!(
        "{} :\n```{}```\n(Retour à la valeur par défaut dans {})",
        label,
        text,
        humantime::format_duration(bot.config().override_ttl)
    );
    reply(ctx, command, &content, true).await
}

async fn handle_gpt(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = string_option(command, "query")?;
    defer(ctx, command).await?;

    let prompt = bot.overrides.resolve(
        guild_id,
        OverrideKind::GptPrompt,
        &bot.config().gpt_system_prompt,
    );
    let answer = match bot.chat.ask(&prompt, query).await {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Error consultando GPT: {}", e);
            return edit(ctx, command, "❌ Erreur lors de la requête à GPT.").await;
        }
    };

    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_gpt_embed(query, &answer)),
        )
        .await?;

    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return Ok(());
    };

    let spoken: String = answer.chars().take(GPT_SPOKEN_CHARS).collect();
    let source = match bot
        .speech
        .synthesize(&spoken, &bot.config().tts_voice, GPT_READ_INSTRUCTIONS)
        .await
    {
        Ok(source) => source,
        Err(e) => {
            warn!("Error generando el TTS de la respuesta: {}", e);
            return followup(ctx, command, "❌ Erreur lors de la génération audio.").await;
        }
    };

    let outcome = play_and_wait(bot, source, VoiceTarget::new(guild_id, channel_id)).await;
    if outcome.is_err() {
        followup(ctx, command, &outcome_message(&outcome, "")).await?;
    }

    Ok(())
}

async fn handle_block(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, NOT_IN_VOICE, true).await;
    };

    let duration = match integer_option(command, "hours") {
        Some(hours) => Duration::from_secs(hours.max(1) as u64 * 3600),
        None => {
            let mut storage = bot.storage.lock().await;
            storage
                .get_server_config(guild_id.get())
                .await?
                .block_duration(bot.config().block_duration)
        }
    };

    bot.guard
        .block(guild_id, channel_id, command.user.id, duration);

    let content = format!(
        "🚫 Le bot ne rejoindra plus <#{}> tant que tu y es, pendant {}.",
        channel_id,
        humantime::format_duration(duration)
    );
    reply(ctx, command, &content, true).await
}

async fn handle_unblock(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(channel_id) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return reply(ctx, command, "Rejoins le salon vocal que tu avais bloqué.", true).await;
    };

    let content = if bot.guard.unblock(guild_id, channel_id, command.user.id) {
        format!("✅ Blocage retiré pour <#{}>.", channel_id)
    } else {
        format!("Tu n'avais aucun blocage actif sur <#{}>.", channel_id)
    };
    reply(ctx, command, &content, true).await
}

async fn handle_leave(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    if bot.voice.current_channel(guild_id).await.is_none() {
        return reply(ctx, command, "Je ne suis dans aucun salon vocal ici.", false).await;
    }

    match bot.voice.disconnect(guild_id).await {
        Ok(()) => reply(ctx, command, "Je quitte le salon vocal !", false).await,
        Err(e) => {
            warn!("Error al desconectar en guild {}: {:?}", guild_id, e);
            reply(ctx, command, "Erreur lors de la déconnexion du salon vocal.", false).await
        }
    }
}

async fn handle_help(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    reply_embed(ctx, command, embeds::create_help_embed()).await
}

async fn handle_config(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &JokeBot,
    guild_id: GuildId,
) -> Result<()> {
    let block_hours = integer_option(command, "block_hours");
    let voice = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "voice")
        .and_then(|opt| opt.value.as_str());

    let mut storage = bot.storage.lock().await;
    if let Some(hours) = block_hours {
        storage
            .set_block_duration(guild_id.get(), Duration::from_secs(hours.max(1) as u64 * 3600))
            .await?;
    }
    if let Some(voice) = voice {
        storage.set_tts_voice(guild_id.get(), voice).await?;
    }

    let server = storage.get_server_config(guild_id.get()).await?;
    drop(storage);

    let description = format!(
        "Durée de blocage : {}\nVoix TTS : {}",
        humantime::format_duration(server.block_duration(bot.config().block_duration)),
        server.voice(&bot.config().tts_voice)
    );
    let embed = if block_hours.is_some() || voice.is_some() {
        embeds::create_success_embed("Configuration mise à jour", &description)
    } else {
        embeds::create_info_embed("Configuration du serveur", &description)
    };

    reply_embed(ctx, command, embed).await
}

// Utilidades

/// Encola el audio y espera su resultado como mucho `REQUEST_TIMEOUT`.
async fn play_and_wait(bot: &JokeBot, source: AudioSource, target: VoiceTarget) -> PlaybackOutcome {
    let (request, ticket) = PlaybackRequest::new(source, target);
    bot.scheduler.submit(request);
    ticket.wait_timeout(bot.config().request_timeout).await
}

/// Texto para el usuario según el resultado de la reproducción.
pub fn outcome_message(outcome: &PlaybackOutcome, success: &str) -> String {
    match outcome {
        Ok(()) => success.to_string(),
        Err(PlaybackError::Blocked { users }) => {
            let mentions: Vec<String> = users.iter().map(|user| format!("<@{}>", user)).collect();
            format!(
                "🚫 Je ne peux pas rejoindre ce salon : bloqué par {}.",
                mentions.join(", ")
            )
        }
        Err(PlaybackError::Timeout { stage }) => {
            let stage = match stage {
                VoiceStage::Queue => "file d'attente",
                VoiceStage::Connect => "connexion",
                VoiceStage::Play => "lecture",
                VoiceStage::Disconnect => "déconnexion",
            };
            format!("⏱️ Délai dépassé ({}).", stage)
        }
        Err(PlaybackError::PlaybackFailed { cause }) => {
            format!("❌ Erreur de lecture audio : {}", cause)
        }
        Err(PlaybackError::SourceMissing { path }) => {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            format!("❌ Fichier audio introuvable : {}", name)
        }
    }
}

fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Result<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow!("Option manquante : {}", name))
}

fn integer_option(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

async fn reply(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(ephemeral),
            ),
        )
        .await?;
    Ok(())
}

async fn reply_embed(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

async fn edit(ctx: &Context, command: &CommandInteraction, content: impl Into<String>) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content))
        .await?;
    Ok(())
}

async fn followup(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    command
        .create_followup(
            &ctx.http,
            CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}
