use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId, Permissions},
    prelude::Context,
};

use crate::storage::TTS_VOICES;

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        simple_command("ping", "Pong !"),
        simple_command("joke", "Joue une blague Reddit en vocal"),
        simple_command("jokeqc", "Joue une blague québécoise locale"),
        simple_command("special", "Joue un son spécial"),
        text_command("say_tc", "Affiche le texte dans le channel", "message", "Texte à afficher"),
        text_command("say_vc", "Lis le texte en vocal", "message", "Texte à lire"),
        text_command(
            "say_vc_alt",
            "Lis le texte en vocal avec le second jeu d'instructions",
            "message",
            "Texte à lire",
        ),
        text_command(
            "say_vc_instructions",
            "Modifie les instructions TTS pour /say_vc (24h)",
            "instructions",
            "Nouvelles instructions",
        ),
        text_command(
            "gpt",
            "Pose une question à GPT et lis la réponse en vocal",
            "query",
            "Ce que tu demandes à GPT",
        ),
        text_command(
            "gpt_prompt",
            "Modifie le prompt système pour /gpt (24h)",
            "prompt",
            "Nouveau prompt système GPT",
        ),
        block_command(),
        simple_command("unblock", "Autorise de nouveau le bot dans ton salon vocal"),
        simple_command("leave", "Force le bot à quitter le vocal"),
        simple_command("help", "Aide sur les commandes du bot"),
        config_command(),
    ]
}

fn simple_command(name: &str, description: &str) -> CreateCommand {
    CreateCommand::new(name).description(description)
}

fn text_command(name: &str, description: &str, option: &str, option_description: &str) -> CreateCommand {
    simple_command(name, description).add_option(
        CreateCommandOption::new(CommandOptionType::String, option, option_description)
            .required(true)
            .max_length(1000),
    )
}

fn block_command() -> CreateCommand {
    simple_command("block", "Empêche le bot de rejoindre ton salon vocal").add_option(
        CreateCommandOption::new(
            CommandOptionType::Integer,
            "hours",
            "Durée du blocage en heures",
        )
        .min_int_value(1)
        .max_int_value(720),
    )
}

fn config_command() -> CreateCommand {
    let voice = TTS_VOICES.iter().fold(
        CreateCommandOption::new(CommandOptionType::String, "voice", "Voix TTS du serveur"),
        |option, voice| option.add_string_choice(*voice, *voice),
    );

    simple_command("config", "Réglages du serveur")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "block_hours",
                "Durée par défaut de /block en heures",
            )
            .min_int_value(1)
            .max_int_value(720),
        )
        .add_option(voice)
}
