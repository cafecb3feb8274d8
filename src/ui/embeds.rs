use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::jokes::Joke;

/// Paleta de colores del bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(0, 188, 255);
    pub const JOKE_ORANGE: Colour = Colour::from_rgb(255, 145, 0);
}

const STANDARD_FOOTER: &str = "🎙️ Jokebox";

/// Límite de Discord por campo
pub const FIELD_LIMIT: usize = 1024;
/// Límite de Discord de campos por embed
pub const MAX_FIELDS: usize = 25;

const HELP_ENTRIES: &[(&str, &str)] = &[
    ("/help", "Affiche ce message"),
    ("/ping", "Pong !"),
    ("/joke", "Joue une blague Reddit en vocal"),
    ("/jokeqc", "Joue une blague québécoise locale"),
    ("/special", "Joue un son spécial"),
    ("/leave", "Force le bot à quitter le vocal"),
    ("/say_tc <texte>", "Affiche le texte dans le channel"),
    ("/say_vc <texte>", "TTS avec les instructions du serveur"),
    ("/say_vc_alt <texte>", "TTS avec le second jeu d'instructions"),
    ("/say_vc_instructions <texte>", "Change les instructions TTS de /say_vc (24h)"),
    ("/gpt <question>", "Question à GPT, réponse en texte et en vocal"),
    ("/gpt_prompt <texte>", "Change le prompt système de /gpt (24h)"),
    ("/block [heures]", "Empêche le bot de rejoindre ton salon vocal"),
    ("/unblock", "Retire ton blocage du salon vocal"),
    ("/config", "Réglages du serveur (durée de blocage, voix)"),
];

pub fn create_help_embed() -> CreateEmbed {
    HELP_ENTRIES
        .iter()
        .fold(
            CreateEmbed::default()
                .title("Commandes disponibles :")
                .color(colors::INFO_BLUE),
            |embed, (name, value)| embed.field(*name, *value, false),
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_joke_embed(joke: &Joke) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("😂 r/{}", joke.subreddit))
        .description(&joke.text)
        .color(colors::JOKE_ORANGE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Respuesta de GPT repartida en campos de 1024 caracteres.
pub fn create_gpt_embed(query: &str, reply: &str) -> CreateEmbed {
    let (chunks, truncated) = chunk_reply(reply, FIELD_LIMIT, MAX_FIELDS);

    let mut embed = CreateEmbed::default()
        .title("Réponse GPT")
        .description(format!("**Q :** {}", query))
        .color(colors::INFO_BLUE);

    for (idx, chunk) in chunks.into_iter().enumerate() {
        let name = if idx == 0 {
            "Réponse".to_string()
        } else {
            format!("(suite {})", idx)
        };
        embed = embed.field(name, chunk, false);
    }

    if truncated {
        embed = embed.field(
            "Info",
            "(réponse tronquée, trop longue pour Discord !)",
            false,
        );
    }

    embed
}

/// Parte `text` en trozos de `size` caracteres. Si hacen falta más de
/// `max_chunks` deja sitio para el aviso y marca la respuesta como truncada.
pub fn chunk_reply(text: &str, size: usize, max_chunks: usize) -> (Vec<String>, bool) {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks: Vec<String> = chars
        .chunks(size.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect();

    let truncated = chunks.len() > max_chunks;
    if truncated {
        chunks.truncate(max_chunks.saturating_sub(1));
    }
    (chunks, truncated)
}

pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
