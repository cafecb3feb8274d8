use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::VoiceTimeouts;

const DEFAULT_GPT_PROMPT: &str = "You are a helpful assistant. Reply in the language in which the question is asked, either English or French.";
const DEFAULT_SAY_VC_INSTRUCTIONS: &str = "Utilise un accent québécois";
const DEFAULT_SAY_VC_ALT_INSTRUCTIONS: &str =
    "Parle comme un présentateur radio des années 50, très théâtral.";

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: Option<u64>, // Si falta, Serenity lo toma del gateway
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub audio_dir: PathBuf,
    pub special_sound: String,
    pub data_dir: PathBuf,

    // Azure OpenAI
    pub api_key: String,
    pub tts_url: String,
    pub gpt_url: String,
    pub tts_voice: String,
    pub gpt_system_prompt: String,
    pub say_vc_instructions: String,
    pub say_vc_alt_instructions: String,
    pub override_ttl: Duration,

    // Voz y bloqueos
    pub block_duration: Duration,
    pub connect_timeout: Duration,
    pub play_timeout: Duration,
    pub disconnect_timeout: Duration,
    pub request_timeout: Duration,

    // Chistes
    pub joke_subreddits: Vec<String>,
    pub joke_max_length: usize,
    pub joke_posts_per_sub: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no definido")?,
            application_id: match std::env::var("APPLICATION_ID") {
                Ok(val) if !val.trim().is_empty() => Some(
                    val.trim()
                        .parse()
                        .with_context(|| format!("APPLICATION_ID no es un id válido: {val}"))?,
                ),
                _ => None,
            },
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Audio
            audio_dir: env_or("AUDIO_DIR", defaults.audio_dir),
            special_sound: env_or("SPECIAL_SOUND", defaults.special_sound),
            data_dir: env_or("DATA_DIR", defaults.data_dir),

            // Azure OpenAI
            api_key: std::env::var("API_KEY").unwrap_or_default(),
            tts_url: std::env::var("TTS_URL").unwrap_or_default(),
            gpt_url: std::env::var("GPT_URL").unwrap_or_default(),
            tts_voice: env_or("TTS_VOICE", defaults.tts_voice),
            gpt_system_prompt: env_or("GPT_SYSTEM_PROMPT", defaults.gpt_system_prompt),
            say_vc_instructions: env_or("SAY_VC_INSTRUCTIONS", defaults.say_vc_instructions),
            say_vc_alt_instructions: env_or(
                "SAY_VC_ALT_INSTRUCTIONS",
                defaults.say_vc_alt_instructions,
            ),
            override_ttl: env_duration("OVERRIDE_TTL", defaults.override_ttl)?,

            // Voz y bloqueos
            block_duration: env_duration("BLOCK_DURATION", defaults.block_duration)?,
            connect_timeout: env_duration("CONNECT_TIMEOUT", defaults.connect_timeout)?,
            play_timeout: env_duration("PLAY_TIMEOUT", defaults.play_timeout)?,
            disconnect_timeout: env_duration("DISCONNECT_TIMEOUT", defaults.disconnect_timeout)?,
            request_timeout: env_duration("REQUEST_TIMEOUT", defaults.request_timeout)?,

            // Chistes
            joke_subreddits: match std::env::var("JOKE_SUBREDDITS") {
                Ok(val) if !val.trim().is_empty() => parse_subreddits(&val),
                _ => defaults.joke_subreddits,
            },
            joke_max_length: match std::env::var("JOKE_MAX_LENGTH") {
                Ok(val) => val.parse()?,
                Err(_) => defaults.joke_max_length,
            },
            joke_posts_per_sub: match std::env::var("JOKE_POSTS_PER_SUB") {
                Ok(val) => val.parse()?,
                Err(_) => defaults.joke_posts_per_sub,
            },
        };

        std::fs::create_dir_all(&config.data_dir)?;
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// A request must be able to sit in the queue and still be answered
    /// within Discord's 15 minute interaction window, so `REQUEST_TIMEOUT`
    /// is capped there.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN must not be empty");
        }

        if self.application_id == Some(0) {
            anyhow::bail!("APPLICATION_ID must not be 0");
        }

        for (name, value) in [
            ("CONNECT_TIMEOUT", self.connect_timeout),
            ("PLAY_TIMEOUT", self.play_timeout),
            ("DISCONNECT_TIMEOUT", self.disconnect_timeout),
            ("REQUEST_TIMEOUT", self.request_timeout),
            ("BLOCK_DURATION", self.block_duration),
            ("OVERRIDE_TTL", self.override_ttl),
        ] {
            if value.is_zero() {
                anyhow::bail!("{name} must be greater than 0");
            }
        }

        if self.request_timeout > Duration::from_secs(15 * 60) {
            anyhow::bail!(
                "REQUEST_TIMEOUT cannot exceed 15m, got: {}",
                humantime::format_duration(self.request_timeout)
            );
        }

        if self.joke_subreddits.is_empty() {
            anyhow::bail!("JOKE_SUBREDDITS must name at least one subreddit");
        }

        if self.joke_max_length == 0 {
            anyhow::bail!("JOKE_MAX_LENGTH must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the configuration for logging, without secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Audio: {} (special: {})\n  \
            Voice: connect {}, play {}, disconnect {}, request {}\n  \
            Blocks: {} default, overrides {}\n  \
            Jokes: r/{} ({} posts, {} chars max)\n  \
            Azure: GPT {}, TTS {} (voice {})",
            self.application_id.map_or("auto".to_string(), |id| id.to_string()),
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.audio_dir.display(),
            self.special_sound,
            humantime::format_duration(self.connect_timeout),
            humantime::format_duration(self.play_timeout),
            humantime::format_duration(self.disconnect_timeout),
            humantime::format_duration(self.request_timeout),
            humantime::format_duration(self.block_duration),
            humantime::format_duration(self.override_ttl),
            self.joke_subreddits.join(", r/"),
            self.joke_posts_per_sub,
            self.joke_max_length,
            configured(&self.gpt_url),
            configured(&self.tts_url),
            self.tts_voice,
        )
    }

    pub fn voice_timeouts(&self) -> VoiceTimeouts {
        VoiceTimeouts {
            connect: self.connect_timeout,
            play: self.play_timeout,
            disconnect: self.disconnect_timeout,
        }
    }

    pub fn azure_enabled(&self) -> bool {
        !self.api_key.is_empty() && !self.tts_url.is_empty() && !self.gpt_url.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        let timeouts = VoiceTimeouts::default();

        Self {
            discord_token: String::new(),
            application_id: None,
            guild_id: None,

            audio_dir: "./Audio".into(),
            special_sound: "sort-pas-ton-penis.mp3".to_string(),
            data_dir: "./data".into(),

            api_key: String::new(),
            tts_url: String::new(),
            gpt_url: String::new(),
            tts_voice: "ash".to_string(),
            gpt_system_prompt: DEFAULT_GPT_PROMPT.to_string(),
            say_vc_instructions: DEFAULT_SAY_VC_INSTRUCTIONS.to_string(),
            say_vc_alt_instructions: DEFAULT_SAY_VC_ALT_INSTRUCTIONS.to_string(),
            override_ttl: Duration::from_secs(24 * 3600),

            block_duration: Duration::from_secs(2 * 3600),
            connect_timeout: timeouts.connect,
            play_timeout: timeouts.play,
            disconnect_timeout: timeouts.disconnect,
            request_timeout: Duration::from_secs(10 * 60),

            joke_subreddits: parse_subreddits("darkjokes,jokes,dadjokes"),
            joke_max_length: 300,
            joke_posts_per_sub: 100,
        }
    }
}

/// Lista separada por comas, sin `r/` ni entradas vacías.
pub fn parse_subreddits(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches("r/").to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_or<T: From<String>>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => T::from(val),
        _ => default,
    }
}

fn env_duration(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => humantime::parse_duration(val.trim())
            .with_context(|| format!("{key} no es una duración válida: {val}")),
        _ => Ok(default),
    }
}

fn configured(value: &str) -> &'static str {
    if value.is_empty() {
        "disabled"
    } else {
        "configured"
    }
}
