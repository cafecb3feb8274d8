//! Chistes de Reddit: descarga, deduplicación y selección sesgada hacia
//! los posts más votados.

pub mod reddit;

use rand::{
    distributions::{Distribution, WeightedIndex},
    seq::IteratorRandom,
    Rng,
};
use regex::Regex;
use std::{
    collections::{BTreeMap, HashSet},
    sync::LazyLock,
};
use tracing::info;

pub use reddit::{RedditClient, RedditPost};

/// Cuánto pesa estar más arriba en el ranking: peso = exp(-BIAS * índice).
const BIAS_FACTOR: f64 = 0.02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joke {
    pub subreddit: String,
    pub title: String,
    pub text: String,
}

/// Chistes únicos agrupados por subreddit, en orden de ranking.
#[derive(Debug, Default)]
pub struct JokeBook {
    by_subreddit: BTreeMap<String, Vec<Joke>>,
}

impl JokeBook {
    /// Construye el libro a partir de los posts descargados.
    ///
    /// Texto = `"{title}. {selftext}"`; se descartan los vacíos, los más
    /// largos que `max_len` caracteres y los repetidos (sin distinguir
    /// mayúsculas), aunque vengan de otro subreddit.
    pub fn from_posts<I>(posts: I, max_len: usize) -> Self
    where
        I: IntoIterator<Item = RedditPost>,
    {
        let mut seen = HashSet::new();
        let mut by_subreddit: BTreeMap<String, Vec<Joke>> = BTreeMap::new();

        for post in posts {
            let text = format!("{}. {}", post.title, post.selftext)
                .trim()
                .to_string();
            let length = text.chars().count();
            if length == 0 || length > max_len {
                continue;
            }
            if !seen.insert(text.to_lowercase()) {
                continue;
            }

            let subreddit = post
                .subreddit
                .as_deref()
                .unwrap_or("unknown")
                .to_lowercase();
            by_subreddit.entry(subreddit.clone()).or_default().push(Joke {
                subreddit,
                title: post.title,
                text,
            });
        }

        let book = Self { by_subreddit };
        info!(
            "😂 {} chistes únicos en {} subreddits",
            book.len(),
            book.by_subreddit.len()
        );
        book
    }

    pub fn len(&self) -> usize {
        self.by_subreddit.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subreddit al azar y, dentro de él, un chiste con sesgo hacia el top.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Joke> {
        let jokes = self
            .by_subreddit
            .values()
            .filter(|jokes| !jokes.is_empty())
            .choose(rng)?;

        let weights = (0..jokes.len()).map(|i| (-BIAS_FACTOR * i as f64).exp());
        let index = WeightedIndex::new(weights).ok()?.sample(rng);
        jokes.get(index)
    }
}

static MARKDOWN_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("regex de enlaces válida"));
static BARE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("regex de URLs válida"));
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_~#>`]+").expect("regex de formato válida"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("regex de espacios válida"));

/// Limpia el formato de Reddit para que el TTS no lea símbolos ni URLs.
pub fn speakable(text: &str) -> String {
    let text = MARKDOWN_LINK.replace_all(text, "$1");
    let text = BARE_URL.replace_all(&text, "");
    let text = MARKUP.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
