use serde::Deserialize;
use std::{future::Future, time::Duration};
use tracing::{info, warn};

use crate::error::ServiceError;

const REDDIT_BASE_URL: &str = "https://www.reddit.com";
const PAGE_SIZE: usize = 100;

/// Post de Reddit con los campos que usamos.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub subreddit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RedditPost,
}

/// Cliente para los listados `top.json` de Reddit
pub struct RedditClient {
    client: reqwest::Client,
    base_url: String,
}

impl RedditClient {
    pub fn new() -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self {
            client,
            base_url: REDDIT_BASE_URL.to_string(),
        })
    }

    /// Descarga los mejores posts del año siguiendo el cursor `after`.
    ///
    /// Un error de red corta la paginación y devuelve lo ya descargado.
    pub async fn fetch_top(&self, subreddit: &str, max_posts: usize) -> Vec<RedditPost> {
        let base_url = format!(
            "{}/r/{}/top.json?t=year&limit={}",
            self.base_url, subreddit, PAGE_SIZE
        );

        let posts = paginate(max_posts, |after| {
            let url = page_url(&base_url, after.as_deref());
            async move { self.fetch_page(&url).await }
        })
        .await;

        info!("📥 {} posts descargados de r/{}", posts.len(), subreddit);
        posts
    }

    async fn fetch_page(&self, url: &str) -> Result<ListingData, ServiceError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status { status, body });
        }

        let listing: Listing = response.json().await?;
        Ok(listing.data)
    }
}

/// Recorre páginas hasta vaciar el listado o llegar a `max_posts`.
///
/// Se detiene con una página vacía, sin cursor o incompleta.
async fn paginate<F, Fut>(max_posts: usize, mut fetch: F) -> Vec<RedditPost>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListingData, ServiceError>>,
{
    let mut posts = Vec::new();
    let mut after: Option<String> = None;

    while posts.len() < max_posts {
        let page = match fetch(after.take()).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Error de red, paginación interrumpida: {}", e);
                break;
            }
        };

        let received = page.children.len();
        if received == 0 {
            break;
        }
        posts.extend(page.children.into_iter().map(|child| child.data));

        after = page.after;
        if after.is_none() || received < PAGE_SIZE {
            break;
        }
    }

    posts.truncate(max_posts);
    posts
}

fn page_url(base_url: &str, after: Option<&str>) -> String {
    match after {
        Some(cursor) => format!("{base_url}&after={cursor}"),
        None => base_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    #[test]
    fn test_page_url_appends_cursor() {
        let base = "https://www.reddit.com/r/jokes/top.json?t=year&limit=100";
        assert_eq!(page_url(base, None), base);
        assert_eq!(
            page_url(base, Some("t3_abc")),
            format!("{base}&after=t3_abc")
        );
    }

    #[test]
    fn test_listing_parses_posts_and_cursor() {
        let json = r#"{
            "kind": "Listing",
            "data": {
                "after": "t3_next",
                "children": [
                    {"kind": "t3", "data": {"title": "Why?", "selftext": "Because.", "subreddit": "Jokes", "score": 10}},
                    {"kind": "t3", "data": {"title": "No body", "subreddit": "dadjokes"}}
                ]
            }
        }"#;

        let listing: Listing = serde_json::from_str(json).expect("listing");

        assert_eq!(listing.data.after.as_deref(), Some("t3_next"));
        assert_eq!(listing.data.children.len(), 2);
        assert_eq!(listing.data.children[0].data.selftext, "Because.");
        assert_eq!(listing.data.children[1].data.selftext, "");
    }

    fn page(len: usize, after: Option<&str>) -> ListingData {
        ListingData {
            children: (0..len)
                .map(|i| Child {
                    data: RedditPost {
                        title: format!("joke {i}"),
                        selftext: String::new(),
                        subreddit: Some("Jokes".to_string()),
                    },
                })
                .collect(),
            after: after.map(str::to_string),
        }
    }

    /// Sirve las páginas en orden y anota el cursor pedido en cada llamada.
    async fn run_pages(
        max_posts: usize,
        pages: Vec<Result<ListingData, ServiceError>>,
    ) -> (Vec<RedditPost>, Vec<Option<String>>) {
        let mut pages = VecDeque::from(pages);
        let mut cursors = Vec::new();

        let posts = paginate(max_posts, |after| {
            cursors.push(after);
            let next = pages.pop_front().expect("unexpected extra page request");
            async move { next }
        })
        .await;

        (posts, cursors)
    }

    #[tokio::test]
    async fn test_follows_cursor_until_short_page() {
        let (posts, cursors) = run_pages(
            500,
            vec![Ok(page(100, Some("t3_a"))), Ok(page(40, Some("t3_b")))],
        )
        .await;

        assert_eq!(posts.len(), 140);
        assert_eq!(cursors, vec![None, Some("t3_a".to_string())]);
    }

    #[tokio::test]
    async fn test_empty_page_stops() {
        let (posts, cursors) = run_pages(
            500,
            vec![Ok(page(100, Some("t3_a"))), Ok(page(0, Some("t3_b")))],
        )
        .await;

        assert_eq!(posts.len(), 100);
        assert_eq!(cursors.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_cursor_stops() {
        let (posts, cursors) = run_pages(500, vec![Ok(page(100, None))]).await;

        assert_eq!(posts.len(), 100);
        assert_eq!(cursors, vec![None]);
    }

    #[tokio::test]
    async fn test_truncates_to_max_posts() {
        let (posts, cursors) = run_pages(
            150,
            vec![Ok(page(100, Some("t3_a"))), Ok(page(100, Some("t3_b")))],
        )
        .await;

        assert_eq!(posts.len(), 150);
        assert_eq!(posts[149].title, "joke 49");
        assert_eq!(cursors.len(), 2);
    }

    #[tokio::test]
    async fn test_error_keeps_fetched_posts() {
        let (posts, cursors) = run_pages(
            500,
            vec![Ok(page(100, Some("t3_a"))), Err(ServiceError::EmptyReply)],
        )
        .await;

        assert_eq!(posts.len(), 100);
        assert_eq!(cursors.len(), 2);
    }

    #[tokio::test]
    async fn test_error_on_first_page_returns_nothing() {
        let (posts, _) = run_pages(500, vec![Err(ServiceError::EmptyReply)]).await;

        assert!(posts.is_empty());
    }

    #[test]
    fn test_last_page_has_no_cursor() {
        let json = r#"{"data": {"after": null, "children": []}}"#;
        let listing: Listing = serde_json::from_str(json).expect("listing");

        assert!(listing.data.after.is_none());
        assert!(listing.data.children.is_empty());
    }
}
