// src/services/board.rs

//! Board sources: where listing pages, documents and comments come from.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{BoardRef, CommentRecord, CrawlerConfig, PostRecord, PostRef};

/// A lazily fetched comment stream for one post.
pub type CommentStream<'a> = BoxStream<'a, Result<CommentRecord>>;

/// A paginated board.
#[async_trait]
pub trait BoardSource: Send + Sync {
    /// Post references listed on `page`. An empty page ends the board.
    async fn list_page(&self, board: &BoardRef, page: u32) -> Result<Vec<PostRef>>;

    /// Full document behind a reference, or `None` when the source has nothing.
    async fn document(&self, post: &PostRef) -> Result<Option<PostRecord>>;

    /// Open the comment stream of a post.
    ///
    /// An `Err` here is permanent (the stream cannot be addressed at all);
    /// failures while the stream is being consumed arrive as `Err` items.
    fn comments<'a>(&'a self, post: &'a PostRef) -> Result<CommentStream<'a>>;
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    posts: Vec<ListingEntry>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<CommentRecord>,
}

/// JSON board API client.
///
/// ```text
/// GET {base}/boards/{board}/posts?page={n}&minor={bool}
/// GET {base}/boards/{board}/posts/{id}
/// GET {base}/boards/{board}/posts/{id}/comments?page={n}
/// ```
pub struct HttpBoardSource {
    client: Client,
    base_url: Url,
}

impl HttpBoardSource {
    /// Create a client for the configured API.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base_url = Url::parse(&config.api_base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::config(format!(
                "api_base_url '{}' cannot hold a path",
                config.api_base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Base URL extended by `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::config("api_base_url cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn post_url(&self, post: &PostRef) -> Result<Url> {
        self.endpoint(&["boards", &post.board_id, "posts", &post.post_id])
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(AppError::fetch(url.as_str(), response.status()));
        }
        Ok(response.json().await?)
    }

    async fn comment_page(&self, url: Url, page: u32) -> Result<Vec<CommentRecord>> {
        let mut url = url;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        let page: CommentPage = self.get_json(url).await?;
        Ok(page.comments)
    }
}

#[async_trait]
impl BoardSource for HttpBoardSource {
    async fn list_page(&self, board: &BoardRef, page: u32) -> Result<Vec<PostRef>> {
        let mut url = self.endpoint(&["boards", &board.id, "posts"])?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("minor", if board.minor { "true" } else { "false" });

        let listing: ListingPage = self.get_json(url).await?;
        Ok(listing
            .posts
            .into_iter()
            .map(|entry| PostRef::new(board.id.clone(), entry.id, page))
            .collect())
    }

    async fn document(&self, post: &PostRef) -> Result<Option<PostRecord>> {
        let url = self.post_url(post)?;
        let response = self.client.get(url.clone()).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(AppError::fetch(url.as_str(), status)),
        }
    }

    fn comments<'a>(&'a self, post: &'a PostRef) -> Result<CommentStream<'a>> {
        let url = self.endpoint(&["boards", &post.board_id, "posts", &post.post_id, "comments"])?;

        // Pages are fetched one at a time as the consumer pulls.
        let pages = stream::try_unfold(1u32, move |page| {
            let url = url.clone();
            async move {
                let comments = self.comment_page(url, page).await?;
                if comments.is_empty() {
                    Ok::<_, AppError>(None)
                } else {
                    Ok(Some((stream::iter(comments.into_iter().map(Ok)), page + 1)))
                }
            }
        });

        Ok(pages.try_flatten().boxed())
    }
}

/// Check that `page` exists before committing to a crawl.
///
/// Gives up after `timeout`; a missing page, an empty page and a timeout are
/// all validation errors.
pub async fn validate_start_page(
    source: &dyn BoardSource,
    board: &BoardRef,
    page: u32,
    timeout: Duration,
) -> Result<()> {
    if page == 0 {
        return Err(AppError::validation("start page must be >= 1"));
    }
    match tokio::time::timeout(timeout, source.list_page(board, page)).await {
        Err(_) => Err(AppError::validation(format!(
            "page {page} of board '{}' did not respond within {timeout:?}",
            board.id
        ))),
        Ok(Err(e)) => Err(AppError::validation(format!(
            "page {page} of board '{}' could not be fetched: {e}",
            board.id
        ))),
        Ok(Ok(posts)) if posts.is_empty() => Err(AppError::validation(format!(
            "page {page} of board '{}' does not exist",
            board.id
        ))),
        Ok(Ok(_)) => Ok(()),
    }
}
