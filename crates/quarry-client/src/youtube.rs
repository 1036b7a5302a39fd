use quarry_core::traits::VideoApi;
use quarry_core::{AppError, HttpConfig, RawItem};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tracing::{debug, warn};

/// Default endpoint of the YouTube Data API v3.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";

/// Response of the `search.list` endpoint, reduced to what the harvester reads.
///
/// API reference: <https://developers.google.com/youtube/v3/docs/search/list>
#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize, Debug)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    /// Absent for channel and playlist results.
    video_id: Option<String>,
}

/// Response of the `videos.list` endpoint.
///
/// Items stay untyped until [`VideosResponse::into_raw_items`] so one
/// malformed resource cannot fail the whole batch.
///
/// API reference: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Deserialize, Debug)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

impl VideosResponse {
    /// Decodes every item on its own, logging and dropping the ones that
    /// do not match [`VideoResource`].
    fn into_raw_items(self) -> Vec<RawItem> {
        self.items
            .into_iter()
            .enumerate()
            .filter_map(|(position, value)| {
                match serde_json::from_value::<VideoResource>(value) {
                    Ok(video) => Some(YouTubeClient::into_raw_item(video)),
                    Err(e) => {
                        warn!(position, error = %e, "Skipping undecodable video resource");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Data Transfer Object for one video resource.
///
/// Every part is optional so a partial resource still reaches the
/// normalizer, which decides whether the item is usable.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<VideoSnippet>,
    #[serde(default)]
    pub content_details: Option<VideoContentDetails>,
    #[serde(default)]
    pub statistics: Option<VideoStatistics>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct VideoContentDetails {
    pub duration: Option<String>,
}

/// Statistics are sent as decimal strings; hidden counters are omitted.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

/// Error envelope returned with non-2xx responses.
#[derive(Deserialize, Debug)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize, Debug)]
struct ErrorDetail {
    reason: Option<String>,
}

/// HTTP client for the YouTube Data API v3.
///
/// # Examples
///
/// ```no_run
/// use quarry_client::YouTubeClient;
/// use quarry_core::HttpConfig;
/// use quarry_core::traits::VideoApi;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = YouTubeClient::new("my-api-key", &HttpConfig::default())?;
/// let ids = client.search("plant breeding", 50).await?;
/// println!("Found {} videos", ids.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl YouTubeClient {
    /// Creates a client against the public API endpoint.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the API key is empty.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(api_key: &str, config: &HttpConfig) -> Result<Self, AppError> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, config)
    }

    /// Creates a client against a custom endpoint (proxies, test servers).
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the URL is invalid or the API key is empty.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url_str: &str,
        api_key: &str,
        config: &HttpConfig,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::ConfigError("YouTube API key is empty".to_string()));
        }

        let mut base_url = Url::parse(base_url_str)
            .map_err(|_| AppError::ConfigError(format!("Invalid API URL: {}", base_url_str)))?;
        // Url::join drops the last path segment unless it ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(client_error)?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn search_url(&self, query: &str, max_results: u32) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join("search")
            .map_err(|e| AppError::Generic(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("part", "id")
            .append_pair("type", "video")
            .append_pair("order", "relevance")
            .append_pair("q", query)
            .append_pair("maxResults", &max_results.to_string())
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    fn videos_url(&self, ids: &[String]) -> Result<Url, AppError> {
        let mut url = self
            .base_url
            .join("videos")
            .map_err(|e| AppError::Generic(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("part", "snippet,statistics,contentDetails")
            .append_pair("id", &ids.join(","))
            .append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, AppError> {
        let resp = self.client.get(url).send().await.map_err(client_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        Ok(resp)
    }

    /// Converts an API video resource into the core's raw item payload.
    pub fn into_raw_item(video: VideoResource) -> RawItem {
        let snippet = video.snippet;
        let statistics = video.statistics.unwrap_or_default();
        RawItem {
            id: video.id,
            title: snippet.as_ref().and_then(|s| s.title.clone()),
            published_at: snippet.and_then(|s| s.published_at),
            duration: video.content_details.and_then(|c| c.duration),
            view_count: statistics.view_count,
            like_count: statistics.like_count,
            comment_count: statistics.comment_count,
        }
    }
}

impl VideoApi for YouTubeClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<String>, AppError> {
        let url = self.search_url(query, max_results)?;
        let resp: SearchResponse = self.get(url).await?.json().await.map_err(client_error)?;

        Ok(resp
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    async fn get_details(&self, ids: &[String]) -> Result<Vec<RawItem>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.videos_url(ids)?;
        let resp: VideosResponse = self.get(url).await?.json().await.map_err(client_error)?;
        let returned = resp.items.len();
        let items = resp.into_raw_items();
        debug!(
            requested = ids.len(),
            returned,
            decoded = items.len(),
            "videos.list"
        );

        Ok(items)
    }
}

/// Strips the request URL from the error: it carries the API key.
fn client_error(e: reqwest::Error) -> AppError {
    AppError::ClientError(e.without_url().to_string())
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .errors
                .into_iter()
                .find_map(|d| d.reason);
            match (envelope.error.message, reason) {
                (Some(message), Some(reason)) => format!("{reason}: {message}"),
                (Some(message), None) => message,
                (None, Some(reason)) => reason,
                (None, None) => "unknown error".to_string(),
            }
        }
        Err(_) if body.trim().is_empty() => "empty response body".to_string(),
        Err(_) => body.chars().take(200).collect(),
    }
}
