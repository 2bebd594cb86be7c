//! Twitch HTTP endpoints: GQL metadata queries and the v5 comments API.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tracing::debug;

use crate::badges::{BADGE_INFO_URL, BadgeCatalog};
use crate::error::{Result, TwitchChatError};

/// Public web client id, sent with every GQL request.
pub const CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

pub const GQL_API_URL: &str = "https://gql.twitch.tv/gql";

const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// GQL persisted queries, addressed by operation name and query hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GqlOperation {
    VideoMetadata,
    StreamMetadata,
    BrowsePagePopular,
    ChannelVideoShelvesQuery,
    ClipsCardsUser,
}

impl GqlOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::VideoMetadata => "VideoMetadata",
            Self::StreamMetadata => "StreamMetadata",
            Self::BrowsePagePopular => "BrowsePage_Popular",
            Self::ChannelVideoShelvesQuery => "ChannelVideoShelvesQuery",
            Self::ClipsCardsUser => "ClipsCards__User",
        }
    }

    pub fn sha256_hash(&self) -> &'static str {
        match self {
            Self::VideoMetadata => {
                "226edb3e692509f727fd56821f5653c05740242c82b0388883e0c0e75dcbf687"
            }
            Self::StreamMetadata => {
                "1c719a40e481453e5c48d9bb585d971b8b372f8ebb105b17076722264dfa5b3e"
            }
            Self::BrowsePagePopular => {
                "c3322a9df3121f437182beb5a75c2a8db9a1e27fa57701ffcae70e681f502557"
            }
            Self::ChannelVideoShelvesQuery => {
                "fb663273aa958ebe2f58d5fcb3aacc112d67ebfd7f414b095c5d1498d21aad92"
            }
            Self::ClipsCardsUser => {
                "b73ad2bfaecfd30a9e6c28fada15bd97032c83ec77a0440766a56fe0bd632777"
            }
        }
    }
}

/// Metadata for a VOD, from the `VideoMetadata` query.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub duration: Option<f64>,
}

/// Metadata for a clip, resolved to the VOD it was cut from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    pub video_id: String,
    /// Where the clip starts within the VOD, in seconds.
    pub offset: f64,
    pub duration: Option<f64>,
    pub title: String,
}

/// Liveness and title for a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub is_live: bool,
    pub title: Option<String>,
}

/// Thin client over the Twitch HTTP surface this crate needs.
#[derive(Debug, Clone)]
pub struct TwitchApi {
    client: reqwest::Client,
}

impl TwitchApi {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds an API handle with this crate's default HTTP client.
    pub fn with_default_client() -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(DEFAULT_UA).build()?;
        Ok(Self::new(client))
    }

    pub async fn get_json(&self, url: &str) -> Result<Value> {
        let text = self.client.get(url).send().await?.text().await?;
        parse_json(&text)
    }

    async fn post_gql(&self, body: &Value) -> Result<Value> {
        let text = self
            .client
            .post(GQL_API_URL)
            .header("Content-Type", "text/plain;charset=UTF-8")
            .header("Client-ID", CLIENT_ID)
            .body(serde_json::to_string(body)?)
            .send()
            .await?
            .text()
            .await?;
        parse_json(&text)
    }

    /// Runs a persisted query and returns its single response object.
    pub async fn gql(&self, operation: GqlOperation, variables: Value) -> Result<Value> {
        let ops = json!([{
            "operationName": operation.name(),
            "variables": variables,
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": operation.sha256_hash(),
                }
            }
        }]);
        let response = self.post_gql(&ops).await?;
        response
            .as_array()
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| {
                TwitchChatError::unexpected(format!(
                    "Empty GQL response for {}",
                    operation.name()
                ))
            })
    }

    /// Runs a raw (non-persisted) GQL query.
    pub async fn gql_raw_query(&self, query: &str) -> Result<Value> {
        self.post_gql(&json!({ "query": query })).await
    }

    pub async fn video_metadata(&self, vod_id: &str) -> Result<VideoInfo> {
        let response = self
            .gql(
                GqlOperation::VideoMetadata,
                json!({"channelLogin": "", "videoID": vod_id}),
            )
            .await?;
        let video = match response.get("data").and_then(|d| d.get("video")) {
            Some(video) if !video.is_null() => video,
            _ => {
                return Err(TwitchChatError::no_replay(format!(
                    "Video {vod_id} does not have a chat replay"
                )));
            }
        };
        Ok(VideoInfo {
            title: video.get("title").and_then(Value::as_str).map(str::to_owned),
            duration: video.get("lengthSeconds").and_then(Value::as_f64),
        })
    }

    pub async fn clip_metadata(&self, clip_id: &str) -> Result<ClipInfo> {
        let query = format!(
            r#"{{ clip(slug: "{clip_id}") {{ video {{ id createdAt }} createdAt durationSeconds videoOffsetSeconds title url slug }} }}"#
        );
        let response = self.gql_raw_query(&query).await?;
        let clip = response.get("data").and_then(|d| d.get("clip"));

        let video_id = match clip.and_then(|c| c.get("video")).and_then(|v| v.get("id")) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(TwitchChatError::no_replay(
                    "Video does not have a chat replay. This is because the original VOD has been deleted.",
                ));
            }
        };

        let title = clip
            .and_then(|c| c.get("title"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(ClipInfo {
            video_id,
            offset: clip
                .and_then(|c| c.get("videoOffsetSeconds"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            duration: clip
                .and_then(|c| c.get("durationSeconds"))
                .and_then(Value::as_f64),
            title: format!("{title} ({clip_id})"),
        })
    }

    pub async fn stream_metadata(&self, channel_name: &str) -> Result<StreamInfo> {
        let response = self
            .gql(
                GqlOperation::StreamMetadata,
                json!({"channelLogin": channel_name.to_lowercase()}),
            )
            .await?;
        let user = response.get("data").and_then(|d| d.get("user"));
        let is_live = user
            .and_then(|u| u.get("stream"))
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            == Some("live");
        // only report a title when the channel is actually live
        let title = if is_live {
            user.and_then(|u| u.get("lastBroadcast"))
                .and_then(|b| b.get("title"))
                .and_then(Value::as_str)
                .map(str::to_owned)
        } else {
            None
        };
        Ok(StreamInfo { is_live, title })
    }

    /// One page of the v5 comments API for a VOD.
    pub async fn comments_page(
        &self,
        vod_id: &str,
        cursor: &str,
        content_offset_seconds: f64,
    ) -> Result<Value> {
        let url = format!(
            "https://api.twitch.tv/v5/videos/{vod_id}/comments?client_id={CLIENT_ID}&cursor={cursor}&content_offset_seconds={content_offset_seconds}"
        );
        debug!("Fetching comments page: {url}");
        self.get_json(&url).await
    }

    /// Fetches the global badge catalog.
    pub async fn global_badges(&self) -> Result<BadgeCatalog> {
        let response = self.get_json(BADGE_INFO_URL).await?;
        Ok(BadgeCatalog::from_response(&response))
    }

    /// The most popular livestreams. The backend caps pages at 30 entries.
    pub async fn top_livestreams(&self, limit: u32) -> Result<Vec<Value>> {
        let mut count = i64::from(limit);
        let mut cursor = String::new();
        let mut results = Vec::new();
        loop {
            let num_to_get = count.clamp(0, 30);
            if num_to_get <= 0 {
                break;
            }
            let response = self
                .gql(
                    GqlOperation::BrowsePagePopular,
                    json!({
                        "limit": num_to_get,
                        "cursor": cursor,
                        "platformType": "all",
                        "options": {"sort": "VIEWER_COUNT"},
                        "sortTypeIsRecency": false,
                    }),
                )
                .await?;
            let edges = response
                .get("data")
                .and_then(|d| d.get("streams"))
                .and_then(|s| s.get("edges"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if edges.is_empty() {
                break;
            }
            cursor = edges
                .last()
                .and_then(|e| e.get("cursor"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            count -= num_to_get;
            results.extend(edges);
        }
        Ok(results)
    }

    /// Video shelves for a channel (recent broadcasts, highlights, ...).
    pub async fn user_vods(&self, user_name: &str) -> Result<Vec<Value>> {
        let response = self
            .gql(
                GqlOperation::ChannelVideoShelvesQuery,
                json!({"channelLogin": user_name, "first": 5}),
            )
            .await?;
        Ok(response
            .get("data")
            .and_then(|d| d.get("user"))
            .and_then(|u| u.get("videoShelves"))
            .and_then(|v| v.get("edges"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Clips for a channel. `filter_by` is one of `LAST_DAY`, `LAST_WEEK`,
    /// `LAST_MONTH` or `ALL_TIME`. Pages are capped at 100 entries.
    pub async fn user_clips(
        &self,
        user_name: &str,
        limit: u32,
        filter_by: &str,
    ) -> Result<Vec<Value>> {
        let mut count = i64::from(limit);
        let offset = 0u32;
        let mut results = Vec::new();
        loop {
            let cursor = STANDARD.encode(offset.to_string());
            let num_to_get = count.clamp(0, 100);
            if num_to_get <= 0 {
                break;
            }
            let response = self
                .gql(
                    GqlOperation::ClipsCardsUser,
                    json!({
                        "cursor": cursor,
                        "login": user_name,
                        "limit": num_to_get,
                        "criteria": {"filter": filter_by},
                    }),
                )
                .await?;
            let clips = response
                .get("data")
                .and_then(|d| d.get("user"))
                .and_then(|u| u.get("clips"))
                .cloned()
                .unwrap_or(Value::Null);
            let edges = clips
                .get("edges")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if edges.is_empty() {
                break;
            }
            count -= edges.len() as i64;
            let has_next = clips
                .get("pageInfo")
                .and_then(|p| p.get("hasNextPage"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            results.extend(edges);
            if !has_next {
                break;
            }
        }
        Ok(results)
    }
}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|_| {
        let snippet: String = text.chars().take(200).collect();
        TwitchChatError::unexpected(format!("Response is not valid JSON: {snippet}"))
    })
}
