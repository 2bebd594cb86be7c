//! URL recognition and the top-level downloader.
//!
//! [`TwitchChatDownloader`] turns a Twitch URL into a [`Chat`] handle that
//! yields [`ChatEvent`]s, either live over IRC or replayed from the comments
//! API.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use futures::{Stream, stream};
use regex::Regex;
use tracing::debug;

use crate::api::{ClipInfo, TwitchApi};
use crate::badges::BadgeCatalog;
use crate::error::{Result, TwitchChatError};
use crate::event::ChatEvent;
use crate::irc::{LiveChatStream, TcpConnector};
use crate::replay::{ApiPageSource, ReplayChatStream};
use crate::retry::{Deadline, run_with_retries};

/// `twitch.tv/videos/<id>`, the legacy `<channel>/v/<id>` and
/// `<channel>/video/<id>` shapes, and the player embed.
static VOD_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:(?:(?:www|go|m)\.)?twitch\.tv/(?:[^/]+/v(?:ideo)?|videos)/|player\.twitch\.tv/\?.*?\bvideo=v?)(?P<id>\d+)",
    )
    .unwrap()
});

/// `clips.twitch.tv/<slug>`, the clip embed and `twitch.tv/<channel>/clip/<slug>`.
static CLIP_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:clips\.twitch\.tv/(?:embed\?.*?\bclip=|(?:[^/]+/)*)|(?:(?:www|go|m)\.)?twitch\.tv/[^/]+/clip/)(?P<id>[^/?#&]+)",
    )
    .unwrap()
});

/// `twitch.tv/<channel>` and the player embed. Matches almost any
/// path, so it is only tried after the VOD and clip shapes.
static CHANNEL_URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:(?:(?:www|go|m)\.)?twitch\.tv/|player\.twitch\.tv/\?.*?\bchannel=)(?P<id>[^/#?]+)",
    )
    .unwrap()
});

fn capture(regex: &Regex, url: &str) -> Option<String> {
    regex
        .captures(url)
        .and_then(|caps| caps.name("id"))
        .map(|id| id.as_str().to_owned())
}

/// What a Twitch URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    /// A VOD id, e.g. `449716115`.
    Video(String),
    /// A clip slug.
    Clip(String),
    /// A channel login.
    Channel(String),
}

impl ContentRef {
    /// Classifies a Twitch URL, or `None` when no shape matches.
    pub fn parse(url: &str) -> Option<Self> {
        if let Some(id) = capture(&VOD_URL_REGEX, url) {
            return Some(ContentRef::Video(id));
        }
        if let Some(id) = capture(&CLIP_URL_REGEX, url) {
            return Some(ContentRef::Clip(id));
        }
        capture(&CHANNEL_URL_REGEX, url).map(ContentRef::Channel)
    }
}

/// Tuning knobs for a chat retrieval.
#[derive(Debug, Clone)]
pub struct ChatParams {
    /// Only yield events from this many seconds into the stream (replays).
    pub start_time: Option<f64>,

    /// Stop once events pass this many seconds into the stream (replays).
    pub end_time: Option<f64>,

    /// Attempts per failing network operation. `None` retries forever.
    pub max_attempts: Option<u32>,

    /// Delay between attempts.
    pub retry_timeout: Duration,

    /// Overall wall-clock budget. For live chat this also bounds how long
    /// the stream may stay silent before the retrieval ends.
    pub timeout: Option<Duration>,

    /// Per-read socket timeout on the IRC connection.
    pub message_receive_timeout: Duration,

    /// Maximum bytes per socket read.
    pub buffer_size: usize,

    /// How often to ping the IRC server when nothing is arriving.
    pub ping_interval: Duration,

    /// Message groups to keep, e.g. `messages`, `bans`. Empty keeps all.
    pub message_groups: Vec<String>,

    /// Individual message types to keep. Mutually exclusive with
    /// `message_groups`.
    pub message_types: Vec<String>,
}

impl Default for ChatParams {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            max_attempts: Some(30),
            retry_timeout: Duration::from_secs(1),
            timeout: None,
            message_receive_timeout: Duration::from_millis(250),
            buffer_size: 4096,
            ping_interval: Duration::from_secs(60),
            message_groups: Vec::new(),
            message_types: Vec::new(),
        }
    }
}

impl ChatParams {
    /// Start of the replay window, in seconds from the start of the stream.
    pub fn with_start_time(mut self, seconds: f64) -> Self {
        self.start_time = Some(seconds);
        self
    }

    /// End of the replay window, in seconds from the start of the stream.
    pub fn with_end_time(mut self, seconds: f64) -> Self {
        self.end_time = Some(seconds);
        self
    }

    /// Overall time budget for the retrieval.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attempts per failing network operation.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Delay between retry attempts.
    pub fn with_retry_timeout(mut self, delay: Duration) -> Self {
        self.retry_timeout = delay;
        self
    }

    /// Keep only events belonging to these message groups.
    pub fn with_message_groups(
        mut self,
        groups: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.message_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only events of these message types.
    pub fn with_message_types(
        mut self,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.message_types = types.into_iter().map(Into::into).collect();
        self
    }
}

enum ChatSource {
    Live(LiveChatStream<TcpConnector>),
    Replay(ReplayChatStream<ApiPageSource>),
}

/// An open chat retrieval.
///
/// Events arrive lazily through [`Chat::next_event`], or through the
/// [`Stream`] adapter from [`Chat::into_stream`].
pub struct Chat {
    /// Stream, VOD or clip title, when the backend reports one.
    pub title: Option<String>,
    /// Length in seconds. `None` for live chat.
    pub duration: Option<f64>,
    pub is_live: bool,
    source: ChatSource,
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("title", &self.title)
            .field("duration", &self.duration)
            .field("is_live", &self.is_live)
            .finish_non_exhaustive()
    }
}

impl Chat {
    /// Next chat event, or `None` once the chat has ended.
    pub async fn next_event(&mut self) -> Option<Result<ChatEvent>> {
        match &mut self.source {
            ChatSource::Live(live) => live.next_event().await,
            ChatSource::Replay(replay) => replay.next_event().await,
        }
    }

    /// Adapts the chat into a [`Stream`] of events.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChatEvent>> {
        stream::unfold(self, |mut chat| async move {
            chat.next_event().await.map(|event| (event, chat))
        })
    }
}

/// Entry point for retrieving Twitch chat.
///
/// Holds the HTTP client and the global badge catalog, which is fetched
/// once at construction and shared by every chat opened afterwards.
pub struct TwitchChatDownloader {
    api: TwitchApi,
    badges: Arc<BadgeCatalog>,
}

impl TwitchChatDownloader {
    /// Creates a downloader with this crate's default HTTP client.
    pub async fn new() -> Result<Self> {
        Self::with_api(TwitchApi::with_default_client()?).await
    }

    /// Creates a downloader over an existing API handle.
    pub async fn with_api(api: TwitchApi) -> Result<Self> {
        let badges = Arc::new(api.global_badges().await?);
        Ok(Self { api, badges })
    }

    /// The underlying API handle, for metadata and browse queries.
    pub fn api(&self) -> &TwitchApi {
        &self.api
    }

    /// Opens chat for any supported Twitch URL.
    ///
    /// VOD and clip URLs resolve to a replay, channel URLs to live chat.
    pub async fn get_chat(&self, url: &str, params: ChatParams) -> Result<Chat> {
        if !params.message_groups.is_empty() && !params.message_types.is_empty() {
            return Err(TwitchChatError::parameter(
                "Only one of message_groups and message_types may be specified",
            ));
        }
        let content = ContentRef::parse(url).ok_or_else(|| {
            TwitchChatError::parameter(format!("Unrecognised Twitch URL: {url}"))
        })?;
        debug!("Resolved {url} to {content:?}");
        match content {
            ContentRef::Video(id) => self.get_chat_by_vod_id(&id, params).await,
            ContentRef::Clip(slug) => self.get_chat_by_clip_slug(&slug, params).await,
            ContentRef::Channel(name) => self.get_chat_by_channel(&name, params).await,
        }
    }

    /// Chat replay for a VOD.
    pub async fn get_chat_by_vod_id(&self, vod_id: &str, params: ChatParams) -> Result<Chat> {
        let video = run_with_retries(
            params.max_attempts,
            params.retry_timeout,
            &Deadline::none(),
            || {
                let api = &self.api;
                async move { api.video_metadata(vod_id).await }
            },
        )
        .await?;

        let source = ApiPageSource::new(self.api.clone(), vod_id);
        let replay = ReplayChatStream::new(source, params, Arc::clone(&self.badges), 0.0, None);
        Ok(Chat {
            title: video.title,
            duration: video.duration,
            is_live: false,
            source: ChatSource::Replay(replay),
        })
    }

    /// Chat replay for a clip, cut from the parent VOD's replay.
    pub async fn get_chat_by_clip_slug(&self, clip_id: &str, params: ChatParams) -> Result<Chat> {
        let clip = run_with_retries(
            params.max_attempts,
            params.retry_timeout,
            &Deadline::none(),
            || {
                let api = &self.api;
                async move { api.clip_metadata(clip_id).await }
            },
        )
        .await?;

        let ClipInfo {
            video_id,
            offset,
            duration,
            title,
        } = clip;
        let source = ApiPageSource::new(self.api.clone(), video_id);
        let replay =
            ReplayChatStream::new(source, params, Arc::clone(&self.badges), offset, duration);
        Ok(Chat {
            title: Some(title),
            duration,
            is_live: false,
            source: ChatSource::Replay(replay),
        })
    }

    /// Live chat for a channel.
    ///
    /// The IRC connection is opened whether or not the channel is currently
    /// broadcasting; an offline channel simply produces no events.
    pub async fn get_chat_by_channel(
        &self,
        channel_name: &str,
        params: ChatParams,
    ) -> Result<Chat> {
        let info = run_with_retries(
            params.max_attempts,
            params.retry_timeout,
            &Deadline::none(),
            || {
                let api = &self.api;
                async move { api.stream_metadata(channel_name).await }
            },
        )
        .await?;

        let live = LiveChatStream::new(TcpConnector, channel_name, params, Arc::clone(&self.badges));
        Ok(Chat {
            title: info.title,
            duration: None,
            is_live: info.is_live,
            source: ChatSource::Live(live),
        })
    }
}
