//! Replayed chat for VODs and clips, paged through the comments API.
//!
//! Comments arrive in cursor-linked pages; each record is remapped into a
//! [`ChatEvent`], shifted by the clip offset, windowed against the
//! caller's start and end times and filtered by message type.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::TwitchApi;
use crate::badges::BadgeCatalog;
use crate::client::ChatParams;
use crate::error::{Result, TwitchChatError};
use crate::event::ChatEvent;
use crate::filter::{MESSAGE_TYPE_REMAPPING, should_add};
use crate::remap::{
    COMMENT_REMAPPING, KNOWN_COMMENT_KEYS, MESSAGE_PARAM_REMAPPING, RemapContext, UnknownKey,
    remap,
};
use crate::retry::{Deadline, run_with_retries};
use crate::utils::{is_truthy, seconds_to_time};

/// One page of archived comments, addressed by cursor and start offset.
///
/// Abstracted from [`TwitchApi`] so the paging loop can be driven by
/// canned pages in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, cursor: &str, content_offset_seconds: f64) -> Result<Value>;
}

/// The real comments endpoint for one VOD.
pub struct ApiPageSource {
    api: TwitchApi,
    vod_id: String,
}

impl ApiPageSource {
    pub fn new(api: TwitchApi, vod_id: impl Into<String>) -> Self {
        Self {
            api,
            vod_id: vod_id.into(),
        }
    }
}

#[async_trait]
impl PageSource for ApiPageSource {
    async fn fetch(&self, cursor: &str, content_offset_seconds: f64) -> Result<Value> {
        self.api
            .comments_page(&self.vod_id, cursor, content_offset_seconds)
            .await
    }
}

/// An archived chat replay.
///
/// For clips the whole retrieval is shifted: fetching starts at the
/// clip's position inside the parent VOD and every comment's time is
/// rebased so the clip starts at zero. A comment past the end of the
/// window terminates the entire retrieval, since comments arrive in
/// offset order.
pub struct ReplayChatStream<S: PageSource> {
    source: S,
    params: ChatParams,
    badges: Arc<BadgeCatalog>,
    offset: f64,
    start_time: f64,
    end_time: Option<f64>,
    content_offset_seconds: f64,
    cursor: String,
    pending: VecDeque<ChatEvent>,
    deadline: Deadline,
    finished: bool,
}

impl<S: PageSource> ReplayChatStream<S> {
    /// `offset` and `max_duration` position a clip inside its parent VOD;
    /// a plain VOD passes `0.0` and `None`.
    pub fn new(
        source: S,
        params: ChatParams,
        badges: Arc<BadgeCatalog>,
        offset: f64,
        max_duration: Option<f64>,
    ) -> Self {
        // Messages from before the broadcast started are never archived,
        // so the window opens at zero unless the caller moved it.
        let start_time = params.start_time.unwrap_or(0.0);
        let end_time = params.end_time.or(max_duration);
        let content_offset_seconds = start_time + offset;
        let deadline = Deadline::new(params.timeout);
        Self {
            source,
            badges,
            offset,
            start_time,
            end_time,
            content_offset_seconds,
            cursor: String::new(),
            pending: VecDeque::new(),
            deadline,
            finished: false,
            params,
        }
    }

    /// Next chat event, or `None` once the replay is exhausted.
    pub async fn next_event(&mut self) -> Option<Result<ChatEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            if let Err(error) = self.fetch_page().await {
                self.finished = true;
                return Some(Err(error));
            }
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let info = run_with_retries(
            self.params.max_attempts,
            self.params.retry_timeout,
            &self.deadline,
            || {
                let source = &self.source;
                let cursor = self.cursor.as_str();
                let content_offset_seconds = self.content_offset_seconds;
                async move { source.fetch(cursor, content_offset_seconds).await }
            },
        )
        .await?;

        if let Some(error) = info.get("error").filter(|value| is_truthy(value)) {
            let message = info
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| error.to_string());
            return Err(TwitchChatError::backend(message));
        }

        let comments = info
            .get("comments")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for comment in comments {
            let event = parse_comment(comment, self.offset, &self.badges);

            let missing: Vec<&str> = event
                .0
                .keys()
                .map(String::as_str)
                .filter(|key| !KNOWN_COMMENT_KEYS.contains(key))
                .collect();
            if !missing.is_empty() {
                debug!(?missing, parsed = ?event, "Parsed comment contains unrecognised keys");
            }

            let time_in_seconds = event
                .get("time_in_seconds")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);

            if time_in_seconds < self.start_time {
                continue;
            }
            if self.end_time.is_some_and(|end| time_in_seconds > end) {
                self.finished = true;
                return Ok(());
            }
            if should_add(&event, &self.params.message_groups, &self.params.message_types) {
                self.pending.push_back(event);
            }
        }

        match info.get("_next").filter(|value| is_truthy(value)) {
            Some(next) => self.cursor = next.as_str().unwrap_or_default().to_string(),
            None => self.finished = true,
        }
        Ok(())
    }
}

/// Rebases a comment's offset by the clip position, keeping integers
/// integral the way the API serialises them.
fn adjust_time(value: &Value, offset: f64) -> Value {
    match value.as_f64() {
        Some(seconds) => {
            let adjusted = seconds - offset;
            if value.is_i64() && offset.fract() == 0.0 {
                Value::from(adjusted as i64)
            } else {
                Value::from(adjusted)
            }
        }
        None => value.clone(),
    }
}

/// Parses one comments-API record into a canonical event.
pub fn parse_comment(item: &Value, offset: f64, badges: &BadgeCatalog) -> ChatEvent {
    let mut info = Map::new();
    let ctx = RemapContext { badges };

    if let Some(fields) = item.as_object() {
        for (key, value) in fields {
            remap(
                &mut info,
                &COMMENT_REMAPPING,
                key,
                value.clone(),
                &ctx,
                UnknownKey::Discard,
            );
        }
    }

    if let Some(time_value) = info.get("time_in_seconds").cloned() {
        let adjusted = adjust_time(&time_value, offset);
        let seconds = adjusted.as_f64().unwrap_or(0.0) as i64;
        info.insert("time_in_seconds".to_string(), adjusted);
        info.insert(
            "time_text".to_string(),
            Value::String(seconds_to_time(seconds)),
        );
    }

    let message_info = info.remove("message_info");
    if let Some(message_info) = message_info
        .as_ref()
        .and_then(Value::as_object)
        .filter(|fields| !fields.is_empty())
    {
        info.insert(
            "message".to_string(),
            message_info.get("message").cloned().unwrap_or(Value::Null),
        );

        let author = info
            .entry("author".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(author) = author.as_object_mut() {
            author.insert(
                "colour".to_string(),
                message_info.get("colour").cloned().unwrap_or(Value::Null),
            );
            if let Some(badge_list) = message_info
                .get("badges")
                .and_then(Value::as_array)
                .filter(|list| !list.is_empty())
            {
                author.insert("badges".to_string(), Value::Array(badge_list.clone()));
            }
        }

        if let Some(user_notice_params) = message_info
            .get("user_notice_params")
            .and_then(Value::as_object)
        {
            for (key, value) in user_notice_params {
                remap(
                    &mut info,
                    &MESSAGE_PARAM_REMAPPING,
                    key,
                    value.clone(),
                    &ctx,
                    UnknownKey::Keep,
                );
            }
        }
    }

    match info
        .get("message_type")
        .and_then(Value::as_str)
        .filter(|message_type| !message_type.is_empty())
        .map(str::to_owned)
    {
        Some(original) => match MESSAGE_TYPE_REMAPPING.get(original.as_str()) {
            Some(new_type) => {
                info.insert(
                    "message_type".to_string(),
                    Value::String((*new_type).to_string()),
                );
            }
            None => debug!(message_type = %original, "Unknown message type"),
        },
        None => {
            info.insert(
                "message_type".to_string(),
                Value::String("text_message".to_string()),
            );
        }
    }

    info.remove("profile_image_url");

    ChatEvent::from_map(info)
}
