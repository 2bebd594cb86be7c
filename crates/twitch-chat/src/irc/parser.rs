//! Parsing of tagged IRC lines into chat events.

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::badges::{BadgeCatalog, set_subscriber_badge_info};
use crate::event::ChatEvent;
use crate::filter::MESSAGE_TYPE_REMAPPING;
use crate::remap::{IRC_REMAPPING, RemapContext, UnknownKey, move_to_object, remap};

/// Matches one tagged IRC line, e.g.
/// `@badges=subscriber/6;color=#FF69B4 :sumz5!sumz5@sumz5.tmi.twitch.tv PRIVMSG #chan :hello`.
///
/// Groups: 1 tag block, 2 command, 3 message body.
pub static MESSAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^@(.+?)\s+:.*tmi\.twitch\.tv\s+(\S+)(?:.+#\S+)?(?:.:)*([^\r\n]*)").unwrap()
});

/// IRC commands to canonical action types. Unknown commands pass through
/// unchanged.
pub static ACTION_TYPE_REMAPPING: LazyLock<FxHashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        [
            // tags
            ("CLEARCHAT", "clear_chat"),
            ("CLEARMSG", "delete_message"),
            ("GLOBALUSERSTATE", "successful_login"),
            ("PRIVMSG", "text_message"),
            ("ROOMSTATE", "room_state"),
            ("USERNOTICE", "user_notice"),
            ("USERSTATE", "user_state"),
            // commands
            ("HOSTTARGET", "host_target"),
            ("NOTICE", "notice"),
            ("RECONNECT", "reconnect"),
        ]
        .into_iter()
        .collect()
    });

/// One regex-matched IRC line with its capture groups extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    pub tags: String,
    pub command: String,
    pub body: String,
}

impl IrcLine {
    fn from_captures(caps: &regex::Captures<'_>) -> Self {
        let group = |i: usize| {
            caps.get(i)
                .map_or_else(String::new, |m| m.as_str().to_string())
        };
        Self {
            tags: group(1),
            command: group(2),
            body: group(3),
        }
    }
}

/// Splits the read buffer into complete IRC lines and the remainder to
/// carry into the next read.
///
/// A buffer ending in `\r\n` was read completely and is consumed whole.
/// Otherwise the final match is suspect: if a terminator occurs anywhere
/// after its start the match was actually complete and only the trailing
/// remainder is retained, else the match itself was cut off and is held
/// back, unprocessed, for the next read to finish it.
pub fn split_buffer(buffer: &str) -> (Vec<IrcLine>, String) {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut lines: Vec<IrcLine> = Vec::new();
    for caps in MESSAGE_REGEX.captures_iter(buffer) {
        if let Some(whole) = caps.get(0) {
            spans.push((whole.start(), whole.end()));
            lines.push(IrcLine::from_captures(&caps));
        }
    }

    let full_buffer = buffer.ends_with("\r\n");

    if lines.is_empty() {
        if full_buffer {
            // Data was read successfully but nothing matched, so the buffer
            // can safely be dropped instead of growing without bound.
            debug!("No matches found in \"\n{}\n\"", buffer.trim());
            return (lines, String::new());
        }
        return (lines, buffer.to_string());
    }

    if full_buffer {
        return (lines, String::new());
    }

    let Some(&(last_start, last_end)) = spans.last() else {
        return (lines, buffer.to_string());
    };
    let pass_on = &buffer[last_start..];
    if pass_on.contains("\r\n") {
        // The last match was complete after all; retain only what follows it.
        (lines, buffer[last_end..].to_string())
    } else {
        // The last match itself was cut off. Hold it back for the next read.
        lines.pop();
        (lines, pass_on.to_string())
    }
}

/// Parses one IRC line into a chat event.
pub fn parse_irc_line(line: &IrcLine, badges: &BadgeCatalog) -> ChatEvent {
    let ctx = RemapContext { badges };
    let mut info = Map::new();

    for item in line.tags.split(';') {
        let (key, value) = match item.split_once('=') {
            Some((key, value)) => (key, Value::from(value)),
            // a tag without an equals sign is a boolean flag
            None => (item, Value::Bool(true)),
        };
        remap(
            &mut info,
            &IRC_REMAPPING,
            key,
            value,
            &ctx,
            UnknownKey::KeepUnderscored,
        );
    }

    if !line.body.is_empty() {
        let message = line
            .body
            .strip_prefix("\u{1}ACTION ")
            .unwrap_or(&line.body);
        info.insert("message".into(), Value::from(message));
    }

    // Subscriber tenure lives in badge-info, not in the badge tag itself.
    let badge_metadata = match info.remove("author_badge_metadata") {
        Some(Value::Array(list)) => list,
        _ => Vec::new(),
    };
    let subscriber_months = badge_metadata
        .iter()
        .find(|badge| badge.get("name").and_then(Value::as_str) == Some("subscriber"))
        .and_then(|badge| badge.get("version"))
        .cloned();
    if let Some(months) = subscriber_months {
        if let Some(badge_list) = info.get_mut("author_badges").and_then(|v| v.as_array_mut()) {
            if let Some(Value::Object(subscriber)) = badge_list
                .iter_mut()
                .find(|badge| badge.get("name").and_then(Value::as_str) == Some("subscriber"))
            {
                set_subscriber_badge_info(subscriber, &months);
            }
        }
    }

    if let Some(display_name) = info
        .get("author_display_name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
    {
        let lowered = display_name.to_lowercase();
        info.insert("author_name".into(), Value::from(lowered));
    }

    move_to_object(&mut info, "in_reply_to");
    if let Some(Value::Object(reply)) = info.get_mut("in_reply_to") {
        move_to_object(reply, "author");
    }
    move_to_object(&mut info, "author");

    if !line.command.is_empty() {
        let action_type = ACTION_TYPE_REMAPPING
            .get(line.command.as_str())
            .copied()
            .unwrap_or(line.command.as_str());
        info.insert("action_type".into(), Value::from(action_type));
    }

    let original_message_type = info
        .get("message_type")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_owned);
    match original_message_type {
        Some(original) => {
            if let Some(new_type) = MESSAGE_TYPE_REMAPPING.get(original.as_str()) {
                info.insert("message_type".into(), Value::from(*new_type));
            } else {
                debug!("Unknown message type: {original}");
            }
        }
        None => {
            let action = info.get("action_type").cloned().unwrap_or(Value::Null);
            info.insert("message_type".into(), action);
        }
    }

    // CLEARCHAT with a body names a banned user; without one the whole
    // chat was cleared.
    if line.command == "CLEARCHAT" && !line.body.is_empty() {
        info.insert("message_type".into(), Value::from("ban_user"));
        let is_timeout = info
            .get("ban_duration")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            != 0;
        let ban_type = if is_timeout { "timeout" } else { "permanent" };
        info.insert("ban_type".into(), Value::from(ban_type));
        let banned_user = info.remove("message").unwrap_or_else(|| Value::from(""));
        info.insert("banned_user".into(), banned_user);
    }

    // ROOMSTATE sends -1 for disabled follower-only mode, 0 for enabled
    // without a minimum follow age and a positive minute count otherwise.
    if let Some(minutes) = info.get("follower_only").and_then(Value::as_i64) {
        info.insert("follower_only".into(), Value::from(minutes != -1));
        if minutes > 0 {
            info.insert(
                "minutes_to_follow_before_chatting".into(),
                Value::from(minutes),
            );
        }
    }

    if let Some(seconds) = info.get("slow_mode").and_then(Value::as_i64) {
        if seconds != 0 {
            info.insert("slow_mode".into(), Value::Bool(true));
            info.insert("seconds_to_wait".into(), Value::from(seconds));
        } else {
            info.insert("slow_mode".into(), Value::Bool(false));
        }
    }

    ChatEvent::from_map(info)
}
