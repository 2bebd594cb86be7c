//! Declarative key remapping.
//!
//! Both backends (the v5 comments API and raw IRC) deliver flat key/value
//! data under Twitch's own naming. The tables in this module map those raw
//! keys onto canonical snake_case names, optionally passing the value
//! through a [`Transform`]. Keys missing from a table are either dropped or
//! kept verbatim, depending on the call site.

use std::sync::LazyLock;

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};

use crate::badges::{BadgeCatalog, parse_badge_info, parse_badges};
use crate::utils::{image, int_or_none, timestamp_to_microseconds};

/// How a raw key maps onto its canonical name.
#[derive(Debug, Clone, Copy)]
pub enum Remap {
    /// Rename only, the value is kept as-is.
    To(&'static str),
    /// Rename and pass the value through a transform.
    Apply(&'static str, Transform),
}

impl Remap {
    pub fn canonical(&self) -> &'static str {
        match self {
            Self::To(key) => key,
            Self::Apply(key, _) => key,
        }
    }
}

/// Pure value transforms referenced by the remapping tables.
///
/// Transforms never fail: unparseable input becomes `Value::Null`, matching
/// the tolerant handling the rest of the pipeline expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    /// RFC 3339 timestamp to epoch microseconds.
    ParseTimestamp,
    /// Author avatar URL to a list of image objects (300x300 and 70x70).
    ParseAuthorImages,
    /// IRC badge list (`name/version,...`) to a list of badge objects.
    ParseBadges,
    /// Millisecond timestamp to microseconds.
    MultiplyBy1000,
    ParseInt,
    /// IRC boolean, where `"1"` is true.
    ParseBool,
    /// Textual boolean, where `"true"` is true.
    ParseBoolText,
    /// Subscription plan id to a readable tier name.
    ParseSubscriptionType,
    /// v5 commenter object to a canonical author object.
    ParseCommenter,
    /// v5 message object to message body, colour, badges and notice params.
    ParseMessageInfo,
    /// IRCv3 tag value escapes (`\:` and `\s`).
    DecodePseudoBnf,
}

/// Shared state some transforms need, currently just the badge catalog.
#[derive(Clone, Copy)]
pub struct RemapContext<'a> {
    pub badges: &'a BadgeCatalog,
}

impl Transform {
    pub fn apply(&self, value: &Value, ctx: &RemapContext<'_>) -> Value {
        match self {
            Self::ParseTimestamp => value
                .as_str()
                .and_then(timestamp_to_microseconds)
                .map_or(Value::Null, Value::from),
            Self::ParseAuthorImages => match value.as_str() {
                Some(url) => {
                    let smaller = url.replace("300x300", "70x70");
                    Value::Array(vec![image(url, 300, 300), image(&smaller, 70, 70)])
                }
                None => Value::Null,
            },
            Self::ParseBadges => match value.as_str() {
                Some(raw) => Value::Array(parse_badges(raw, ctx.badges)),
                None => Value::Array(Vec::new()),
            },
            Self::MultiplyBy1000 => {
                int_or_none(value).map_or(Value::Null, |n| Value::from(n * 1000))
            }
            Self::ParseInt => int_or_none(value).map_or(Value::Null, Value::from),
            Self::ParseBool => Value::Bool(value.as_str() == Some("1")),
            Self::ParseBoolText => Value::Bool(value.as_str() == Some("true")),
            Self::ParseSubscriptionType => match value.as_str() {
                Some("Prime") => Value::from("Prime"),
                Some("1000") => Value::from("Tier 1"),
                Some("2000") => Value::from("Tier 2"),
                Some("3000") => Value::from("Tier 3"),
                _ => Value::Null,
            },
            Self::ParseCommenter => {
                let mut author = Map::new();
                if let Some(commenter) = value.as_object() {
                    for (key, val) in commenter {
                        remap(
                            &mut author,
                            &AUTHOR_REMAPPING,
                            key,
                            val.clone(),
                            ctx,
                            UnknownKey::Discard,
                        );
                    }
                }
                Value::Object(author)
            }
            Self::ParseMessageInfo => {
                let message = value.as_object();
                let field = |key: &str| {
                    message
                        .and_then(|m| m.get(key))
                        .cloned()
                        .unwrap_or(Value::Null)
                };
                let badges: Vec<Value> = message
                    .and_then(|m| m.get("user_badges"))
                    .and_then(Value::as_array)
                    .map(|list| {
                        list.iter()
                            .map(|badge| {
                                parse_badge_info(
                                    badge.get("_id").and_then(Value::as_str).unwrap_or(""),
                                    badge.get("version").unwrap_or(&Value::Null),
                                    true,
                                    ctx.badges,
                                )
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                let mut info = Map::new();
                info.insert("message".into(), field("body"));
                info.insert("colour".into(), field("user_color"));
                info.insert("badges".into(), Value::Array(badges));
                info.insert("user_notice_params".into(), field("user_notice_params"));
                Value::Object(info)
            }
            Self::DecodePseudoBnf => match value.as_str() {
                Some(text) => Value::from(text.replace("\\:", ";").replace("\\s", " ")),
                None => Value::Null,
            },
        }
    }
}

/// What to do with keys a table does not know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKey {
    Discard,
    /// Keep under the original key.
    Keep,
    /// Keep, with `-` replaced by `_` in the key.
    KeepUnderscored,
}

/// Applies one table entry: renames `key`, transforms `value` where the
/// table says so and inserts the result into `dest`.
pub fn remap(
    dest: &mut Map<String, Value>,
    table: &RemapTable,
    key: &str,
    value: Value,
    ctx: &RemapContext<'_>,
    unknown: UnknownKey,
) {
    match table.get(key) {
        Some(Remap::To(canonical)) => {
            dest.insert((*canonical).to_string(), value);
        }
        Some(Remap::Apply(canonical, transform)) => {
            dest.insert((*canonical).to_string(), transform.apply(&value, ctx));
        }
        None => match unknown {
            UnknownKey::Discard => {}
            UnknownKey::Keep => {
                dest.insert(key.to_string(), value);
            }
            UnknownKey::KeepUnderscored => {
                dest.insert(key.replace('-', "_"), value);
            }
        },
    }
}

/// Moves all `{name}_*` keys of `info` into a nested object under `name`.
/// Nothing is inserted when no such keys exist.
pub fn move_to_object(info: &mut Map<String, Value>, name: &str) {
    let prefix = format!("{name}_");
    let keys: Vec<String> = info
        .keys()
        .filter(|key| key.starts_with(&prefix))
        .cloned()
        .collect();
    if keys.is_empty() {
        return;
    }

    let mut nested = Map::new();
    for key in keys {
        if let Some(value) = info.remove(&key) {
            nested.insert(key[prefix.len()..].to_string(), value);
        }
    }
    info.insert(name.to_string(), Value::Object(nested));
}

pub type RemapTable = FxHashMap<&'static str, Remap>;

/// v5 commenter objects.
const AUTHOR_ENTRIES: &[(&str, Remap)] = &[
    ("_id", Remap::Apply("id", Transform::ParseInt)),
    ("name", Remap::To("name")),
    ("display_name", Remap::To("display_name")),
    ("logo", Remap::Apply("images", Transform::ParseAuthorImages)),
    ("type", Remap::To("type")),
    ("created_at", Remap::Apply("created_at", Transform::ParseTimestamp)),
    ("bio", Remap::To("bio")),
];

/// Top-level v5 comment objects.
const COMMENT_ENTRIES: &[(&str, Remap)] = &[
    ("_id", Remap::To("message_id")),
    ("created_at", Remap::Apply("timestamp", Transform::ParseTimestamp)),
    ("commenter", Remap::Apply("author", Transform::ParseCommenter)),
    ("content_offset_seconds", Remap::To("time_in_seconds")),
    ("source", Remap::To("source")),
    ("state", Remap::To("state")),
    ("message", Remap::Apply("message_info", Transform::ParseMessageInfo)),
];

/// USERNOTICE `msg-param-*` tags, shared between the replay path (where they
/// arrive as `user_notice_params`) and the IRC path.
const MESSAGE_PARAM_ENTRIES: &[(&str, Remap)] = &[
    ("msg-id", Remap::To("message_type")),
    ("msg-param-cumulative-months", Remap::Apply("cumulative_months", Transform::ParseInt)),
    ("msg-param-months", Remap::Apply("months", Transform::ParseInt)),
    ("msg-param-displayName", Remap::To("raider_display_name")),
    ("msg-param-login", Remap::To("raider_name")),
    ("msg-param-viewerCount", Remap::Apply("number_of_raiders", Transform::ParseInt)),
    ("msg-param-promo-name", Remap::To("promotion_name")),
    ("msg-param-promo-gift-total", Remap::To("number_of_gifts_given_during_promo")),
    ("msg-param-recipient-id", Remap::To("gift_recipient_id")),
    ("msg-param-recipient-user-name", Remap::To("gift_recipient_display_name")),
    ("msg-param-recipient-display-name", Remap::To("gift_recipient_display_name")),
    ("msg-param-gift-months", Remap::Apply("number_of_months_gifted", Transform::ParseInt)),
    ("msg-param-sender-login", Remap::To("gifter_name")),
    ("msg-param-sender-name", Remap::To("gifter_display_name")),
    ("msg-param-should-share-streak", Remap::Apply("user_wants_to_share_streaks", Transform::ParseBool)),
    ("msg-param-streak-months", Remap::Apply("number_of_consecutive_months_subscribed", Transform::ParseInt)),
    ("msg-param-sub-plan", Remap::Apply("subscription_type", Transform::ParseSubscriptionType)),
    ("msg-param-sub-plan-name", Remap::To("subscription_plan_name")),
    ("msg-param-ritual-name", Remap::To("ritual_name")),
    ("msg-param-threshold", Remap::To("bits_badge_tier")),
    // resub
    ("msg-param-multimonth-duration", Remap::Apply("multimonth_duration", Transform::ParseInt)),
    ("msg-param-multimonth-tenure", Remap::Apply("multimonth_tenure", Transform::ParseInt)),
    ("msg-param-was-gifted", Remap::Apply("was_gifted", Transform::ParseBoolText)),
    ("msg-param-gifter-id", Remap::To("gifter_id")),
    ("msg-param-gifter-login", Remap::To("gifter_name")),
    ("msg-param-gifter-name", Remap::To("gifter_display_name")),
    ("msg-param-anon-gift", Remap::Apply("was_anonymous_gift", Transform::ParseBoolText)),
    ("msg-param-gift-month-being-redeemed", Remap::Apply("gift_months_being_redeemed", Transform::ParseInt)),
    // rewardgift
    ("msg-param-domain", Remap::To("domain")),
    ("msg-param-selected-count", Remap::Apply("selected_count", Transform::ParseInt)),
    ("msg-param-trigger-type", Remap::To("trigger_type")),
    ("msg-param-total-reward-count", Remap::Apply("total_reward_count", Transform::ParseInt)),
    ("msg-param-trigger-amount", Remap::Apply("trigger_amount", Transform::ParseInt)),
    // submysterygift
    ("msg-param-origin-id", Remap::To("origin_id")),
    ("msg-param-sender-count", Remap::Apply("sender_count", Transform::ParseInt)),
    ("msg-param-mass-gift-count", Remap::Apply("mass_gift_count", Transform::ParseInt)),
    // communitypayforward
    ("msg-param-prior-gifter-anonymous", Remap::Apply("prior_gifter_anonymous", Transform::ParseBoolText)),
    ("msg-param-prior-gifter-user-name", Remap::To("prior_gifter_name")),
    ("msg-param-prior-gifter-display-name", Remap::To("prior_gifter_display_name")),
    ("msg-param-prior-gifter-id", Remap::To("prior_gifter_id")),
    ("msg-param-fun-string", Remap::To("fun_string")),
    // removed from the final event after parsing
    ("msg-param-profileImageURL", Remap::To("profile_image_url")),
];

/// IRCv3 message tags.
const IRC_ENTRIES: &[(&str, Remap)] = &[
    // CLEARCHAT: duration of the timeout in seconds, omitted for permanent bans
    ("ban-duration", Remap::Apply("ban_duration", Transform::ParseInt)),
    // CLEARMSG
    ("login", Remap::To("author_name")),
    ("target-msg-id", Remap::To("target_message_id")),
    // GLOBALUSERSTATE
    ("emote-sets", Remap::To("emote_sets")),
    // general; colour can be empty, which means it depends on the theme
    ("color", Remap::To("author_colour")),
    ("display-name", Remap::To("author_display_name")),
    ("user-id", Remap::Apply("author_id", Transform::ParseInt)),
    // PRIVMSG
    ("badge-info", Remap::Apply("author_badge_metadata", Transform::ParseBadges)),
    ("badges", Remap::Apply("author_badges", Transform::ParseBadges)),
    ("bits", Remap::Apply("bits", Transform::ParseInt)),
    ("id", Remap::To("message_id")),
    ("mod", Remap::Apply("is_moderator", Transform::ParseBool)),
    ("room-id", Remap::Apply("channel_id", Transform::ParseInt)),
    ("tmi-sent-ts", Remap::Apply("timestamp", Transform::MultiplyBy1000)),
    ("subscriber", Remap::Apply("is_subscriber", Transform::ParseBool)),
    ("turbo", Remap::Apply("is_turbo", Transform::ParseBool)),
    ("client-nonce", Remap::To("client_nonce")),
    ("user-type", Remap::To("user_type")),
    ("reply-parent-msg-body", Remap::Apply("in_reply_to_message", Transform::DecodePseudoBnf)),
    ("reply-parent-user-id", Remap::Apply("in_reply_to_author_id", Transform::ParseInt)),
    ("reply-parent-msg-id", Remap::To("in_reply_to_message_id")),
    ("reply-parent-display-name", Remap::To("in_reply_to_author_display_name")),
    ("reply-parent-user-login", Remap::To("in_reply_to_author_name")),
    ("custom-reward-id", Remap::To("custom_reward_id")),
    ("emotes", Remap::To("emotes")),
    ("flags", Remap::To("flags")),
    // ROOMSTATE
    ("emote-only", Remap::Apply("emote_only", Transform::ParseBool)),
    ("followers-only", Remap::Apply("follower_only", Transform::ParseInt)),
    ("r9k", Remap::Apply("r9k_mode", Transform::ParseBool)),
    ("slow", Remap::Apply("slow_mode", Transform::ParseInt)),
    ("subs-only", Remap::Apply("subscriber_only", Transform::ParseBool)),
    ("rituals", Remap::Apply("rituals_enabled", Transform::ParseBool)),
    // USERNOTICE
    ("system-msg", Remap::To("system_message")),
    // HOSTTARGET
    ("number-of-viewers", Remap::To("number_of_viewers")),
    // CLEARCHAT on a single user
    ("target-user-id", Remap::Apply("target_author_id", Transform::ParseInt)),
];

pub static AUTHOR_REMAPPING: LazyLock<RemapTable> =
    LazyLock::new(|| AUTHOR_ENTRIES.iter().copied().collect());

pub static COMMENT_REMAPPING: LazyLock<RemapTable> =
    LazyLock::new(|| COMMENT_ENTRIES.iter().copied().collect());

pub static MESSAGE_PARAM_REMAPPING: LazyLock<RemapTable> =
    LazyLock::new(|| MESSAGE_PARAM_ENTRIES.iter().copied().collect());

/// The IRC table also answers for USERNOTICE `msg-param-*` tags.
pub static IRC_REMAPPING: LazyLock<RemapTable> = LazyLock::new(|| {
    IRC_ENTRIES
        .iter()
        .chain(MESSAGE_PARAM_ENTRIES.iter())
        .copied()
        .collect()
});

/// Canonical keys the IRC parser is expected to produce. Anything outside
/// this set gets logged so new tags are noticed.
pub static KNOWN_IRC_KEYS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    let mut keys: FxHashSet<&'static str> = [
        // set while parsing bans
        "banned_user",
        "ban_type",
        // slow mode
        "seconds_to_wait",
        // follower only mode
        "minutes_to_follow_before_chatting",
        // set elsewhere in the parser
        "action_type",
        "author",
        "in_reply_to",
        "message",
    ]
    .into_iter()
    .collect();
    keys.extend(IRC_REMAPPING.values().map(Remap::canonical));
    keys
});

/// Canonical keys a parsed replay comment is expected to contain.
pub static KNOWN_COMMENT_KEYS: LazyLock<FxHashSet<&'static str>> = LazyLock::new(|| {
    let mut keys: FxHashSet<&'static str> = [
        "message",
        "time_in_seconds",
        "message_id",
        "time_text",
        "author",
        "timestamp",
        "message_type",
    ]
    .into_iter()
    .collect();
    keys.extend(COMMENT_REMAPPING.values().map(Remap::canonical));
    keys.extend(MESSAGE_PARAM_REMAPPING.values().map(Remap::canonical));
    keys
});

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_catalog() -> BadgeCatalog {
        BadgeCatalog::empty()
    }

    fn apply(transform: Transform, value: Value) -> Value {
        let catalog = ctx_catalog();
        let ctx = RemapContext { badges: &catalog };
        transform.apply(&value, &ctx)
    }

    #[test]
    fn test_parse_int_transform() {
        assert_eq!(apply(Transform::ParseInt, json!("42")), json!(42));
        assert_eq!(apply(Transform::ParseInt, json!(7)), json!(7));
        assert_eq!(apply(Transform::ParseInt, json!("x")), Value::Null);
    }

    #[test]
    fn test_bool_transforms() {
        assert_eq!(apply(Transform::ParseBool, json!("1")), json!(true));
        assert_eq!(apply(Transform::ParseBool, json!("0")), json!(false));
        assert_eq!(apply(Transform::ParseBool, json!(true)), json!(false));
        assert_eq!(apply(Transform::ParseBoolText, json!("true")), json!(true));
        assert_eq!(apply(Transform::ParseBoolText, json!("false")), json!(false));
    }

    #[test]
    fn test_multiply_by_1000() {
        assert_eq!(
            apply(Transform::MultiplyBy1000, json!("1607447245754")),
            json!(1_607_447_245_754_000i64)
        );
        assert_eq!(apply(Transform::MultiplyBy1000, json!("")), Value::Null);
    }

    #[test]
    fn test_subscription_type() {
        assert_eq!(
            apply(Transform::ParseSubscriptionType, json!("Prime")),
            json!("Prime")
        );
        assert_eq!(
            apply(Transform::ParseSubscriptionType, json!("1000")),
            json!("Tier 1")
        );
        assert_eq!(
            apply(Transform::ParseSubscriptionType, json!("3000")),
            json!("Tier 3")
        );
        assert_eq!(
            apply(Transform::ParseSubscriptionType, json!("9000")),
            Value::Null
        );
    }

    #[test]
    fn test_decode_pseudo_bnf() {
        assert_eq!(
            apply(Transform::DecodePseudoBnf, json!(r"hello\sworld\:")),
            json!("hello world;")
        );
    }

    #[test]
    fn test_parse_author_images() {
        let images = apply(
            Transform::ParseAuthorImages,
            json!("https://cdn.example/profile_image-300x300.png"),
        );
        let images = images.as_array().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0]["width"], 300);
        assert_eq!(images[0]["id"], "300x300");
        assert_eq!(
            images[1]["url"],
            "https://cdn.example/profile_image-70x70.png"
        );
        assert_eq!(images[1]["height"], 70);
    }

    #[test]
    fn test_parse_commenter_drops_unknown_keys() {
        let commenter = json!({
            "_id": "611966876",
            "display_name": "sumz5",
            "logo": "https://cdn.example/profile_image-300x300.png",
            "unknown_field": "dropped",
        });
        let author = apply(Transform::ParseCommenter, commenter);
        let author = author.as_object().unwrap();
        assert_eq!(author["id"], json!(611966876));
        assert_eq!(author["display_name"], "sumz5");
        assert!(author.contains_key("images"));
        assert!(!author.contains_key("unknown_field"));
    }

    #[test]
    fn test_remap_unknown_key_modes() {
        let catalog = ctx_catalog();
        let ctx = RemapContext { badges: &catalog };

        let mut discard = Map::new();
        remap(
            &mut discard,
            &IRC_REMAPPING,
            "brand-new-tag",
            json!("x"),
            &ctx,
            UnknownKey::Discard,
        );
        assert!(discard.is_empty());

        let mut keep = Map::new();
        remap(
            &mut keep,
            &IRC_REMAPPING,
            "brand-new-tag",
            json!("x"),
            &ctx,
            UnknownKey::Keep,
        );
        assert_eq!(keep["brand-new-tag"], "x");

        let mut underscored = Map::new();
        remap(
            &mut underscored,
            &IRC_REMAPPING,
            "brand-new-tag",
            json!("x"),
            &ctx,
            UnknownKey::KeepUnderscored,
        );
        assert_eq!(underscored["brand_new_tag"], "x");
    }

    #[test]
    fn test_remap_is_idempotent() {
        let catalog = ctx_catalog();
        let ctx = RemapContext { badges: &catalog };

        let raw = [
            ("display-name", json!("sumz5")),
            ("bits", json!("100")),
            ("tmi-sent-ts", json!("1607447245754")),
            ("mod", json!("0")),
            ("emotes", json!("")),
        ];
        let mut once = Map::new();
        for (key, value) in raw {
            remap(
                &mut once,
                &IRC_REMAPPING,
                key,
                value,
                &ctx,
                UnknownKey::KeepUnderscored,
            );
        }

        let mut twice = Map::new();
        for (key, value) in &once {
            remap(
                &mut twice,
                &IRC_REMAPPING,
                key,
                value.clone(),
                &ctx,
                UnknownKey::KeepUnderscored,
            );
        }
        assert_eq!(once, twice);
    }

    #[test]
    fn test_move_to_object() {
        let mut info = Map::new();
        info.insert("author_name".to_string(), json!("sumz5"));
        info.insert("author_id".to_string(), json!(611966876));
        info.insert("message".to_string(), json!("hi"));
        move_to_object(&mut info, "author");

        assert_eq!(info["author"]["name"], "sumz5");
        assert_eq!(info["author"]["id"], 611966876);
        assert!(!info.contains_key("author_name"));
        assert_eq!(info["message"], "hi");
    }

    #[test]
    fn test_move_to_object_skips_when_empty() {
        let mut info = Map::new();
        info.insert("message".to_string(), json!("hi"));
        move_to_object(&mut info, "author");
        assert!(!info.contains_key("author"));
    }

    #[test]
    fn test_nested_reply_move() {
        let mut info = Map::new();
        info.insert("in_reply_to_message_id".to_string(), json!("abc"));
        info.insert("in_reply_to_author_id".to_string(), json!(42));
        info.insert("in_reply_to_author_name".to_string(), json!("someone"));
        move_to_object(&mut info, "in_reply_to");
        if let Some(Value::Object(reply)) = info.get_mut("in_reply_to") {
            move_to_object(reply, "author");
        }

        assert_eq!(info["in_reply_to"]["message_id"], "abc");
        assert_eq!(info["in_reply_to"]["author"]["id"], 42);
        assert_eq!(info["in_reply_to"]["author"]["name"], "someone");
    }

    #[test]
    fn test_known_key_sets_cover_tables() {
        assert!(KNOWN_IRC_KEYS.contains("author_display_name"));
        assert!(KNOWN_IRC_KEYS.contains("subscription_type"));
        assert!(KNOWN_IRC_KEYS.contains("banned_user"));
        assert!(KNOWN_COMMENT_KEYS.contains("time_text"));
        assert!(KNOWN_COMMENT_KEYS.contains("gifter_name"));
        assert!(!KNOWN_COMMENT_KEYS.contains("ban_duration"));
    }
}
