//! Message grouping and the group/type filter.
//!
//! Every event ends up with a canonical `message_type`. Types are organised
//! into named groups so callers can ask for broad categories ("messages",
//! "bans") instead of enumerating individual types.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use crate::event::ChatEvent;

/// Action-type membership per group. Types produced by `msg-id` remapping
/// are appended to these at startup.
const MESSAGE_GROUP_BASE: &[(&str, &[&str])] = &[
    ("messages", &["text_message"]),
    ("bans", &["ban_user"]),
    ("deleted_messages", &["delete_message"]),
    ("hosts", &["host_target"]),
    ("room_states", &["room_state"]),
    ("user_states", &["user_state"]),
    ("notices", &["user_notice", "notice", "successful_login"]),
    ("other", &["clear_chat", "reconnect"]),
];

/// Raw `msg-id` values to canonical message types, organised by group.
const MESSAGE_GROUP_REMAPPINGS: &[(&str, &[(&str, &str)])] = &[
    (
        "messages",
        &[
            ("highlighted-message", "highlighted_message"),
            ("skip-subs-mode-message", "send_message_in_subscriber_only_mode"),
        ],
    ),
    ("bits", &[("bitsbadgetier", "bits_badge_tier")]),
    (
        "subscriptions",
        &[
            ("sub", "subscription"),
            ("resub", "resubscription"),
            ("subgift", "subscription_gift"),
            ("anonsubgift", "anonymous_subscription_gift"),
            ("anonsubmysterygift", "anonymous_mystery_subscription_gift"),
            ("submysterygift", "mystery_subscription_gift"),
            ("extendsub", "extend_subscription"),
            ("standardpayforward", "standard_pay_forward"),
            ("communitypayforward", "community_pay_forward"),
            ("primecommunitygiftreceived", "prime_community_gift_received"),
        ],
    ),
    (
        "upgrades",
        &[
            ("primepaidupgrade", "prime_paid_upgrade"),
            ("giftpaidupgrade", "gift_paid_upgrade"),
            ("rewardgift", "reward_gift"),
            ("anongiftpaidupgrade", "anonymous_gift_paid_upgrade"),
        ],
    ),
    ("raids", &[("raid", "raid"), ("unraid", "unraid")]),
    (
        "hosts",
        &[
            ("host_on", "start_host"),
            ("host_off", "end_host"),
            ("bad_host_hosting", "bad_host_hosting"),
            ("bad_host_rate_exceeded", "bad_host_rate_exceeded"),
            ("bad_host_error", "bad_host_error"),
            ("hosts_remaining", "hosts_remaining"),
            ("not_hosting", "not_hosting"),
            ("host_target_went_offline", "host_target_went_offline"),
        ],
    ),
    ("rituals", &[("ritual", "ritual")]),
    (
        "room_states",
        &[
            // slow mode
            ("slow_on", "enable_slow_mode"),
            ("slow_off", "disable_slow_mode"),
            ("already_slow_on", "slow_mode_already_on"),
            ("already_slow_off", "slow_mode_already_off"),
            // sub only mode
            ("subs_on", "enable_subscriber_only_mode"),
            ("subs_off", "disable_subscriber_only_mode"),
            ("already_subs_on", "sub_mode_already_on"),
            ("already_subs_off", "sub_mode_already_off"),
            // emote only mode
            ("emote_only_on", "enable_emote_only_mode"),
            ("emote_only_off", "disable_emote_only_mode"),
            ("already_emote_only_on", "emote_only_already_on"),
            ("already_emote_only_off", "emote_only_already_off"),
            // r9k mode
            ("r9k_on", "enable_r9k_mode"),
            ("r9k_off", "disable_r9k_mode"),
            ("already_r9k_on", "r9k_mode_already_on"),
            ("already_r9k_off", "r9k_mode_already_off"),
            // follower only mode
            ("followers_on", "enable_follower_only_mode"),
            ("followers_on_zero", "enable_follower_only_mode"),
            ("followers_off", "disable_follower_only_mode"),
            ("already_followers_on", "follower_only_mode_already_on"),
            ("already_followers_on_zero", "follower_only_mode_already_on"),
            ("already_followers_off", "follower_only_mode_already_off"),
        ],
    ),
    (
        "deleted_messages",
        &[
            ("msg_banned", "banned_message"),
            ("bad_delete_message_error", "bad_delete_message_error"),
            ("bad_delete_message_broadcaster", "bad_delete_message_broadcaster"),
            ("bad_delete_message_mod", "bad_delete_message_mod"),
            ("delete_message_success", "delete_message_success"),
        ],
    ),
    (
        "bans",
        &[
            ("already_banned", "already_banned"),
            ("bad_ban_self", "bad_ban_self"),
            ("bad_ban_broadcaster", "bad_ban_broadcaster"),
            ("bad_ban_admin", "bad_ban_admin"),
            ("bad_ban_global_mod", "bad_ban_global_mod"),
            ("bad_ban_staff", "bad_ban_staff"),
            ("ban_success", "ban_success"),
            ("bad_unban_no_ban", "bad_unban_no_ban"),
            ("unban_success", "unban_success"),
            ("msg_channel_suspended", "channel_suspended_message"),
            ("timeout_success", "timeout_success"),
            ("bad_timeout_self", "bad_timeout_self"),
            ("bad_timeout_broadcaster", "bad_timeout_broadcaster"),
            ("bad_timeout_mod", "bad_timeout_mod"),
            ("bad_timeout_admin", "bad_timeout_admin"),
            ("bad_timeout_global_mod", "bad_timeout_global_mod"),
            ("bad_timeout_staff", "bad_timeout_staff"),
        ],
    ),
    (
        "mods",
        &[
            ("bad_mod_banned", "bad_mod_banned"),
            ("bad_mod_mod", "bad_mod_mod"),
            ("mod_success", "mod_success"),
            ("bad_unmod_mod", "bad_unmod_mod"),
            ("unmod_success", "unmod_success"),
            ("no_mods", "no_mods"),
            ("room_mods", "room_mods"),
        ],
    ),
    (
        "colours",
        &[
            ("turbo_only_color", "turbo_only_colour"),
            ("color_changed", "colour_changed"),
        ],
    ),
    (
        "commercials",
        &[
            ("bad_commercial_error", "bad_commercial_error"),
            ("commercial_success", "commercial_success"),
        ],
    ),
    (
        "vips",
        &[
            ("bad_vip_grantee_banned", "bad_vip_grantee_banned"),
            ("bad_vip_grantee_already_vip", "bad_vip_grantee_already_vip"),
            ("vip_success", "vip_success"),
            ("bad_unvip_grantee_not_vip", "bad_unvip_grantee_not_vip"),
            ("unvip_success", "unvip_success"),
            ("no_vips", "no_vips"),
            ("vips_success", "vips_success"),
        ],
    ),
    (
        "other",
        &[
            ("cmds_available", "cmds_available"),
            ("unrecognized_cmd", "unrecognized_cmd"),
            ("no_permission", "no_permission"),
            ("msg_ratelimit", "rate_limit_reached_message"),
        ],
    ),
];

/// Flat raw `msg-id` to canonical message type lookup.
pub static MESSAGE_TYPE_REMAPPING: LazyLock<FxHashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        MESSAGE_GROUP_REMAPPINGS
            .iter()
            .flat_map(|(_, pairs)| pairs.iter().copied())
            .collect()
    });

/// Group name to the full list of canonical message types it contains.
pub static MESSAGE_GROUPS: LazyLock<FxHashMap<&'static str, Vec<&'static str>>> =
    LazyLock::new(|| {
        let mut groups: FxHashMap<&'static str, Vec<&'static str>> = MESSAGE_GROUP_BASE
            .iter()
            .map(|(name, types)| (*name, types.to_vec()))
            .collect();
        for &(name, pairs) in MESSAGE_GROUP_REMAPPINGS {
            groups
                .entry(name)
                .or_default()
                .extend(pairs.iter().map(|&(_, canonical)| canonical));
        }
        groups
    });

/// Decides whether an event passes the configured group/type filter.
///
/// No filter at all lets everything through, as does the special name
/// `all` in either list. Otherwise an event passes when its type is listed
/// explicitly or belongs to one of the requested groups.
pub fn should_add(event: &ChatEvent, groups: &[String], types: &[String]) -> bool {
    if groups.is_empty() && types.is_empty() {
        return true;
    }
    if groups.iter().any(|g| g == "all") || types.iter().any(|t| t == "all") {
        return true;
    }

    let Some(message_type) = event.message_type() else {
        return false;
    };
    if types.iter().any(|t| t == message_type) {
        return true;
    }
    groups.iter().any(|group| {
        MESSAGE_GROUPS
            .get(group.as_str())
            .is_some_and(|members| members.contains(&message_type))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_of_type(message_type: &str) -> ChatEvent {
        let mut event = ChatEvent::new();
        event.0.insert("message_type".into(), json!(message_type));
        event
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_type_remapping_lookups() {
        assert_eq!(MESSAGE_TYPE_REMAPPING.get("sub"), Some(&"subscription"));
        assert_eq!(
            MESSAGE_TYPE_REMAPPING.get("highlighted-message"),
            Some(&"highlighted_message")
        );
        assert_eq!(
            MESSAGE_TYPE_REMAPPING.get("msg_ratelimit"),
            Some(&"rate_limit_reached_message")
        );
        assert_eq!(MESSAGE_TYPE_REMAPPING.get("not-a-msg-id"), None);
    }

    #[test]
    fn test_groups_include_remapped_types() {
        let messages = &MESSAGE_GROUPS["messages"];
        assert!(messages.contains(&"text_message"));
        assert!(messages.contains(&"highlighted_message"));

        let subscriptions = &MESSAGE_GROUPS["subscriptions"];
        assert!(subscriptions.contains(&"resubscription"));

        let bans = &MESSAGE_GROUPS["bans"];
        assert!(bans.contains(&"ban_user"));
        assert!(bans.contains(&"timeout_success"));
    }

    #[test]
    fn test_no_filter_lets_everything_through() {
        assert!(should_add(&event_of_type("text_message"), &[], &[]));
        assert!(should_add(&event_of_type("ban_user"), &[], &[]));
        assert!(should_add(&ChatEvent::new(), &[], &[]));
    }

    #[test]
    fn test_all_keyword() {
        assert!(should_add(
            &event_of_type("whatever"),
            &strings(&["all"]),
            &[]
        ));
        assert!(should_add(
            &event_of_type("whatever"),
            &[],
            &strings(&["all"])
        ));
    }

    #[test]
    fn test_group_filter() {
        let groups = strings(&["messages"]);
        assert!(should_add(&event_of_type("text_message"), &groups, &[]));
        assert!(should_add(
            &event_of_type("highlighted_message"),
            &groups,
            &[]
        ));
        assert!(!should_add(&event_of_type("ban_user"), &groups, &[]));
    }

    #[test]
    fn test_type_filter() {
        let types = strings(&["ban_user"]);
        assert!(should_add(&event_of_type("ban_user"), &[], &types));
        assert!(!should_add(&event_of_type("text_message"), &[], &types));
    }

    #[test]
    fn test_event_without_type_is_dropped_when_filtering() {
        assert!(!should_add(&ChatEvent::new(), &strings(&["messages"]), &[]));
    }

    #[test]
    fn test_unknown_group_matches_nothing() {
        assert!(!should_add(
            &event_of_type("text_message"),
            &strings(&["nonexistent"]),
            &[]
        ));
    }
}
