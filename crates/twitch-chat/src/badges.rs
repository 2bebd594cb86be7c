//! Chat badge parsing against the global badge catalog.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::utils::{image, int_or_none, replace_with_underscores};

/// A full list of global badges can be found here.
pub const BADGE_INFO_URL: &str = "https://badges.twitch.tv/v1/badges/global/display";

const BADGE_KEYS: &[&str] = &[
    "title",
    "description",
    "image_url_1x",
    "image_url_2x",
    "image_url_4x",
    "click_action",
    "click_url",
];

static BADGE_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v1/(.+)/").unwrap()
});

/// The global badge catalog, keyed by badge set name and version.
///
/// Fetched once per downloader. An empty catalog is valid: badges then keep
/// only their name and version, without titles or icons.
#[derive(Debug, Clone, Default)]
pub struct BadgeCatalog {
    badge_sets: Map<String, Value>,
}

impl BadgeCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_badge_sets(badge_sets: Map<String, Value>) -> Self {
        Self { badge_sets }
    }

    /// Builds a catalog from the raw badge endpoint response.
    pub fn from_response(response: &Value) -> Self {
        let badge_sets = response
            .get("badge_sets")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Self { badge_sets }
    }

    fn lookup(&self, name: &str, version: &str) -> Option<&Map<String, Value>> {
        self.badge_sets
            .get(name)?
            .get("versions")?
            .get(version)?
            .as_object()
            .filter(|info| !info.is_empty())
    }
}

/// Parses an IRC badge list such as `subscriber/6,premium/1` into badge
/// objects. A badge without a `/` gets a null version.
pub fn parse_badges(badges: &str, catalog: &BadgeCatalog) -> Vec<Value> {
    if badges.is_empty() {
        return Vec::new();
    }

    badges
        .split(',')
        .map(|badge| match badge.split_once('/') {
            Some((name, version)) => {
                parse_badge_info(name, &Value::from(version), false, catalog)
            }
            None => parse_badge_info(badge, &Value::Null, false, catalog),
        })
        .collect()
}

/// Builds a badge object from a name and version.
///
/// Subscriber badges carry per-channel artwork, so they are never looked up
/// in the global catalog; their tenure info is instead filled in from the
/// `badge-info` metadata (IRC) or directly (replay) via
/// `set_subscriber_badge_info`. All other badges are enriched with titles
/// and icon images from the catalog when present.
pub fn parse_badge_info(
    name: &str,
    version: &Value,
    set_subscriber: bool,
    catalog: &BadgeCatalog,
) -> Value {
    let mut badge = Map::new();
    badge.insert("name".into(), Value::from(replace_with_underscores(name)));
    badge.insert(
        "version".into(),
        int_or_none(version).map_or_else(|| version.clone(), Value::from),
    );

    if name == "subscriber" {
        if set_subscriber {
            set_subscriber_badge_info(&mut badge, version);
        }
    } else if let Some(info) = catalog.lookup(name, version.as_str().unwrap_or("")) {
        for key in BADGE_KEYS {
            badge.insert((*key).to_string(), info.get(*key).cloned().unwrap_or(Value::Null));
        }

        let mut icons = Vec::new();
        let mut first_url = String::new();
        for multiplier in [1u32, 2, 4] {
            let size = multiplier * 18;
            let url = badge
                .remove(&format!("image_url_{multiplier}x"))
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_default();
            if multiplier == 1 {
                first_url.clone_from(&url);
            }
            icons.push(image(&url, size, size));
        }
        badge.insert("icons".into(), Value::Array(icons));

        if let Some(id) = BADGE_ID_REGEX
            .captures(&first_url)
            .and_then(|caps| caps.get(1))
        {
            badge.insert("id".into(), Value::from(id.as_str()));
        }
    }

    Value::Object(badge)
}

/// Fills in subscriber tenure on a badge object. A zero or unparseable
/// month count leaves the plain `Subscriber` title.
pub fn set_subscriber_badge_info(badge: &mut Map<String, Value>, months: &Value) {
    let num_months = int_or_none(months).unwrap_or(0);
    let title = if num_months != 0 {
        badge.insert("months".into(), Value::from(num_months));
        format!("{}-Month Subscriber", display_value(months))
    } else {
        "Subscriber".to_string()
    };
    badge.insert("title".into(), Value::from(title.clone()));
    badge.insert("description".into(), Value::from(title));
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_catalog() -> BadgeCatalog {
        let response = json!({
            "badge_sets": {
                "premium": {
                    "versions": {
                        "1": {
                            "title": "Prime Gaming",
                            "description": "Prime Gaming",
                            "image_url_1x": "https://static-cdn.jtvnw.net/badges/v1/bbbe0db0-a598-423e-86d0-f9fb98ca1933/1",
                            "image_url_2x": "https://static-cdn.jtvnw.net/badges/v1/bbbe0db0-a598-423e-86d0-f9fb98ca1933/2",
                            "image_url_4x": "https://static-cdn.jtvnw.net/badges/v1/bbbe0db0-a598-423e-86d0-f9fb98ca1933/3",
                            "click_action": "visit_url",
                            "click_url": "https://gaming.amazon.com"
                        }
                    }
                }
            }
        });
        BadgeCatalog::from_response(&response)
    }

    #[test]
    fn test_parse_badges_splits_list() {
        let badges = parse_badges("subscriber/6,premium/1", &sample_catalog());
        assert_eq!(badges.len(), 2);
        assert_eq!(badges[0]["name"], "subscriber");
        assert_eq!(badges[0]["version"], 6);
        assert_eq!(badges[1]["name"], "premium");
        assert_eq!(badges[1]["version"], 1);
    }

    #[test]
    fn test_parse_badges_empty() {
        assert!(parse_badges("", &sample_catalog()).is_empty());
    }

    #[test]
    fn test_badge_without_version() {
        let badges = parse_badges("no-version-badge", &BadgeCatalog::empty());
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0]["name"], "no_version_badge");
        assert_eq!(badges[0]["version"], Value::Null);
    }

    #[test]
    fn test_catalog_enrichment() {
        let badge = parse_badge_info("premium", &json!("1"), false, &sample_catalog());
        assert_eq!(badge["title"], "Prime Gaming");
        assert_eq!(badge["click_url"], "https://gaming.amazon.com");
        assert_eq!(badge["id"], "bbbe0db0-a598-423e-86d0-f9fb98ca1933");

        let icons = badge["icons"].as_array().unwrap();
        assert_eq!(icons.len(), 3);
        assert_eq!(icons[0]["width"], 18);
        assert_eq!(icons[1]["width"], 36);
        assert_eq!(icons[2]["width"], 72);
        assert_eq!(icons[2]["id"], "72x72");
        assert!(badge.get("image_url_1x").is_none());
    }

    #[test]
    fn test_unknown_badge_keeps_name_and_version() {
        let badge = parse_badge_info("made-up", &json!("3"), false, &sample_catalog());
        let object = badge.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["name"], "made_up");
        assert_eq!(object["version"], 3);
    }

    #[test]
    fn test_subscriber_badge_skips_catalog() {
        let badge = parse_badge_info("subscriber", &json!("6"), false, &sample_catalog());
        let object = badge.as_object().unwrap();
        assert_eq!(object.len(), 2);
    }

    #[test]
    fn test_subscriber_tenure() {
        let badge = parse_badge_info("subscriber", &json!("6"), true, &sample_catalog());
        assert_eq!(badge["months"], 6);
        assert_eq!(badge["title"], "6-Month Subscriber");
        assert_eq!(badge["description"], "6-Month Subscriber");
    }

    #[test]
    fn test_subscriber_zero_months() {
        let badge = parse_badge_info("subscriber", &json!("0"), true, &sample_catalog());
        assert!(badge.get("months").is_none());
        assert_eq!(badge["title"], "Subscriber");
    }

    #[test]
    fn test_set_subscriber_badge_info_from_metadata() {
        let mut badge = Map::new();
        badge.insert("name".into(), json!("subscriber"));
        badge.insert("version".into(), json!(12));
        set_subscriber_badge_info(&mut badge, &json!(15));
        assert_eq!(badge["months"], 15);
        assert_eq!(badge["title"], "15-Month Subscriber");
    }
}
