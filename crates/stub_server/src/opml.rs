//! Channel ids out of a subscription export.

use std::sync::LazyLock;

use regex::Regex;

static XML_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"xmlUrl\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("xmlUrl regex")
});
static CHANNEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:channel_id=|/channel/)([A-Za-z0-9_-]+)").expect("channel id regex")
});

/// Every distinct channel id referenced by an outline's `xmlUrl`, in document order.
pub fn channel_ids(document: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for caps in XML_URL_RE.captures_iter(document) {
        let Some(url) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let Some(id) = CHANNEL_RE.captures(url.as_str()).and_then(|c| c.get(1)) else {
            continue;
        };
        if !ids.iter().any(|seen| seen == id.as_str()) {
            ids.push(id.as_str().to_string());
        }
    }
    ids
}
