//! Minimal scanning of server-rendered markup: just enough to read the attributes the panel
//! relies on. The panel never edits markup, it only swaps it wholesale.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<([a-z][a-z0-9-]*)\b([^>]*)>").expect("tag regex"));
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("attribute regex")
});
static OPTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<option\b([^>]*)>").expect("option regex"));
/// Where an option's label ends: its close tag is optional, so the next option or the end of
/// the select also closes it.
static OPTION_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</option\s*>|<option\b|</select\s*>").expect("option end regex")
});
static SELECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<select\b([^>]*)>.*?</select>").expect("select regex"));
static CHANNEL_ROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-channel-id\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("channel row regex")
});
static TEXT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("inner tag regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub name: String,
    pub value: Option<String>,
}

pub(crate) fn attributes(raw: &str) -> Vec<Attribute> {
    ATTR_RE
        .captures_iter(raw)
        .map(|caps| Attribute {
            name: caps[1].to_ascii_lowercase(),
            value: caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| decode_entities(m.as_str())),
        })
        .collect()
}

pub(crate) fn attribute(raw: &str, name: &str) -> Option<String> {
    attributes(raw)
        .into_iter()
        .find(|attr| attr.name == name)
        .map(|attr| attr.value.unwrap_or_default())
}

pub(crate) fn has_attribute(raw: &str, name: &str) -> bool {
    attributes(raw).iter().any(|attr| attr.name == name)
}

/// `content` of the first `<meta>` whose `id` or `name` matches.
pub(crate) fn meta_content(html: &str, key: &str) -> Option<String> {
    TAG_RE
        .captures_iter(html)
        .filter(|caps| caps[1].eq_ignore_ascii_case("meta"))
        .find(|caps| {
            let raw = &caps[2];
            attribute(raw, "id").as_deref() == Some(key)
                || attribute(raw, "name").as_deref() == Some(key)
        })
        .and_then(|caps| attribute(&caps[2], "content"))
}

/// Full `<select …>…</select>` element with the given id.
pub(crate) fn select_element<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    SELECT_RE
        .captures_iter(html)
        .find(|caps| attribute(&caps[1], "id").as_deref() == Some(id))
        .and_then(|caps| caps.get(0))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

pub(crate) fn options(markup: &str) -> Vec<RawOption> {
    OPTION_RE
        .captures_iter(markup)
        .map(|caps| {
            let raw = &caps[1];
            let rest = &markup[caps.get(0).map_or(markup.len(), |m| m.end())..];
            let text = OPTION_END_RE
                .find(rest)
                .map_or(rest, |end| &rest[..end.start()]);
            let label = decode_entities(TEXT_TAG_RE.replace_all(text, "").trim());
            RawOption {
                value: attribute(raw, "value").unwrap_or_else(|| label.clone()),
                selected: has_attribute(raw, "selected"),
                label,
            }
        })
        .collect()
}

pub(crate) fn channel_row_ids(markup: &str) -> Vec<String> {
    CHANNEL_ROW_RE
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| decode_entities(m.as_str()))
        .collect()
}

pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
