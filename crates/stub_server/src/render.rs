//! HTML served to the panel: the settings page and the fragments it swaps in.

use shared::domain::{Account, AccountId, Channel, SourceKind};

pub fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// The `<select>` of accounts; only the option matching `selection` is marked.
pub fn account_selection(accounts: &[Account], selection: Option<&AccountId>) -> String {
    let options: String = accounts
        .iter()
        .map(|account| {
            let selected = if Some(&account.id) == selection {
                " selected"
            } else {
                ""
            };
            format!(
                r#"<option value="{}"{selected}>{}</option>"#,
                escape(account.id.as_str()),
                escape(&account.name)
            )
        })
        .collect();
    format!(r#"<select id="account-selection">{options}</select>"#)
}

pub fn channel_table(channels: &[Channel]) -> String {
    let rows: String = channels
        .iter()
        .map(|channel| {
            let id = escape(channel.id.as_str());
            format!(
                r#"<tr data-channel-id="{id}"><td>{id}</td><td><button class="delete-channel">Delete</button></td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<table id="channelTable"><thead><tr><th>Channel</th><th></th></tr></thead><tbody>{rows}</tbody></table>"#
    )
}

pub fn cards() -> String {
    r#"<div class="card-deck"></div>"#.to_string()
}

pub fn settings_page(
    kind: SourceKind,
    csrf_token: &str,
    accounts: &[Account],
    selection: Option<&AccountId>,
) -> String {
    let import_form = if kind.supports_bulk_import() {
        r#"<form id="opml-form"><input type="file" id="opml-file" name="opml-file"><button id="opml-upload">Import</button></form>"#
    } else {
        ""
    };
    format!(
        r#"<!doctype html>
<html>
<head><meta charset="utf-8"><meta id="csrf" content="{token}"><title>{kind} settings</title></head>
<body>
<div class="select-wrapper">{selector}</div>
<input id="account-name" type="text"><button id="add-account">Add account</button>
<button id="delete-account">Delete account</button>
<input id="channel-id" type="text"><button id="add-channel">Add channel</button>
{import_form}
{table}
</body>
</html>"#,
        token = escape(csrf_token),
        selector = account_selection(accounts, selection),
        table = channel_table(&[]),
    )
}
