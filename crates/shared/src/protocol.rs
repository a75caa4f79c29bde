//! Wire contract between the settings panel and the account/channel service.
//!
//! Field names follow the service's JSON casing exactly; they are not uniform across routes.

use serde::{Deserialize, Serialize};

use crate::domain::AccountId;

pub mod routes {
    pub const ACCOUNT: &str = "/api/v1/account";
    pub const CHANNEL: &str = "/api/v1/channel";
    pub const CONTENT: &str = "/api/v1/content";
    pub const BULK_UPLOAD: &str = "/opmlupload";
    pub const CHANNEL_TABLE_FRAGMENT: &str = "/partial-renderer/settings-channel-table";
    pub const ACCOUNT_SELECTION_FRAGMENT: &str = "/partial-renderer/settings-account-selection";
    pub const CARDS_FRAGMENT: &str = "/partial-renderer/cards";
}

/// Header carrying the anti-forgery token on every request.
pub const CSRF_HEADER: &str = "csrf";
/// Multipart field names of the bulk upload.
pub const BULK_FILE_FIELD: &str = "opml-file";
pub const BULK_ACCOUNT_FIELD: &str = "accountID";
/// `LastID` value meaning "no account remains".
pub const NO_ACCOUNT_SENTINEL: i64 = -1;
/// Cards per page in the card browser.
pub const CARDS_PAGE_SIZE: u32 = 30;

/// Account identity as it travels on the wire: the service emits integers, hosts may hold strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    pub fn none() -> Self {
        Self::Number(NO_ACCOUNT_SENTINEL)
    }

    /// Integer-looking ids are sent as numbers; a missing id is the `-1` sentinel.
    pub fn from_account(id: Option<&AccountId>) -> Self {
        match id {
            Some(id) => match id.as_str().parse::<i64>() {
                Ok(number) => Self::Number(number),
                Err(_) => Self::Text(id.as_str().to_string()),
            },
            None => Self::none(),
        }
    }

    pub fn into_account(self) -> Option<AccountId> {
        match self {
            Self::Number(NO_ACCOUNT_SENTINEL) => None,
            Self::Number(number) => Some(AccountId(number.to_string())),
            Self::Text(text) => {
                let text = text.trim();
                if text.is_empty() || text == "-1" {
                    None
                } else {
                    Some(AccountId(text.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(rename = "accountName")]
    pub account_name: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountResponse {
    #[serde(rename = "ID")]
    pub id: WireId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAccountRequest {
    #[serde(rename = "accountID")]
    pub account_id: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAccountResponse {
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WireId>,
    #[serde(rename = "LastID")]
    pub last_id: WireId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    #[serde(rename = "ChannelID")]
    pub channel_id: String,
    #[serde(rename = "AccountID")]
    pub account_id: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteChannelRequest {
    #[serde(rename = "channelID")]
    pub channel_id: String,
    #[serde(rename = "accountID")]
    pub account_id: String,
    pub kind: String,
}

/// Channel table fragment request; an empty `accountID` renders the empty table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelTableRequest {
    #[serde(rename = "accountID")]
    pub account_id: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSelectionRequest {
    #[serde(rename = "ID")]
    pub id: WireId,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCountQuery {
    pub kind: String,
    #[serde(rename = "accountID")]
    pub account_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCountResponse {
    #[serde(rename = "Count")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardsQuery {
    pub id: String,
    pub kind: String,
    pub page: u32,
    pub count: u32,
}
