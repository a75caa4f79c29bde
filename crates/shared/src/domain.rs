use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(AccountId);
id_newtype!(ChannelId);

/// Content-source kind served by one settings panel.
///
/// The tag is sent verbatim as `kind` on every request; `bulk_import` decides whether the
/// OPML upload control can ever be enabled for the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKind {
    tag: &'static str,
    bulk_import: bool,
}

impl SourceKind {
    pub const YOUTUBE: Self = Self::new("youtube", true);
    pub const REDDIT: Self = Self::new("reddit", false);
    pub const TWITTER: Self = Self::new("twitter", false);

    pub const fn new(tag: &'static str, bulk_import: bool) -> Self {
        Self { tag, bulk_import }
    }

    pub fn known() -> [Self; 3] {
        [Self::YOUTUBE, Self::REDDIT, Self::TWITTER]
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::known().into_iter().find(|kind| kind.tag == tag)
    }

    pub fn as_str(&self) -> &'static str {
        self.tag
    }

    pub fn supports_bulk_import(&self) -> bool {
        self.bulk_import
    }

    /// Path of the hosting settings page, e.g. `/youtube-settings`.
    pub fn settings_page_path(&self) -> String {
        format!("/{}-settings", self.tag)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag)
    }
}

impl Serialize for SourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub account_id: AccountId,
    pub kind: String,
}
