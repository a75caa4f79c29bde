//! In-memory account/channel store backing the stub service.

use std::sync::Arc;

use shared::domain::{Account, AccountId, Channel, ChannelId};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("account name must not be empty")]
    EmptyAccountName,
    #[error("account {name:?} already exists for {kind}")]
    DuplicateAccount { name: String, kind: String },
    #[error("unknown account {0}")]
    UnknownAccount(String),
    #[error("invalid channel id {0:?}")]
    InvalidChannelId(String),
    #[error("channel {channel} is not linked to account {account}")]
    UnknownChannel { account: i64, channel: String },
}

#[derive(Debug, Clone)]
struct StoredAccount {
    id: i64,
    name: String,
    kind: String,
    channels: Vec<String>,
}

impl StoredAccount {
    fn to_account(&self) -> Account {
        Account {
            id: AccountId(self.id.to_string()),
            name: self.name.clone(),
            kind: self.kind.clone(),
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    next_id: i64,
    accounts: Vec<StoredAccount>,
}

#[derive(Clone)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Account ids travel as decimal strings; anything else names no account.
pub fn parse_account_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}

fn valid_channel_id(raw: &str) -> bool {
    !raw.is_empty() && !raw.chars().any(char::is_whitespace)
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                next_id: 1,
                accounts: Vec::new(),
            })),
        }
    }

    pub async fn create_account(&self, name: &str, kind: &str) -> Result<i64, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyAccountName);
        }
        let mut inner = self.inner.write().await;
        if inner
            .accounts
            .iter()
            .any(|account| account.name == name && account.kind == kind)
        {
            return Err(StoreError::DuplicateAccount {
                name: name.to_string(),
                kind: kind.to_string(),
            });
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.accounts.push(StoredAccount {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            channels: Vec::new(),
        });
        Ok(id)
    }

    /// Removes the account and returns the most recently created account of `kind` that is
    /// left, if any.
    pub async fn delete_account(&self, id: i64, kind: &str) -> Result<Option<i64>, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.accounts.len();
        inner
            .accounts
            .retain(|account| account.id != id || account.kind != kind);
        if inner.accounts.len() == before {
            return Err(StoreError::UnknownAccount(id.to_string()));
        }
        Ok(inner
            .accounts
            .iter()
            .rev()
            .find(|account| account.kind == kind)
            .map(|account| account.id))
    }

    pub async fn accounts(&self, kind: &str) -> Vec<Account> {
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .filter(|account| account.kind == kind)
            .map(StoredAccount::to_account)
            .collect()
    }

    pub async fn account_kind(&self, id: i64) -> Option<String> {
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .find(|account| account.id == id)
            .map(|account| account.kind.clone())
    }

    /// Links a channel to an account. Linking an already linked channel succeeds unchanged.
    pub async fn add_channel(&self, account_id: i64, channel: &str) -> Result<bool, StoreError> {
        if !valid_channel_id(channel) {
            return Err(StoreError::InvalidChannelId(channel.to_string()));
        }
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .ok_or_else(|| StoreError::UnknownAccount(account_id.to_string()))?;
        if account.channels.iter().any(|linked| linked == channel) {
            return Ok(false);
        }
        account.channels.push(channel.to_string());
        Ok(true)
    }

    pub async fn remove_channel(&self, account_id: i64, channel: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .iter_mut()
            .find(|account| account.id == account_id)
            .ok_or_else(|| StoreError::UnknownAccount(account_id.to_string()))?;
        let before = account.channels.len();
        account.channels.retain(|linked| linked != channel);
        if account.channels.len() == before {
            return Err(StoreError::UnknownChannel {
                account: account_id,
                channel: channel.to_string(),
            });
        }
        Ok(())
    }

    /// Channels of `account_id` when it is an account of `kind`; empty otherwise.
    pub async fn channels(&self, account_id: i64, kind: &str) -> Vec<Channel> {
        self.inner
            .read()
            .await
            .accounts
            .iter()
            .find(|account| account.id == account_id && account.kind == kind)
            .map(|account| {
                account
                    .channels
                    .iter()
                    .map(|channel| Channel {
                        id: ChannelId(channel.clone()),
                        account_id: AccountId(account.id.to_string()),
                        kind: account.kind.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
