//! Server-rendered fragments and the displayed subtrees they replace.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::domain::{AccountId, ChannelId, SourceKind};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{error::PanelError, markup, mutation_client::FragmentSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentSlot {
    ChannelTable,
    AccountSelector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorOption {
    pub id: AccountId,
    pub label: String,
    pub selected: bool,
}

/// Listener state of the account selector, rebuilt from the markup after every swap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorBinding {
    options: Vec<SelectorOption>,
    bound: bool,
}

impl SelectorBinding {
    pub fn bind(markup: &str) -> Self {
        let options = markup::options(markup)
            .into_iter()
            .filter(|option| !option.value.is_empty())
            .map(|option| SelectorOption {
                id: AccountId(option.value),
                label: option.label,
                selected: option.selected,
            })
            .collect();
        Self {
            options,
            bound: true,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    pub fn options(&self) -> &[SelectorOption] {
        &self.options
    }

    /// Native select semantics: the marked option, else the first one.
    pub fn selected(&self) -> Option<&AccountId> {
        self.options
            .iter()
            .find(|option| option.selected)
            .or_else(|| self.options.first())
            .map(|option| &option.id)
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.options.iter().any(|option| &option.id == id)
    }
}

/// The displayed panel subtrees. Slots are only ever replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelDocument {
    channel_table: Option<String>,
    account_selector: Option<String>,
    selector: SelectorBinding,
}

impl PanelDocument {
    pub fn with_selector(markup: Option<String>) -> Self {
        let mut document = Self::default();
        if let Some(markup) = markup {
            document.replace_and_rebind(FragmentSlot::AccountSelector, markup);
        }
        document
    }

    pub fn fragment(&self, slot: FragmentSlot) -> Option<&str> {
        match slot {
            FragmentSlot::ChannelTable => self.channel_table.as_deref(),
            FragmentSlot::AccountSelector => self.account_selector.as_deref(),
        }
    }

    pub fn selector(&self) -> &SelectorBinding {
        &self.selector
    }

    /// Channel ids listed by the current table fragment.
    pub fn channel_ids(&self) -> Vec<ChannelId> {
        self.channel_table
            .as_deref()
            .map(markup::channel_row_ids)
            .unwrap_or_default()
            .into_iter()
            .map(ChannelId)
            .collect()
    }

    /// Swaps a slot and re-attaches whatever the fresh subtree needs. Idempotent.
    pub fn replace_and_rebind(&mut self, slot: FragmentSlot, markup: String) -> &SelectorBinding {
        match slot {
            FragmentSlot::ChannelTable => {
                self.channel_table = Some(markup);
            }
            FragmentSlot::AccountSelector => {
                self.selector = SelectorBinding::bind(&markup);
                self.account_selector = Some(markup);
            }
        }
        &self.selector
    }

    pub fn clear(&mut self, slot: FragmentSlot) {
        match slot {
            FragmentSlot::ChannelTable => self.channel_table = None,
            FragmentSlot::AccountSelector => {
                self.account_selector = None;
                self.selector = SelectorBinding::default();
            }
        }
    }
}

/// Counter bumped on every selection change; table responses tagged with an older value are
/// dropped instead of overwriting the newer selection's table.
#[derive(Debug, Clone, Default)]
pub struct SelectionEpoch(Arc<AtomicU64>);

impl SelectionEpoch {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Table fetch for `account`, tagged with the selection epoch it was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRequest {
    pub account: Option<AccountId>,
    pub issued_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRefresh {
    Replaced,
    Cleared,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorReconciled {
    pub resolved: Option<AccountId>,
    pub table: TableRefresh,
}

pub struct FragmentReconciler {
    source: Arc<dyn FragmentSource>,
    kind: SourceKind,
    epoch: SelectionEpoch,
    document: Mutex<PanelDocument>,
}

impl FragmentReconciler {
    pub fn new(
        source: Arc<dyn FragmentSource>,
        kind: SourceKind,
        epoch: SelectionEpoch,
        document: PanelDocument,
    ) -> Self {
        Self {
            source,
            kind,
            epoch,
            document: Mutex::new(document),
        }
    }

    pub async fn document(&self) -> PanelDocument {
        self.document.lock().await.clone()
    }

    pub async fn selector(&self) -> SelectorBinding {
        self.document.lock().await.selector().clone()
    }

    /// Fetches the table for the requested account and swaps it in, unless the selection moved
    /// on while the request was in flight. No selection clears the table without a request.
    pub async fn refresh_channel_table(
        &self,
        request: &TableRequest,
    ) -> Result<TableRefresh, PanelError> {
        let Some(account) = request.account.as_ref() else {
            self.document.lock().await.clear(FragmentSlot::ChannelTable);
            return Ok(TableRefresh::Cleared);
        };

        let markup = self
            .source
            .channel_table_fragment(Some(account), self.kind)
            .await?;

        let mut document = self.document.lock().await;
        if self.epoch.current() != request.issued_at {
            debug!(
                %account,
                issued_at = request.issued_at,
                "dropping channel table for a superseded selection"
            );
            return Ok(TableRefresh::Stale);
        }
        document.replace_and_rebind(FragmentSlot::ChannelTable, markup);
        Ok(TableRefresh::Replaced)
    }

    /// Selector fragment, then rebind, then the table for the resolved selection. Strictly in
    /// that order: `resolve` sees the freshly bound selector and returns the table request.
    pub async fn reconcile_selector<F, Fut>(
        &self,
        hint: Option<&AccountId>,
        resolve: F,
    ) -> Result<SelectorReconciled, PanelError>
    where
        F: FnOnce(SelectorBinding) -> Fut,
        Fut: Future<Output = TableRequest>,
    {
        let markup = self
            .source
            .account_selector_fragment(hint, self.kind)
            .await?;
        let binding = {
            let mut document = self.document.lock().await;
            document
                .replace_and_rebind(FragmentSlot::AccountSelector, markup)
                .clone()
        };

        let request = resolve(binding).await;
        let table = self.refresh_channel_table(&request).await?;
        Ok(SelectorReconciled {
            resolved: request.account,
            table,
        })
    }
}

#[cfg(test)]
#[path = "tests/fragments_tests.rs"]
mod tests;
