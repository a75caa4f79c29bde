//! Paged card view over one feed (a single account or all accounts of a kind).

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use shared::{
    domain::{AccountId, SourceKind},
    protocol::{CardsQuery, CARDS_PAGE_SIZE},
};
use tracing::debug;

use crate::error::PanelError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedSelector {
    All,
    Account(AccountId),
}

impl FeedSelector {
    pub fn as_query_value(&self) -> String {
        match self {
            FeedSelector::All => "*".to_string(),
            FeedSelector::Account(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardsResponse {
    Fragment {
        markup: String,
        last_modified: Option<String>,
    },
    NotModified,
}

#[async_trait]
pub trait CardSource: Send + Sync {
    async fn content_count(&self, feed: &FeedSelector, kind: SourceKind)
        -> Result<u64, PanelError>;
    async fn cards_fragment(
        &self,
        query: &CardsQuery,
        if_modified_since: Option<&str>,
    ) -> Result<CardsResponse, PanelError>;
}

/// Highest zero-based page for `count` items.
pub fn max_page_for(count: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let mut max_page = count / page_size;
    if count > 0 && count % page_size == 0 {
        max_page -= 1;
    }
    u32::try_from(max_page).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardPager {
    page: u32,
    max_page: u32,
}

impl CardPager {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn max_page(&self) -> u32 {
        self.max_page
    }

    pub fn can_go_left(&self) -> bool {
        self.page > 0
    }

    pub fn can_go_right(&self) -> bool {
        self.page < self.max_page
    }

    /// One-based "page/pages" label.
    pub fn status(&self) -> String {
        format!("{}/{}", self.page + 1, self.max_page + 1)
    }

    pub fn set_content_count(&mut self, count: u64) {
        self.max_page = max_page_for(count, CARDS_PAGE_SIZE);
        self.page = self.page.min(self.max_page);
    }

    pub fn reset(&mut self) {
        self.page = 0;
    }

    pub fn next(&mut self) -> bool {
        if !self.can_go_right() {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn prev(&mut self) -> bool {
        if !self.can_go_left() {
            return false;
        }
        self.page -= 1;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    feed: FeedSelector,
    kind: &'static str,
    page: u32,
}

#[derive(Debug, Clone)]
struct CachedCards {
    last_modified: String,
    markup: String,
}

pub struct CardBrowser {
    source: Arc<dyn CardSource>,
    active: Option<(FeedSelector, SourceKind)>,
    pager: CardPager,
    cards: Option<String>,
    cache: HashMap<CacheKey, CachedCards>,
}

impl CardBrowser {
    pub fn new(source: Arc<dyn CardSource>) -> Self {
        Self {
            source,
            active: None,
            pager: CardPager::default(),
            cards: None,
            cache: HashMap::new(),
        }
    }

    pub fn pager(&self) -> CardPager {
        self.pager
    }

    pub fn cards(&self) -> Option<&str> {
        self.cards.as_deref()
    }

    pub fn active_feed(&self) -> Option<&FeedSelector> {
        self.active.as_ref().map(|(feed, _)| feed)
    }

    /// Switches to another feed at page 0. Re-selecting the active feed does nothing.
    pub async fn select_feed(
        &mut self,
        feed: FeedSelector,
        kind: SourceKind,
    ) -> Result<bool, PanelError> {
        if self.active.as_ref() == Some(&(feed.clone(), kind)) {
            return Ok(false);
        }
        self.pager = CardPager::default();
        self.load_cards(&feed, kind).await?;
        let count = self.source.content_count(&feed, kind).await?;
        self.pager.set_content_count(count);
        debug!(feed = %feed.as_query_value(), %kind, count, "card feed selected");
        self.active = Some((feed, kind));
        Ok(true)
    }

    pub async fn next_page(&mut self) -> Result<bool, PanelError> {
        self.turn_page(CardPager::next).await
    }

    pub async fn prev_page(&mut self) -> Result<bool, PanelError> {
        self.turn_page(CardPager::prev).await
    }

    async fn turn_page(&mut self, step: fn(&mut CardPager) -> bool) -> Result<bool, PanelError> {
        let Some((feed, kind)) = self.active.clone() else {
            return Ok(false);
        };
        let previous = self.pager;
        if !step(&mut self.pager) {
            return Ok(false);
        }
        if let Err(err) = self.load_cards(&feed, kind).await {
            self.pager = previous;
            return Err(err);
        }
        Ok(true)
    }

    async fn load_cards(&mut self, feed: &FeedSelector, kind: SourceKind) -> Result<(), PanelError> {
        let key = CacheKey {
            feed: feed.clone(),
            kind: kind.as_str(),
            page: self.pager.page(),
        };
        let query = CardsQuery {
            id: feed.as_query_value(),
            kind: kind.as_str().to_string(),
            page: key.page,
            count: CARDS_PAGE_SIZE,
        };
        let since = self
            .cache
            .get(&key)
            .map(|cached| cached.last_modified.clone());

        match self.source.cards_fragment(&query, since.as_deref()).await? {
            CardsResponse::NotModified => {
                if let Some(cached) = self.cache.get(&key) {
                    self.cards = Some(cached.markup.clone());
                }
            }
            CardsResponse::Fragment {
                markup,
                last_modified,
            } => {
                match last_modified {
                    Some(last_modified) => {
                        self.cache.insert(
                            key,
                            CachedCards {
                                last_modified,
                                markup: markup.clone(),
                            },
                        );
                    }
                    None => {
                        self.cache.remove(&key);
                    }
                }
                self.cards = Some(markup);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/card_browser_tests.rs"]
mod tests;
