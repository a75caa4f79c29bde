//! Values the hosting settings page hands to the panel at startup.

use reqwest::Client;
use shared::domain::{AccountId, SourceKind};
use tracing::info;

use crate::{
    error::PanelError,
    fragments::SelectorBinding,
    markup,
    mutation_client::{normalize_base_url, AntiForgeryToken},
};

pub const CSRF_META_ID: &str = "csrf";
pub const ACCOUNT_SELECTOR_ID: &str = "account-selection";

#[derive(Debug, Clone)]
pub struct PageBootstrap {
    pub token: AntiForgeryToken,
    pub selected_account: Option<AccountId>,
    pub selector_markup: Option<String>,
}

impl PageBootstrap {
    pub fn new(token: AntiForgeryToken) -> Self {
        Self {
            token,
            selected_account: None,
            selector_markup: None,
        }
    }

    pub fn with_selection(mut self, account: AccountId) -> Self {
        self.selected_account = Some(account);
        self
    }

    pub fn with_selector_markup(mut self, markup: impl Into<String>) -> Self {
        let markup = markup.into();
        self.selected_account = SelectorBinding::bind(&markup).selected().cloned();
        self.selector_markup = Some(markup);
        self
    }

    /// Reads the `csrf` meta value and the account selector out of a rendered settings page.
    pub fn from_html(html: &str) -> Result<Self, PanelError> {
        let token = markup::meta_content(html, CSRF_META_ID)
            .filter(|token| !token.is_empty())
            .ok_or(PanelError::MissingAntiForgeryToken)?;
        let bootstrap = Self::new(AntiForgeryToken::new(token));
        Ok(match markup::select_element(html, ACCOUNT_SELECTOR_ID) {
            Some(select) => bootstrap.with_selector_markup(select),
            None => bootstrap,
        })
    }

    /// Loads `/{kind}-settings` from the server and bootstraps from it.
    pub async fn fetch(http: &Client, base_url: &str, kind: SourceKind) -> Result<Self, PanelError> {
        let route = "settings-page";
        let url = normalize_base_url(base_url)?
            .join(kind.settings_page_path().trim_start_matches('/'))?;
        let html = http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| PanelError::from_reqwest(route, err))?
            .text()
            .await
            .map_err(|err| PanelError::MalformedResponse {
                route,
                message: err.to_string(),
            })?;
        let bootstrap = Self::from_html(&html)?;
        info!(
            %kind,
            selected = ?bootstrap.selected_account,
            "bootstrapped settings panel from page"
        );
        Ok(bootstrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html><head><meta id="csrf" content="c5rf-token"></head>
<body>
  <div class="select-wrapper">
    <select id="account-selection">
      <option value="3">first</option>
      <option value="8" selected>second</option>
    </select>
  </div>
  <table id="channelTable"></table>
</body></html>"#;

    #[test]
    fn reads_token_and_preselected_account() {
        let bootstrap = PageBootstrap::from_html(PAGE).expect("bootstrap");
        assert_eq!(bootstrap.token.as_str(), "c5rf-token");
        assert_eq!(bootstrap.selected_account, Some(AccountId::new("8")));
        assert!(bootstrap
            .selector_markup
            .as_deref()
            .is_some_and(|markup| markup.starts_with("<select")));
    }

    #[test]
    fn page_without_accounts_starts_unselected() {
        let html = r#"<meta id="csrf" content="t"><select id="account-selection"></select>"#;
        let bootstrap = PageBootstrap::from_html(html).expect("bootstrap");
        assert_eq!(bootstrap.selected_account, None);
    }

    #[test]
    fn missing_token_is_rejected() {
        let err = PageBootstrap::from_html("<html></html>").expect_err("no token");
        assert!(matches!(err, PanelError::MissingAntiForgeryToken));
    }
}
