use std::{fmt, path::Path, sync::Arc};

use async_trait::async_trait;
use reqwest::{
    header::{IF_MODIFIED_SINCE, LAST_MODIFIED},
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AccountId, ChannelId, SourceKind},
    protocol::{
        routes, AccountSelectionRequest, CardsQuery, ChannelTableRequest, ContentCountQuery,
        ContentCountResponse, CreateAccountRequest, CreateAccountResponse, CreateChannelRequest,
        DeleteAccountRequest, DeleteAccountResponse, DeleteChannelRequest, WireId,
        BULK_ACCOUNT_FIELD, BULK_FILE_FIELD, CSRF_HEADER,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    card_browser::{CardSource, CardsResponse, FeedSelector},
    error::PanelError,
};

/// Anti-forgery token read once from the hosting page and attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub struct AntiForgeryToken(Arc<str>);

impl AntiForgeryToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::from(value.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AntiForgeryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AntiForgeryToken(..)")
    }
}

/// File selected for bulk import.
#[derive(Debug, Clone)]
pub struct BulkFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl BulkFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, PanelError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import.opml".to_string());
        Ok(Self::new(file_name, bytes))
    }
}

/// One network mutation per call. No UI state is touched here; the controller applies
/// transitions once the returned future settles.
#[async_trait]
pub trait PanelApi: Send + Sync {
    async fn create_account(&self, name: &str, kind: SourceKind) -> Result<AccountId, PanelError>;
    /// Returns the account the service wants selected next, `None` when no account remains.
    async fn delete_account(
        &self,
        account_id: &AccountId,
        kind: SourceKind,
    ) -> Result<Option<AccountId>, PanelError>;
    async fn create_channel(
        &self,
        channel_id: &ChannelId,
        account_id: &AccountId,
        kind: SourceKind,
    ) -> Result<(), PanelError>;
    async fn delete_channel(
        &self,
        channel_id: &ChannelId,
        account_id: &AccountId,
        kind: SourceKind,
    ) -> Result<(), PanelError>;
    async fn upload_bulk_file(&self, file: BulkFile, account_id: &AccountId)
        -> Result<(), PanelError>;
}

#[async_trait]
pub trait FragmentSource: Send + Sync {
    async fn channel_table_fragment(
        &self,
        account_id: Option<&AccountId>,
        kind: SourceKind,
    ) -> Result<String, PanelError>;
    async fn account_selector_fragment(
        &self,
        select: Option<&AccountId>,
        kind: SourceKind,
    ) -> Result<String, PanelError>;
}

pub struct HttpPanelApi {
    http: Client,
    base_url: Url,
    token: AntiForgeryToken,
}

impl HttpPanelApi {
    pub fn new(base_url: &str, token: AntiForgeryToken) -> Result<Self, PanelError> {
        Self::with_client(Client::new(), base_url, token)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        token: AntiForgeryToken,
    ) -> Result<Self, PanelError> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            token,
        })
    }

    pub fn token(&self) -> &AntiForgeryToken {
        &self.token
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: Method, route: &'static str) -> Result<RequestBuilder, PanelError> {
        let url = self.base_url.join(route.trim_start_matches('/'))?;
        Ok(self
            .http
            .request(method, url)
            .header(CSRF_HEADER, self.token.as_str()))
    }

    async fn send(
        &self,
        route: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, PanelError> {
        debug!(route, "issuing panel request");
        let response = request.send().await.map_err(|err| {
            warn!(route, error = %err, "panel request failed before a response arrived");
            PanelError::from_reqwest(route, err)
        })?;
        response.error_for_status().map_err(|err| {
            warn!(route, status = ?err.status(), "panel request rejected");
            PanelError::from_reqwest(route, err)
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        route: &'static str,
        request: RequestBuilder,
    ) -> Result<T, PanelError> {
        self.send(route, request)
            .await?
            .json::<T>()
            .await
            .map_err(|err| PanelError::MalformedResponse {
                route,
                message: err.to_string(),
            })
    }

    async fn send_text(
        &self,
        route: &'static str,
        request: RequestBuilder,
    ) -> Result<String, PanelError> {
        self.send(route, request)
            .await?
            .text()
            .await
            .map_err(|err| PanelError::MalformedResponse {
                route,
                message: err.to_string(),
            })
    }
}

/// Parses the server URL so that joining a relative route keeps any path prefix.
pub(crate) fn normalize_base_url(raw: &str) -> Result<Url, PanelError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[async_trait]
impl PanelApi for HttpPanelApi {
    async fn create_account(&self, name: &str, kind: SourceKind) -> Result<AccountId, PanelError> {
        let request = self
            .request(Method::POST, routes::ACCOUNT)?
            .json(&CreateAccountRequest {
                account_name: name.to_string(),
                kind: kind.as_str().to_string(),
            });
        let response: CreateAccountResponse = self.send_json(routes::ACCOUNT, request).await?;
        response
            .id
            .into_account()
            .ok_or_else(|| PanelError::MalformedResponse {
                route: routes::ACCOUNT,
                message: "created account has no usable id".to_string(),
            })
    }

    async fn delete_account(
        &self,
        account_id: &AccountId,
        kind: SourceKind,
    ) -> Result<Option<AccountId>, PanelError> {
        let request = self
            .request(Method::DELETE, routes::ACCOUNT)?
            .json(&DeleteAccountRequest {
                account_id: account_id.to_string(),
                kind: kind.as_str().to_string(),
            });
        let response: DeleteAccountResponse = self.send_json(routes::ACCOUNT, request).await?;
        Ok(response.last_id.into_account())
    }

    async fn create_channel(
        &self,
        channel_id: &ChannelId,
        account_id: &AccountId,
        kind: SourceKind,
    ) -> Result<(), PanelError> {
        let request = self
            .request(Method::POST, routes::CHANNEL)?
            .json(&CreateChannelRequest {
                channel_id: channel_id.to_string(),
                account_id: account_id.to_string(),
                kind: kind.as_str().to_string(),
            });
        self.send(routes::CHANNEL, request).await?;
        Ok(())
    }

    async fn delete_channel(
        &self,
        channel_id: &ChannelId,
        account_id: &AccountId,
        kind: SourceKind,
    ) -> Result<(), PanelError> {
        let request = self
            .request(Method::DELETE, routes::CHANNEL)?
            .json(&DeleteChannelRequest {
                channel_id: channel_id.to_string(),
                account_id: account_id.to_string(),
                kind: kind.as_str().to_string(),
            });
        self.send(routes::CHANNEL, request).await?;
        Ok(())
    }

    async fn upload_bulk_file(
        &self,
        file: BulkFile,
        account_id: &AccountId,
    ) -> Result<(), PanelError> {
        let size_bytes = file.bytes.len();
        let part = Part::bytes(file.bytes).file_name(file.file_name);
        let part = match file.mime_type.as_deref() {
            Some(mime) => part
                .mime_str(mime)
                .map_err(|err| PanelError::from_reqwest(routes::BULK_UPLOAD, err))?,
            None => part,
        };
        let form = Form::new()
            .part(BULK_FILE_FIELD, part)
            .text(BULK_ACCOUNT_FIELD, account_id.to_string());

        debug!(%account_id, size_bytes, "uploading bulk import file");
        let request = self.request(Method::POST, routes::BULK_UPLOAD)?.multipart(form);
        self.send(routes::BULK_UPLOAD, request).await?;
        Ok(())
    }
}

#[async_trait]
impl FragmentSource for HttpPanelApi {
    async fn channel_table_fragment(
        &self,
        account_id: Option<&AccountId>,
        kind: SourceKind,
    ) -> Result<String, PanelError> {
        let request = self
            .request(Method::POST, routes::CHANNEL_TABLE_FRAGMENT)?
            .json(&ChannelTableRequest {
                account_id: account_id.map(ToString::to_string).unwrap_or_default(),
                kind: kind.as_str().to_string(),
            });
        self.send_text(routes::CHANNEL_TABLE_FRAGMENT, request).await
    }

    async fn account_selector_fragment(
        &self,
        select: Option<&AccountId>,
        kind: SourceKind,
    ) -> Result<String, PanelError> {
        let request = self
            .request(Method::POST, routes::ACCOUNT_SELECTION_FRAGMENT)?
            .json(&AccountSelectionRequest {
                id: WireId::from_account(select),
                kind: kind.as_str().to_string(),
            });
        self.send_text(routes::ACCOUNT_SELECTION_FRAGMENT, request)
            .await
    }
}

#[async_trait]
impl CardSource for HttpPanelApi {
    async fn content_count(
        &self,
        feed: &FeedSelector,
        kind: SourceKind,
    ) -> Result<u64, PanelError> {
        let request = self
            .request(Method::GET, routes::CONTENT)?
            .query(&ContentCountQuery {
                kind: kind.as_str().to_string(),
                account_id: feed.as_query_value(),
            });
        let response: ContentCountResponse = self.send_json(routes::CONTENT, request).await?;
        Ok(response.count)
    }

    async fn cards_fragment(
        &self,
        query: &CardsQuery,
        if_modified_since: Option<&str>,
    ) -> Result<CardsResponse, PanelError> {
        let mut request = self
            .request(Method::GET, routes::CARDS_FRAGMENT)?
            .query(query);
        if let Some(since) = if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        let response = self.send(routes::CARDS_FRAGMENT, request).await?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(CardsResponse::NotModified);
        }
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let markup = response
            .text()
            .await
            .map_err(|err| PanelError::MalformedResponse {
                route: routes::CARDS_FRAGMENT,
                message: err.to_string(),
            })?;
        Ok(CardsResponse::Fragment {
            markup,
            last_modified,
        })
    }
}

#[cfg(test)]
#[path = "tests/mutation_client_tests.rs"]
mod tests;
