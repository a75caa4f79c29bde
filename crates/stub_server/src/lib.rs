//! Stand-in for the account/channel service behind the settings panel.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, Response},
    routing::{get, post},
    Json, Router,
};
use shared::{
    domain::SourceKind,
    error::{ApiError, ErrorCode},
    protocol::{
        routes, AccountSelectionRequest, CardsQuery, ChannelTableRequest, ContentCountQuery,
        ContentCountResponse, CreateAccountRequest, CreateAccountResponse, CreateChannelRequest,
        DeleteAccountRequest, DeleteAccountResponse, DeleteChannelRequest, WireId,
        BULK_ACCOUNT_FIELD, BULK_FILE_FIELD, CSRF_HEADER, NO_ACCOUNT_SENTINEL,
    },
};
use tracing::{debug, info, warn};

pub mod config;
pub mod opml;
pub mod render;
pub mod store;

use store::{parse_account_id, Store, StoreError};

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub csrf_token: Arc<str>,
}

impl AppState {
    pub fn new(csrf_token: impl Into<String>) -> Self {
        Self {
            store: Store::new(),
            csrf_token: Arc::from(csrf_token.into()),
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        .route(routes::ACCOUNT, post(create_account).delete(delete_account))
        .route(routes::CHANNEL, post(create_channel).delete(delete_channel))
        .route(routes::CONTENT, get(content_count))
        .route(routes::BULK_UPLOAD, post(bulk_upload))
        .route(routes::CHANNEL_TABLE_FRAGMENT, post(channel_table))
        .route(routes::ACCOUNT_SELECTION_FRAGMENT, post(account_selection))
        .route(routes::CARDS_FRAGMENT, get(cards))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_csrf));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/:page", get(settings_page))
        .merge(guarded)
        .with_state(state)
}

fn reject(status: StatusCode, error: ApiError) -> (StatusCode, Json<ApiError>) {
    (status, Json(error))
}

fn store_error(err: StoreError) -> (StatusCode, Json<ApiError>) {
    warn!(error = %err, "stub: request rejected by store");
    let status = match &err {
        StoreError::EmptyAccountName => StatusCode::BAD_REQUEST,
        StoreError::DuplicateAccount { .. } => StatusCode::CONFLICT,
        StoreError::UnknownAccount(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidChannelId(_) | StoreError::UnknownChannel { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let code = match status {
        StatusCode::BAD_REQUEST => ErrorCode::Validation,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        _ => ErrorCode::Internal,
    };
    reject(status, ApiError::new(code, err.to_string()))
}

fn require_account_id(raw: &str) -> ApiResult<i64> {
    parse_account_id(raw).ok_or_else(|| {
        reject(
            StatusCode::BAD_REQUEST,
            ApiError::validation(format!("invalid account id {raw:?}")),
        )
    })
}

async fn require_csrf(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let presented = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(&*state.csrf_token) {
        warn!(path = %request.uri().path(), "stub: missing or invalid csrf token");
        return Err(reject(
            StatusCode::FORBIDDEN,
            ApiError::forbidden("missing or invalid csrf token"),
        ));
    }
    Ok(next.run(request).await)
}

async fn healthz() -> &'static str {
    "ok"
}

/// `/{kind}-settings`: the page the panel bootstraps from.
async fn settings_page(
    State(state): State<Arc<AppState>>,
    Path(page): Path<String>,
) -> ApiResult<Html<String>> {
    let kind = page
        .strip_suffix("-settings")
        .and_then(SourceKind::from_tag)
        .ok_or_else(|| reject(StatusCode::NOT_FOUND, ApiError::not_found("no such page")))?;
    let accounts = state.store.accounts(kind.as_str()).await;
    let selection = accounts.first().map(|account| account.id.clone());
    Ok(Html(render::settings_page(
        kind,
        &state.csrf_token,
        &accounts,
        selection.as_ref(),
    )))
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> ApiResult<Json<CreateAccountResponse>> {
    let id = state
        .store
        .create_account(&req.account_name, &req.kind)
        .await
        .map_err(store_error)?;
    info!(id, name = %req.account_name, kind = %req.kind, "stub: account created");
    Ok(Json(CreateAccountResponse {
        id: WireId::Number(id),
    }))
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteAccountRequest>,
) -> ApiResult<Json<DeleteAccountResponse>> {
    let id = require_account_id(&req.account_id)?;
    let last = state
        .store
        .delete_account(id, &req.kind)
        .await
        .map_err(store_error)?;
    info!(id, last = ?last, kind = %req.kind, "stub: account deleted");
    Ok(Json(DeleteAccountResponse {
        id: Some(WireId::Number(id)),
        last_id: WireId::Number(last.unwrap_or(NO_ACCOUNT_SENTINEL)),
    }))
}

async fn create_channel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChannelRequest>,
) -> ApiResult<StatusCode> {
    let account = require_account_id(&req.account_id)?;
    let added = state
        .store
        .add_channel(account, &req.channel_id)
        .await
        .map_err(store_error)?;
    info!(account, channel = %req.channel_id, added, "stub: channel linked");
    Ok(StatusCode::OK)
}

async fn delete_channel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteChannelRequest>,
) -> ApiResult<StatusCode> {
    let account = require_account_id(&req.account_id)?;
    state
        .store
        .remove_channel(account, &req.channel_id)
        .await
        .map_err(store_error)?;
    info!(account, channel = %req.channel_id, "stub: channel unlinked");
    Ok(StatusCode::OK)
}

async fn bulk_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<StatusCode> {
    let mut document = None;
    let mut account = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            ApiError::validation(e.to_string()),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| {
            reject(
                StatusCode::BAD_REQUEST,
                ApiError::validation(e.to_string()),
            )
        })?;
        match name.as_str() {
            BULK_FILE_FIELD => document = Some(bytes),
            BULK_ACCOUNT_FIELD => account = Some(String::from_utf8_lossy(&bytes).into_owned()),
            other => debug!(field = other, "stub: ignoring unknown upload field"),
        }
    }

    let (Some(document), Some(account)) = (document, account) else {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ApiError::validation("upload needs both a file and an account"),
        ));
    };
    let account = require_account_id(&account)?;
    let kind = state
        .store
        .account_kind(account)
        .await
        .ok_or_else(|| store_error(StoreError::UnknownAccount(account.to_string())))?;
    if !SourceKind::from_tag(&kind).is_some_and(|kind| kind.supports_bulk_import()) {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            ApiError::validation(format!("{kind} accounts cannot import subscriptions")),
        ));
    }
    let document = std::str::from_utf8(&document).map_err(|e| {
        reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new(ErrorCode::Internal, e.to_string()),
        )
    })?;

    let mut imported = 0usize;
    for channel in opml::channel_ids(document) {
        if state
            .store
            .add_channel(account, &channel)
            .await
            .map_err(store_error)?
        {
            imported += 1;
        }
    }
    info!(account, imported, "stub: subscriptions imported");
    Ok(StatusCode::OK)
}

async fn channel_table(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChannelTableRequest>,
) -> Html<String> {
    let channels = match parse_account_id(&req.account_id) {
        Some(account) => state.store.channels(account, &req.kind).await,
        None => Vec::new(),
    };
    Html(render::channel_table(&channels))
}

async fn account_selection(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AccountSelectionRequest>,
) -> Html<String> {
    let accounts = state.store.accounts(&req.kind).await;
    let selection = req.id.into_account();
    Html(render::account_selection(&accounts, selection.as_ref()))
}

async fn content_count(Query(query): Query<ContentCountQuery>) -> Json<ContentCountResponse> {
    debug!(kind = %query.kind, account = %query.account_id, "stub: content count");
    Json(ContentCountResponse { count: 0 })
}

async fn cards(Query(query): Query<CardsQuery>) -> Html<String> {
    debug!(id = %query.id, kind = %query.kind, page = query.page, "stub: cards");
    Html(render::cards())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/panel_roundtrip_tests.rs"]
mod panel_roundtrip_tests;
