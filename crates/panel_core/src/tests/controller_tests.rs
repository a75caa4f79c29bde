use super::*;
use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use shared::protocol::routes;
use tokio::sync::{broadcast::error::TryRecvError, Notify};

use crate::{controls::Control, mutation_client::AntiForgeryToken};

#[derive(Debug, Clone, Copy, Default)]
struct Failures {
    create_account: bool,
    create_channel: bool,
    upload: bool,
}

#[derive(Default)]
struct Backend {
    accounts: Vec<(AccountId, String)>,
    channels: BTreeMap<AccountId, Vec<ChannelId>>,
    next_id: u64,
}

/// In-memory account/channel service that renders fragments from its own state.
struct FakeService {
    backend: Mutex<Backend>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<Failures>,
    table_gate: Mutex<Option<(AccountId, Arc<Notify>)>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
}

fn render_selector(accounts: &[(AccountId, String)], hint: Option<&AccountId>) -> String {
    let options: String = accounts
        .iter()
        .map(|(id, name)| {
            let selected = if Some(id) == hint { " selected" } else { "" };
            format!(r#"<option value="{id}"{selected}>{name}</option>"#)
        })
        .collect();
    format!(r#"<select id="account-selection">{options}</select>"#)
}

fn render_table(channels: &[ChannelId]) -> String {
    let rows: String = channels
        .iter()
        .map(|channel| format!(r#"<tr data-channel-id="{channel}"><td>{channel}</td></tr>"#))
        .collect();
    format!(r#"<table id="channelTable">{rows}</table>"#)
}

impl FakeService {
    fn new() -> Arc<Self> {
        Self::with_accounts(&[])
    }

    fn with_accounts(accounts: &[&str]) -> Arc<Self> {
        let accounts = accounts
            .iter()
            .map(|id| (AccountId::new(*id), format!("account-{id}")))
            .collect();
        Arc::new(Self {
            backend: Mutex::new(Backend {
                accounts,
                channels: BTreeMap::new(),
                next_id: 42,
            }),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Failures::default()),
            table_gate: Mutex::new(None),
            upload_gate: Mutex::new(None),
        })
    }

    async fn bootstrap(&self, selected: Option<&str>) -> PageBootstrap {
        let backend = self.backend.lock().await;
        let hint = selected.map(AccountId::new);
        PageBootstrap::new(AntiForgeryToken::new("token"))
            .with_selector_markup(render_selector(&backend.accounts, hint.as_ref()))
    }

    async fn add_channel(&self, account: &str, channel: &str) {
        self.backend
            .lock()
            .await
            .channels
            .entry(AccountId::new(account))
            .or_default()
            .push(ChannelId::new(channel));
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn table_calls(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| call.starts_with("table:"))
            .collect()
    }

    async fn record(&self, call: String) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl PanelApi for FakeService {
    async fn create_account(&self, name: &str, _kind: SourceKind) -> Result<AccountId, PanelError> {
        self.record(format!("create_account:{name}")).await;
        if self.failures.lock().await.create_account {
            return Err(PanelError::Status {
                route: routes::ACCOUNT,
                status: 409,
            });
        }
        let mut backend = self.backend.lock().await;
        let id = AccountId(backend.next_id.to_string());
        backend.next_id += 1;
        backend.accounts.push((id.clone(), name.to_string()));
        Ok(id)
    }

    async fn delete_account(
        &self,
        account_id: &AccountId,
        _kind: SourceKind,
    ) -> Result<Option<AccountId>, PanelError> {
        self.record(format!("delete_account:{account_id}")).await;
        let mut backend = self.backend.lock().await;
        backend.accounts.retain(|(id, _)| id != account_id);
        backend.channels.remove(account_id);
        Ok(backend.accounts.first().map(|(id, _)| id.clone()))
    }

    async fn create_channel(
        &self,
        channel_id: &ChannelId,
        account_id: &AccountId,
        _kind: SourceKind,
    ) -> Result<(), PanelError> {
        self.record(format!("create_channel:{account_id}:{channel_id}"))
            .await;
        if self.failures.lock().await.create_channel {
            return Err(PanelError::Status {
                route: routes::CHANNEL,
                status: 500,
            });
        }
        self.add_channel(account_id.as_str(), channel_id.as_str())
            .await;
        Ok(())
    }

    async fn delete_channel(
        &self,
        channel_id: &ChannelId,
        account_id: &AccountId,
        _kind: SourceKind,
    ) -> Result<(), PanelError> {
        self.record(format!("delete_channel:{account_id}:{channel_id}"))
            .await;
        let mut backend = self.backend.lock().await;
        let channels = backend.channels.entry(account_id.clone()).or_default();
        let before = channels.len();
        channels.retain(|channel| channel != channel_id);
        if channels.len() == before {
            return Err(PanelError::Status {
                route: routes::CHANNEL,
                status: 500,
            });
        }
        Ok(())
    }

    async fn upload_bulk_file(
        &self,
        file: BulkFile,
        account_id: &AccountId,
    ) -> Result<(), PanelError> {
        self.record(format!("upload:{account_id}:{}", file.file_name))
            .await;
        let gate = self.upload_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failures.lock().await.upload {
            return Err(PanelError::Status {
                route: routes::BULK_UPLOAD,
                status: 500,
            });
        }
        self.add_channel(account_id.as_str(), "UC-imported").await;
        Ok(())
    }
}

#[async_trait]
impl FragmentSource for FakeService {
    async fn channel_table_fragment(
        &self,
        account_id: Option<&AccountId>,
        _kind: SourceKind,
    ) -> Result<String, PanelError> {
        let id = account_id.map(ToString::to_string).unwrap_or_default();
        self.record(format!("table:{id}")).await;
        let gate = self
            .table_gate
            .lock()
            .await
            .clone()
            .filter(|(gated, _)| Some(gated) == account_id);
        if let Some((_, gate)) = gate {
            gate.notified().await;
        }
        let backend = self.backend.lock().await;
        let channels = account_id
            .and_then(|id| backend.channels.get(id))
            .cloned()
            .unwrap_or_default();
        Ok(render_table(&channels))
    }

    async fn account_selector_fragment(
        &self,
        select: Option<&AccountId>,
        _kind: SourceKind,
    ) -> Result<String, PanelError> {
        let hint = select
            .map(ToString::to_string)
            .unwrap_or_else(|| "-1".to_string());
        self.record(format!("selector:{hint}")).await;
        let backend = self.backend.lock().await;
        Ok(render_selector(&backend.accounts, select))
    }
}

async fn panel(
    service: &Arc<FakeService>,
    kind: SourceKind,
    selected: Option<&str>,
) -> Arc<PanelController> {
    let bootstrap = service.bootstrap(selected).await;
    PanelController::new(kind, service.clone(), &bootstrap)
}

fn drain(events: &mut broadcast::Receiver<PanelEvent>) -> Vec<PanelEvent> {
    let mut drained = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => drained.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => return drained,
        }
    }
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn creating_first_account_selects_it_and_rerenders() {
    let service = FakeService::new();
    let controller = panel(&service, SourceKind::YOUTUBE, None).await;
    let mut events = controller.subscribe_events();

    assert!(!controller.controls().await.create_account);
    controller.set_account_name("acme").await;
    assert!(controller.controls().await.create_account);

    let outcome = controller.submit_account().await;
    assert_eq!(outcome, ActionOutcome::Applied);
    assert_eq!(
        service.calls().await,
        vec!["create_account:acme", "selector:42", "table:42"]
    );

    let state = controller.state().await;
    assert_eq!(state.selected_account, Some(AccountId::new("42")));
    assert_eq!(state.account_name.value, "");
    assert_eq!(state.last_submitted_account_name, "acme");
    assert!(state.controls.delete_account);
    assert!(state.controls.bulk_import);

    let document = controller.document().await;
    assert_eq!(document.selector().selected(), Some(&AccountId::new("42")));
    assert!(document.fragment(FragmentSlot::ChannelTable).is_some());

    let events = drain(&mut events);
    assert!(events.contains(&PanelEvent::SelectionChanged(Some(AccountId::new("42")))));
    assert!(events.contains(&PanelEvent::InputCleared(InputKind::AccountName)));
    let selector_swap = events
        .iter()
        .position(|e| *e == PanelEvent::FragmentReplaced(FragmentSlot::AccountSelector));
    let table_swap = events
        .iter()
        .position(|e| *e == PanelEvent::FragmentReplaced(FragmentSlot::ChannelTable));
    assert!(selector_swap.is_some() && selector_swap < table_swap);
}

#[tokio::test]
async fn resubmitting_last_account_name_is_inert() {
    let service = FakeService::new();
    let controller = panel(&service, SourceKind::YOUTUBE, None).await;
    controller.set_account_name("acme").await;
    assert_eq!(controller.submit_account().await, ActionOutcome::Applied);
    let calls = service.calls().await.len();

    controller.set_account_name("acme").await;
    assert!(!controller.controls().await.create_account);
    assert_eq!(
        controller.submit_account().await,
        ActionOutcome::Noop(NoopReason::DuplicateOfLastSubmitted)
    );
    assert_eq!(service.calls().await.len(), calls);
}

#[tokio::test]
async fn empty_account_name_never_reaches_the_network() {
    let service = FakeService::new();
    let controller = panel(&service, SourceKind::YOUTUBE, None).await;

    assert_eq!(
        controller.submit_input(InputKind::AccountName).await,
        ActionOutcome::Noop(NoopReason::EmptyValue)
    );
    assert!(service.calls().await.is_empty());
}

#[tokio::test]
async fn rejected_account_marks_input_and_keeps_value() {
    let service = FakeService::new();
    service.failures.lock().await.create_account = true;
    let controller = panel(&service, SourceKind::YOUTUBE, None).await;
    controller.set_account_name("acme").await;

    assert_eq!(
        controller.submit_account().await,
        ActionOutcome::Failed(FailureKind::Request)
    );
    let state = controller.state().await;
    assert!(state.account_name.invalid);
    assert_eq!(state.account_name.value, "acme");
    assert!(!state.pending.account_create);
    assert!(state.controls.create_account);
    assert_eq!(state.selected_account, None);

    controller.set_account_name("acme2").await;
    assert!(!controller.state().await.account_name.invalid);
}

#[tokio::test]
async fn deleting_the_last_account_leaves_nothing_selected() {
    let service = FakeService::with_accounts(&["42"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("42")).await;
    assert_eq!(controller.start().await, ActionOutcome::Applied);

    assert_eq!(
        controller.delete_selected_account().await,
        ActionOutcome::Applied
    );

    let state = controller.state().await;
    assert_eq!(state.selected_account, None);
    assert!(!state.controls.create_channel);
    assert!(!state.controls.bulk_import);
    assert!(!state.controls.delete_account);
    assert_eq!(
        controller
            .document()
            .await
            .fragment(FragmentSlot::ChannelTable),
        None
    );
    assert_eq!(
        service.calls().await,
        vec!["table:42", "delete_account:42", "selector:-1"]
    );
}

#[tokio::test]
async fn deleting_an_account_moves_to_the_next_one() {
    let service = FakeService::with_accounts(&["7", "9"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("9")).await;

    assert_eq!(
        controller.delete_selected_account().await,
        ActionOutcome::Applied
    );

    assert_eq!(
        controller.state().await.selected_account,
        Some(AccountId::new("7"))
    );
    assert_eq!(service.table_calls().await, vec!["table:7"]);
    assert_eq!(
        service.calls().await,
        vec!["delete_account:9", "selector:7", "table:7"]
    );
}

#[tokio::test]
async fn added_channel_shows_up_in_refreshed_table() {
    let service = FakeService::with_accounts(&["1"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("1")).await;

    controller.set_channel_id("UC1").await;
    assert!(controller.controls().await.create_channel);
    assert_eq!(controller.submit_channel().await, ActionOutcome::Applied);

    let state = controller.state().await;
    assert_eq!(state.channel_id.value, "");
    assert_eq!(state.last_submitted_channel_id, "UC1");
    assert_eq!(
        controller.document().await.channel_ids(),
        vec![ChannelId::new("UC1")]
    );

    controller.set_channel_id("UC1").await;
    assert_eq!(
        controller.submit_channel().await,
        ActionOutcome::Noop(NoopReason::DuplicateOfLastSubmitted)
    );
}

#[tokio::test]
async fn rejected_channel_stays_retryable() {
    let service = FakeService::with_accounts(&["1"]);
    service.failures.lock().await.create_channel = true;
    let controller = panel(&service, SourceKind::YOUTUBE, Some("1")).await;
    controller.set_channel_id("UC1").await;

    assert_eq!(
        controller.submit_channel().await,
        ActionOutcome::Failed(FailureKind::Request)
    );
    let state = controller.state().await;
    assert!(state.channel_id.invalid);
    assert_eq!(state.channel_id.value, "UC1");
    assert_eq!(state.last_submitted_channel_id, "");
    assert!(state.controls.create_channel);
    assert!(service.table_calls().await.is_empty());

    service.failures.lock().await.create_channel = false;
    assert_eq!(controller.submit_channel().await, ActionOutcome::Applied);
    assert!(!controller.state().await.channel_id.invalid);
}

#[tokio::test]
async fn channel_submission_needs_a_selected_account() {
    let service = FakeService::new();
    let controller = panel(&service, SourceKind::YOUTUBE, None).await;
    controller.set_channel_id("UC1").await;

    assert!(!controller.controls().await.create_channel);
    assert_eq!(
        controller.submit_channel().await,
        ActionOutcome::Noop(NoopReason::NoAccountSelected)
    );
    assert!(service.calls().await.is_empty());
}

#[tokio::test]
async fn deleting_a_missing_channel_still_refreshes_once() {
    let service = FakeService::with_accounts(&["1"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("1")).await;
    let mut events = controller.subscribe_events();

    let outcome = controller.delete_channel(ChannelId::new("UC-gone")).await;

    assert_eq!(outcome, ActionOutcome::Failed(FailureKind::BestEffort));
    assert_eq!(service.table_calls().await, vec!["table:1"]);
    let state = controller.state().await;
    assert!(!state.channel_id.invalid);
    assert!(state.controls.delete_channel);
    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, PanelEvent::InputValidityChanged { .. })));
}

#[tokio::test]
async fn deleting_a_channel_resets_last_submitted_value() {
    let service = FakeService::with_accounts(&["1"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("1")).await;
    controller.set_channel_id("UC1").await;
    controller.submit_channel().await;

    assert_eq!(
        controller.delete_channel(ChannelId::new("UC1")).await,
        ActionOutcome::Applied
    );
    assert!(controller.document().await.channel_ids().is_empty());

    controller.set_channel_id("UC1").await;
    assert!(controller.controls().await.create_channel);
}

#[tokio::test]
async fn import_is_never_offered_for_kinds_without_it() {
    let service = FakeService::with_accounts(&["1", "2"]);
    let controller = panel(&service, SourceKind::REDDIT, None).await;
    assert!(!controller.controls().await.bulk_import);

    controller.select_account(AccountId::new("1")).await;
    assert!(!controller.controls().await.bulk_import);
    controller.set_channel_id("r/rust").await;
    assert!(!controller.controls().await.bulk_import);

    let file = BulkFile::new("subs.opml", b"<opml/>".to_vec());
    assert_eq!(
        controller.upload_bulk_file(file).await,
        ActionOutcome::Noop(NoopReason::ImportUnsupported)
    );
    assert!(!service
        .calls()
        .await
        .iter()
        .any(|call| call.starts_with("upload")));
}

#[tokio::test]
async fn upload_in_flight_freezes_the_panel() {
    let service = FakeService::with_accounts(&["1", "2"]);
    let gate = Arc::new(Notify::new());
    *service.upload_gate.lock().await = Some(gate.clone());
    let controller = panel(&service, SourceKind::YOUTUBE, Some("1")).await;

    let upload = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller
                .upload_bulk_file(BulkFile::new("subs.opml", b"<opml/>".to_vec()))
                .await
        }
    });
    let watched = &controller;
    wait_until(move || async move { watched.state().await.busy }).await;

    let controls = controller.controls().await;
    assert_eq!(controls.enabled().count(), 0);
    assert!(!controls.is_enabled(Control::AccountSelector));
    assert_eq!(
        controller.select_account(AccountId::new("2")).await,
        ActionOutcome::Noop(NoopReason::ControlDisabled)
    );
    assert_eq!(
        controller.delete_selected_account().await,
        ActionOutcome::Noop(NoopReason::ControlDisabled)
    );

    gate.notify_one();
    assert_eq!(upload.await.expect("join"), ActionOutcome::Applied);

    let state = controller.state().await;
    assert!(!state.busy);
    assert!(state.controls.bulk_import);
    assert!(state.controls.account_selector);
    assert_eq!(
        controller.document().await.channel_ids(),
        vec![ChannelId::new("UC-imported")]
    );
}

#[tokio::test]
async fn failed_upload_reenables_silently() {
    let service = FakeService::with_accounts(&["1"]);
    service.failures.lock().await.upload = true;
    let controller = panel(&service, SourceKind::YOUTUBE, Some("1")).await;

    let outcome = controller
        .upload_bulk_file(BulkFile::new("subs.opml", Vec::new()))
        .await;

    assert_eq!(outcome, ActionOutcome::Failed(FailureKind::Request));
    let state = controller.state().await;
    assert!(!state.busy);
    assert!(!state.account_name.invalid && !state.channel_id.invalid);
    assert!(state.controls.bulk_import);
    assert!(service.table_calls().await.is_empty());
}

#[tokio::test]
async fn table_for_abandoned_selection_is_discarded() {
    let service = FakeService::with_accounts(&["1", "2", "3"]);
    service.add_channel("1", "UC-one").await;
    service.add_channel("2", "UC-two").await;
    let gate = Arc::new(Notify::new());
    *service.table_gate.lock().await = Some((AccountId::new("1"), gate.clone()));
    let controller = panel(&service, SourceKind::YOUTUBE, Some("3")).await;
    let mut events = controller.subscribe_events();

    let slow = tokio::spawn({
        let controller = controller.clone();
        async move { controller.select_account(AccountId::new("1")).await }
    });
    let watched = &service;
    wait_until(move || async move {
        watched
            .table_calls()
            .await
            .iter()
            .any(|call| call == "table:1")
    })
    .await;

    assert_eq!(
        controller.select_account(AccountId::new("2")).await,
        ActionOutcome::Applied
    );
    gate.notify_one();
    assert_eq!(slow.await.expect("join"), ActionOutcome::Applied);

    assert_eq!(
        controller.document().await.channel_ids(),
        vec![ChannelId::new("UC-two")]
    );
    assert!(drain(&mut events)
        .contains(&PanelEvent::StaleFragmentDiscarded(FragmentSlot::ChannelTable)));
}

#[tokio::test]
async fn selection_guards() {
    let service = FakeService::with_accounts(&["1", "2"]);
    let controller = panel(&service, SourceKind::TWITTER, Some("1")).await;

    assert_eq!(
        controller.select_account(AccountId::new("1")).await,
        ActionOutcome::Noop(NoopReason::SelectionUnchanged)
    );
    assert_eq!(
        controller.select_account(AccountId::new("99")).await,
        ActionOutcome::Noop(NoopReason::UnknownAccount)
    );
    assert!(service.calls().await.is_empty());

    assert_eq!(
        controller.select_account(AccountId::new("2")).await,
        ActionOutcome::Applied
    );
    assert_eq!(service.calls().await, vec!["table:2"]);
}

#[tokio::test]
async fn selection_change_makes_last_channel_submittable_again() {
    let service = FakeService::with_accounts(&["1", "2"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("1")).await;
    controller.set_channel_id("UC1").await;
    controller.submit_channel().await;
    controller.set_channel_id("UC1").await;
    assert!(!controller.controls().await.create_channel);

    controller.select_account(AccountId::new("2")).await;

    assert!(controller.controls().await.create_channel);
    assert_eq!(controller.submit_channel().await, ActionOutcome::Applied);
    assert_eq!(
        controller.document().await.channel_ids(),
        vec![ChannelId::new("UC1")]
    );
}

#[tokio::test]
async fn start_fetches_table_only_for_preselected_account() {
    let service = FakeService::with_accounts(&["5"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("5")).await;
    assert_eq!(controller.start().await, ActionOutcome::Applied);
    assert_eq!(service.calls().await, vec!["table:5"]);

    let empty = FakeService::new();
    let controller = panel(&empty, SourceKind::YOUTUBE, None).await;
    let mut events = controller.subscribe_events();
    assert_eq!(
        controller.start().await,
        ActionOutcome::Noop(NoopReason::NoAccountSelected)
    );
    assert!(empty.calls().await.is_empty());
    assert!(matches!(
        drain(&mut events).first(),
        Some(PanelEvent::ControlsChanged(_))
    ));
}

#[tokio::test]
async fn snapshot_reflects_state_and_document() {
    let service = FakeService::with_accounts(&["5"]);
    let controller = panel(&service, SourceKind::YOUTUBE, Some("5")).await;
    controller.start().await;
    controller.set_account_name("other").await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.kind, SourceKind::YOUTUBE);
    assert_eq!(snapshot.state.account_name.value, "other");
    assert_eq!(
        snapshot.document.selector().selected(),
        Some(&AccountId::new("5"))
    );
    assert!(snapshot
        .document
        .fragment(FragmentSlot::ChannelTable)
        .is_some());
}
