//! State machine behind the settings panel: text inputs, the account selection, in-flight
//! mutations and the control states derived from them.
//!
//! The state lock is never held across a network call. Each operation guards and marks its
//! pending flag, releases the lock, awaits the request, then re-locks to apply the result.

use std::sync::Arc;

use shared::domain::{AccountId, ChannelId, SourceKind};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    bootstrap::PageBootstrap,
    controls::{evaluate, ControlInputs, ControlStates, PendingFlags},
    error::PanelError,
    fragments::{
        FragmentReconciler, FragmentSlot, PanelDocument, SelectionEpoch, TableRefresh,
        TableRequest,
    },
    mutation_client::{BulkFile, FragmentSource, PanelApi},
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    AccountName,
    ChannelId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputField {
    pub value: String,
    /// Set after a rejected submission, cleared by the next edit.
    pub invalid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    pub selected_account: Option<AccountId>,
    pub last_submitted_account_name: String,
    pub last_submitted_channel_id: String,
    pub pending: PendingFlags,
    pub account_name: InputField,
    pub channel_id: InputField,
    pub busy: bool,
    pub controls: ControlStates,
}

impl PanelState {
    fn control_inputs(&self, kind: SourceKind) -> ControlInputs<'_> {
        ControlInputs {
            selected_account: self.selected_account.as_ref(),
            pending: self.pending,
            account_name: &self.account_name.value,
            last_submitted_account_name: &self.last_submitted_account_name,
            channel_id: &self.channel_id.value,
            last_submitted_channel_id: &self.last_submitted_channel_id,
            kind_supports_import: kind.supports_bulk_import(),
        }
    }

    fn input_mut(&mut self, input: InputKind) -> &mut InputField {
        match input {
            InputKind::AccountName => &mut self.account_name,
            InputKind::ChannelId => &mut self.channel_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelSnapshot {
    pub kind: SourceKind,
    pub state: PanelState,
    pub document: PanelDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    ControlsChanged(ControlStates),
    SelectionChanged(Option<AccountId>),
    FragmentReplaced(FragmentSlot),
    FragmentCleared(FragmentSlot),
    StaleFragmentDiscarded(FragmentSlot),
    InputValidityChanged { input: InputKind, invalid: bool },
    InputCleared(InputKind),
    BusyChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoopReason {
    EmptyValue,
    DuplicateOfLastSubmitted,
    NoAccountSelected,
    AlreadyPending,
    SelectionUnchanged,
    UnknownAccount,
    ImportUnsupported,
    ControlDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The mutation was rejected; the related input is marked invalid.
    Request,
    /// The mutation failed but the panel still re-synced with the server.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    Noop(NoopReason),
    Failed(FailureKind),
}

fn submission_guard(
    value: &str,
    last_submitted: &str,
    pending: bool,
    uploading: bool,
) -> Option<NoopReason> {
    if value.is_empty() {
        Some(NoopReason::EmptyValue)
    } else if value == last_submitted {
        Some(NoopReason::DuplicateOfLastSubmitted)
    } else if pending {
        Some(NoopReason::AlreadyPending)
    } else if uploading {
        Some(NoopReason::ControlDisabled)
    } else {
        None
    }
}

pub struct PanelController {
    kind: SourceKind,
    api: Arc<dyn PanelApi>,
    reconciler: FragmentReconciler,
    epoch: SelectionEpoch,
    inner: Mutex<PanelState>,
    events: broadcast::Sender<PanelEvent>,
}

impl PanelController {
    pub fn new<A>(kind: SourceKind, api: Arc<A>, bootstrap: &PageBootstrap) -> Arc<Self>
    where
        A: PanelApi + FragmentSource + 'static,
    {
        let fragments: Arc<dyn FragmentSource> = api.clone();
        Self::with_sources(kind, api, fragments, bootstrap)
    }

    pub fn with_sources(
        kind: SourceKind,
        api: Arc<dyn PanelApi>,
        fragments: Arc<dyn FragmentSource>,
        bootstrap: &PageBootstrap,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let epoch = SelectionEpoch::default();
        let document = PanelDocument::with_selector(bootstrap.selector_markup.clone());
        let mut state = PanelState {
            selected_account: bootstrap.selected_account.clone(),
            ..PanelState::default()
        };
        state.controls = evaluate(&state.control_inputs(kind));

        Arc::new(Self {
            kind,
            api,
            reconciler: FragmentReconciler::new(fragments, kind, epoch.clone(), document),
            epoch,
            inner: Mutex::new(state),
            events,
        })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PanelEvent> {
        self.events.subscribe()
    }

    pub async fn controls(&self) -> ControlStates {
        self.inner.lock().await.controls
    }

    pub async fn state(&self) -> PanelState {
        self.inner.lock().await.clone()
    }

    pub async fn document(&self) -> PanelDocument {
        self.reconciler.document().await
    }

    pub async fn snapshot(&self) -> PanelSnapshot {
        let state = self.state().await;
        PanelSnapshot {
            kind: self.kind,
            state,
            document: self.document().await,
        }
    }

    /// Publishes the initial control states and loads the table for the preselected account.
    pub async fn start(&self) -> ActionOutcome {
        let request = {
            let state = self.inner.lock().await;
            self.emit(PanelEvent::ControlsChanged(state.controls));
            if state.selected_account.is_none() {
                debug!(kind = %self.kind, "panel: started without a selected account");
                return ActionOutcome::Noop(NoopReason::NoAccountSelected);
            }
            self.table_request(&state)
        };
        info!(kind = %self.kind, account = ?request.account, "panel: started");
        match self.apply_table(&request).await {
            Ok(()) => ActionOutcome::Applied,
            Err(_) => ActionOutcome::Failed(FailureKind::Request),
        }
    }

    pub async fn set_account_name(&self, value: impl Into<String>) {
        self.set_input(InputKind::AccountName, value.into()).await;
    }

    pub async fn set_channel_id(&self, value: impl Into<String>) {
        self.set_input(InputKind::ChannelId, value.into()).await;
    }

    /// Every edit clears the invalid marker and re-derives the control states.
    pub async fn set_input(&self, input: InputKind, value: String) {
        let mut state = self.inner.lock().await;
        state.input_mut(input).value = value;
        self.mark_input(&mut state, input, false);
        self.refresh_controls(&mut state);
    }

    /// Enter inside a text input behaves like pressing the matching button.
    pub async fn submit_input(&self, input: InputKind) -> ActionOutcome {
        match input {
            InputKind::AccountName => self.submit_account().await,
            InputKind::ChannelId => self.submit_channel().await,
        }
    }

    pub async fn submit_account(&self) -> ActionOutcome {
        let name = {
            let mut state = self.inner.lock().await;
            let name = state.account_name.value.clone();
            if let Some(reason) = submission_guard(
                &name,
                &state.last_submitted_account_name,
                state.pending.account_create,
                state.pending.bulk_upload,
            ) {
                debug!(?reason, "panel: account submission ignored");
                return ActionOutcome::Noop(reason);
            }
            state.pending.account_create = true;
            self.refresh_controls(&mut state);
            name
        };

        let result = self.api.create_account(&name, self.kind).await;

        let created = {
            let mut state = self.inner.lock().await;
            state.pending.account_create = false;
            match result {
                Ok(account) => {
                    info!(kind = %self.kind, %account, name = %name, "panel: account created");
                    state.last_submitted_account_name = name;
                    self.clear_input(&mut state, InputKind::AccountName);
                    self.set_selection(&mut state, Some(account.clone()));
                    self.refresh_controls(&mut state);
                    account
                }
                Err(err) => {
                    warn!(kind = %self.kind, name = %name, error = %err, "panel: account creation failed");
                    self.mark_input(&mut state, InputKind::AccountName, true);
                    self.refresh_controls(&mut state);
                    return ActionOutcome::Failed(FailureKind::Request);
                }
            }
        };

        self.rerender_selector(Some(created)).await;
        ActionOutcome::Applied
    }

    pub async fn delete_selected_account(&self) -> ActionOutcome {
        let account = {
            let mut state = self.inner.lock().await;
            let Some(account) = state.selected_account.clone() else {
                return ActionOutcome::Noop(NoopReason::NoAccountSelected);
            };
            if state.pending.account_delete {
                return ActionOutcome::Noop(NoopReason::AlreadyPending);
            }
            if state.pending.bulk_upload {
                return ActionOutcome::Noop(NoopReason::ControlDisabled);
            }
            state.pending.account_delete = true;
            self.refresh_controls(&mut state);
            account
        };

        let result = self.api.delete_account(&account, self.kind).await;

        let next = {
            let mut state = self.inner.lock().await;
            state.pending.account_delete = false;
            match result {
                Ok(next) => {
                    info!(kind = %self.kind, %account, next = ?next, "panel: account deleted");
                    state.last_submitted_account_name.clear();
                    self.set_selection(&mut state, next.clone());
                    self.refresh_controls(&mut state);
                    next
                }
                Err(err) => {
                    warn!(kind = %self.kind, %account, error = %err, "panel: account deletion failed");
                    self.refresh_controls(&mut state);
                    return ActionOutcome::Failed(FailureKind::Request);
                }
            }
        };

        self.rerender_selector(next).await;
        ActionOutcome::Applied
    }

    /// User picked an account in the selector.
    pub async fn select_account(&self, account: AccountId) -> ActionOutcome {
        let selector = self.reconciler.selector().await;
        let request = {
            let mut state = self.inner.lock().await;
            if state.selected_account.as_ref() == Some(&account) {
                return ActionOutcome::Noop(NoopReason::SelectionUnchanged);
            }
            if state.pending.bulk_upload {
                return ActionOutcome::Noop(NoopReason::ControlDisabled);
            }
            if selector.is_bound() && !selector.contains(&account) {
                debug!(%account, "panel: selection of an unlisted account ignored");
                return ActionOutcome::Noop(NoopReason::UnknownAccount);
            }
            self.set_selection(&mut state, Some(account));
            self.refresh_controls(&mut state);
            self.table_request(&state)
        };

        match self.apply_table(&request).await {
            Ok(()) => ActionOutcome::Applied,
            Err(_) => ActionOutcome::Failed(FailureKind::Request),
        }
    }

    pub async fn submit_channel(&self) -> ActionOutcome {
        let (account, channel, previous_last) = {
            let mut state = self.inner.lock().await;
            let Some(account) = state.selected_account.clone() else {
                return ActionOutcome::Noop(NoopReason::NoAccountSelected);
            };
            let value = state.channel_id.value.clone();
            if let Some(reason) = submission_guard(
                &value,
                &state.last_submitted_channel_id,
                state.pending.channel_create,
                state.pending.bulk_upload,
            ) {
                debug!(?reason, "panel: channel submission ignored");
                return ActionOutcome::Noop(reason);
            }
            let previous_last =
                std::mem::replace(&mut state.last_submitted_channel_id, value.clone());
            state.pending.channel_create = true;
            self.refresh_controls(&mut state);
            (account, ChannelId(value), previous_last)
        };

        let result = self
            .api
            .create_channel(&channel, &account, self.kind)
            .await;

        let request = {
            let mut state = self.inner.lock().await;
            state.pending.channel_create = false;
            match result {
                Ok(()) => {
                    info!(kind = %self.kind, %account, %channel, "panel: channel added");
                    self.clear_input(&mut state, InputKind::ChannelId);
                    self.refresh_controls(&mut state);
                    self.table_request(&state)
                }
                Err(err) => {
                    warn!(kind = %self.kind, %account, %channel, error = %err, "panel: channel creation failed");
                    // A rejected value stays retryable unless a selection change already reset it.
                    if state.last_submitted_channel_id == channel.as_str() {
                        state.last_submitted_channel_id = previous_last;
                    }
                    self.mark_input(&mut state, InputKind::ChannelId, true);
                    self.refresh_controls(&mut state);
                    return ActionOutcome::Failed(FailureKind::Request);
                }
            }
        };

        let _ = self.apply_table(&request).await;
        ActionOutcome::Applied
    }

    /// Removes one row of the channel table. The table is re-fetched whatever the outcome.
    pub async fn delete_channel(&self, channel: ChannelId) -> ActionOutcome {
        let account = {
            let mut state = self.inner.lock().await;
            let Some(account) = state.selected_account.clone() else {
                return ActionOutcome::Noop(NoopReason::NoAccountSelected);
            };
            if state.pending.channel_delete {
                return ActionOutcome::Noop(NoopReason::AlreadyPending);
            }
            if state.pending.bulk_upload {
                return ActionOutcome::Noop(NoopReason::ControlDisabled);
            }
            state.pending.channel_delete = true;
            self.refresh_controls(&mut state);
            account
        };

        let result = self
            .api
            .delete_channel(&channel, &account, self.kind)
            .await;
        match &result {
            Ok(()) => info!(kind = %self.kind, %account, %channel, "panel: channel deleted"),
            Err(err) => {
                warn!(kind = %self.kind, %account, %channel, error = %err, "panel: channel deletion failed")
            }
        }

        let request = {
            let mut state = self.inner.lock().await;
            state.pending.channel_delete = false;
            state.last_submitted_channel_id.clear();
            self.refresh_controls(&mut state);
            self.table_request(&state)
        };
        let refreshed = self.apply_table(&request).await;

        match (result, refreshed) {
            (Ok(()), Ok(())) => ActionOutcome::Applied,
            _ => ActionOutcome::Failed(FailureKind::BestEffort),
        }
    }

    /// Sends a subscription export for the selected account. The panel is busy until it settles.
    pub async fn upload_bulk_file(&self, file: BulkFile) -> ActionOutcome {
        let account = {
            let mut state = self.inner.lock().await;
            if !self.kind.supports_bulk_import() {
                return ActionOutcome::Noop(NoopReason::ImportUnsupported);
            }
            let Some(account) = state.selected_account.clone() else {
                return ActionOutcome::Noop(NoopReason::NoAccountSelected);
            };
            if state.pending.bulk_upload {
                return ActionOutcome::Noop(NoopReason::AlreadyPending);
            }
            state.pending.bulk_upload = true;
            self.set_busy(&mut state, true);
            self.refresh_controls(&mut state);
            account
        };

        let file_name = file.file_name.clone();
        let result = self.api.upload_bulk_file(file, &account).await;

        let request = {
            let mut state = self.inner.lock().await;
            state.pending.bulk_upload = false;
            self.set_busy(&mut state, false);
            self.refresh_controls(&mut state);
            match result {
                Ok(()) => {
                    info!(%account, file = %file_name, "panel: bulk import uploaded");
                    self.table_request(&state)
                }
                Err(err) => {
                    warn!(%account, file = %file_name, error = %err, "panel: bulk import failed");
                    return ActionOutcome::Failed(FailureKind::Request);
                }
            }
        };

        let _ = self.apply_table(&request).await;
        ActionOutcome::Applied
    }

    /// Re-renders the selector around `hint`, adopts whatever it settled on, then reloads the
    /// table for that selection.
    async fn rerender_selector(&self, hint: Option<AccountId>) {
        let reconciled = self
            .reconciler
            .reconcile_selector(hint.as_ref(), |binding| async move {
                self.emit(PanelEvent::FragmentReplaced(FragmentSlot::AccountSelector));
                let mut state = self.inner.lock().await;
                self.set_selection(&mut state, binding.selected().cloned());
                self.refresh_controls(&mut state);
                self.table_request(&state)
            })
            .await;

        match reconciled {
            Ok(reconciled) => self.publish_table(reconciled.table),
            Err(err) => {
                warn!(kind = %self.kind, hint = ?hint, error = %err, "panel: selector re-render failed");
            }
        }
    }

    async fn apply_table(&self, request: &TableRequest) -> Result<(), PanelError> {
        match self.reconciler.refresh_channel_table(request).await {
            Ok(refresh) => {
                self.publish_table(refresh);
                Ok(())
            }
            Err(err) => {
                warn!(kind = %self.kind, account = ?request.account, error = %err, "panel: channel table refresh failed");
                Err(err)
            }
        }
    }

    fn publish_table(&self, refresh: TableRefresh) {
        let slot = FragmentSlot::ChannelTable;
        self.emit(match refresh {
            TableRefresh::Replaced => PanelEvent::FragmentReplaced(slot),
            TableRefresh::Cleared => PanelEvent::FragmentCleared(slot),
            TableRefresh::Stale => PanelEvent::StaleFragmentDiscarded(slot),
        });
    }

    fn table_request(&self, state: &PanelState) -> TableRequest {
        TableRequest {
            account: state.selected_account.clone(),
            issued_at: self.epoch.current(),
        }
    }

    /// Only called with the state lock held, so the epoch and the selection move together.
    fn set_selection(&self, state: &mut PanelState, next: Option<AccountId>) {
        if state.selected_account == next {
            return;
        }
        state.selected_account = next.clone();
        state.last_submitted_channel_id.clear();
        let epoch = self.epoch.advance();
        debug!(kind = %self.kind, selected = ?next, epoch, "panel: selection changed");
        self.emit(PanelEvent::SelectionChanged(next));
    }

    fn refresh_controls(&self, state: &mut PanelState) {
        let controls = evaluate(&state.control_inputs(self.kind));
        if controls != state.controls {
            state.controls = controls;
            self.emit(PanelEvent::ControlsChanged(controls));
        }
    }

    fn mark_input(&self, state: &mut PanelState, input: InputKind, invalid: bool) {
        let field = state.input_mut(input);
        if field.invalid != invalid {
            field.invalid = invalid;
            self.emit(PanelEvent::InputValidityChanged { input, invalid });
        }
    }

    fn clear_input(&self, state: &mut PanelState, input: InputKind) {
        state.input_mut(input).value.clear();
        self.mark_input(state, input, false);
        self.emit(PanelEvent::InputCleared(input));
    }

    fn set_busy(&self, state: &mut PanelState, busy: bool) {
        if state.busy != busy {
            state.busy = busy;
            self.emit(PanelEvent::BusyChanged(busy));
        }
    }

    fn emit(&self, event: PanelEvent) {
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/controller_http_tests.rs"]
mod http_tests;
