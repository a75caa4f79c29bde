//! Enabled/disabled derivation for every interactive control of the panel.
//!
//! Pure: the controller feeds in its current state after every input change and every request
//! completion and applies whatever comes out.

use shared::domain::AccountId;

/// One flag per mutating operation that can be in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingFlags {
    pub account_create: bool,
    pub account_delete: bool,
    pub channel_create: bool,
    pub channel_delete: bool,
    pub bulk_upload: bool,
}

impl PendingFlags {
    pub fn any(&self) -> bool {
        self.account_create
            || self.account_delete
            || self.channel_create
            || self.channel_delete
            || self.bulk_upload
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    CreateAccount,
    DeleteAccount,
    CreateChannel,
    DeleteChannel,
    BulkImport,
    AccountSelector,
    AccountNameInput,
    ChannelIdInput,
}

impl Control {
    pub const ALL: [Control; 8] = [
        Control::CreateAccount,
        Control::DeleteAccount,
        Control::CreateChannel,
        Control::DeleteChannel,
        Control::BulkImport,
        Control::AccountSelector,
        Control::AccountNameInput,
        Control::ChannelIdInput,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Control::CreateAccount => "create-account",
            Control::DeleteAccount => "delete-account",
            Control::CreateChannel => "create-channel",
            Control::DeleteChannel => "delete-channel",
            Control::BulkImport => "bulk-import",
            Control::AccountSelector => "account-selector",
            Control::AccountNameInput => "account-name",
            Control::ChannelIdInput => "channel-id",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlStates {
    pub create_account: bool,
    pub delete_account: bool,
    pub create_channel: bool,
    pub delete_channel: bool,
    pub bulk_import: bool,
    pub account_selector: bool,
    pub account_name_input: bool,
    pub channel_id_input: bool,
}

impl ControlStates {
    pub fn is_enabled(&self, control: Control) -> bool {
        match control {
            Control::CreateAccount => self.create_account,
            Control::DeleteAccount => self.delete_account,
            Control::CreateChannel => self.create_channel,
            Control::DeleteChannel => self.delete_channel,
            Control::BulkImport => self.bulk_import,
            Control::AccountSelector => self.account_selector,
            Control::AccountNameInput => self.account_name_input,
            Control::ChannelIdInput => self.channel_id_input,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = Control> + '_ {
        Control::ALL
            .into_iter()
            .filter(move |control| self.is_enabled(*control))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ControlInputs<'a> {
    pub selected_account: Option<&'a AccountId>,
    pub pending: PendingFlags,
    pub account_name: &'a str,
    pub last_submitted_account_name: &'a str,
    pub channel_id: &'a str,
    pub last_submitted_channel_id: &'a str,
    pub kind_supports_import: bool,
}

/// A typed value may be submitted when it is non-empty and not what was last submitted.
pub fn is_submittable(value: &str, last_submitted: &str) -> bool {
    !value.is_empty() && value != last_submitted
}

pub fn evaluate(inputs: &ControlInputs<'_>) -> ControlStates {
    let selected = inputs.selected_account.is_some();
    let pending = inputs.pending;
    // An upload in flight freezes everything tied to the selected account.
    let uploading = pending.bulk_upload;

    ControlStates {
        create_account: !uploading
            && !pending.account_create
            && is_submittable(inputs.account_name, inputs.last_submitted_account_name),
        delete_account: !uploading && selected && !pending.account_delete,
        create_channel: !uploading
            && selected
            && !pending.channel_create
            && is_submittable(inputs.channel_id, inputs.last_submitted_channel_id),
        delete_channel: !uploading && selected && !pending.channel_delete,
        bulk_import: !uploading && selected && inputs.kind_supports_import,
        account_selector: !uploading,
        account_name_input: !uploading && !pending.account_create,
        channel_id_input: !uploading && !pending.channel_create,
    }
}

#[cfg(test)]
#[path = "tests/controls_tests.rs"]
mod tests;
