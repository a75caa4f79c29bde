//! Plain-text rendering of the panel for the terminal.

use std::fmt::Write as _;

use panel_core::{ActionOutcome, CardPager, FailureKind, NoopReason, PanelSnapshot};

pub fn outcome(action: &str, outcome: ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Applied => format!("{action}: done"),
        ActionOutcome::Noop(reason) => format!("{action}: nothing to do ({})", noop_reason(reason)),
        ActionOutcome::Failed(FailureKind::Request) => format!("{action}: rejected by the server"),
        ActionOutcome::Failed(FailureKind::BestEffort) => {
            format!("{action}: failed, panel re-synced with the server")
        }
    }
}

fn noop_reason(reason: NoopReason) -> &'static str {
    match reason {
        NoopReason::EmptyValue => "empty value",
        NoopReason::DuplicateOfLastSubmitted => "same as the last submission",
        NoopReason::NoAccountSelected => "no account selected",
        NoopReason::AlreadyPending => "a request is already in flight",
        NoopReason::SelectionUnchanged => "already selected",
        NoopReason::UnknownAccount => "account is not listed",
        NoopReason::ImportUnsupported => "this kind has no bulk import",
        NoopReason::ControlDisabled => "control is disabled",
    }
}

pub fn panel(snapshot: &PanelSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "kind: {}", snapshot.kind);

    let selector = snapshot.document.selector();
    let _ = writeln!(out, "accounts:");
    if selector.options().is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for option in selector.options() {
        let marker = if snapshot.state.selected_account.as_ref() == Some(&option.id) {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(out, "  {marker} {} {}", option.id, option.label);
    }

    let channels = snapshot.document.channel_ids();
    let _ = writeln!(out, "channels:");
    if channels.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for channel in channels {
        let _ = writeln!(out, "  {channel}");
    }

    let enabled: Vec<&str> = snapshot
        .state
        .controls
        .enabled()
        .map(|control| control.label())
        .collect();
    let _ = write!(out, "enabled: {}", enabled.join(", "));
    out
}

pub fn cards(pager: CardPager, markup: Option<&str>) -> String {
    format!("page {}\n{}", pager.status(), markup.unwrap_or(""))
}

#[cfg(test)]
#[path = "tests/report_tests.rs"]
mod tests;
