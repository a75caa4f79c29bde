use super::*;
use proptest::prelude::*;

fn inputs<'a>(
    selected: Option<&'a AccountId>,
    pending: PendingFlags,
    account_name: &'a str,
    last_account_name: &'a str,
    channel_id: &'a str,
    last_channel_id: &'a str,
    kind_supports_import: bool,
) -> ControlInputs<'a> {
    ControlInputs {
        selected_account: selected,
        pending,
        account_name,
        last_submitted_account_name: last_account_name,
        channel_id,
        last_submitted_channel_id: last_channel_id,
        kind_supports_import,
    }
}

#[test]
fn create_account_grid_matches_rule() {
    let values = ["", "acme", "globex"];
    for value in values {
        for last in values {
            for pending in [false, true] {
                let flags = PendingFlags {
                    account_create: pending,
                    ..PendingFlags::default()
                };
                let states = evaluate(&inputs(None, flags, value, last, "", "", false));
                let expected = !value.is_empty() && value != last && !pending;
                assert_eq!(
                    states.create_account, expected,
                    "value={value:?} last={last:?} pending={pending}"
                );
            }
        }
    }
}

#[test]
fn create_channel_grid_matches_rule() {
    let account = AccountId::new("1");
    let values = ["", "UC1", "UC2"];
    for selected in [None, Some(&account)] {
        for value in values {
            for last in values {
                for pending in [false, true] {
                    let flags = PendingFlags {
                        channel_create: pending,
                        ..PendingFlags::default()
                    };
                    let states = evaluate(&inputs(selected, flags, "", "", value, last, true));
                    let expected =
                        selected.is_some() && !value.is_empty() && value != last && !pending;
                    assert_eq!(
                        states.create_channel, expected,
                        "selected={selected:?} value={value:?} last={last:?} pending={pending}"
                    );
                }
            }
        }
    }
}

#[test]
fn delete_account_requires_selection_and_no_pending_delete() {
    let account = AccountId::new("9");
    let none = evaluate(&inputs(None, PendingFlags::default(), "", "", "", "", true));
    assert!(!none.delete_account);

    let selected = evaluate(&inputs(
        Some(&account),
        PendingFlags::default(),
        "",
        "",
        "",
        "",
        true,
    ));
    assert!(selected.delete_account);

    let pending = evaluate(&inputs(
        Some(&account),
        PendingFlags {
            account_delete: true,
            ..PendingFlags::default()
        },
        "",
        "",
        "",
        "",
        true,
    ));
    assert!(!pending.delete_account);
}

#[test]
fn bulk_import_never_enabled_for_kind_without_import() {
    let account = AccountId::new("3");
    for selected in [None, Some(&account)] {
        for pending in [PendingFlags::default(), PendingFlags {
            account_create: true,
            channel_create: true,
            ..PendingFlags::default()
        }] {
            let states = evaluate(&inputs(selected, pending, "x", "", "y", "", false));
            assert!(!states.bulk_import);
        }
    }

    let states = evaluate(&inputs(
        Some(&account),
        PendingFlags::default(),
        "",
        "",
        "",
        "",
        true,
    ));
    assert!(states.bulk_import);
}

#[test]
fn upload_in_flight_disables_dependent_controls() {
    let account = AccountId::new("3");
    let states = evaluate(&inputs(
        Some(&account),
        PendingFlags {
            bulk_upload: true,
            ..PendingFlags::default()
        },
        "acme",
        "",
        "UC1",
        "",
        true,
    ));
    assert_eq!(states.enabled().count(), 0);
}

#[test]
fn pending_create_disables_its_input() {
    let states = evaluate(&inputs(
        None,
        PendingFlags {
            account_create: true,
            ..PendingFlags::default()
        },
        "acme",
        "",
        "",
        "",
        false,
    ));
    assert!(!states.account_name_input);
    assert!(states.channel_id_input);
    assert!(states.account_selector);
}

proptest! {
    #[test]
    fn create_controls_follow_rules_for_arbitrary_values(
        account_name in "[ab]{0,2}",
        last_account_name in "[ab]{0,2}",
        channel_id in "[ab]{0,2}",
        last_channel_id in "[ab]{0,2}",
        selected in any::<bool>(),
        account_create in any::<bool>(),
        channel_create in any::<bool>(),
        supports_import in any::<bool>(),
    ) {
        let account = AccountId::new("5");
        let flags = PendingFlags {
            account_create,
            channel_create,
            ..PendingFlags::default()
        };
        let states = evaluate(&inputs(
            selected.then_some(&account),
            flags,
            &account_name,
            &last_account_name,
            &channel_id,
            &last_channel_id,
            supports_import,
        ));

        prop_assert_eq!(
            states.create_account,
            !account_name.is_empty() && account_name != last_account_name && !account_create
        );
        prop_assert_eq!(
            states.create_channel,
            selected && !channel_id.is_empty() && channel_id != last_channel_id && !channel_create
        );
        prop_assert_eq!(states.bulk_import, selected && supports_import);
        prop_assert_eq!(states.delete_account, selected);
    }
}
