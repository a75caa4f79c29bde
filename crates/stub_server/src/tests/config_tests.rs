use super::{apply_env_overrides, apply_file_overrides, Settings};

use std::collections::HashMap;

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    apply_file_overrides(
        &mut settings,
        "bind_addr = \"0.0.0.0:9000\"\ncsrf_token = \"from-file\"\n",
    );
    assert_eq!(settings.bind_addr, "0.0.0.0:9000");
    assert_eq!(settings.csrf_token, "from-file");
}

#[test]
fn unreadable_file_keeps_defaults() {
    let mut settings = Settings::default();
    apply_file_overrides(&mut settings, "this is = = not toml");
    assert_eq!(settings, Settings::default());
}

#[test]
fn app_prefixed_env_wins_over_legacy_name() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("STUB_SERVER_BIND", "127.0.0.1:1"),
        ("APP__BIND_ADDR", "127.0.0.1:2"),
        ("APP__CSRF_TOKEN", "from-env"),
    ]);
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, |key| env.get(key).map(|v| v.to_string()));
    assert_eq!(settings.bind_addr, "127.0.0.1:2");
    assert_eq!(settings.csrf_token, "from-env");
}

#[test]
fn empty_token_env_is_ignored() {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, |key| {
        (key == "APP__CSRF_TOKEN").then(String::new)
    });
    assert_eq!(settings.csrf_token, Settings::default().csrf_token);
}
