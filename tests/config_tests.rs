use issuescope::config::{resolve_model, ConfigError, HttpSettings, OracleSettings, Overrides, SlackSettings};
use issuescope::http::TlsTrust;
use std::collections::HashMap;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |name| map.get(name).cloned()
}

#[test]
fn defaults_apply_when_only_the_key_is_set() {
    let s = OracleSettings::from_lookup(&env(&[("OPENAI_API_KEY", "sk-1")]), &Overrides::default()).unwrap();
    assert_eq!(s.api_key, "sk-1");
    assert_eq!(s.model, "gpt-4o-mini");
    assert_eq!(s.base_url, "https://api.openai.com/v1");
    assert_eq!(s.http.timeout, Duration::from_secs(120));
    assert_eq!(s.http.retry.attempts(), 3);
    assert_eq!(s.http.retry.delay_for(1), Duration::from_millis(800));
    assert_eq!(s.http.tls, TlsTrust::Bundled);
}

#[test]
fn environment_values_are_read() {
    let lookup = env(&[
        ("OPENAI_API_KEY", "sk-1"),
        ("OPENAI_MODEL", "gpt-4o"),
        ("OPENAI_BASE_URL", "https://proxy.internal/v1/"),
        ("OPENAI_RETRIES", "5"),
        ("OPENAI_RETRY_BACKOFF", "1.5"),
        ("OPENAI_TIMEOUT_SECS", "30"),
        ("OPENAI_TLS_ROOTS", "platform"),
    ]);
    let s = OracleSettings::from_lookup(&lookup, &Overrides::default()).unwrap();
    assert_eq!(s.model, "gpt-4o");
    assert_eq!(s.base_url, "https://proxy.internal/v1");
    assert_eq!(s.http.retry.attempts(), 5);
    assert_eq!(s.http.retry.delay_for(2), Duration::from_secs(3));
    assert_eq!(s.http.timeout, Duration::from_secs(30));
    assert_eq!(s.http.tls, TlsTrust::Platform);
}

#[test]
fn command_line_overrides_win() {
    let lookup = env(&[("OPENAI_MODEL", "gpt-4o"), ("OPENAI_TLS_ROOTS", "bundled")]);
    let overrides = Overrides { model: Some("o3-mini".into()), system_roots: true, ..Overrides::default() };
    assert_eq!(resolve_model(&lookup, &overrides), "o3-mini");
    assert_eq!(HttpSettings::from_lookup(&lookup, &overrides).unwrap().tls, TlsTrust::Platform);

    let insecure = Overrides { insecure: true, ..Overrides::default() };
    assert_eq!(HttpSettings::from_lookup(&lookup, &insecure).unwrap().tls, TlsTrust::Insecure);
}

#[test]
fn insecure_and_bundle_from_environment() {
    let dir = tempfile::tempdir().unwrap();
    let pem = dir.path().join("corp.pem");
    std::fs::write(&pem, "-----BEGIN CERTIFICATE-----\n").unwrap();
    let pem_str = pem.to_string_lossy().into_owned();

    let lookup = env(&[("OPENAI_CA_BUNDLE", pem_str.as_str())]);
    assert_eq!(HttpSettings::from_lookup(&lookup, &Overrides::default()).unwrap().tls, TlsTrust::CaBundle(pem.clone()));

    let lookup = env(&[("OPENAI_CA_BUNDLE", pem_str.as_str()), ("OPENAI_INSECURE_SKIP_VERIFY", "yes")]);
    assert_eq!(HttpSettings::from_lookup(&lookup, &Overrides::default()).unwrap().tls, TlsTrust::Insecure);
}

#[test]
fn model_resolves_without_a_key() {
    assert_eq!(resolve_model(&env(&[]), &Overrides::default()), "gpt-4o-mini");
    let err = OracleSettings::from_lookup(&env(&[("OPENAI_API_KEY", "  ")]), &Overrides::default()).unwrap_err();
    assert_eq!(err, ConfigError::MissingCredential("OPENAI_API_KEY"));
}

#[test]
fn malformed_numbers_and_roots_are_rejected() {
    for (name, value) in [("OPENAI_RETRY_BACKOFF", "-1"), ("OPENAI_TIMEOUT_SECS", "soon"), ("OPENAI_TLS_ROOTS", "mine")] {
        let err = HttpSettings::from_lookup(&env(&[(name, value)]), &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: n, .. } if n == name), "{name}");
    }
}

#[test]
fn slack_settings() {
    let s = SlackSettings::from_lookup(&env(&[
        ("SLACK_BOT_TOKEN", "xoxb-bot"),
        ("SLACK_TOKEN", "xoxb-legacy"),
        ("SLACK_CHANNEL", "C123"),
        ("SLACK_API_BASE", "http://localhost:9000/api/"),
    ]));
    assert_eq!(s.target(), Some(("xoxb-bot", "C123")));
    assert_eq!(s.api_base, "http://localhost:9000/api");

    let s = SlackSettings::from_lookup(&env(&[]));
    assert_eq!(s.api_base, "https://slack.com/api");
    assert_eq!(s.token, None);
}
