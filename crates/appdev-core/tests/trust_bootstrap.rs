//! Tests for interactive certificate bundle acquisition.

mod support;

use tempfile::TempDir;

use appdev_core::config::{ConfigPaths, Settings};
use appdev_core::error::Error;
use appdev_core::trust::{
    BundleStatus, ConnectionConfig, SocksVersion, TrustBootstrap, TrustRecord, TrustStore,
    Verification, check_bootstrapped,
};

use support::{Answer, ConnectScript, FakeConnector, ScriptedOperator, self_signed_pem};

const HOST: &str = "10.0.0.1";

fn store(temp: &TempDir) -> TrustStore {
    TrustStore::new(ConfigPaths::from_home(temp.path()))
}

/// Proceed, no proxy, default user, then one password per attempt.
fn direct_answers(passwords: &[&str]) -> Vec<Answer> {
    let mut answers = vec![
        Answer::Confirm(true),
        Answer::Confirm(false),
        Answer::Text(String::new()),
    ];
    answers.extend(passwords.iter().map(|p| Answer::Secret(p.to_string())));
    answers
}

#[test]
fn first_use_downloads_bundle_and_saves_config() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let operator = ScriptedOperator::new(direct_answers(&["secret"]));
    let connector = FakeConnector::new(
        vec![ConnectScript::Success],
        Some(self_signed_pem().into_bytes()),
    );
    let settings = Settings::default();

    let verification = TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap();

    assert_eq!(verification, Verification::Bundle(store.bundle_path(HOST)));
    assert_eq!(
        TrustStore::validate(&store.bundle_path(HOST)),
        BundleStatus::Valid
    );
    let saved = store.load(HOST).connection;
    assert_eq!(saved.server_user_id.as_deref(), Some("root"));
    assert_eq!(saved.server_hostname.as_deref(), Some("console.example.com"));
    assert_eq!(connector.log.passwords.borrow().as_slice(), ["secret"]);
    assert_eq!(connector.log.closes.get(), 1);
    assert!(operator.said("No CA certificate bundle found for 10.0.0.1"));
    assert!(!store.bundle_path(HOST).with_extension("crt.part").exists());
}

#[test]
fn valid_bundle_needs_no_interaction() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    store.write_bundle(HOST, self_signed_pem().as_bytes()).unwrap();
    let operator = ScriptedOperator::default();
    let connector = FakeConnector::new(vec![], None);
    let settings = Settings::default();

    let verification = TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap();

    assert_eq!(verification, Verification::Bundle(store.bundle_path(HOST)));
    assert!(operator.prompts.borrow().is_empty());
    assert!(connector.log.passwords.borrow().is_empty());
}

#[test]
fn invalid_bundle_wipes_all_host_state_before_acquiring() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    store
        .save(
            &TrustRecord {
                bundle: Some(b"not a certificate".to_vec()),
                connection: ConnectionConfig {
                    socks_proxy_host: Some("old-proxy".to_string()),
                    server_user_id: Some("admin".to_string()),
                    ..Default::default()
                },
            },
            HOST,
        )
        .unwrap();
    let operator = ScriptedOperator::new(direct_answers(&["pw"]));
    let connector = FakeConnector::new(
        vec![ConnectScript::Failure("connection refused".to_string())],
        None,
    );
    let settings = Settings::default();

    let err = TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap_err();

    assert!(matches!(err, Error::ServerConnection(_)));
    assert!(!store.bundle_path(HOST).exists());
    assert!(!store.config_path(HOST).exists());
    // The stale proxy was not offered to the connection attempt either.
    assert_eq!(
        connector.log.configs.borrow()[0].socks_proxy_host,
        None
    );
    assert!(operator.said("Removing invalid certificate bundle"));
    assert!(!operator.said("No CA certificate bundle found"));
}

#[test]
fn declined_download_is_distinct_and_does_not_connect() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let operator = ScriptedOperator::new(vec![Answer::Confirm(false)]);
    let connector = FakeConnector::new(vec![ConnectScript::Success], None);
    let settings = Settings::default();

    let err = TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap_err();

    assert!(err.is_declined());
    assert!(connector.log.passwords.borrow().is_empty());
}

#[test]
fn authentication_failures_re_prompt_for_password() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let operator = ScriptedOperator::new(direct_answers(&["wrong", "still-wrong", "right"]));
    let connector = FakeConnector::new(
        vec![
            ConnectScript::AuthFailure,
            ConnectScript::AuthFailure,
            ConnectScript::Success,
        ],
        Some(self_signed_pem().into_bytes()),
    );
    let settings = Settings::default();

    TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap();

    assert_eq!(
        connector.log.passwords.borrow().as_slice(),
        ["wrong", "still-wrong", "right"]
    );
    let failures = operator
        .lines
        .borrow()
        .iter()
        .filter(|line| line.starts_with("Authentication failed"))
        .count();
    assert_eq!(failures, 2);
}

#[test]
fn hostname_lookup_failure_is_not_fatal() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let operator = ScriptedOperator::new(direct_answers(&["pw"]));
    let connector = FakeConnector::new(
        vec![ConnectScript::Success],
        Some(self_signed_pem().into_bytes()),
    )
    .without_hostname();
    let settings = Settings::default();

    TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap();

    assert_eq!(store.load(HOST).connection.server_hostname, None);
    assert!(operator.said("Unable to retrieve hostname for 10.0.0.1"));
    assert_eq!(
        TrustStore::validate(&store.bundle_path(HOST)),
        BundleStatus::Valid
    );
}

#[test]
fn session_is_closed_when_transfer_fails() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let operator = ScriptedOperator::new(direct_answers(&["pw"]));
    let connector = FakeConnector::new(vec![ConnectScript::Success], None);
    let settings = Settings::default();

    let err = TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap_err();

    assert!(matches!(err, Error::ServerConnection(_)));
    assert_eq!(connector.log.closes.get(), 1);
    assert!(!store.bundle_path(HOST).exists());
    assert!(!store.bundle_path(HOST).with_extension("crt.part").exists());
}

#[test]
fn proxy_answers_are_collected_and_port_re_prompted() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let operator = ScriptedOperator::new(vec![
        Answer::Confirm(true),
        Answer::Confirm(true),
        Answer::Choice(0),
        Answer::Text("proxy.local".to_string()),
        Answer::Text("99999".to_string()),
        Answer::Text("1081".to_string()),
        Answer::Text("admin".to_string()),
        Answer::Secret("pw".to_string()),
    ]);
    let connector = FakeConnector::new(
        vec![ConnectScript::Success],
        Some(self_signed_pem().into_bytes()),
    );
    let settings = Settings::default();

    TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap();

    let saved = store.load(HOST).connection;
    assert_eq!(saved.socks_proxy_protocol_version, Some(SocksVersion::V4));
    assert_eq!(saved.socks_proxy_host.as_deref(), Some("proxy.local"));
    assert_eq!(saved.socks_proxy_port, Some(1081));
    assert_eq!(saved.server_user_id.as_deref(), Some("admin"));
    assert!(operator.said("99999 is not in the range 1 to 65535"));
    assert_eq!(operator.remaining_answers(), 0);
}

#[test]
fn security_opt_out_skips_everything() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);
    let operator = ScriptedOperator::default();
    let connector = FakeConnector::new(vec![], None);
    let settings = Settings {
        disable_security: true,
        ..Default::default()
    };

    let verification = TrustBootstrap::new(&store, &operator, &connector, &settings)
        .ensure(HOST)
        .unwrap();

    assert_eq!(verification, Verification::Disabled);
    assert!(operator.prompts.borrow().is_empty());
    assert!(!store.paths().root().exists());
}

#[test]
fn availability_check_never_prompts() {
    let temp = TempDir::new().unwrap();
    let store = store(&temp);

    let err = check_bootstrapped(&store, HOST).unwrap_err();
    assert!(err.to_string().starts_with("No certificate bundle found for host 10.0.0.1"));

    store.write_bundle(HOST, b"garbage").unwrap();
    let err = check_bootstrapped(&store, HOST).unwrap_err();
    assert!(err.to_string().starts_with("Invalid certificate bundle found for host 10.0.0.1"));

    store.write_bundle(HOST, self_signed_pem().as_bytes()).unwrap();
    check_bootstrapped(&store, HOST).unwrap();
}
