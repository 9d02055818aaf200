use spaceduck_domain::config::Config;

#[test]
fn default_host_is_loopback() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn default_port_is_7337() {
    let config = Config::default();
    assert_eq!(config.server.port, 7337);
}

#[test]
fn defaults_round_trip_through_json5() {
    let config = Config::default();
    let json = serde_json::to_string_pretty(&config).unwrap();
    let reparsed: Config = json5::from_str(&json).unwrap();
    assert_eq!(reparsed.server.port, config.server.port);
    assert_eq!(reparsed.ai.model, config.ai.model);
}

#[test]
fn partial_json5_document_fills_defaults() {
    let text = r#"{
        // trailing comments and commas are fine
        server: { port: 9000 },
    }"#;
    let config: Config = json5::from_str(text).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.ai.model, "claude-sonnet-4-5");
}

#[test]
fn default_config_validates_clean() {
    let config = Config::default();
    let issues = config.validate();
    assert!(
        issues
            .iter()
            .all(|i| i.severity != spaceduck_domain::config::ConfigSeverity::Error),
        "default config should have no validation errors: {issues:?}"
    );
}
