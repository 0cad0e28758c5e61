use std::{env, fs, time::Duration};

use octofhir_launch_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("octofhir-launch.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8600

[client]
client_id = "my-smart-app"
redirect_uri = "http://localhost:8600/"
scope = "launch openid fhirUser user/Patient.read"
discovery_timeout = "5s"

[session]
cookie_name = "launch_sid"
secure_cookies = true
ttl = "30m"

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8600);
    assert_eq!(cfg.client.client_id, "my-smart-app");
    assert_eq!(cfg.client.redirect_uri, "http://localhost:8600/");
    assert_eq!(cfg.client.discovery_timeout, Duration::from_secs(5));
    assert_eq!(cfg.session.cookie_name, "launch_sid");
    assert!(cfg.session.secure_cookies);
    assert_eq!(cfg.session.ttl, Duration::from_secs(30 * 60));
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("OCTOFHIR_LAUNCH__SERVER__PORT", "9090");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.server.port, 9090);
    unsafe {
        env::remove_var("OCTOFHIR_LAUNCH__SERVER__PORT");
    }

    // 3) A scope without `launch` cannot drive an EHR launch
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[client]
scope = "openid fhirUser"
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("launch"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert_eq!(cfg.client.client_id, "11c867a3-5c5a-4857-9835-ca22859e7882");
    assert_eq!(cfg.client.discovery_timeout, Duration::from_secs(10));
}
