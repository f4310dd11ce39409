use chanmint::{ConfigError, ExpiryPolicy, IdentityApiConfig, ServiceConfig};
use std::env;
use std::fs;

const CERT: &str = include_str!("../chanmint-token/tests/app_key.pem");

fn base_config() -> ServiceConfig {
    ServiceConfig::builder()
        .app_id("demo-app")
        .app_certificate(CERT)
        .build()
        .unwrap()
}

// Each env test uses its own prefix so tests can run in parallel.
fn clear_env(prefix: &str) {
    for name in [
        "APP_ID",
        "APP_CERTIFICATE",
        "APP_CERTIFICATE_FILE",
        "PORT",
        "CHANNEL_TTL",
        "TOKEN_EXPIRY",
        "IDENTITY_API_URL",
        "IDENTITY_API_TOKEN",
        "IDENTITY_API_TOKEN_FILE",
    ] {
        env::remove_var(format!("{}_{}", prefix, name));
    }
}

#[test]
fn test_builder_defaults() {
    let config = base_config();

    assert_eq!(config.bind_address, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.channel_ttl, 3600);
    assert_eq!(config.channel_prefix, "channel_");
    assert_eq!(config.sweep_interval, 300);
    assert_eq!(config.token_expiry, ExpiryPolicy::Ttl(3600));
    assert_eq!(config.app_token_ttl, 3600);
    assert!(config.identity_api.is_none());
}

#[test]
fn test_config_validation() {
    assert!(base_config().validate().is_ok());

    let mut config = base_config();
    config.app_id = " ".to_string();
    match config.validate() {
        Err(ConfigError::MissingAppId) => {}
        other => panic!("Expected MissingAppId error, got {:?}", other),
    }

    let mut config = base_config();
    config.app_certificate = "not a key".to_string();
    match config.validate() {
        Err(ConfigError::InvalidCertificate(_)) => {}
        other => panic!("Expected InvalidCertificate error, got {:?}", other),
    }

    let mut config = base_config();
    config.channel_ttl = 0;
    match config.validate() {
        Err(ConfigError::InvalidDuration("channel_ttl")) => {}
        other => panic!("Expected InvalidDuration error, got {:?}", other),
    }

    let mut config = base_config();
    config.channel_name_min = 10;
    config.channel_name_max = 5;
    match config.validate() {
        Err(ConfigError::InvalidNameRange { min: 10, max: 5 }) => {}
        other => panic!("Expected InvalidNameRange error, got {:?}", other),
    }

    let mut config = base_config();
    config.identity_api = Some(IdentityApiConfig {
        base_url: "identity.example.com".to_string(),
        bearer_token: None,
        timeout_secs: 10,
    });
    match config.validate() {
        Err(ConfigError::InvalidIdentityApiUrl(_)) => {}
        other => panic!("Expected InvalidIdentityApiUrl error, got {:?}", other),
    }
}

#[test]
fn test_builder_requires_credentials() {
    match ServiceConfig::builder().app_certificate(CERT).build() {
        Err(ConfigError::MissingAppId) => {}
        other => panic!("Expected MissingAppId error, got {:?}", other),
    }
    match ServiceConfig::builder().app_id("demo-app").build() {
        Err(ConfigError::MissingAppCertificate) => {}
        other => panic!("Expected MissingAppCertificate error, got {:?}", other),
    }
}

#[test]
fn test_config_from_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file_path = temp_dir.path().join("config.json");

    let config_json = serde_json::json!({
        "app_id": "json-app",
        "app_certificate": CERT,
        "port": 9443,
        "channel_ttl": 600,
        "token_expiry": "never",
        "identity_api": {
            "base_url": "https://identity.example.com/org/app",
            "bearer_token": "static"
        }
    });
    fs::write(&file_path, config_json.to_string()).unwrap();

    let config = ServiceConfig::from_file(&file_path).unwrap();

    assert_eq!(config.app_id, "json-app");
    assert_eq!(config.port, 9443);
    assert_eq!(config.channel_ttl, 600);
    assert_eq!(config.token_expiry, ExpiryPolicy::Never);
    let identity_api = config.identity_api.unwrap();
    assert_eq!(identity_api.bearer_token.as_deref(), Some("static"));
    assert_eq!(identity_api.timeout_secs, 10);
}

#[test]
fn test_config_from_toml() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file_path = temp_dir.path().join("config.toml");

    let config_toml = format!(
        r#"
app_id = "toml-app"
app_certificate = '''
{}'''
channel_prefix = "room_"
token_expiry = 120
"#,
        CERT
    );
    fs::write(&file_path, config_toml).unwrap();

    let config = ServiceConfig::from_path(&file_path).unwrap();

    assert_eq!(config.app_id, "toml-app");
    assert_eq!(config.channel_prefix, "room_");
    assert_eq!(config.token_expiry, ExpiryPolicy::Ttl(120));
}

#[test]
fn test_invalid_file_is_a_parse_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let file_path = temp_dir.path().join("broken.json");
    fs::write(&file_path, "{ not json").unwrap();

    match ServiceConfig::from_file(&file_path) {
        Err(ConfigError::ParseError(_)) => {}
        other => panic!("Expected ParseError, got {:?}", other),
    }

    match ServiceConfig::from_file(temp_dir.path().join("missing.json")) {
        Err(ConfigError::IOError(_)) => {}
        other => panic!("Expected IOError, got {:?}", other),
    }
}

#[test]
fn test_config_from_env() {
    let prefix = "CHANMINT_TEST_ENV";
    clear_env(prefix);

    env::set_var(format!("{}_APP_ID", prefix), "env-app");
    env::set_var(format!("{}_APP_CERTIFICATE", prefix), CERT);
    env::set_var(format!("{}_PORT", prefix), "7070");
    env::set_var(format!("{}_TOKEN_EXPIRY", prefix), "never");
    env::set_var(format!("{}_IDENTITY_API_URL", prefix), "http://localhost:9999");

    let config = ServiceConfig::from_env(prefix).unwrap();

    assert_eq!(config.app_id, "env-app");
    assert_eq!(config.port, 7070);
    assert_eq!(config.token_expiry, ExpiryPolicy::Never);
    let identity_api = config.identity_api.unwrap();
    assert_eq!(identity_api.base_url, "http://localhost:9999");
    assert!(identity_api.bearer_token.is_none());

    clear_env(prefix);
}

#[test]
fn test_config_from_env_rejects_bad_values() {
    let prefix = "CHANMINT_TEST_BAD_ENV";
    clear_env(prefix);

    match ServiceConfig::from_env(prefix) {
        Err(ConfigError::MissingAppId) => {}
        other => panic!("Expected MissingAppId error, got {:?}", other),
    }

    env::set_var(format!("{}_APP_ID", prefix), "env-app");
    env::set_var(format!("{}_APP_CERTIFICATE", prefix), CERT);
    env::set_var(format!("{}_PORT", prefix), "not-a-port");
    match ServiceConfig::from_env(prefix) {
        Err(ConfigError::InvalidPort) => {}
        other => panic!("Expected InvalidPort error, got {:?}", other),
    }

    env::remove_var(format!("{}_PORT", prefix));
    env::set_var(format!("{}_CHANNEL_TTL", prefix), "-1");
    match ServiceConfig::from_env(prefix) {
        Err(ConfigError::InvalidDuration("channel_ttl")) => {}
        other => panic!("Expected InvalidDuration error, got {:?}", other),
    }

    clear_env(prefix);
}

#[test]
fn test_config_from_env_or_file() {
    let prefix = "CHANMINT_TEST_FILE_ENV";
    clear_env(prefix);

    let temp_dir = tempfile::tempdir().unwrap();
    let cert_path = temp_dir.path().join("app_key.pem");
    let token_path = temp_dir.path().join("identity_token");
    fs::write(&cert_path, CERT).unwrap();
    fs::write(&token_path, "file-token\n").unwrap();

    env::set_var(format!("{}_APP_ID", prefix), "file-app");
    env::set_var(format!("{}_APP_CERTIFICATE_FILE", prefix), &cert_path);
    env::set_var(format!("{}_IDENTITY_API_URL", prefix), "https://identity.example.com");
    env::set_var(format!("{}_IDENTITY_API_TOKEN_FILE", prefix), &token_path);

    let config = ServiceConfig::from_env_or_file(prefix).unwrap();

    assert_eq!(config.app_id, "file-app");
    assert!(config.app_certificate.contains("PRIVATE KEY"));
    assert_eq!(
        config.identity_api.unwrap().bearer_token.as_deref(),
        Some("file-token")
    );

    // Plain from_env ignores the *_FILE variables
    match ServiceConfig::from_env(prefix) {
        Err(ConfigError::MissingAppCertificate) => {}
        other => panic!("Expected MissingAppCertificate error, got {:?}", other),
    }

    clear_env(prefix);
}

#[test]
fn test_to_builder_round_trip() {
    let config = base_config()
        .to_builder()
        .port(9999)
        .token_expiry(ExpiryPolicy::Never)
        .build()
        .unwrap();

    assert_eq!(config.app_id, "demo-app");
    assert_eq!(config.port, 9999);
    assert_eq!(config.token_expiry, ExpiryPolicy::Never);
}
