//! # Configuration Tests
//!
//! Loading `AppConfig` from a YAML file layered with environment variables.
//! Environment variables are process-global, so every test here runs serially.

use anyhow::Result;
use medreturn_server::config::{get_config, substitute_env, ConfigError, DEV_JWT_SECRET};
use serial_test::serial;
use std::{env, fs};
use tempfile::{tempdir, TempDir};

/// A helper function to clear all environment variables `get_config` reads.
fn clear_env_vars() {
    for var in [
        "PORT",
        "DB_URL",
        "JWT_SECRET_KEY",
        "MEDRETURN_PORT",
        "MEDRETURN_DB_URL",
        "MEDRETURN_JWT__SECRET",
        "MEDRETURN_CHATBOT__API_URL",
        "MEDRETURN_CHATBOT__TIMEOUT_SECS",
        "MEDRETURN_TEST_DB_DIR",
    ] {
        env::remove_var(var);
    }
}

fn write_yaml(content: &str) -> Result<(TempDir, String)> {
    let dir = tempdir()?;
    let path = dir.path().join("config.yml");
    fs::write(&path, content)?;
    Ok((dir, path.to_string_lossy().into_owned()))
}

#[test]
#[serial]
fn test_minimal_file_falls_back_to_defaults() -> Result<()> {
    // --- 1. Arrange ---
    clear_env_vars();
    let (_dir, path) = write_yaml("jwt:\n  secret: \"file-secret\"\n")?;

    // --- 2. Act ---
    let config = get_config(Some(&path))?;

    // --- 3. Assert ---
    assert_eq!(config.port, 9090);
    assert_eq!(config.db_url, "db/medreturn.db");
    assert_eq!(config.max_connections, 10);
    assert_eq!(config.jwt.secret, "file-secret");
    assert_eq!(config.jwt.access_ttl_minutes, 30);
    assert_eq!(config.jwt.refresh_ttl_days, 30);
    assert_eq!(config.session.ttl_hours, 24);
    assert_eq!(config.chatbot.timeout_secs, 30);
    assert_eq!(config.chatbot.history_limit, 10);
    Ok(())
}

#[test]
#[serial]
fn test_placeholders_are_expanded_from_env() -> Result<()> {
    // --- 1. Arrange ---
    clear_env_vars();
    env::set_var("MEDRETURN_TEST_DB_DIR", "/var/lib/medreturn");
    let (_dir, path) = write_yaml(
        r#"
db_url: "${MEDRETURN_TEST_DB_DIR}/app.db"
chatbot:
  api_url: "http://bot.internal:8001"
"#,
    )?;

    // --- 2. Act ---
    let config = get_config(Some(&path))?;

    // --- 3. Assert ---
    assert_eq!(config.db_url, "/var/lib/medreturn/app.db");
    assert_eq!(config.chatbot.api_url, "http://bot.internal:8001");

    clear_env_vars();
    Ok(())
}

#[test]
#[serial]
fn test_prefixed_env_overrides_nested_keys() -> Result<()> {
    // --- 1. Arrange ---
    clear_env_vars();
    env::set_var("PORT", "7070");
    env::set_var("MEDRETURN_CHATBOT__API_URL", "http://override:9000");
    env::set_var("MEDRETURN_CHATBOT__TIMEOUT_SECS", "5");
    let (_dir, path) = write_yaml(
        r#"
port: 8080
chatbot:
  api_url: "http://from-file:8001"
"#,
    )?;

    // --- 2. Act ---
    let config = get_config(Some(&path))?;

    // --- 3. Assert ---
    assert_eq!(config.port, 7070, "plain PORT beats the file");
    assert_eq!(config.chatbot.api_url, "http://override:9000");
    assert_eq!(config.chatbot.timeout_secs, 5);

    clear_env_vars();
    Ok(())
}

#[test]
#[serial]
fn test_jwt_secret_falls_back_to_env_then_dev_secret() -> Result<()> {
    // --- 1. Arrange ---
    clear_env_vars();
    let (_dir, path) = write_yaml("port: 9091\n")?;

    // --- 2. Act & Assert ---
    let config = get_config(Some(&path))?;
    assert_eq!(config.jwt.secret, DEV_JWT_SECRET);

    env::set_var("JWT_SECRET_KEY", "from-env");
    let config = get_config(Some(&path))?;
    assert_eq!(config.jwt.secret, "from-env");

    clear_env_vars();
    Ok(())
}

#[test]
#[serial]
fn test_explicit_missing_path_is_not_found() {
    clear_env_vars();
    let result = get_config(Some("/definitely/not/here/config.yml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
#[serial]
fn test_unset_placeholder_becomes_empty() -> Result<()> {
    clear_env_vars();
    let expanded = substitute_env("url: \"${MEDRETURN_TEST_DB_DIR}/x\"")?;
    assert_eq!(expanded, "url: \"/x\"");
    Ok(())
}
