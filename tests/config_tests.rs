//! Config Tests: environment and .env loading
//!
//! Environment variables are process-global, so every test holds ENV_LOCK.

use once_cell::sync::Lazy;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;
use wallet_session::config::{CONNECT_TIMEOUT_ENV, PROJECT_ID_ENV, PROJECT_ID_ENV_PUBLIC};
use wallet_session::{load_env_file, ConfigError, SessionConfig};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    let guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    for key in [PROJECT_ID_ENV, PROJECT_ID_ENV_PUBLIC, CONNECT_TIMEOUT_ENV] {
        std::env::remove_var(key);
    }
    guard
}

#[test]
fn missing_project_id_is_fatal() {
    let _guard = lock_env();
    assert_eq!(SessionConfig::from_env().unwrap_err(), ConfigError::MissingProjectId);

    std::env::set_var(PROJECT_ID_ENV, "   ");
    assert_eq!(SessionConfig::from_env().unwrap_err(), ConfigError::MissingProjectId);
}

#[test]
fn project_id_from_either_variable() {
    let _guard = lock_env();
    std::env::set_var(PROJECT_ID_ENV_PUBLIC, "public-id");
    assert_eq!(SessionConfig::from_env().unwrap().provider.project_id, "public-id");

    std::env::set_var(PROJECT_ID_ENV, "primary-id");
    assert_eq!(SessionConfig::from_env().unwrap().provider.project_id, "primary-id");
}

#[test]
fn connect_timeout_from_env() {
    let _guard = lock_env();
    std::env::set_var(PROJECT_ID_ENV, "pid");

    std::env::set_var(CONNECT_TIMEOUT_ENV, "30");
    assert_eq!(SessionConfig::from_env().unwrap().connect_timeout, Some(Duration::from_secs(30)));

    std::env::set_var(CONNECT_TIMEOUT_ENV, "0");
    assert_eq!(SessionConfig::from_env().unwrap().connect_timeout, None);

    std::env::set_var(CONNECT_TIMEOUT_ENV, "soon");
    assert!(matches!(SessionConfig::from_env(), Err(ConfigError::InvalidValue { .. })));
}

#[test]
fn env_file_does_not_override_existing_vars() {
    let _guard = lock_env();
    std::env::set_var(CONNECT_TIMEOUT_ENV, "5");

    let mut file = NamedTempFile::new().expect("tempfile");
    writeln!(file, "# wallet settings").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "export {}=\"from-file\"", PROJECT_ID_ENV).unwrap();
    writeln!(file, "{}=99", CONNECT_TIMEOUT_ENV).unwrap();
    writeln!(file, "NOT_A_PAIR").unwrap();

    let applied = load_env_file(file.path()).expect("load");
    assert_eq!(applied, 1);

    let config = SessionConfig::from_env().unwrap();
    assert_eq!(config.provider.project_id, "from-file");
    assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
}

#[test]
fn missing_env_file_errors() {
    let _guard = lock_env();
    let dir = tempfile::TempDir::new().expect("tempdir");
    let err = load_env_file(dir.path().join("absent.env")).unwrap_err();
    assert!(matches!(err, ConfigError::EnvFile(_)));
}
