//! Integration tests for the on-disk credential lifecycle.
//!
//! Covers construction from optional parts, persistence across store
//! instances, and the unreadable state reached when the key changes.

use std::fs;

use runcoach_core::{
    ClientCredentials, CoachError, ConfigError, CredentialStore, Credentials, EnvConfig,
    StoreConfig, StoreError,
};
use tempfile::TempDir;

fn env_with_client() -> EnvConfig {
    EnvConfig::from_lookup(|name| match name {
        "STRAVA_CLIENT_ID" => Some("env-id".to_string()),
        "STRAVA_CLIENT_SECRET" => Some("env-secret".to_string()),
        _ => None,
    })
}

fn open(dir: &TempDir) -> CredentialStore {
    let client = ClientCredentials::new("client-id", "client-secret").unwrap();
    CredentialStore::open(StoreConfig::new(dir.path()), client).unwrap()
}

#[test]
fn test_from_parts_uses_environment_fallback() {
    let temp_dir = TempDir::new().unwrap();
    let store = CredentialStore::from_parts(
        Some(temp_dir.path().to_path_buf()),
        None,
        None,
        &env_with_client(),
    )
    .unwrap();

    assert_eq!(store.config_dir(), temp_dir.path());
    assert!(store.key_path().exists());
}

#[test]
fn test_construction_without_client_fails() {
    let temp_dir = TempDir::new().unwrap();
    let result = CredentialStore::from_parts(
        Some(temp_dir.path().to_path_buf()),
        None,
        None,
        &EnvConfig::default(),
    );

    match result {
        Err(CoachError::Config(ConfigError::MissingClientCredentials { missing })) => {
            assert_eq!(missing, vec!["STRAVA_CLIENT_ID", "STRAVA_CLIENT_SECRET"]);
        }
        other => panic!("Expected missing client credentials, got {:?}", other.map(|_| ())),
    }

    // Nothing should have been written for a rejected construction.
    assert!(!temp_dir.path().join(".key").exists());
}

#[test]
fn test_record_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let creds = Credentials::new("access", "refresh", 1_900_000_000);

    open(&temp_dir).save(&creds).unwrap();

    let reopened = open(&temp_dir);
    assert_eq!(reopened.load().unwrap(), Some(creds));
}

#[test]
fn test_replaced_key_makes_record_unreadable() {
    let temp_dir = TempDir::new().unwrap();
    open(&temp_dir)
        .save(&Credentials::new("access", "refresh", 1_900_000_000))
        .unwrap();

    // Losing the key: a new one is generated on the next open.
    fs::remove_file(temp_dir.path().join(".key")).unwrap();
    let store = open(&temp_dir);

    match store.load() {
        Err(StoreError::Corrupted { .. }) => {}
        other => panic!("Expected StoreError::Corrupted, got {:?}", other),
    }
    assert!(store.needs_refresh().is_err());
}

#[test]
fn test_truncated_key_file_rejected() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join(".key"), b"short").unwrap();

    let client = ClientCredentials::new("id", "secret").unwrap();
    let result = CredentialStore::open(StoreConfig::new(temp_dir.path()), client);

    assert!(matches!(
        result,
        Err(CoachError::Store(StoreError::InvalidKey { .. }))
    ));
}

#[tokio::test]
async fn test_unreadable_store_surfaces_through_get_valid_token() {
    let temp_dir = TempDir::new().unwrap();
    let store = open(&temp_dir);
    fs::write(store.credentials_path(), b"definitely not a valid blob").unwrap();

    let err = store.get_valid_token().await.unwrap_err();
    assert!(err.to_string().contains("unreadable"));
}
