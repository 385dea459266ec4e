// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pettyledger::application::{LedgerService, NewPettyCash};
use pettyledger::config::AppConfig;
use pettyledger::domain::{PettyCash, Upload};
use pettyledger::storage::{BlobStore, LocalBlobStore, Repository, StoreOptions};
use tempfile::TempDir;

/// Configuration rooted in a temporary directory
pub fn test_config(temp_dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.path = temp_dir.path().join("test.db").to_string_lossy().into_owned();
    config.blob.root = temp_dir.path().join("uploads");
    config
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = LedgerService::init(&test_config(&temp_dir)).await?;
    Ok((service, temp_dir))
}

/// Helper to create a service over a custom blob store. The repository
/// handle is returned so tests can inspect or tamper with stored rows.
pub async fn test_service_with_blobs(
    blobs: Arc<dyn BlobStore>,
) -> Result<(LedgerService, Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);
    let repo = Repository::init(&config.database.url(), &StoreOptions::default()).await?;
    let service = LedgerService::new(repo.clone(), blobs);
    Ok((service, repo, temp_dir))
}

/// Helper for tests that need raw repository access with local blobs
pub async fn test_service_with_repo() -> Result<(LedgerService, Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);
    let repo = Repository::init(&config.database.url(), &StoreOptions::default()).await?;
    let blobs = Arc::new(LocalBlobStore::new(config.blob.root.clone()));
    let service = LedgerService::new(repo.clone(), blobs);
    Ok((service, repo, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Record a plain movement without attachments
pub async fn record(
    service: &LedgerService,
    office: &str,
    title: &str,
    date: &str,
    received: &str,
    spent: &str,
) -> Result<PettyCash> {
    let entry = service
        .record_petty_cash(NewPettyCash::new(
            office,
            title,
            parse_date(date),
            received,
            spent,
        ))
        .await?;
    Ok(entry)
}

/// (opening, closing) pairs of an office chain in order
pub async fn balances(service: &LedgerService, office: &str) -> Result<Vec<(i64, i64)>> {
    Ok(service
        .list_petty_cash(office)
        .await?
        .iter()
        .map(|e| (e.opening_balance, e.closing_balance))
        .collect())
}

/// Blob store whose every call fails
pub struct FailingBlobStore;

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn upload(&self, _folder: &str, _upload: &Upload) -> Result<String> {
        bail!("blob store unavailable")
    }

    async fn delete(&self, _reference: &str) -> Result<()> {
        bail!("blob store unavailable")
    }
}
