//! SQLite backend.
//!
//! - `model`: row decoding helpers.
//! - `repo`: SQL-only functions, one per table operation.
//!
//! [`SqliteStore`] wraps both behind [`CampaignStore`]; attachments are
//! plain files under `files_dir/<campaign_id>/`.

pub mod model;
pub mod repo;

pub use repo::*;

use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::model::{CampaignSnapshot, KolProfile, User};
use crate::store::{CampaignStore, Record, Table};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
    files_dir: PathBuf,
}

impl SqliteStore {
    pub fn new(pool: Pool, files_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            files_dir: files_dir.into(),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn ensure_affected(affected: u64, table: Table, key: &str) -> Result<()> {
    if affected == 0 {
        return Err(anyhow!("{} row {} not found", table.as_str(), key));
    }
    Ok(())
}

/// Strip path separators so a file name cannot escape its campaign folder.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "file".to_string(),
        rest => rest.to_string(),
    }
}

#[async_trait]
impl CampaignStore for SqliteStore {
    async fn load_campaign(&self, campaign_id: &str) -> Result<CampaignSnapshot> {
        repo::fetch_snapshot(&self.pool, campaign_id).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        repo::list_users(&self.pool).await
    }

    async fn list_available_kols(&self, campaign_id: &str) -> Result<Vec<KolProfile>> {
        repo::list_available_kols(&self.pool, campaign_id).await
    }

    #[instrument(skip_all, fields(table = record.table().as_str()))]
    async fn insert(&self, record: &Record) -> Result<()> {
        match record {
            Record::Campaign(v) => repo::insert_campaign(&self.pool, v).await,
            Record::BudgetAllocation(v) => repo::insert_budget_allocation(&self.pool, v).await,
            Record::KolProfile(v) => repo::insert_kol_profile(&self.pool, v).await,
            Record::CampaignKol(v) => repo::insert_campaign_kol(&self.pool, v).await,
            Record::Content(v) => repo::insert_content(&self.pool, v).await,
            Record::Payment(v) => repo::insert_payment(&self.pool, v).await,
            Record::Update(v) => repo::insert_update(&self.pool, v).await,
            Record::ReportFile(v) => repo::insert_report_file(&self.pool, v).await,
            Record::Report(v) => repo::upsert_report(&self.pool, v).await,
        }
    }

    #[instrument(skip_all, fields(table = record.table().as_str()))]
    async fn update(&self, record: &Record) -> Result<()> {
        let affected = match record {
            Record::Campaign(v) => repo::update_campaign(&self.pool, v).await?,
            Record::BudgetAllocation(v) => repo::update_budget_allocation(&self.pool, v).await?,
            Record::KolProfile(v) => repo::update_kol_profile(&self.pool, v).await?,
            Record::CampaignKol(v) => repo::update_campaign_kol(&self.pool, v).await?,
            Record::Content(v) => repo::update_content(&self.pool, v).await?,
            Record::Payment(v) => repo::update_payment(&self.pool, v).await?,
            Record::Update(v) => repo::update_update(&self.pool, v).await?,
            Record::ReportFile(v) => repo::update_report_file(&self.pool, v).await?,
            Record::Report(v) => {
                repo::upsert_report(&self.pool, v).await?;
                1
            }
        };
        ensure_affected(affected, record.table(), record.key())
    }

    #[instrument(skip_all, fields(table = table.as_str()))]
    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        let affected = repo::delete_row(&self.pool, table, key).await?;
        ensure_affected(affected, table, key)
    }

    #[instrument(skip_all)]
    async fn upload_file(&self, campaign_id: &str, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let dir = self.files_dir.join(sanitize_file_name(campaign_id));
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))?;
        let path = dir.join(sanitize_file_name(file_name));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!(path = %path.display(), size = bytes.len(), "stored attachment");
        Ok(format!("file://{}", path.display()))
    }

    #[instrument(skip_all)]
    async fn remove_file(&self, file_url: &str) -> Result<()> {
        let path = Path::new(file_url.strip_prefix("file://").unwrap_or(file_url));
        let escapes = path.components().any(|c| c == Component::ParentDir);
        if escapes || !path.starts_with(&self.files_dir) {
            return Err(anyhow!("{} is outside the attachment directory", file_url));
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}
