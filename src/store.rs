//! Row-level store seam shared by the SQLite and hosted REST backends.
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{BackendKind, Config};
use crate::model::{
    BudgetAllocation, Campaign, CampaignKol, CampaignReport, CampaignSnapshot, CampaignUpdate,
    Content, KolProfile, Payment, ReportFile, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Campaigns,
    BudgetAllocations,
    Kols,
    CampaignKols,
    Contents,
    Payments,
    CampaignUpdates,
    ReportFiles,
    Reports,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Campaigns => "campaigns",
            Table::BudgetAllocations => "campaign_budget_allocations",
            Table::Kols => "kols",
            Table::CampaignKols => "campaign_kols",
            Table::Contents => "contents",
            Table::Payments => "payments",
            Table::CampaignUpdates => "campaign_updates",
            Table::ReportFiles => "campaign_report_files",
            Table::Reports => "campaign_reports",
        }
    }

    /// Column identifying a row. Reports are one per campaign.
    pub fn key_column(&self) -> &'static str {
        match self {
            Table::Reports => "campaign_id",
            _ => "id",
        }
    }
}

/// One typed row headed for a table.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Campaign(Campaign),
    BudgetAllocation(BudgetAllocation),
    KolProfile(KolProfile),
    CampaignKol(CampaignKol),
    Content(Content),
    Payment(Payment),
    Update(CampaignUpdate),
    ReportFile(ReportFile),
    Report(CampaignReport),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Record::Campaign(_) => Table::Campaigns,
            Record::BudgetAllocation(_) => Table::BudgetAllocations,
            Record::KolProfile(_) => Table::Kols,
            Record::CampaignKol(_) => Table::CampaignKols,
            Record::Content(_) => Table::Contents,
            Record::Payment(_) => Table::Payments,
            Record::Update(_) => Table::CampaignUpdates,
            Record::ReportFile(_) => Table::ReportFiles,
            Record::Report(_) => Table::Reports,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Record::Campaign(v) => &v.id,
            Record::BudgetAllocation(v) => &v.id,
            Record::KolProfile(v) => &v.id,
            Record::CampaignKol(v) => &v.id,
            Record::Content(v) => &v.id,
            Record::Payment(v) => &v.id,
            Record::Update(v) => &v.id,
            Record::ReportFile(v) => &v.id,
            Record::Report(v) => &v.campaign_id,
        }
    }
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Fetch a campaign and every list hanging off it.
    async fn load_campaign(&self, campaign_id: &str) -> Result<CampaignSnapshot>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Master KOLs not yet associated with the campaign.
    async fn list_available_kols(&self, campaign_id: &str) -> Result<Vec<KolProfile>>;

    async fn insert(&self, record: &Record) -> Result<()>;

    /// Overwrite the row with the same key. Reports are upserted.
    async fn update(&self, record: &Record) -> Result<()>;

    async fn delete(&self, table: Table, key: &str) -> Result<()>;

    /// Store a report attachment and return its URL.
    async fn upload_file(&self, campaign_id: &str, file_name: &str, bytes: Vec<u8>) -> Result<String>;

    async fn remove_file(&self, file_url: &str) -> Result<()>;
}

/// Open the backend selected in the configuration.
pub async fn connect(cfg: &Config) -> Result<Arc<dyn CampaignStore>> {
    match cfg.backend.kind {
        BackendKind::Sqlite => {
            let pool = crate::db::init_pool(&cfg.database_url()).await?;
            crate::db::run_migrations(&pool).await?;
            let files_dir = std::path::Path::new(&cfg.app.data_dir).join("files");
            Ok(Arc::new(crate::db::SqliteStore::new(pool, files_dir)))
        }
        BackendKind::Rest => Ok(Arc::new(crate::rest::RestStore::from_config(cfg)?)),
    }
}
