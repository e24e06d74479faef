//! Row decoding for the SQLite tables.
//!
//! List-valued columns are stored as JSON text; enum columns as their
//! display string. Unknown enum strings decode as `None` rather than
//! failing the whole load.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::model::{
    BudgetAllocation, Campaign, CampaignFlags, CampaignKol, CampaignReport, CampaignStatus,
    CampaignUpdate, Content, ContentStatus, HhStatus, KolProfile, Payment, PaymentMethod,
    ReportFile, User,
};

pub(crate) fn json_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub(crate) fn encode_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values).context("failed to encode list column")
}

pub(crate) fn campaign_from_row(row: &SqliteRow) -> Result<Campaign> {
    Ok(Campaign {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: row
            .try_get::<Option<String>, _>("status")?
            .and_then(|s| CampaignStatus::parse_status(&s)),
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        client_id: row.try_get("client_id")?,
        manager_id: row.try_get("manager_id")?,
        region: row.try_get("region")?,
        description: row.try_get("description")?,
        total_budget: row.try_get("total_budget")?,
        total_allocated: row.try_get("total_allocated")?,
        budget_type: json_list(row.try_get("budget_type")?),
        budget_allocations: Vec::new(),
        flags: CampaignFlags {
            intro_call: row.try_get("intro_call")?,
            proposal_sent: row.try_get("proposal_sent")?,
            nda_signed: row.try_get("nda_signed")?,
            weekly_updates: row.try_get("weekly_updates")?,
        },
        share_report_publicly: row.try_get("share_report_publicly")?,
        report_message: row.try_get("report_message")?,
    })
}

pub(crate) fn allocation_from_row(row: &SqliteRow) -> Result<BudgetAllocation> {
    Ok(BudgetAllocation {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        region: row.try_get("region")?,
        allocated_budget: row.try_get("allocated_budget")?,
    })
}

/// Expects the `kols` columns prefixed with `k_` when joined.
pub(crate) fn profile_from_row(row: &SqliteRow, prefix: &str) -> Result<KolProfile> {
    let col = |name: &str| format!("{prefix}{name}");
    Ok(KolProfile {
        id: row.try_get(col("id").as_str())?,
        name: row.try_get(col("name").as_str())?,
        region: row.try_get(col("region").as_str())?,
        platform: json_list(row.try_get(col("platform").as_str())?),
        followers: row.try_get(col("followers").as_str())?,
        creator_type: json_list(row.try_get(col("creator_type").as_str())?),
        content_type: json_list(row.try_get(col("content_type").as_str())?),
        deliverables: json_list(row.try_get(col("deliverables").as_str())?),
        link: row.try_get(col("link").as_str())?,
    })
}

pub(crate) fn campaign_kol_from_row(row: &SqliteRow) -> Result<CampaignKol> {
    Ok(CampaignKol {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        master_kol: profile_from_row(row, "k_")?,
        hh_status: row
            .try_get::<Option<String>, _>("hh_status")?
            .and_then(|s| HhStatus::parse_status(&s)),
        allocated_budget: row.try_get("allocated_budget")?,
        budget_type: row.try_get("budget_type")?,
        paid: row.try_get("paid")?,
        wallet: row.try_get("wallet")?,
        notes: row.try_get("notes")?,
    })
}

pub(crate) fn content_from_row(row: &SqliteRow) -> Result<Content> {
    Ok(Content {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        campaign_kols_id: row.try_get("campaign_kols_id")?,
        activation_date: row.try_get("activation_date")?,
        content_link: row.try_get("content_link")?,
        platform: row.try_get("platform")?,
        content_type: row.try_get("type")?,
        status: row
            .try_get::<Option<String>, _>("status")?
            .and_then(|s| ContentStatus::parse_status(&s)),
        impressions: row.try_get("impressions")?,
        likes: row.try_get("likes")?,
        retweets: row.try_get("retweets")?,
        comments: row.try_get("comments")?,
        bookmarks: row.try_get("bookmarks")?,
    })
}

pub(crate) fn payment_from_row(row: &SqliteRow) -> Result<Payment> {
    Ok(Payment {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        campaign_kol_id: row.try_get("campaign_kol_id")?,
        content_id: row.try_get("content_id")?,
        amount: row.try_get("amount")?,
        payment_date: row.try_get("payment_date")?,
        payment_method: row
            .try_get::<Option<String>, _>("payment_method")?
            .and_then(|s| PaymentMethod::parse_method(&s)),
        transaction_id: row.try_get("transaction_id")?,
        notes: row.try_get("notes")?,
    })
}

pub(crate) fn update_from_row(row: &SqliteRow) -> Result<CampaignUpdate> {
    Ok(CampaignUpdate {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        author: row.try_get("author")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn report_file_from_row(row: &SqliteRow) -> Result<ReportFile> {
    Ok(ReportFile {
        id: row.try_get("id")?,
        campaign_id: row.try_get("campaign_id")?,
        file_name: row.try_get("file_name")?,
        file_url: row.try_get("file_url")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn report_from_row(row: &SqliteRow) -> Result<CampaignReport> {
    Ok(CampaignReport {
        campaign_id: row.try_get("campaign_id")?,
        custom_message: row.try_get("custom_message")?,
        is_public: row.try_get("is_public")?,
    })
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
    })
}
