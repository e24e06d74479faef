use super::model::{
    allocation_from_row, campaign_from_row, campaign_kol_from_row, content_from_row, encode_list,
    payment_from_row, profile_from_row, report_file_from_row, report_from_row, update_from_row,
    user_from_row,
};
use crate::model::{
    BudgetAllocation, Campaign, CampaignKol, CampaignReport, CampaignSnapshot, CampaignUpdate,
    Content, KolProfile, Payment, ReportFile, User,
};
use crate::store::Table;
use anyhow::{anyhow, Context, Result};
use sqlx::SqlitePool;
use tracing::instrument;

pub type Pool = SqlitePool;

const CAMPAIGN_KOL_SELECT: &str = "SELECT ck.id, ck.campaign_id, ck.hh_status, ck.allocated_budget, ck.budget_type, \
            ck.paid, ck.wallet, ck.notes, \
            k.id AS k_id, k.name AS k_name, k.region AS k_region, k.platform AS k_platform, \
            k.followers AS k_followers, k.creator_type AS k_creator_type, \
            k.content_type AS k_content_type, k.deliverables AS k_deliverables, k.link AS k_link \
     FROM campaign_kols ck \
     JOIN kols k ON k.id = ck.master_kol_id";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// Expand a leading `~/` in file-backed SQLite URLs, make sure the parent
/// directory exists, and ask SQLite to create the file if missing.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{expanded_path}?{query}")
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn fetch_campaign(pool: &Pool, campaign_id: &str) -> Result<Campaign> {
    let row = sqlx::query("SELECT * FROM campaigns WHERE id = ?")
        .bind(campaign_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Err(anyhow!("campaign {} not found", campaign_id));
    };
    let mut campaign = campaign_from_row(&row)?;
    campaign.budget_allocations = fetch_budget_allocations(pool, campaign_id).await?;
    Ok(campaign)
}

#[instrument(skip_all)]
pub async fn fetch_budget_allocations(pool: &Pool, campaign_id: &str) -> Result<Vec<BudgetAllocation>> {
    let rows = sqlx::query(
        "SELECT id, campaign_id, region, allocated_budget FROM campaign_budget_allocations WHERE campaign_id = ? ORDER BY region ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(allocation_from_row).collect()
}

#[instrument(skip_all)]
pub async fn fetch_campaign_kols(pool: &Pool, campaign_id: &str) -> Result<Vec<CampaignKol>> {
    let sql = format!("{CAMPAIGN_KOL_SELECT} WHERE ck.campaign_id = ? ORDER BY ck.created_at ASC, ck.id ASC");
    let rows = sqlx::query(&sql).bind(campaign_id).fetch_all(pool).await?;
    rows.iter().map(campaign_kol_from_row).collect()
}

#[instrument(skip_all)]
pub async fn fetch_contents(pool: &Pool, campaign_id: &str) -> Result<Vec<Content>> {
    let rows = sqlx::query(
        "SELECT * FROM contents WHERE campaign_id = ? ORDER BY activation_date IS NULL, activation_date ASC, id ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(content_from_row).collect()
}

#[instrument(skip_all)]
pub async fn fetch_payments(pool: &Pool, campaign_id: &str) -> Result<Vec<Payment>> {
    let rows = sqlx::query(
        "SELECT * FROM payments WHERE campaign_id = ? ORDER BY payment_date IS NULL, payment_date DESC, id ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(payment_from_row).collect()
}

#[instrument(skip_all)]
pub async fn fetch_updates(pool: &Pool, campaign_id: &str) -> Result<Vec<CampaignUpdate>> {
    let rows = sqlx::query(
        "SELECT * FROM campaign_updates WHERE campaign_id = ? ORDER BY created_at DESC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(update_from_row).collect()
}

#[instrument(skip_all)]
pub async fn fetch_report_files(pool: &Pool, campaign_id: &str) -> Result<Vec<ReportFile>> {
    let rows = sqlx::query(
        "SELECT * FROM campaign_report_files WHERE campaign_id = ? ORDER BY created_at ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(report_file_from_row).collect()
}

#[instrument(skip_all)]
pub async fn fetch_report(pool: &Pool, campaign_id: &str) -> Result<Option<CampaignReport>> {
    let row = sqlx::query("SELECT * FROM campaign_reports WHERE campaign_id = ?")
        .bind(campaign_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(report_from_row).transpose()
}

#[instrument(skip_all)]
pub async fn fetch_snapshot(pool: &Pool, campaign_id: &str) -> Result<CampaignSnapshot> {
    Ok(CampaignSnapshot {
        campaign: fetch_campaign(pool, campaign_id).await?,
        kols: fetch_campaign_kols(pool, campaign_id).await?,
        contents: fetch_contents(pool, campaign_id).await?,
        payments: fetch_payments(pool, campaign_id).await?,
        updates: fetch_updates(pool, campaign_id).await?,
        report_files: fetch_report_files(pool, campaign_id).await?,
        report: fetch_report(pool, campaign_id).await?,
    })
}

#[instrument(skip_all)]
pub async fn list_users(pool: &Pool) -> Result<Vec<User>> {
    let rows = sqlx::query("SELECT id, name, email FROM users ORDER BY name ASC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(user_from_row).collect()
}

#[instrument(skip_all)]
pub async fn insert_user(pool: &Pool, user: &User) -> Result<()> {
    sqlx::query("INSERT INTO users (id, name, email) VALUES (?, ?, ?)")
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .execute(pool)
        .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn list_available_kols(pool: &Pool, campaign_id: &str) -> Result<Vec<KolProfile>> {
    let rows = sqlx::query(
        "SELECT * FROM kols WHERE id NOT IN (SELECT master_kol_id FROM campaign_kols WHERE campaign_id = ?) ORDER BY name ASC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(|r| profile_from_row(r, "")).collect()
}

#[instrument(skip_all)]
pub async fn insert_campaign(pool: &Pool, c: &Campaign) -> Result<()> {
    sqlx::query(
        "INSERT INTO campaigns (id, name, status, start_date, end_date, client_id, manager_id, region, description, \
         total_budget, total_allocated, budget_type, intro_call, proposal_sent, nda_signed, weekly_updates, \
         share_report_publicly, report_message) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&c.id)
    .bind(&c.name)
    .bind(c.status.map(|s| s.as_str()))
    .bind(c.start_date)
    .bind(c.end_date)
    .bind(&c.client_id)
    .bind(&c.manager_id)
    .bind(&c.region)
    .bind(&c.description)
    .bind(c.total_budget)
    .bind(c.total_allocated)
    .bind(encode_list(&c.budget_type)?)
    .bind(c.flags.intro_call)
    .bind(c.flags.proposal_sent)
    .bind(c.flags.nda_signed)
    .bind(c.flags.weekly_updates)
    .bind(c.share_report_publicly)
    .bind(&c.report_message)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_campaign(pool: &Pool, c: &Campaign) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE campaigns SET name = ?, status = ?, start_date = ?, end_date = ?, client_id = ?, manager_id = ?, \
         region = ?, description = ?, total_budget = ?, total_allocated = ?, budget_type = ?, intro_call = ?, \
         proposal_sent = ?, nda_signed = ?, weekly_updates = ?, share_report_publicly = ?, report_message = ? \
         WHERE id = ?",
    )
    .bind(&c.name)
    .bind(c.status.map(|s| s.as_str()))
    .bind(c.start_date)
    .bind(c.end_date)
    .bind(&c.client_id)
    .bind(&c.manager_id)
    .bind(&c.region)
    .bind(&c.description)
    .bind(c.total_budget)
    .bind(c.total_allocated)
    .bind(encode_list(&c.budget_type)?)
    .bind(c.flags.intro_call)
    .bind(c.flags.proposal_sent)
    .bind(c.flags.nda_signed)
    .bind(c.flags.weekly_updates)
    .bind(c.share_report_publicly)
    .bind(&c.report_message)
    .bind(&c.id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_budget_allocation(pool: &Pool, a: &BudgetAllocation) -> Result<()> {
    sqlx::query(
        "INSERT INTO campaign_budget_allocations (id, campaign_id, region, allocated_budget) VALUES (?, ?, ?, ?)",
    )
    .bind(&a.id)
    .bind(&a.campaign_id)
    .bind(&a.region)
    .bind(a.allocated_budget)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_budget_allocation(pool: &Pool, a: &BudgetAllocation) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE campaign_budget_allocations SET region = ?, allocated_budget = ? WHERE id = ?",
    )
    .bind(&a.region)
    .bind(a.allocated_budget)
    .bind(&a.id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_kol_profile(pool: &Pool, k: &KolProfile) -> Result<()> {
    sqlx::query(
        "INSERT INTO kols (id, name, region, platform, followers, creator_type, content_type, deliverables, link) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&k.id)
    .bind(&k.name)
    .bind(&k.region)
    .bind(encode_list(&k.platform)?)
    .bind(k.followers)
    .bind(encode_list(&k.creator_type)?)
    .bind(encode_list(&k.content_type)?)
    .bind(encode_list(&k.deliverables)?)
    .bind(&k.link)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_kol_profile(pool: &Pool, k: &KolProfile) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE kols SET name = ?, region = ?, platform = ?, followers = ?, creator_type = ?, content_type = ?, \
         deliverables = ?, link = ? WHERE id = ?",
    )
    .bind(&k.name)
    .bind(&k.region)
    .bind(encode_list(&k.platform)?)
    .bind(k.followers)
    .bind(encode_list(&k.creator_type)?)
    .bind(encode_list(&k.content_type)?)
    .bind(encode_list(&k.deliverables)?)
    .bind(&k.link)
    .bind(&k.id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_campaign_kol(pool: &Pool, ck: &CampaignKol) -> Result<()> {
    sqlx::query(
        "INSERT INTO campaign_kols (id, campaign_id, master_kol_id, hh_status, allocated_budget, budget_type, paid, wallet, notes) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&ck.id)
    .bind(&ck.campaign_id)
    .bind(&ck.master_kol.id)
    .bind(ck.hh_status.map(|s| s.as_str()))
    .bind(ck.allocated_budget)
    .bind(&ck.budget_type)
    .bind(ck.paid)
    .bind(&ck.wallet)
    .bind(&ck.notes)
    .execute(pool)
    .await
    .context("failed to insert campaign kol")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_campaign_kol(pool: &Pool, ck: &CampaignKol) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE campaign_kols SET hh_status = ?, allocated_budget = ?, budget_type = ?, paid = ?, wallet = ?, notes = ? \
         WHERE id = ?",
    )
    .bind(ck.hh_status.map(|s| s.as_str()))
    .bind(ck.allocated_budget)
    .bind(&ck.budget_type)
    .bind(ck.paid)
    .bind(&ck.wallet)
    .bind(&ck.notes)
    .bind(&ck.id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_content(pool: &Pool, c: &Content) -> Result<()> {
    sqlx::query(
        "INSERT INTO contents (id, campaign_id, campaign_kols_id, activation_date, content_link, platform, type, status, \
         impressions, likes, retweets, comments, bookmarks) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&c.id)
    .bind(&c.campaign_id)
    .bind(&c.campaign_kols_id)
    .bind(c.activation_date)
    .bind(&c.content_link)
    .bind(&c.platform)
    .bind(&c.content_type)
    .bind(c.status.map(|s| s.as_str()))
    .bind(c.impressions)
    .bind(c.likes)
    .bind(c.retweets)
    .bind(c.comments)
    .bind(c.bookmarks)
    .execute(pool)
    .await
    .context("failed to insert content")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_content(pool: &Pool, c: &Content) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE contents SET campaign_kols_id = ?, activation_date = ?, content_link = ?, platform = ?, type = ?, status = ?, \
         impressions = ?, likes = ?, retweets = ?, comments = ?, bookmarks = ? WHERE id = ?",
    )
    .bind(&c.campaign_kols_id)
    .bind(c.activation_date)
    .bind(&c.content_link)
    .bind(&c.platform)
    .bind(&c.content_type)
    .bind(c.status.map(|s| s.as_str()))
    .bind(c.impressions)
    .bind(c.likes)
    .bind(c.retweets)
    .bind(c.comments)
    .bind(c.bookmarks)
    .bind(&c.id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_payment(pool: &Pool, p: &Payment) -> Result<()> {
    sqlx::query(
        "INSERT INTO payments (id, campaign_id, campaign_kol_id, content_id, amount, payment_date, payment_method, \
         transaction_id, notes) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&p.id)
    .bind(&p.campaign_id)
    .bind(&p.campaign_kol_id)
    .bind(&p.content_id)
    .bind(p.amount)
    .bind(p.payment_date)
    .bind(p.payment_method.map(|m| m.as_str()))
    .bind(&p.transaction_id)
    .bind(&p.notes)
    .execute(pool)
    .await
    .context("failed to insert payment")?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_payment(pool: &Pool, p: &Payment) -> Result<u64> {
    let res = sqlx::query(
        "UPDATE payments SET campaign_kol_id = ?, content_id = ?, amount = ?, payment_date = ?, payment_method = ?, \
         transaction_id = ?, notes = ? WHERE id = ?",
    )
    .bind(&p.campaign_kol_id)
    .bind(&p.content_id)
    .bind(p.amount)
    .bind(p.payment_date)
    .bind(p.payment_method.map(|m| m.as_str()))
    .bind(&p.transaction_id)
    .bind(&p.notes)
    .bind(&p.id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_update(pool: &Pool, u: &CampaignUpdate) -> Result<()> {
    sqlx::query(
        "INSERT INTO campaign_updates (id, campaign_id, author, body, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&u.id)
    .bind(&u.campaign_id)
    .bind(&u.author)
    .bind(&u.body)
    .bind(u.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_update(pool: &Pool, u: &CampaignUpdate) -> Result<u64> {
    let res = sqlx::query("UPDATE campaign_updates SET author = ?, body = ? WHERE id = ?")
        .bind(&u.author)
        .bind(&u.body)
        .bind(&u.id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn insert_report_file(pool: &Pool, f: &ReportFile) -> Result<()> {
    sqlx::query(
        "INSERT INTO campaign_report_files (id, campaign_id, file_name, file_url, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&f.id)
    .bind(&f.campaign_id)
    .bind(&f.file_name)
    .bind(&f.file_url)
    .bind(f.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn update_report_file(pool: &Pool, f: &ReportFile) -> Result<u64> {
    let res = sqlx::query("UPDATE campaign_report_files SET file_name = ?, file_url = ? WHERE id = ?")
        .bind(&f.file_name)
        .bind(&f.file_url)
        .bind(&f.id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

#[instrument(skip_all)]
pub async fn upsert_report(pool: &Pool, r: &CampaignReport) -> Result<()> {
    sqlx::query(
        "INSERT INTO campaign_reports (campaign_id, custom_message, is_public) VALUES (?, ?, ?) \
         ON CONFLICT(campaign_id) DO UPDATE SET custom_message = excluded.custom_message, is_public = excluded.is_public",
    )
    .bind(&r.campaign_id)
    .bind(&r.custom_message)
    .bind(r.is_public)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn delete_row(pool: &Pool, table: Table, key: &str) -> Result<u64> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?",
        table.as_str(),
        table.key_column()
    );
    let res = sqlx::query(&sql).bind(key).execute(pool).await?;
    Ok(res.rows_affected())
}
