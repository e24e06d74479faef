//! Optimistic mutations: apply locally, write remotely, revert on failure.
//!
//! Every row change goes through [`dispatch`], which owns the whole
//! contract including the error toast. Bulk helpers use per-row restores
//! instead of whole-collection undo so that one failed item never rolls
//! back its siblings.
use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{run_bounded, BatchReport, ItemFailure};
use crate::model::{
    CampaignKol, Content, HhStatus, KolProfile, Payment, PaymentMethod, ReportFile,
};
use crate::state::{Action, AppState, KolEdit, PaymentEdit, StateError, ToastLevel};
use crate::store::{CampaignStore, Record, Table};

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Rejected(#[from] StateError),
    #[error("could not save {subject}: {source:#}")]
    Remote {
        subject: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

fn subject(action: &Action) -> &'static str {
    match action {
        Action::SaveCampaign(_) => "campaign",
        Action::AddBudgetAllocation(_)
        | Action::UpdateBudgetAllocation(_)
        | Action::DeleteBudgetAllocation(_) => "budget allocation",
        Action::AddKol(_) | Action::UpdateKol(_) | Action::DeleteKol(_) => "KOL",
        Action::UpdateKolProfile(_) => "KOL profile",
        Action::AddContent(_) | Action::UpdateContent(_) | Action::DeleteContent(_) => "content",
        Action::AddPayment(_) | Action::UpdatePayment(_) | Action::DeletePayment(_) => "payment",
        Action::PostUpdate(_) | Action::DeleteUpdate(_) => "update",
        Action::AddReportFile(_) | Action::DeleteReportFile(_) => "report file",
        Action::SaveReport(_) => "report settings",
    }
}

fn past_tense(action: &Action) -> &'static str {
    match action {
        Action::AddBudgetAllocation(_)
        | Action::AddKol(_)
        | Action::AddContent(_)
        | Action::AddPayment(_)
        | Action::AddReportFile(_) => "added",
        Action::PostUpdate(_) => "posted",
        Action::DeleteBudgetAllocation(_)
        | Action::DeleteKol(_)
        | Action::DeleteContent(_)
        | Action::DeletePayment(_)
        | Action::DeleteUpdate(_)
        | Action::DeleteReportFile(_) => "deleted",
        _ => "saved",
    }
}

/// Mirror an applied action to the store. `state` is already post-apply.
async fn write_remote(state: &AppState, store: &dyn CampaignStore, action: &Action) -> anyhow::Result<()> {
    let campaign = || Record::Campaign(state.campaign.clone());
    match action {
        Action::SaveCampaign(_) => store.update(&campaign()).await,
        Action::AddBudgetAllocation(a) => {
            store.insert(&Record::BudgetAllocation(a.clone())).await?;
            store.update(&campaign()).await
        }
        Action::UpdateBudgetAllocation(a) => {
            store.update(&Record::BudgetAllocation(a.clone())).await?;
            store.update(&campaign()).await
        }
        Action::DeleteBudgetAllocation(id) => {
            store.delete(Table::BudgetAllocations, id).await?;
            store.update(&campaign()).await
        }
        Action::AddKol(kol) => {
            let row = state.kol(&kol.id).cloned().unwrap_or_else(|| kol.clone());
            store.insert(&Record::CampaignKol(row)).await
        }
        Action::UpdateKol(kol) => {
            let row = state.kol(&kol.id).cloned().unwrap_or_else(|| kol.clone());
            store.update(&Record::CampaignKol(row)).await
        }
        Action::UpdateKolProfile(p) => store.update(&Record::KolProfile(p.clone())).await,
        Action::DeleteKol(id) => store.delete(Table::CampaignKols, id).await,
        Action::AddContent(c) => store.insert(&Record::Content(c.clone())).await,
        Action::UpdateContent(c) => store.update(&Record::Content(c.clone())).await,
        Action::DeleteContent(id) => store.delete(Table::Contents, id).await,
        Action::AddPayment(p) => store.insert(&Record::Payment(p.clone())).await,
        Action::UpdatePayment(p) => store.update(&Record::Payment(p.clone())).await,
        Action::DeletePayment(id) => store.delete(Table::Payments, id).await,
        Action::PostUpdate(u) => store.insert(&Record::Update(u.clone())).await,
        Action::DeleteUpdate(id) => store.delete(Table::CampaignUpdates, id).await,
        Action::AddReportFile(f) => store.insert(&Record::ReportFile(f.clone())).await,
        Action::DeleteReportFile(id) => store.delete(Table::ReportFiles, id).await,
        Action::SaveReport(r) => {
            store.update(&Record::Report(r.clone())).await?;
            store.update(&campaign()).await
        }
    }
}

/// Persist re-derived `paid` totals. Failures are surfaced but do not
/// undo the payment change that caused them.
async fn sync_paid(state: &mut AppState, store: &dyn CampaignStore, kol_ids: &[String]) {
    for id in kol_ids {
        let Some(kol) = state.kol(id).cloned() else {
            continue;
        };
        let name = kol.name().to_string();
        if let Err(e) = store.update(&Record::CampaignKol(kol)).await {
            warn!(kol_id = %id, error = %format!("{e:#}"), "failed to persist paid total");
            state.push_toast(ToastLevel::Error, format!("Could not sync paid total for {name}"));
        }
    }
}

/// Apply one row change under the optimistic contract.
pub async fn dispatch(
    state: &mut AppState,
    store: &dyn CampaignStore,
    action: Action,
) -> Result<(), MutationError> {
    let subject = subject(&action);
    let applied = match state.apply(&action) {
        Ok(applied) => applied,
        Err(e) => {
            state.push_toast(ToastLevel::Error, e.to_string());
            return Err(e.into());
        }
    };

    if let Err(source) = write_remote(state, store, &action).await {
        state.revert(applied.undo);
        warn!(subject, error = %format!("{source:#}"), "remote write failed; reverted");
        let err = MutationError::Remote { subject, source };
        state.push_toast(ToastLevel::Error, err.to_string());
        return Err(err);
    }

    sync_paid(state, store, &applied.paid_changed).await;
    state.push_toast(
        ToastLevel::Success,
        format!("{} {}", capitalize(subject), past_tense(&action)),
    );
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Load a campaign into shared state unless a newer load overtakes it.
/// Returns false when the result was discarded as stale.
pub async fn load_campaign(
    state: &Mutex<AppState>,
    store: &dyn CampaignStore,
    campaign_id: &str,
) -> anyhow::Result<bool> {
    let ticket = state.lock().await.begin_load();
    let snapshot = store.load_campaign(campaign_id).await?;
    let users = store.list_users().await?;
    let mut guard = state.lock().await;
    let fresh = guard.finish_load(ticket, snapshot);
    if fresh {
        guard.users = users;
        info!(campaign_id, kols = guard.kols.len(), "campaign loaded");
    }
    Ok(fresh)
}

/// Add content and, when asked, a zero-amount payment linked to it.
pub async fn add_content(
    state: &mut AppState,
    store: &dyn CampaignStore,
    content: Content,
    spawn_payment: bool,
) -> Result<(), MutationError> {
    let payment = spawn_payment.then(|| Payment {
        id: Uuid::new_v4().to_string(),
        campaign_id: content.campaign_id.clone(),
        campaign_kol_id: content.campaign_kols_id.clone(),
        content_id: Some(content.id.clone()),
        amount: Some(0.0),
        ..Default::default()
    });
    dispatch(state, store, Action::AddContent(content)).await?;
    if let Some(payment) = payment {
        dispatch(state, store, Action::AddPayment(payment)).await?;
    }
    Ok(())
}

/// Delete an attachment row and then its stored file.
pub async fn delete_report_file(
    state: &mut AppState,
    store: &dyn CampaignStore,
    file_id: &str,
) -> Result<(), MutationError> {
    let url = state
        .report_files
        .iter()
        .find(|f| f.id == file_id)
        .map(|f| f.file_url.clone());
    dispatch(state, store, Action::DeleteReportFile(file_id.to_string())).await?;
    if let Some(url) = url {
        if let Err(e) = store.remove_file(&url).await {
            warn!(file_url = %url, error = %format!("{e:#}"), "stored file left behind");
        }
    }
    Ok(())
}

/// Upload an attachment and record it. The upload is removed again when
/// the row cannot be written.
pub async fn upload_report_file(
    state: &mut AppState,
    store: &dyn CampaignStore,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<(), MutationError> {
    let campaign_id = state.campaign.id.clone();
    let url = match store.upload_file(&campaign_id, file_name, bytes).await {
        Ok(url) => url,
        Err(source) => {
            let err = MutationError::Remote {
                subject: "report file",
                source,
            };
            state.push_toast(ToastLevel::Error, err.to_string());
            return Err(err);
        }
    };
    let file = ReportFile {
        id: Uuid::new_v4().to_string(),
        campaign_id,
        file_name: file_name.to_string(),
        file_url: url.clone(),
        created_at: Utc::now(),
    };
    let res = dispatch(state, store, Action::AddReportFile(file)).await;
    if res.is_err() {
        if let Err(e) = store.remove_file(&url).await {
            warn!(file_url = %url, error = %format!("{e:#}"), "orphaned upload");
        }
    }
    res
}

fn finish_bulk(state: &mut AppState, report: &BatchReport, verb: &str) {
    let level = if report.is_clean() {
        ToastLevel::Success
    } else {
        ToastLevel::Error
    };
    info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "{verb} finished"
    );
    state.push_toast(level, report.summary(verb));
}

/// Selection order with repeats dropped; the first occurrence wins.
fn unique(ids: &[String]) -> Vec<&String> {
    let mut seen = HashSet::new();
    ids.iter().filter(|id| seen.insert(id.as_str())).collect()
}

fn rejected(id: &str, e: StateError) -> ItemFailure {
    ItemFailure {
        id: id.to_string(),
        error: e.to_string(),
    }
}

/// Attach master profiles to the current campaign as new KOL rows.
pub async fn add_kols(
    state: &mut AppState,
    store: &dyn CampaignStore,
    profiles: Vec<KolProfile>,
    limit: usize,
) -> BatchReport {
    let mut items = Vec::new();
    let mut early = Vec::new();
    for profile in profiles {
        let row = CampaignKol {
            id: Uuid::new_v4().to_string(),
            campaign_id: state.campaign.id.clone(),
            master_kol: profile,
            hh_status: Some(HhStatus::Curated),
            ..Default::default()
        };
        match state.apply(&Action::AddKol(row.clone())) {
            Ok(_) => items.push((row.id.clone(), Record::CampaignKol(row))),
            Err(e) => early.push(rejected(&row.id, e)),
        }
    }

    let mut report = run_bounded(items, limit, |record: Record| async move {
        store.insert(&record).await
    })
    .await;
    for failure in &report.failed {
        state.kols.retain(|k| k.id != failure.id);
    }
    report.failed.extend(early);
    finish_bulk(state, &report, "Added");
    report
}

/// Set `hh_status` on several KOLs at once.
pub async fn bulk_update_status(
    state: &mut AppState,
    store: &dyn CampaignStore,
    kol_ids: &[String],
    status: Option<HhStatus>,
    limit: usize,
) -> BatchReport {
    let mut previous = Vec::new();
    let mut items = Vec::new();
    let mut early = Vec::new();
    for id in unique(kol_ids) {
        let prior = state.kol(id).cloned();
        let applied = state
            .kol_edit(id, KolEdit::Status(status))
            .and_then(|action| state.apply(&action));
        match (applied, prior) {
            (Ok(_), Some(prior)) => {
                if let Some(row) = state.kol(id).cloned() {
                    items.push((id.clone(), Record::CampaignKol(row)));
                }
                previous.push(prior);
            }
            (Err(e), _) => early.push(rejected(id, e)),
            (Ok(_), None) => {}
        }
    }

    let mut report = run_bounded(items, limit, |record: Record| async move {
        store.update(&record).await
    })
    .await;
    for prior in previous {
        if report.failed.iter().any(|f| f.id == prior.id) {
            state.restore_kol(prior);
        }
    }
    report.failed.extend(early);
    finish_bulk(state, &report, "Updated");
    report
}

/// Set the payment method on several payments at once.
pub async fn bulk_update_payment_method(
    state: &mut AppState,
    store: &dyn CampaignStore,
    payment_ids: &[String],
    method: Option<PaymentMethod>,
    limit: usize,
) -> BatchReport {
    let mut previous = Vec::new();
    let mut items = Vec::new();
    let mut early = Vec::new();
    for id in unique(payment_ids) {
        let prior = state.payment(id).cloned();
        let applied = state
            .payment_edit(id, PaymentEdit::Method(method))
            .and_then(|action| state.apply(&action));
        match (applied, prior) {
            (Ok(_), Some(prior)) => {
                if let Some(row) = state.payment(id).cloned() {
                    items.push((id.clone(), Record::Payment(row)));
                }
                previous.push(prior);
            }
            (Err(e), _) => early.push(rejected(id, e)),
            (Ok(_), None) => {}
        }
    }

    let mut report = run_bounded(items, limit, |record: Record| async move {
        store.update(&record).await
    })
    .await;
    for prior in previous {
        if report.failed.iter().any(|f| f.id == prior.id) {
            state.restore_payment(prior);
        }
    }
    report.failed.extend(early);
    finish_bulk(state, &report, "Updated");
    report
}

/// Payment fields shared by every row created in one bulk run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentTemplate {
    pub amount: Option<f64>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

/// Create one payment per KOL id; a repeated id gets one payment per
/// occurrence. Report ids are KOL ids.
pub async fn create_payments_for_kols(
    state: &mut AppState,
    store: &dyn CampaignStore,
    kol_ids: &[String],
    template: PaymentTemplate,
    limit: usize,
) -> BatchReport {
    let mut owner = HashMap::new();
    let mut items = Vec::new();
    let mut early = Vec::new();
    for kol_id in kol_ids {
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            campaign_id: state.campaign.id.clone(),
            campaign_kol_id: kol_id.clone(),
            amount: template.amount,
            payment_date: template.payment_date,
            payment_method: template.payment_method,
            notes: template.notes.clone(),
            ..Default::default()
        };
        match state.apply(&Action::AddPayment(payment.clone())) {
            Ok(_) => {
                owner.insert(payment.id.clone(), kol_id.clone());
                items.push((payment.id.clone(), Record::Payment(payment)));
            }
            Err(e) => early.push(rejected(kol_id, e)),
        }
    }

    // keyed by payment id: one KOL may own several new rows
    let by_payment = run_bounded(items, limit, |record: Record| async move {
        store.insert(&record).await
    })
    .await;
    for failure in &by_payment.failed {
        state.discard_payment(&failure.id);
    }
    state.rederive_paid();

    let kol_of = |payment_id: &str| owner.get(payment_id).cloned().unwrap_or_default();
    let mut report = BatchReport {
        succeeded: by_payment.succeeded.iter().map(|id| kol_of(id.as_str())).collect(),
        failed: by_payment
            .failed
            .into_iter()
            .map(|f| ItemFailure {
                id: kol_of(f.id.as_str()),
                error: f.error,
            })
            .collect(),
    };
    let synced: Vec<String> = unique(&report.succeeded).into_iter().cloned().collect();
    sync_paid(state, store, &synced).await;
    report.failed.extend(early);
    finish_bulk(state, &report, "Created");
    report
}
