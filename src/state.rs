//! Single explicit application state and the reducer that mutates it.
//!
//! `AppState::apply` is the only way data rows change. It validates an
//! [`Action`], applies it, and hands back an [`Undo`] record that restores
//! exactly the collections it touched. Remote writes live in
//! [`crate::mutation`]; nothing in this module performs I/O.
use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::aggregate::{compute_payment_sums, refresh_paid};
use crate::audit::{missing_fields, MissingField};
use crate::filter::{ContentFilter, KolFilter, PaymentFilter};
use crate::model::{
    BudgetAllocation, Campaign, CampaignKol, CampaignReport, CampaignSnapshot, CampaignStatus,
    CampaignUpdate, Content, ContentStatus, HhStatus, KolProfile, Payment, PaymentMethod,
    ReportFile, User,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    Information,
    KolDashboard,
    ContentDashboard,
    Budget,
    Report,
}

impl Tab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Information => "Information",
            Tab::KolDashboard => "KOL Dashboard",
            Tab::ContentDashboard => "Content Dashboard",
            Tab::Budget => "Budget",
            Tab::Report => "Report",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("{table} row {id} not found")]
    NotFound { table: &'static str, id: String },
    #[error("{table} row {id} already exists")]
    Duplicate { table: &'static str, id: String },
    #[error("cannot mark campaign completed: {0} field(s) still missing")]
    CompletionBlocked(usize),
}

fn not_found(table: &'static str, id: &str) -> StateError {
    StateError::NotFound {
        table,
        id: id.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// Transient notification surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filters {
    pub kol: KolFilter,
    pub kol_search: String,
    pub content: ContentFilter,
    pub content_search: String,
    pub payment: PaymentFilter,
    pub payment_search: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiState {
    pub active_tab: Tab,
    pub selected_kols: BTreeSet<String>,
    pub selected_payments: BTreeSet<String>,
}

/// Row changes. Each variant has exactly one remote counterpart.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SaveCampaign(Campaign),
    AddBudgetAllocation(BudgetAllocation),
    UpdateBudgetAllocation(BudgetAllocation),
    DeleteBudgetAllocation(String),
    AddKol(CampaignKol),
    UpdateKol(CampaignKol),
    UpdateKolProfile(KolProfile),
    DeleteKol(String),
    AddContent(Content),
    UpdateContent(Content),
    DeleteContent(String),
    AddPayment(Payment),
    UpdatePayment(Payment),
    DeletePayment(String),
    PostUpdate(CampaignUpdate),
    DeleteUpdate(String),
    AddReportFile(ReportFile),
    DeleteReportFile(String),
    SaveReport(CampaignReport),
}

/// UI-only changes; never written remotely.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    SelectTab(Tab),
    SetKolFilter(KolFilter),
    SetKolSearch(String),
    SetContentFilter(ContentFilter),
    SetContentSearch(String),
    SetPaymentFilter(PaymentFilter),
    SetPaymentSearch(String),
    ToggleKolSelection(String),
    TogglePaymentSelection(String),
    ClearSelection,
    ClearFilters,
    DismissToasts,
}

/// Pre-action copies of the collections an action touched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Undo {
    campaign: Option<Campaign>,
    kols: Option<Vec<CampaignKol>>,
    contents: Option<Vec<Content>>,
    payments: Option<Vec<Payment>>,
    updates: Option<Vec<CampaignUpdate>>,
    report_files: Option<Vec<ReportFile>>,
    report: Option<Option<CampaignReport>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub undo: Undo,
    /// KOLs whose derived `paid` changed and must be persisted.
    pub paid_changed: Vec<String>,
}

/// Inline edit of one campaign-KOL field.
#[derive(Debug, Clone, PartialEq)]
pub enum KolEdit {
    Status(Option<HhStatus>),
    Budget(Option<f64>),
    BudgetType(Option<String>),
    Wallet(Option<String>),
    Notes(Option<String>),
}

/// Inline edit of a master profile field shown in the KOL table.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileEdit {
    Platforms(Vec<String>),
    Region(Option<String>),
    CreatorTypes(Vec<String>),
    ContentTypes(Vec<String>),
    Followers(Option<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentEdit {
    Status(Option<ContentStatus>),
    Platform(Option<String>),
    Type(Option<String>),
    ActivationDate(Option<chrono::NaiveDate>),
    Link(Option<String>),
    Impressions(Option<i64>),
    Likes(Option<i64>),
    Retweets(Option<i64>),
    Comments(Option<i64>),
    Bookmarks(Option<i64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEdit {
    Amount(Option<f64>),
    Method(Option<PaymentMethod>),
    Date(Option<chrono::NaiveDate>),
    TransactionId(Option<String>),
    Notes(Option<String>),
    Content(Option<String>),
}

/// Ticket handed out when a campaign load starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppState {
    pub campaign: Campaign,
    pub kols: Vec<CampaignKol>,
    pub contents: Vec<Content>,
    pub payments: Vec<Payment>,
    pub updates: Vec<CampaignUpdate>,
    pub report_files: Vec<ReportFile>,
    pub report: Option<CampaignReport>,
    pub users: Vec<User>,
    pub filters: Filters,
    pub ui: UiState,
    pub toasts: Vec<Toast>,
    load_generation: u64,
}

impl AppState {
    pub fn from_snapshot(snapshot: CampaignSnapshot) -> Self {
        let mut state = Self::default();
        state.install(snapshot);
        state
    }

    fn install(&mut self, snapshot: CampaignSnapshot) {
        self.campaign = snapshot.campaign;
        self.kols = snapshot.kols;
        self.contents = snapshot.contents;
        self.payments = snapshot.payments;
        self.updates = snapshot.updates;
        self.report_files = snapshot.report_files;
        self.report = snapshot.report;
        self.ui.selected_kols.clear();
        self.ui.selected_payments.clear();
        self.rederive_paid();
    }

    /// Start a load; any earlier ticket becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_generation += 1;
        LoadTicket(self.load_generation)
    }

    /// Install a loaded snapshot unless a newer load has started since.
    /// Returns false when the snapshot was discarded.
    pub fn finish_load(&mut self, ticket: LoadTicket, snapshot: CampaignSnapshot) -> bool {
        if ticket.0 != self.load_generation {
            return false;
        }
        self.install(snapshot);
        true
    }

    pub fn missing_fields(&self) -> Vec<MissingField> {
        missing_fields(&self.campaign, &self.kols, &self.contents, &self.payments)
    }

    pub fn kol(&self, id: &str) -> Option<&CampaignKol> {
        self.kols.iter().find(|k| k.id == id)
    }

    pub fn content(&self, id: &str) -> Option<&Content> {
        self.contents.iter().find(|c| c.id == id)
    }

    pub fn payment(&self, id: &str) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    pub fn filtered_kols(&self) -> Vec<&CampaignKol> {
        crate::filter::filter_kols(&self.kols, &self.filters.kol, &self.filters.kol_search)
    }

    pub fn filtered_contents(&self) -> Vec<&Content> {
        crate::filter::filter_contents(
            &self.contents,
            &self.kols,
            &self.filters.content,
            &self.filters.content_search,
        )
    }

    pub fn filtered_payments(&self) -> Vec<&Payment> {
        crate::filter::filter_payments(
            &self.payments,
            &self.kols,
            &self.filters.payment,
            &self.filters.payment_search,
        )
    }

    pub fn push_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toasts.push(Toast {
            level,
            message: message.into(),
        });
    }

    pub fn apply_ui(&mut self, action: UiAction) {
        match action {
            UiAction::SelectTab(tab) => self.ui.active_tab = tab,
            UiAction::SetKolFilter(f) => self.filters.kol = f,
            UiAction::SetKolSearch(s) => self.filters.kol_search = s,
            UiAction::SetContentFilter(f) => self.filters.content = f,
            UiAction::SetContentSearch(s) => self.filters.content_search = s,
            UiAction::SetPaymentFilter(f) => self.filters.payment = f,
            UiAction::SetPaymentSearch(s) => self.filters.payment_search = s,
            UiAction::ToggleKolSelection(id) => {
                if !self.ui.selected_kols.remove(&id) {
                    self.ui.selected_kols.insert(id);
                }
            }
            UiAction::TogglePaymentSelection(id) => {
                if !self.ui.selected_payments.remove(&id) {
                    self.ui.selected_payments.insert(id);
                }
            }
            UiAction::ClearSelection => {
                self.ui.selected_kols.clear();
                self.ui.selected_payments.clear();
            }
            UiAction::ClearFilters => self.filters = Filters::default(),
            UiAction::DismissToasts => self.toasts.clear(),
        }
    }

    /// Build the full-row action for a single-field KOL edit.
    pub fn kol_edit(&self, id: &str, edit: KolEdit) -> Result<Action, StateError> {
        let mut kol = self.kol(id).cloned().ok_or_else(|| not_found("campaign_kols", id))?;
        match edit {
            KolEdit::Status(v) => kol.hh_status = v,
            KolEdit::Budget(v) => kol.allocated_budget = v,
            KolEdit::BudgetType(v) => kol.budget_type = v,
            KolEdit::Wallet(v) => kol.wallet = v,
            KolEdit::Notes(v) => kol.notes = v,
        }
        Ok(Action::UpdateKol(kol))
    }

    pub fn profile_edit(&self, campaign_kol_id: &str, edit: ProfileEdit) -> Result<Action, StateError> {
        let mut profile = self
            .kol(campaign_kol_id)
            .map(|k| k.master_kol.clone())
            .ok_or_else(|| not_found("campaign_kols", campaign_kol_id))?;
        match edit {
            ProfileEdit::Platforms(v) => profile.platform = v,
            ProfileEdit::Region(v) => profile.region = v,
            ProfileEdit::CreatorTypes(v) => profile.creator_type = v,
            ProfileEdit::ContentTypes(v) => profile.content_type = v,
            ProfileEdit::Followers(v) => profile.followers = v,
        }
        Ok(Action::UpdateKolProfile(profile))
    }

    pub fn content_edit(&self, id: &str, edit: ContentEdit) -> Result<Action, StateError> {
        let mut content = self.content(id).cloned().ok_or_else(|| not_found("contents", id))?;
        match edit {
            ContentEdit::Status(v) => content.status = v,
            ContentEdit::Platform(v) => content.platform = v,
            ContentEdit::Type(v) => content.content_type = v,
            ContentEdit::ActivationDate(v) => content.activation_date = v,
            ContentEdit::Link(v) => content.content_link = v,
            ContentEdit::Impressions(v) => content.impressions = v,
            ContentEdit::Likes(v) => content.likes = v,
            ContentEdit::Retweets(v) => content.retweets = v,
            ContentEdit::Comments(v) => content.comments = v,
            ContentEdit::Bookmarks(v) => content.bookmarks = v,
        }
        Ok(Action::UpdateContent(content))
    }

    pub fn payment_edit(&self, id: &str, edit: PaymentEdit) -> Result<Action, StateError> {
        let mut payment = self.payment(id).cloned().ok_or_else(|| not_found("payments", id))?;
        match edit {
            PaymentEdit::Amount(v) => payment.amount = v,
            PaymentEdit::Method(v) => payment.payment_method = v,
            PaymentEdit::Date(v) => payment.payment_date = v,
            PaymentEdit::TransactionId(v) => payment.transaction_id = v,
            PaymentEdit::Notes(v) => payment.notes = v,
            PaymentEdit::Content(v) => payment.content_id = v,
        }
        Ok(Action::UpdatePayment(payment))
    }

    /// Validate and apply a row change locally.
    pub fn apply(&mut self, action: &Action) -> Result<Applied, StateError> {
        let mut undo = Undo::default();
        match action {
            Action::SaveCampaign(next) => {
                let becoming_completed = next.status == Some(CampaignStatus::Completed)
                    && self.campaign.status != Some(CampaignStatus::Completed);
                let mut next = next.clone();
                next.budget_allocations = self.campaign.budget_allocations.clone();
                next.total_allocated = next.allocations_total();
                if becoming_completed {
                    let missing = missing_fields(&next, &self.kols, &self.contents, &self.payments);
                    if !missing.is_empty() {
                        return Err(StateError::CompletionBlocked(missing.len()));
                    }
                }
                undo.campaign = Some(std::mem::replace(&mut self.campaign, next));
            }
            Action::AddBudgetAllocation(a) => {
                if self.campaign.budget_allocations.iter().any(|x| x.id == a.id) {
                    return Err(StateError::Duplicate {
                        table: "campaign_budget_allocations",
                        id: a.id.clone(),
                    });
                }
                undo.campaign = Some(self.campaign.clone());
                self.campaign.budget_allocations.push(a.clone());
                self.campaign.total_allocated = self.campaign.allocations_total();
            }
            Action::UpdateBudgetAllocation(a) => {
                let idx = self
                    .campaign
                    .budget_allocations
                    .iter()
                    .position(|x| x.id == a.id)
                    .ok_or_else(|| not_found("campaign_budget_allocations", &a.id))?;
                undo.campaign = Some(self.campaign.clone());
                self.campaign.budget_allocations[idx] = a.clone();
                self.campaign.total_allocated = self.campaign.allocations_total();
            }
            Action::DeleteBudgetAllocation(id) => {
                let idx = self
                    .campaign
                    .budget_allocations
                    .iter()
                    .position(|x| &x.id == id)
                    .ok_or_else(|| not_found("campaign_budget_allocations", id))?;
                undo.campaign = Some(self.campaign.clone());
                self.campaign.budget_allocations.remove(idx);
                self.campaign.total_allocated = self.campaign.allocations_total();
            }
            Action::AddKol(kol) => {
                if self.kol(&kol.id).is_some() {
                    return Err(StateError::Duplicate {
                        table: "campaign_kols",
                        id: kol.id.clone(),
                    });
                }
                undo.kols = Some(self.kols.clone());
                let mut kol = kol.clone();
                kol.paid = 0.0;
                self.kols.push(kol);
            }
            Action::UpdateKol(kol) => {
                let idx = self.kol_index(&kol.id)?;
                undo.kols = Some(self.kols.clone());
                let paid = self.kols[idx].paid;
                self.kols[idx] = CampaignKol {
                    paid,
                    ..kol.clone()
                };
            }
            Action::UpdateKolProfile(profile) => {
                if !self.kols.iter().any(|k| k.master_kol.id == profile.id) {
                    return Err(not_found("kols", &profile.id));
                }
                undo.kols = Some(self.kols.clone());
                for kol in self.kols.iter_mut().filter(|k| k.master_kol.id == profile.id) {
                    kol.master_kol = profile.clone();
                }
            }
            Action::DeleteKol(id) => {
                let idx = self.kol_index(id)?;
                undo.kols = Some(self.kols.clone());
                undo.contents = Some(self.contents.clone());
                undo.payments = Some(self.payments.clone());
                self.kols.remove(idx);
                self.contents.retain(|c| &c.campaign_kols_id != id);
                self.payments.retain(|p| &p.campaign_kol_id != id);
                self.ui.selected_kols.remove(id);
            }
            Action::AddContent(content) => {
                if self.content(&content.id).is_some() {
                    return Err(StateError::Duplicate {
                        table: "contents",
                        id: content.id.clone(),
                    });
                }
                self.kol_index(&content.campaign_kols_id)?;
                undo.contents = Some(self.contents.clone());
                self.contents.push(content.clone());
            }
            Action::UpdateContent(content) => {
                let idx = self.content_index(&content.id)?;
                self.kol_index(&content.campaign_kols_id)?;
                undo.contents = Some(self.contents.clone());
                self.contents[idx] = content.clone();
            }
            Action::DeleteContent(id) => {
                let idx = self.content_index(id)?;
                undo.contents = Some(self.contents.clone());
                undo.payments = Some(self.payments.clone());
                self.contents.remove(idx);
                for p in self.payments.iter_mut() {
                    if p.content_id.as_deref() == Some(id.as_str()) {
                        p.content_id = None;
                    }
                }
            }
            Action::AddPayment(payment) => {
                if self.payment(&payment.id).is_some() {
                    return Err(StateError::Duplicate {
                        table: "payments",
                        id: payment.id.clone(),
                    });
                }
                self.kol_index(&payment.campaign_kol_id)?;
                undo.payments = Some(self.payments.clone());
                self.payments.push(payment.clone());
            }
            Action::UpdatePayment(payment) => {
                let idx = self.payment_index(&payment.id)?;
                self.kol_index(&payment.campaign_kol_id)?;
                undo.payments = Some(self.payments.clone());
                self.payments[idx] = payment.clone();
            }
            Action::DeletePayment(id) => {
                let idx = self.payment_index(id)?;
                undo.payments = Some(self.payments.clone());
                self.payments.remove(idx);
                self.ui.selected_payments.remove(id);
            }
            Action::PostUpdate(update) => {
                undo.updates = Some(self.updates.clone());
                self.updates.insert(0, update.clone());
            }
            Action::DeleteUpdate(id) => {
                let idx = self
                    .updates
                    .iter()
                    .position(|u| &u.id == id)
                    .ok_or_else(|| not_found("campaign_updates", id))?;
                undo.updates = Some(self.updates.clone());
                self.updates.remove(idx);
            }
            Action::AddReportFile(file) => {
                undo.report_files = Some(self.report_files.clone());
                self.report_files.push(file.clone());
            }
            Action::DeleteReportFile(id) => {
                let idx = self
                    .report_files
                    .iter()
                    .position(|f| &f.id == id)
                    .ok_or_else(|| not_found("campaign_report_files", id))?;
                undo.report_files = Some(self.report_files.clone());
                self.report_files.remove(idx);
            }
            Action::SaveReport(report) => {
                undo.report = Some(self.report.clone());
                undo.campaign = Some(self.campaign.clone());
                self.campaign.share_report_publicly = report.is_public;
                self.campaign.report_message = report.custom_message.clone();
                self.report = Some(report.clone());
            }
        }

        let mut paid_changed = Vec::new();
        if undo.payments.is_some() {
            if undo.kols.is_none() {
                undo.kols = Some(self.kols.clone());
            }
            paid_changed = self.rederive_paid();
        }
        Ok(Applied { undo, paid_changed })
    }

    /// Restore every collection captured in `undo`.
    pub fn revert(&mut self, undo: Undo) {
        if let Some(v) = undo.campaign {
            self.campaign = v;
        }
        if let Some(v) = undo.kols {
            self.kols = v;
        }
        if let Some(v) = undo.contents {
            self.contents = v;
        }
        if let Some(v) = undo.payments {
            self.payments = v;
        }
        if let Some(v) = undo.updates {
            self.updates = v;
        }
        if let Some(v) = undo.report_files {
            self.report_files = v;
        }
        if let Some(v) = undo.report {
            self.report = v;
        }
    }

    /// Put back one KOL row captured before a bulk edit.
    pub fn restore_kol(&mut self, previous: CampaignKol) {
        if let Some(slot) = self.kols.iter_mut().find(|k| k.id == previous.id) {
            *slot = previous;
        }
    }

    /// Put back one payment row captured before a bulk edit.
    pub fn restore_payment(&mut self, previous: Payment) -> Vec<String> {
        if let Some(slot) = self.payments.iter_mut().find(|p| p.id == previous.id) {
            *slot = previous;
        }
        self.rederive_paid()
    }

    /// Drop a locally added payment whose remote insert failed.
    pub fn discard_payment(&mut self, id: &str) -> Vec<String> {
        self.payments.retain(|p| p.id != id);
        self.rederive_paid()
    }

    pub fn rederive_paid(&mut self) -> Vec<String> {
        let sums = compute_payment_sums(&self.payments);
        refresh_paid(&mut self.kols, &sums)
    }

    fn kol_index(&self, id: &str) -> Result<usize, StateError> {
        self.kols
            .iter()
            .position(|k| k.id == id)
            .ok_or_else(|| not_found("campaign_kols", id))
    }

    fn content_index(&self, id: &str) -> Result<usize, StateError> {
        self.contents
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| not_found("contents", id))
    }

    fn payment_index(&self, id: &str) -> Result<usize, StateError> {
        self.payments
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| not_found("payments", id))
    }
}
