//! Aggregates derived from the in-memory campaign lists.
//!
//! Everything here is a pure function of its inputs and is cheap enough to
//! recompute whenever the underlying lists change.
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::model::{Campaign, CampaignKol, Content, ContentStatus, HhStatus, Payment};

/// Amount of a payment with missing or non-finite values counted as 0.
pub fn payment_amount(payment: &Payment) -> f64 {
    match payment.amount {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Sum payment amounts per owning `campaign_kol_id`.
pub fn compute_payment_sums(payments: &[Payment]) -> HashMap<String, f64> {
    let mut sums: HashMap<String, f64> = HashMap::new();
    for p in payments {
        *sums.entry(p.campaign_kol_id.clone()).or_insert(0.0) += payment_amount(p);
    }
    sums
}

/// Write fresh `paid` values onto `kols`. KOLs without payments get 0.
/// Returns the ids whose cached value changed.
pub fn refresh_paid(kols: &mut [CampaignKol], sums: &HashMap<String, f64>) -> Vec<String> {
    let mut changed = Vec::new();
    for kol in kols.iter_mut() {
        let paid = sums.get(&kol.id).copied().unwrap_or(0.0);
        if (kol.paid - paid).abs() > f64::EPSILON {
            kol.paid = paid;
            changed.push(kol.id.clone());
        }
    }
    changed
}

pub fn total_kol_allocated(kols: &[CampaignKol]) -> f64 {
    kols.iter()
        .filter_map(|k| k.allocated_budget)
        .filter(|v| v.is_finite())
        .sum()
}

pub fn total_paid(payments: &[Payment]) -> f64 {
    payments.iter().map(payment_amount).sum()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BudgetSummary {
    pub total_budget: f64,
    pub region_allocated: f64,
    pub kol_allocated: f64,
    pub paid: f64,
    /// Allocated to KOLs but not yet paid; never negative.
    pub unpaid: f64,
    /// Campaign budget not yet allocated to KOLs.
    pub unallocated: f64,
    pub utilization_percent: f64,
}

pub fn budget_summary(campaign: &Campaign, kols: &[CampaignKol], payments: &[Payment]) -> BudgetSummary {
    let kol_allocated = total_kol_allocated(kols);
    let paid = total_paid(payments);
    BudgetSummary {
        total_budget: campaign.total_budget,
        region_allocated: campaign.allocations_total(),
        kol_allocated,
        paid,
        unpaid: (kol_allocated - paid).max(0.0),
        unallocated: campaign.total_budget - kol_allocated,
        utilization_percent: crate::format::percent(paid, campaign.total_budget),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Engagement {
    pub impressions: i64,
    pub likes: i64,
    pub retweets: i64,
    pub comments: i64,
    pub bookmarks: i64,
}

impl Engagement {
    fn add(&mut self, c: &Content) {
        self.impressions += c.impressions.unwrap_or(0);
        self.likes += c.likes.unwrap_or(0);
        self.retweets += c.retweets.unwrap_or(0);
        self.comments += c.comments.unwrap_or(0);
        self.bookmarks += c.bookmarks.unwrap_or(0);
    }

    pub fn interactions(&self) -> i64 {
        self.likes + self.retweets + self.comments + self.bookmarks
    }
}

/// Counters behind the dashboard cards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardStats {
    pub kols_by_status: BTreeMap<HhStatus, usize>,
    pub kols_without_status: usize,
    pub contents_by_status: BTreeMap<ContentStatus, usize>,
    pub contents_by_platform: BTreeMap<String, usize>,
    pub engagement: Engagement,
    pub region_allocations: BTreeMap<String, f64>,
    pub budget: BudgetSummary,
}

pub fn dashboard_stats(
    campaign: &Campaign,
    kols: &[CampaignKol],
    contents: &[Content],
    payments: &[Payment],
) -> DashboardStats {
    let mut stats = DashboardStats {
        budget: budget_summary(campaign, kols, payments),
        ..Default::default()
    };
    for kol in kols {
        match kol.hh_status {
            Some(s) => *stats.kols_by_status.entry(s).or_insert(0) += 1,
            None => stats.kols_without_status += 1,
        }
    }
    for c in contents {
        if let Some(s) = c.status {
            *stats.contents_by_status.entry(s).or_insert(0) += 1;
        }
        let platform = c
            .platform
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("Unknown");
        *stats.contents_by_platform.entry(platform.to_string()).or_insert(0) += 1;
        stats.engagement.add(c);
    }
    for a in &campaign.budget_allocations {
        *stats.region_allocations.entry(a.region.clone()).or_insert(0.0) += a.allocated_budget;
    }
    stats
}
