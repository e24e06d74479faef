//! Row predicates for the KOL, content and payment tables.
//!
//! Every filter set follows the same shape: a row passes when all active
//! dimensions match, and a multi-select dimension matches when any selected
//! value is present on the row. Empty selections are inactive.
//!
//! Numeric dimensions compare against a user-typed value. When that value
//! does not parse as a number the dimension lets every row through instead
//! of hiding the whole table.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{CampaignKol, Content, ContentStatus, HhStatus, Payment, PaymentMethod};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NumericOp {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "=")]
    Eq,
}

impl NumericOp {
    pub fn parse_op(s: &str) -> Option<Self> {
        match s.trim() {
            ">" => Some(NumericOp::Gt),
            "<" => Some(NumericOp::Lt),
            "=" | "==" => Some(NumericOp::Eq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NumericOp::Gt => ">",
            NumericOp::Lt => "<",
            NumericOp::Eq => "=",
        }
    }
}

/// Operator plus the raw text the user typed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NumericFilter {
    pub operator: Option<NumericOp>,
    pub value: String,
}

impl NumericFilter {
    pub fn new(operator: NumericOp, value: impl Into<String>) -> Self {
        Self {
            operator: Some(operator),
            value: value.into(),
        }
    }

    /// Parse `>1000`, `< 5`, `=0` style expressions.
    pub fn parse_expr(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        let split = expr.find(|c: char| !matches!(c, '>' | '<' | '='))?;
        let op = NumericOp::parse_op(&expr[..split])?;
        Some(Self::new(op, expr[split..].trim()))
    }

    /// Missing row values compare as 0.
    pub fn matches(&self, actual: Option<f64>) -> bool {
        let Some(op) = self.operator else {
            return true;
        };
        let Ok(target) = self.value.trim().parse::<f64>() else {
            return true;
        };
        let actual = actual.filter(|v| v.is_finite()).unwrap_or(0.0);
        match op {
            NumericOp::Gt => actual > target,
            NumericOp::Lt => actual < target,
            NumericOp::Eq => actual == target,
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn normalized_search(search: &str) -> Option<String> {
    let s = search.trim();
    (!s.is_empty()).then(|| s.to_lowercase())
}

/// `selected` empty means inactive; otherwise `value` must equal one entry.
fn one_of(selected: &[String], value: Option<&str>) -> bool {
    if selected.is_empty() {
        return true;
    }
    value.is_some_and(|v| selected.iter().any(|s| s.eq_ignore_ascii_case(v)))
}

/// `selected` empty means inactive; otherwise the two lists must intersect.
fn intersects(selected: &[String], values: &[String]) -> bool {
    if selected.is_empty() {
        return true;
    }
    values
        .iter()
        .any(|v| selected.iter().any(|s| s.eq_ignore_ascii_case(v)))
}

fn enum_one_of<T: PartialEq>(selected: &[T], value: Option<T>) -> bool {
    selected.is_empty() || value.is_some_and(|v| selected.contains(&v))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KolFilter {
    pub platform: Vec<String>,
    pub region: Vec<String>,
    pub creator_type: Vec<String>,
    pub content_type: Vec<String>,
    pub hh_status: Vec<HhStatus>,
    pub budget_type: Vec<String>,
    pub followers: NumericFilter,
    pub budget: NumericFilter,
    pub paid: NumericFilter,
}

impl KolFilter {
    pub fn matches(&self, kol: &CampaignKol, search: &str) -> bool {
        let profile = &kol.master_kol;
        intersects(&self.platform, &profile.platform)
            && one_of(&self.region, profile.region.as_deref())
            && intersects(&self.creator_type, &profile.creator_type)
            && intersects(&self.content_type, &profile.content_type)
            && enum_one_of(&self.hh_status, kol.hh_status)
            && one_of(&self.budget_type, kol.budget_type.as_deref())
            && self.followers.matches(profile.followers.map(|f| f as f64))
            && self.budget.matches(kol.allocated_budget)
            && self.paid.matches(Some(kol.paid))
            && kol_matches_search(kol, search)
    }
}

fn kol_matches_search(kol: &CampaignKol, search: &str) -> bool {
    let Some(needle) = normalized_search(search) else {
        return true;
    };
    contains_ci(kol.name(), &needle)
        || kol.hh_status.is_some_and(|s| contains_ci(s.as_str(), &needle))
        || kol.notes.as_deref().is_some_and(|n| contains_ci(n, &needle))
}

pub fn filter_kols<'a>(kols: &'a [CampaignKol], filter: &KolFilter, search: &str) -> Vec<&'a CampaignKol> {
    kols.iter().filter(|k| filter.matches(k, search)).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContentFilter {
    pub platform: Vec<String>,
    pub content_type: Vec<String>,
    pub status: Vec<ContentStatus>,
    pub impressions: NumericFilter,
    pub likes: NumericFilter,
    pub retweets: NumericFilter,
    pub comments: NumericFilter,
    pub bookmarks: NumericFilter,
}

impl ContentFilter {
    /// `kol_names` maps `campaign_kols_id` to the KOL display name.
    pub fn matches(&self, content: &Content, kol_names: &HashMap<&str, &str>, search: &str) -> bool {
        let count = |v: Option<i64>| v.map(|n| n as f64);
        one_of(&self.platform, content.platform.as_deref())
            && one_of(&self.content_type, content.content_type.as_deref())
            && enum_one_of(&self.status, content.status)
            && self.impressions.matches(count(content.impressions))
            && self.likes.matches(count(content.likes))
            && self.retweets.matches(count(content.retweets))
            && self.comments.matches(count(content.comments))
            && self.bookmarks.matches(count(content.bookmarks))
            && content_matches_search(content, kol_names, search)
    }
}

fn content_matches_search(content: &Content, kol_names: &HashMap<&str, &str>, search: &str) -> bool {
    let Some(needle) = normalized_search(search) else {
        return true;
    };
    kol_names
        .get(content.campaign_kols_id.as_str())
        .is_some_and(|name| contains_ci(name, &needle))
        || content.platform.as_deref().is_some_and(|p| contains_ci(p, &needle))
        || content.status.is_some_and(|s| contains_ci(s.as_str(), &needle))
}

pub fn kol_name_index(kols: &[CampaignKol]) -> HashMap<&str, &str> {
    kols.iter().map(|k| (k.id.as_str(), k.name())).collect()
}

pub fn filter_contents<'a>(
    contents: &'a [Content],
    kols: &[CampaignKol],
    filter: &ContentFilter,
    search: &str,
) -> Vec<&'a Content> {
    let names = kol_name_index(kols);
    contents
        .iter()
        .filter(|c| filter.matches(c, &names, search))
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HasContent {
    #[default]
    Any,
    Yes,
    No,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PaymentFilter {
    pub kol_ids: Vec<String>,
    pub payment_methods: Vec<PaymentMethod>,
    pub has_content: HasContent,
    pub amount: NumericFilter,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment, kol_names: &HashMap<&str, &str>, search: &str) -> bool {
        let content_ok = match self.has_content {
            HasContent::Any => true,
            HasContent::Yes => payment.content_id.is_some(),
            HasContent::No => payment.content_id.is_none(),
        };
        (self.kol_ids.is_empty() || self.kol_ids.contains(&payment.campaign_kol_id))
            && enum_one_of(&self.payment_methods, payment.payment_method)
            && content_ok
            && self.amount.matches(payment.amount)
            && payment_matches_search(payment, kol_names, search)
    }
}

fn payment_matches_search(payment: &Payment, kol_names: &HashMap<&str, &str>, search: &str) -> bool {
    let Some(needle) = normalized_search(search) else {
        return true;
    };
    kol_names
        .get(payment.campaign_kol_id.as_str())
        .is_some_and(|name| contains_ci(name, &needle))
        || payment
            .payment_method
            .is_some_and(|m| contains_ci(m.as_str(), &needle))
        || payment.notes.as_deref().is_some_and(|n| contains_ci(n, &needle))
}

pub fn filter_payments<'a>(
    payments: &'a [Payment],
    kols: &[CampaignKol],
    filter: &PaymentFilter,
    search: &str,
) -> Vec<&'a Payment> {
    let names = kol_name_index(kols);
    payments
        .iter()
        .filter(|p| filter.matches(p, &names, search))
        .collect()
}
