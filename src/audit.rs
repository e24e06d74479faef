//! "Missing fields" audit shown as the warning badge.
//!
//! A campaign cannot be marked completed while this list is non-empty.
use serde::Serialize;

use crate::aggregate::{total_kol_allocated, total_paid};
use crate::format::format_currency;
use crate::model::{Campaign, CampaignKol, Content, Payment};
use crate::state::Tab;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MissingField {
    pub tab: Tab,
    pub field: &'static str,
    pub label: String,
}

impl MissingField {
    fn new(tab: Tab, field: &'static str, label: impl Into<String>) -> Self {
        Self {
            tab,
            field,
            label: label.into(),
        }
    }
}

fn blank(v: Option<&str>) -> bool {
    v.map_or(true, |s| s.trim().is_empty())
}

fn missing_budget(v: Option<f64>) -> bool {
    !v.is_some_and(|b| b.is_finite() && b != 0.0)
}

pub fn missing_fields(
    campaign: &Campaign,
    kols: &[CampaignKol],
    contents: &[Content],
    payments: &[Payment],
) -> Vec<MissingField> {
    let mut out = Vec::new();

    if campaign.name.trim().is_empty() {
        out.push(MissingField::new(Tab::Information, "name", "Campaign name"));
    }
    if campaign.status.is_none() {
        out.push(MissingField::new(Tab::Information, "status", "Campaign status"));
    }
    if campaign.start_date.is_none() {
        out.push(MissingField::new(Tab::Information, "start_date", "Start date"));
    }
    if campaign.end_date.is_none() {
        out.push(MissingField::new(Tab::Information, "end_date", "End date"));
    }
    if blank(campaign.client_id.as_deref()) {
        out.push(MissingField::new(Tab::Information, "client_id", "Client"));
    }
    if blank(campaign.region.as_deref()) {
        out.push(MissingField::new(Tab::Information, "region", "Region"));
    }
    if missing_budget(Some(campaign.total_budget)) {
        out.push(MissingField::new(Tab::Information, "total_budget", "Total budget"));
    }

    if kols.is_empty() {
        out.push(MissingField::new(Tab::KolDashboard, "kols", "No KOLs added"));
    } else {
        let no_budget = kols.iter().filter(|k| missing_budget(k.allocated_budget)).count();
        if no_budget > 0 {
            out.push(MissingField::new(
                Tab::KolDashboard,
                "allocated_budget",
                format!("{no_budget} KOL(s) missing budget"),
            ));
        }
        let no_status = kols.iter().filter(|k| k.hh_status.is_none()).count();
        if no_status > 0 {
            out.push(MissingField::new(
                Tab::KolDashboard,
                "hh_status",
                format!("{no_status} KOL(s) missing status"),
            ));
        }
    }

    if contents.is_empty() {
        out.push(MissingField::new(Tab::ContentDashboard, "contents", "No content added"));
    } else {
        let no_date = contents.iter().filter(|c| c.activation_date.is_none()).count();
        if no_date > 0 {
            out.push(MissingField::new(
                Tab::ContentDashboard,
                "activation_date",
                format!("{no_date} content item(s) missing activation date"),
            ));
        }
        let no_platform = contents
            .iter()
            .filter(|c| blank(c.platform.as_deref()))
            .count();
        if no_platform > 0 {
            out.push(MissingField::new(
                Tab::ContentDashboard,
                "platform",
                format!("{no_platform} content item(s) missing platform"),
            ));
        }
    }

    let allocated = total_kol_allocated(kols);
    let paid = total_paid(payments);
    if allocated > paid {
        out.push(MissingField::new(
            Tab::Budget,
            "payments",
            format!("Remaining payments ({} unpaid)", format_currency(allocated - paid)),
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::compute_payment_sums;
    use crate::model::{CampaignStatus, HhStatus};
    use chrono::NaiveDate;

    fn complete_campaign() -> Campaign {
        Campaign {
            id: "c1".into(),
            name: "Launch".into(),
            status: Some(CampaignStatus::Active),
            start_date: NaiveDate::from_ymd_opt(2026, 1, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            client_id: Some("client-1".into()),
            region: Some("Korea".into()),
            total_budget: 10_000.0,
            ..Default::default()
        }
    }

    fn fields(list: &[MissingField]) -> Vec<&'static str> {
        list.iter().map(|m| m.field).collect()
    }

    #[test]
    fn zero_budget_is_reported_and_cleared() {
        let mut campaign = complete_campaign();
        campaign.total_budget = 0.0;
        let before = missing_fields(&campaign, &[], &[], &[]);
        assert!(fields(&before).contains(&"total_budget"));

        campaign.total_budget = 2500.0;
        let after = missing_fields(&campaign, &[], &[], &[]);
        assert!(!fields(&after).contains(&"total_budget"));
        assert_eq!(after.len(), before.len() - 1);
    }

    #[test]
    fn empty_campaign_reports_every_section() {
        let list = missing_fields(&Campaign::default(), &[], &[], &[]);
        assert_eq!(
            fields(&list),
            vec![
                "name",
                "status",
                "start_date",
                "end_date",
                "client_id",
                "region",
                "total_budget",
                "kols",
                "contents"
            ]
        );
        assert_eq!(list[7].tab, Tab::KolDashboard);
    }

    #[test]
    fn shortfall_reports_unpaid_amount() {
        let kols = vec![CampaignKol {
            id: "A".into(),
            allocated_budget: Some(1000.0),
            hh_status: Some(HhStatus::Onboarded),
            ..Default::default()
        }];
        let payments = vec![
            Payment {
                campaign_kol_id: "A".into(),
                amount: Some(400.0),
                ..Default::default()
            },
            Payment {
                campaign_kol_id: "A".into(),
                amount: Some(200.0),
                ..Default::default()
            },
        ];
        let sums = compute_payment_sums(&payments);
        assert_eq!(sums.len(), 1);
        assert_eq!(sums["A"], 600.0);

        let list = missing_fields(&complete_campaign(), &kols, &[], &payments);
        let warning = list.iter().find(|m| m.field == "payments").unwrap();
        assert_eq!(warning.tab, Tab::Budget);
        assert_eq!(warning.label, "Remaining payments ($400 unpaid)");
    }

    #[test]
    fn kol_and_content_gaps_are_counted() {
        let kols = vec![
            CampaignKol {
                allocated_budget: Some(0.0),
                ..Default::default()
            },
            CampaignKol {
                allocated_budget: Some(100.0),
                hh_status: Some(HhStatus::Curated),
                ..Default::default()
            },
        ];
        let contents = vec![Content {
            platform: Some(" ".into()),
            ..Default::default()
        }];
        let payments = vec![Payment {
            amount: Some(100.0),
            ..Default::default()
        }];
        let list = missing_fields(&complete_campaign(), &kols, &contents, &payments);
        let labels: Vec<&str> = list.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "1 KOL(s) missing budget",
                "1 KOL(s) missing status",
                "1 content item(s) missing activation date",
                "1 content item(s) missing platform",
            ]
        );
    }
}
