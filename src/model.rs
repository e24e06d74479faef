use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    Planning,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 4] = [
        CampaignStatus::Planning,
        CampaignStatus::Active,
        CampaignStatus::Paused,
        CampaignStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Planning => "Planning",
            CampaignStatus::Active => "Active",
            CampaignStatus::Paused => "Paused",
            CampaignStatus::Completed => "Completed",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

/// Pipeline stage of a KOL inside a campaign. Any stage may follow any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HhStatus {
    Curated,
    Interested,
    Onboarded,
    Concluded,
}

impl HhStatus {
    pub const ALL: [HhStatus; 4] = [
        HhStatus::Curated,
        HhStatus::Interested,
        HhStatus::Onboarded,
        HhStatus::Concluded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HhStatus::Curated => "Curated",
            HhStatus::Interested => "Interested",
            HhStatus::Onboarded => "Onboarded",
            HhStatus::Concluded => "Concluded",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Scheduled,
    Pending,
    Posted,
}

impl ContentStatus {
    pub const ALL: [ContentStatus; 3] = [
        ContentStatus::Scheduled,
        ContentStatus::Pending,
        ContentStatus::Posted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Pending => "pending",
            ContentStatus::Posted => "posted",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PaymentMethod {
    Token,
    Fiat,
    #[serde(rename = "WL")]
    Whitelist,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Token,
        PaymentMethod::Fiat,
        PaymentMethod::Whitelist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Token => "Token",
            PaymentMethod::Fiat => "Fiat",
            PaymentMethod::Whitelist => "WL",
        }
    }

    pub fn parse_method(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BudgetAllocation {
    pub id: String,
    pub campaign_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub region: String,
    #[serde(deserialize_with = "null_as_default")]
    pub allocated_budget: f64,
}

/// Hosted rows send `null` for unset columns; read that as the default.
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Communication / settings checkboxes shown on the information tab.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CampaignFlags {
    #[serde(deserialize_with = "null_as_default")]
    pub intro_call: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub proposal_sent: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub nda_signed: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub weekly_updates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Campaign {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub status: Option<CampaignStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub client_id: Option<String>,
    pub manager_id: Option<String>,
    pub region: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub total_budget: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_allocated: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub budget_type: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub budget_allocations: Vec<BudgetAllocation>,
    #[serde(flatten)]
    pub flags: CampaignFlags,
    #[serde(deserialize_with = "null_as_default")]
    pub share_report_publicly: bool,
    pub report_message: Option<String>,
}

impl Campaign {
    /// Sum of per-region allocations; this is what `total_allocated` caches.
    pub fn allocations_total(&self) -> f64 {
        self.budget_allocations
            .iter()
            .map(|a| a.allocated_budget)
            .sum()
    }
}

/// Master KOL profile, shared across campaigns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct KolProfile {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    pub region: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub platform: Vec<String>,
    pub followers: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub creator_type: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub content_type: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub deliverables: Vec<String>,
    pub link: Option<String>,
}

/// Association between a campaign and a master KOL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CampaignKol {
    pub id: String,
    pub campaign_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub master_kol: KolProfile,
    pub hh_status: Option<HhStatus>,
    pub allocated_budget: Option<f64>,
    pub budget_type: Option<String>,
    /// Cached sum of this KOL's payments. Derived, never authoritative.
    #[serde(deserialize_with = "null_as_default")]
    pub paid: f64,
    pub wallet: Option<String>,
    pub notes: Option<String>,
}

impl CampaignKol {
    pub fn name(&self) -> &str {
        &self.master_kol.name
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Content {
    pub id: String,
    pub campaign_id: String,
    pub campaign_kols_id: String,
    pub activation_date: Option<NaiveDate>,
    pub content_link: Option<String>,
    pub platform: Option<String>,
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    pub status: Option<ContentStatus>,
    pub impressions: Option<i64>,
    pub likes: Option<i64>,
    pub retweets: Option<i64>,
    pub comments: Option<i64>,
    pub bookmarks: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Payment {
    pub id: String,
    pub campaign_id: String,
    pub campaign_kol_id: String,
    pub content_id: Option<String>,
    pub amount: Option<f64>,
    pub payment_date: Option<NaiveDate>,
    pub payment_method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CampaignUpdate {
    pub id: String,
    pub campaign_id: String,
    pub author: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportFile {
    pub id: String,
    pub campaign_id: String,
    pub file_name: String,
    pub file_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CampaignReport {
    pub campaign_id: String,
    pub custom_message: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_public: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

/// Everything the dashboard loads for one campaign.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CampaignSnapshot {
    pub campaign: Campaign,
    pub kols: Vec<CampaignKol>,
    pub contents: Vec<Content>,
    pub payments: Vec<Payment>,
    pub updates: Vec<CampaignUpdate>,
    pub report_files: Vec<ReportFile>,
    pub report: Option<CampaignReport>,
}

/// Fixed option lists offered by the pickers.
pub mod options {
    pub const REGIONS: &[&str] = &[
        "Global",
        "North America",
        "Europe",
        "Korea",
        "Japan",
        "China",
        "Southeast Asia",
        "Vietnam",
        "Turkey",
        "LATAM",
        "Africa",
    ];

    pub const PLATFORMS: &[&str] = &["X", "Telegram", "YouTube", "TikTok", "Instagram", "Discord"];

    pub const CREATOR_TYPES: &[&str] = &[
        "Memecoins",
        "NFT",
        "Trading",
        "Gaming",
        "Education",
        "DeFi",
        "AI",
    ];

    pub const CONTENT_TYPES: &[&str] = &[
        "Post",
        "Thread",
        "Video",
        "Short",
        "Space",
        "Livestream",
        "Article",
    ];

    pub const DELIVERABLES: &[&str] = &[
        "Post",
        "Thread",
        "Video",
        "Space",
        "Quote Tweet",
        "Community Post",
    ];

    pub const BUDGET_TYPES: &[&str] = &["Token", "Fiat", "WL"];

    pub fn is_known(list: &[&str], value: &str) -> bool {
        list.iter().any(|v| v.eq_ignore_ascii_case(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_round_trip_through_strings() {
        for s in HhStatus::ALL {
            assert_eq!(HhStatus::parse_status(s.as_str()), Some(s));
        }
        assert_eq!(ContentStatus::parse_status("Posted"), Some(ContentStatus::Posted));
        assert_eq!(PaymentMethod::parse_method("wl"), Some(PaymentMethod::Whitelist));
        assert_eq!(CampaignStatus::parse_status("unknown"), None);
    }

    #[test]
    fn serde_names_match_table_values() {
        let json = serde_json::to_value(PaymentMethod::Whitelist).unwrap();
        assert_eq!(json, "WL");
        let json = serde_json::to_value(ContentStatus::Scheduled).unwrap();
        assert_eq!(json, "scheduled");

        let content = Content {
            content_type: Some("Thread".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "Thread");
    }

    #[test]
    fn option_lookup_ignores_case() {
        assert!(options::is_known(options::PLATFORMS, "youtube"));
        assert!(options::is_known(options::BUDGET_TYPES, "WL"));
        assert!(!options::is_known(options::REGIONS, "Atlantis"));
    }

    #[test]
    fn null_columns_decode_as_defaults() {
        let campaign: Campaign = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "Launch",
            "budget_type": null,
            "total_budget": null,
            "total_allocated": null,
            "nda_signed": null,
            "share_report_publicly": null
        }))
        .unwrap();
        assert!(campaign.budget_type.is_empty());
        assert_eq!(campaign.total_budget, 0.0);
        assert!(!campaign.flags.nda_signed);

        let ck: CampaignKol = serde_json::from_value(serde_json::json!({
            "id": "ck1",
            "paid": null,
            "master_kol": { "id": "k1", "name": "Alice", "platform": null, "creator_type": null }
        }))
        .unwrap();
        assert_eq!(ck.paid, 0.0);
        assert!(ck.master_kol.platform.is_empty());
        assert!(ck.master_kol.creator_type.is_empty());
    }

    #[test]
    fn allocations_total_sums_regions() {
        let campaign = Campaign {
            budget_allocations: vec![
                BudgetAllocation {
                    region: "Korea".into(),
                    allocated_budget: 1500.0,
                    ..Default::default()
                },
                BudgetAllocation {
                    region: "Japan".into(),
                    allocated_budget: 500.0,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(campaign.allocations_total(), 2000.0);
    }
}
