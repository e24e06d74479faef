//! Hosted backend speaking the PostgREST dialect plus object storage.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::model::{
    BudgetAllocation, Campaign, CampaignKol, CampaignReport, CampaignSnapshot, CampaignUpdate,
    Content, KolProfile, Payment, ReportFile, User,
};
use crate::store::{CampaignStore, Record, Table};

#[derive(Clone)]
pub struct RestStore {
    http: Client,
    base_url: Url,
    api_key: String,
    bucket: String,
}

impl fmt::Debug for RestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// How a write should be resolved server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefer {
    Minimal,
    Upsert,
}

impl Prefer {
    fn header(&self) -> &'static str {
        match self {
            Prefer::Minimal => "return=minimal",
            Prefer::Upsert => "resolution=merge-duplicates,return=minimal",
        }
    }
}

impl RestStore {
    pub fn new(base_url: &str, api_key: String, bucket: String) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("invalid backend.rest_url")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .user_agent("kolboard/0.1")
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            api_key,
            bucket,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let url = cfg
            .backend
            .rest_url
            .as_deref()
            .ok_or_else(|| anyhow!("backend.rest_url is not set"))?;
        let key = cfg
            .backend
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("backend.api_key is not set"))?;
        Self::new(url, key, cfg.backend.storage_bucket.clone())
    }

    /// `rest/v1/<table>` with `col=eq.value` filters.
    pub fn table_url(&self, table: Table, filters: &[(&str, &str)], select: Option<&str>) -> Result<Url> {
        let mut url = self
            .base_url
            .join(&format!("rest/v1/{}", table.as_str()))
            .context("invalid REST base URL")?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(select) = select {
                pairs.append_pair("select", select);
            }
            for (col, value) in filters {
                pairs.append_pair(col, &format!("eq.{value}"));
            }
        }
        Ok(url)
    }

    fn object_url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(&format!("storage/v1/object/{}/{}", self.bucket, path))
            .context("invalid storage URL")
    }

    pub fn build_request(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        prefer: Option<&str>,
    ) -> Result<reqwest::Request> {
        let mut req = self
            .http
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(prefer) = prefer {
            req = req.header("Prefer", prefer);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req.build().context("failed to build REST request")
    }

    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response> {
        debug!(method = %request.method(), url = %request.url(), "sending rest request");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach backend")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from backend: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("backend error {}: {}", status, body));
        }
        Ok(res)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        filters: &[(&str, &str)],
        select: Option<&str>,
    ) -> Result<Vec<T>> {
        let url = self.table_url(table, filters, select)?;
        let request = self.build_request(Method::GET, url, None, None)?;
        let res = self.execute(request).await?;
        res.json()
            .await
            .with_context(|| format!("invalid {} payload", table.as_str()))
    }

    async fn write(&self, method: Method, record: &Record, prefer: Prefer) -> Result<()> {
        let table = record.table();
        let body = record_json(record)?;
        let url = if method == Method::POST {
            self.table_url(table, &[], None)?
        } else {
            self.table_url(table, &[(table.key_column(), record.key())], None)?
        };
        let request = self.build_request(method, url, Some(&body), Some(prefer.header()))?;
        self.execute(request).await?;
        Ok(())
    }
}

/// Row body for a write. Nested collections are stored in their own tables
/// and the embedded master profile is sent as its foreign key.
pub fn record_json(record: &Record) -> Result<Value> {
    let mut value = match record {
        Record::Campaign(v) => serde_json::to_value(v)?,
        Record::BudgetAllocation(v) => serde_json::to_value(v)?,
        Record::KolProfile(v) => serde_json::to_value(v)?,
        Record::CampaignKol(v) => serde_json::to_value(v)?,
        Record::Content(v) => serde_json::to_value(v)?,
        Record::Payment(v) => serde_json::to_value(v)?,
        Record::Update(v) => serde_json::to_value(v)?,
        Record::ReportFile(v) => serde_json::to_value(v)?,
        Record::Report(v) => serde_json::to_value(v)?,
    };
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("row did not serialize to an object"))?;
    match record {
        Record::Campaign(_) => {
            obj.remove("budget_allocations");
        }
        Record::CampaignKol(ck) => {
            obj.remove("master_kol");
            obj.insert("master_kol_id".into(), Value::String(ck.master_kol.id.clone()));
        }
        _ => {}
    }
    Ok(value)
}

#[async_trait]
impl CampaignStore for RestStore {
    #[instrument(skip_all)]
    async fn load_campaign(&self, campaign_id: &str) -> Result<CampaignSnapshot> {
        let by_id = [("id", campaign_id)];
        let by_campaign = [("campaign_id", campaign_id)];

        let mut campaigns: Vec<Campaign> = self.select(Table::Campaigns, &by_id, None).await?;
        let mut campaign = campaigns
            .pop()
            .ok_or_else(|| anyhow!("campaign {} not found", campaign_id))?;
        let allocations: Vec<BudgetAllocation> =
            self.select(Table::BudgetAllocations, &by_campaign, None).await?;
        campaign.budget_allocations = allocations;

        let kols: Vec<CampaignKol> = self
            .select(Table::CampaignKols, &by_campaign, Some("*,master_kol:kols(*)"))
            .await?;
        let contents: Vec<Content> = self.select(Table::Contents, &by_campaign, None).await?;
        let payments: Vec<Payment> = self.select(Table::Payments, &by_campaign, None).await?;
        let updates: Vec<CampaignUpdate> = self.select(Table::CampaignUpdates, &by_campaign, None).await?;
        let report_files: Vec<ReportFile> = self.select(Table::ReportFiles, &by_campaign, None).await?;
        let mut reports: Vec<CampaignReport> = self.select(Table::Reports, &by_campaign, None).await?;

        Ok(CampaignSnapshot {
            campaign,
            kols,
            contents,
            payments,
            updates,
            report_files,
            report: reports.pop(),
        })
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let url = self
            .base_url
            .join("rest/v1/users")
            .context("invalid REST base URL")?;
        let request = self.build_request(Method::GET, url, None, None)?;
        let res = self.execute(request).await?;
        res.json().await.context("invalid users payload")
    }

    async fn list_available_kols(&self, campaign_id: &str) -> Result<Vec<KolProfile>> {
        let taken: Vec<Value> = self
            .select(Table::CampaignKols, &[("campaign_id", campaign_id)], Some("master_kol_id"))
            .await?;
        let taken: Vec<&str> = taken
            .iter()
            .filter_map(|v| v.get("master_kol_id").and_then(Value::as_str))
            .collect();
        let all: Vec<KolProfile> = self.select(Table::Kols, &[], None).await?;
        Ok(all
            .into_iter()
            .filter(|k| !taken.contains(&k.id.as_str()))
            .collect())
    }

    #[instrument(skip_all, fields(table = record.table().as_str()))]
    async fn insert(&self, record: &Record) -> Result<()> {
        let prefer = match record {
            Record::Report(_) => Prefer::Upsert,
            _ => Prefer::Minimal,
        };
        self.write(Method::POST, record, prefer).await
    }

    #[instrument(skip_all, fields(table = record.table().as_str()))]
    async fn update(&self, record: &Record) -> Result<()> {
        match record {
            Record::Report(_) => self.write(Method::POST, record, Prefer::Upsert).await,
            _ => self.write(Method::PATCH, record, Prefer::Minimal).await,
        }
    }

    #[instrument(skip_all, fields(table = table.as_str()))]
    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        let url = self.table_url(table, &[(table.key_column(), key)], None)?;
        let request = self.build_request(Method::DELETE, url, None, None)?;
        self.execute(request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn upload_file(&self, campaign_id: &str, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let path = format!("{}/{}", campaign_id, file_name.replace('/', "_"));
        let url = self.object_url(&path)?;
        let request = self
            .http
            .post(url.clone())
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/octet-stream")
            .header("x-upsert", "true")
            .body(bytes)
            .build()
            .context("failed to build upload request")?;
        self.execute(request).await?;
        let public = self
            .base_url
            .join(&format!("storage/v1/object/public/{}/{}", self.bucket, path))
            .context("invalid storage URL")?;
        Ok(public.to_string())
    }

    #[instrument(skip_all)]
    async fn remove_file(&self, file_url: &str) -> Result<()> {
        let marker = format!("/storage/v1/object/public/{}/", self.bucket);
        let path = file_url
            .split_once(&marker)
            .map(|(_, p)| p)
            .ok_or_else(|| anyhow!("{} is not in bucket {}", file_url, self.bucket))?;
        let url = self.object_url(path)?;
        let request = self.build_request(Method::DELETE, url, None, None)?;
        self.execute(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HhStatus;

    fn store() -> RestStore {
        RestStore::new(
            "https://demo.supabase.co",
            "anon-key".into(),
            "campaign-reports".into(),
        )
        .unwrap()
    }

    #[test]
    fn table_url_encodes_filters() {
        let url = store()
            .table_url(
                Table::CampaignKols,
                &[("campaign_id", "c 1")],
                Some("*,master_kol:kols(*)"),
            )
            .unwrap();
        assert_eq!(url.path(), "/rest/v1/campaign_kols");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("select".to_string(), "*,master_kol:kols(*)".to_string()),
                ("campaign_id".to_string(), "eq.c 1".to_string()),
            ]
        );
    }

    #[test]
    fn reports_are_keyed_by_campaign() {
        let url = store()
            .table_url(Table::Reports, &[(Table::Reports.key_column(), "c1")], None)
            .unwrap();
        assert_eq!(url.query(), Some("campaign_id=eq.c1"));
    }

    #[test]
    fn build_request_sets_headers() {
        let s = store();
        let url = s.table_url(Table::Payments, &[], None).unwrap();
        let body = serde_json::json!({ "id": "p1" });
        let request = s
            .build_request(Method::POST, url, Some(&body), Some(Prefer::Minimal.header()))
            .unwrap();
        assert_eq!(request.method(), Method::POST);
        let headers = request.headers();
        let get = |name: &str| headers.get(name).and_then(|h| h.to_str().ok()).unwrap().to_string();
        assert_eq!(get("apikey"), "anon-key");
        assert_eq!(get("Authorization"), "Bearer anon-key");
        assert_eq!(get("Content-Type"), "application/json");
        assert_eq!(get("Prefer"), "return=minimal");
    }

    #[test]
    fn campaign_kol_body_uses_foreign_key() {
        let ck = CampaignKol {
            id: "ck1".into(),
            campaign_id: "c1".into(),
            master_kol: KolProfile {
                id: "k1".into(),
                name: "Alice".into(),
                ..Default::default()
            },
            hh_status: Some(HhStatus::Interested),
            ..Default::default()
        };
        let body = record_json(&Record::CampaignKol(ck)).unwrap();
        assert_eq!(body["master_kol_id"], "k1");
        assert!(body.get("master_kol").is_none());
        assert_eq!(body["hh_status"], "Interested");
    }

    #[test]
    fn campaign_body_flattens_flags_and_drops_allocations() {
        let campaign = Campaign {
            id: "c1".into(),
            budget_allocations: vec![BudgetAllocation::default()],
            ..Default::default()
        };
        let body = record_json(&Record::Campaign(campaign)).unwrap();
        assert!(body.get("budget_allocations").is_none());
        assert_eq!(body["nda_signed"], false);
    }

    #[test]
    fn campaign_kol_row_with_embedded_profile_decodes() {
        let row = serde_json::json!({
            "id": "ck1",
            "campaign_id": "c1",
            "master_kol_id": "k1",
            "hh_status": "Onboarded",
            "allocated_budget": 500.0,
            "paid": 0,
            "master_kol": { "id": "k1", "name": "Alice", "platform": ["X"], "followers": 1200 }
        });
        let ck: CampaignKol = serde_json::from_value(row).unwrap();
        assert_eq!(ck.name(), "Alice");
        assert_eq!(ck.master_kol.platform, vec!["X".to_string()]);
        assert_eq!(ck.hh_status, Some(HhStatus::Onboarded));
    }

    #[test]
    fn rows_with_null_columns_decode() {
        let rows = serde_json::json!([{
            "id": "ck1",
            "campaign_id": "c1",
            "master_kol_id": "k1",
            "hh_status": null,
            "allocated_budget": null,
            "paid": null,
            "master_kol": {
                "id": "k1",
                "name": "Alice",
                "platform": null,
                "creator_type": null,
                "followers": null
            }
        }]);
        let kols: Vec<CampaignKol> = serde_json::from_value(rows).unwrap();
        assert_eq!(kols[0].paid, 0.0);
        assert!(kols[0].master_kol.platform.is_empty());
        assert_eq!(kols[0].hh_status, None);

        let campaign: Campaign = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "Launch",
            "budget_type": null,
            "total_budget": null
        }))
        .unwrap();
        assert!(campaign.budget_type.is_empty());
        assert_eq!(campaign.total_budget, 0.0);
    }
}
