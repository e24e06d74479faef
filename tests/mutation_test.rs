use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use kolboard::model::{
    Campaign, CampaignKol, CampaignSnapshot, CampaignStatus, Content, HhStatus, KolProfile,
    Payment, PaymentMethod, User,
};
use kolboard::mutation::{self, MutationError, PaymentTemplate};
use kolboard::state::{Action, AppState, ContentEdit, KolEdit, ProfileEdit, ToastLevel};
use kolboard::store::{CampaignStore, Record, Table};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Insert(Record),
    Update(Record),
    Delete(Table, String),
    Upload(String),
    Remove(String),
}

/// Store double that records every call and rejects writes whose key,
/// owning KOL or table name is listed in `fail`, plus the insert whose
/// zero-based position is `fail_insert_at`.
#[derive(Clone, Default)]
struct RecordingStore {
    fail: HashSet<String>,
    fail_insert_at: Option<usize>,
    snapshots: HashMap<String, CampaignSnapshot>,
    load_delay: HashMap<String, u64>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingStore {
    fn failing(keys: &[&str]) -> Self {
        Self {
            fail: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    fn should_fail(&self, record: &Record) -> bool {
        if self.fail.contains(record.key()) || self.fail.contains(record.table().as_str()) {
            return true;
        }
        match record {
            Record::Payment(p) => self.fail.contains(&p.campaign_kol_id),
            _ => false,
        }
    }

    async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl CampaignStore for RecordingStore {
    async fn load_campaign(&self, campaign_id: &str) -> Result<CampaignSnapshot> {
        if let Some(ms) = self.load_delay.get(campaign_id) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        self.snapshots
            .get(campaign_id)
            .cloned()
            .ok_or_else(|| anyhow!("campaign {campaign_id} not found"))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(vec![User {
            id: "u1".into(),
            name: "Operator".into(),
            email: None,
        }])
    }

    async fn list_available_kols(&self, _campaign_id: &str) -> Result<Vec<KolProfile>> {
        Ok(Vec::new())
    }

    async fn insert(&self, record: &Record) -> Result<()> {
        let position = {
            let mut calls = self.calls.lock().await;
            let position = calls.iter().filter(|c| matches!(c, Call::Insert(_))).count();
            calls.push(Call::Insert(record.clone()));
            position
        };
        if self.should_fail(record) || self.fail_insert_at == Some(position) {
            return Err(anyhow!("backend rejected {}", record.key()));
        }
        Ok(())
    }

    async fn update(&self, record: &Record) -> Result<()> {
        self.calls.lock().await.push(Call::Update(record.clone()));
        if self.should_fail(record) {
            return Err(anyhow!("backend rejected {}", record.key()));
        }
        Ok(())
    }

    async fn delete(&self, table: Table, key: &str) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(Call::Delete(table, key.to_string()));
        if self.fail.contains(key) {
            return Err(anyhow!("backend rejected {key}"));
        }
        Ok(())
    }

    async fn upload_file(&self, campaign_id: &str, file_name: &str, _bytes: Vec<u8>) -> Result<String> {
        let url = format!("mem://{campaign_id}/{file_name}");
        self.calls.lock().await.push(Call::Upload(url.clone()));
        Ok(url)
    }

    async fn remove_file(&self, file_url: &str) -> Result<()> {
        self.calls
            .lock()
            .await
            .push(Call::Remove(file_url.to_string()));
        Ok(())
    }
}

fn kol(id: &str, name: &str, budget: f64) -> CampaignKol {
    CampaignKol {
        id: id.into(),
        campaign_id: "c1".into(),
        master_kol: KolProfile {
            id: format!("k-{id}"),
            name: name.into(),
            platform: vec!["X".into()],
            ..Default::default()
        },
        hh_status: Some(HhStatus::Curated),
        allocated_budget: Some(budget),
        ..Default::default()
    }
}

fn fixture() -> CampaignSnapshot {
    CampaignSnapshot {
        campaign: Campaign {
            id: "c1".into(),
            name: "Launch".into(),
            status: Some(CampaignStatus::Active),
            total_budget: 5000.0,
            ..Default::default()
        },
        kols: vec![
            kol("ck1", "Alice", 1000.0),
            kol("ck2", "Bob", 500.0),
            kol("ck3", "Cara", 250.0),
        ],
        payments: vec![Payment {
            id: "p1".into(),
            campaign_id: "c1".into(),
            campaign_kol_id: "ck1".into(),
            amount: Some(400.0),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn last_toast(state: &AppState) -> (ToastLevel, String) {
    let t = state.toasts.last().expect("a toast");
    (t.level, t.message.clone())
}

#[tokio::test]
async fn failed_write_restores_previous_state() {
    let store = RecordingStore::failing(&["ck1"]);
    let mut state = AppState::from_snapshot(fixture());
    let before = state.clone();

    let action = state
        .kol_edit("ck1", KolEdit::Notes(Some("call on Tuesday".into())))
        .unwrap();
    let err = mutation::dispatch(&mut state, &store, action).await.unwrap_err();
    assert!(matches!(err, MutationError::Remote { subject: "KOL", .. }));

    let (level, message) = last_toast(&state);
    assert_eq!(level, ToastLevel::Error);
    assert!(message.contains("backend rejected ck1"));

    state.toasts.clear();
    assert_eq!(state, before);
}

#[tokio::test]
async fn follower_edit_reverts_when_profile_write_fails() {
    let store = RecordingStore::failing(&["k-ck2"]);
    let mut state = AppState::from_snapshot(fixture());
    let before = state.clone();

    let action = state
        .profile_edit("ck2", ProfileEdit::Followers(Some(48_000)))
        .unwrap();
    let err = mutation::dispatch(&mut state, &store, action).await.unwrap_err();
    assert!(matches!(err, MutationError::Remote { subject: "KOL profile", .. }));
    assert_eq!(state.kol("ck2").unwrap().master_kol.followers, None);
    state.toasts.clear();
    assert_eq!(state, before);

    let ok = RecordingStore::default();
    let action = state
        .profile_edit("ck2", ProfileEdit::Followers(Some(48_000)))
        .unwrap();
    mutation::dispatch(&mut state, &ok, action).await.unwrap();
    assert_eq!(state.kol("ck2").unwrap().master_kol.followers, Some(48_000));
    match &ok.calls().await[..] {
        [Call::Update(Record::KolProfile(p))] => assert_eq!(p.followers, Some(48_000)),
        other => panic!("unexpected calls {other:?}"),
    }
}

#[tokio::test]
async fn content_edit_reverts_when_write_fails() {
    let store = RecordingStore::failing(&["ct1"]);
    let mut snap = fixture();
    snap.contents.push(Content {
        id: "ct1".into(),
        campaign_id: "c1".into(),
        campaign_kols_id: "ck1".into(),
        impressions: Some(1200),
        ..Default::default()
    });
    let mut state = AppState::from_snapshot(snap);
    let before = state.clone();

    let action = state
        .content_edit("ct1", ContentEdit::Impressions(Some(9000)))
        .unwrap();
    let err = mutation::dispatch(&mut state, &store, action).await.unwrap_err();
    assert!(matches!(err, MutationError::Remote { subject: "content", .. }));
    assert_eq!(last_toast(&state).0, ToastLevel::Error);
    state.toasts.clear();
    assert_eq!(state, before);

    assert!(state.content_edit("missing", ContentEdit::Likes(Some(1))).is_err());
}

#[tokio::test]
async fn failed_payment_insert_keeps_paid() {
    let store = RecordingStore::failing(&["p-new"]);
    let mut state = AppState::from_snapshot(fixture());
    let before = state.clone();

    let res = mutation::dispatch(
        &mut state,
        &store,
        Action::AddPayment(Payment {
            id: "p-new".into(),
            campaign_id: "c1".into(),
            campaign_kol_id: "ck1".into(),
            amount: Some(200.0),
            ..Default::default()
        }),
    )
    .await;
    assert!(res.is_err());
    assert_eq!(state.kol("ck1").unwrap().paid, 400.0);
    state.toasts.clear();
    assert_eq!(state, before);
}

#[tokio::test]
async fn payment_write_persists_rederived_paid() {
    let store = RecordingStore::default();
    let mut state = AppState::from_snapshot(fixture());

    let payment = Payment {
        id: "p2".into(),
        campaign_id: "c1".into(),
        campaign_kol_id: "ck1".into(),
        amount: Some(200.0),
        ..Default::default()
    };
    mutation::dispatch(&mut state, &store, Action::AddPayment(payment.clone()))
        .await
        .unwrap();

    assert_eq!(state.kol("ck1").unwrap().paid, 600.0);
    let calls = store.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], Call::Insert(Record::Payment(payment)));
    match &calls[1] {
        Call::Update(Record::CampaignKol(k)) => {
            assert_eq!(k.id, "ck1");
            assert_eq!(k.paid, 600.0);
        }
        other => panic!("unexpected call {other:?}"),
    }
    assert_eq!(last_toast(&state), (ToastLevel::Success, "Payment added".into()));
}

#[tokio::test]
async fn deleting_payment_zeroes_paid() {
    let store = RecordingStore::default();
    let mut state = AppState::from_snapshot(fixture());
    mutation::dispatch(&mut state, &store, Action::DeletePayment("p1".into()))
        .await
        .unwrap();
    assert_eq!(state.kol("ck1").unwrap().paid, 0.0);
    let calls = store.calls().await;
    assert_eq!(calls[0], Call::Delete(Table::Payments, "p1".into()));
}

#[tokio::test]
async fn completion_blocked_before_any_write() {
    let store = RecordingStore::default();
    let mut state = AppState::from_snapshot(fixture());
    let mut campaign = state.campaign.clone();
    campaign.status = Some(CampaignStatus::Completed);

    let err = mutation::dispatch(&mut state, &store, Action::SaveCampaign(campaign))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Rejected(_)));
    assert!(store.calls().await.is_empty());
    assert_eq!(state.campaign.status, Some(CampaignStatus::Active));
}

#[tokio::test]
async fn bulk_status_reverts_only_the_failed_item() {
    let store = RecordingStore::failing(&["ck2"]);
    let mut state = AppState::from_snapshot(fixture());
    let ids: Vec<String> = ["ck1", "ck2", "ck3"].iter().map(|s| s.to_string()).collect();

    let report =
        mutation::bulk_update_status(&mut state, &store, &ids, Some(HhStatus::Onboarded), 2).await;

    assert_eq!(report.failed_ids(), vec!["ck2"]);
    assert_eq!(report.succeeded, vec!["ck1".to_string(), "ck3".to_string()]);
    assert_eq!(state.kol("ck1").unwrap().hh_status, Some(HhStatus::Onboarded));
    assert_eq!(state.kol("ck2").unwrap().hh_status, Some(HhStatus::Curated));
    assert_eq!(state.kol("ck3").unwrap().hh_status, Some(HhStatus::Onboarded));
    assert_eq!(
        last_toast(&state),
        (ToastLevel::Error, "Updated 2 item(s), 1 failed".into())
    );
}

#[tokio::test]
async fn bulk_status_reports_unknown_ids() {
    let store = RecordingStore::default();
    let mut state = AppState::from_snapshot(fixture());
    let ids = vec!["ck1".to_string(), "ghost".to_string()];

    let report = mutation::bulk_update_status(&mut state, &store, &ids, None, 4).await;
    assert_eq!(report.succeeded, vec!["ck1".to_string()]);
    assert_eq!(report.failed_ids(), vec!["ghost"]);
    assert_eq!(state.kol("ck1").unwrap().hh_status, None);
}

#[tokio::test]
async fn bulk_payment_method_restores_failed_rows() {
    let store = RecordingStore::failing(&["p2"]);
    let mut snap = fixture();
    snap.payments.push(Payment {
        id: "p2".into(),
        campaign_id: "c1".into(),
        campaign_kol_id: "ck2".into(),
        amount: Some(50.0),
        payment_method: Some(PaymentMethod::Fiat),
        ..Default::default()
    });
    let mut state = AppState::from_snapshot(snap);
    let ids = vec!["p1".to_string(), "p2".to_string()];

    let report = mutation::bulk_update_payment_method(
        &mut state,
        &store,
        &ids,
        Some(PaymentMethod::Token),
        4,
    )
    .await;
    assert_eq!(report.failed_ids(), vec!["p2"]);
    assert_eq!(state.payment("p1").unwrap().payment_method, Some(PaymentMethod::Token));
    assert_eq!(state.payment("p2").unwrap().payment_method, Some(PaymentMethod::Fiat));
    assert_eq!(state.kol("ck2").unwrap().paid, 50.0);
}

#[tokio::test]
async fn create_payments_keeps_successful_rows_only() {
    let store = RecordingStore::failing(&["ck2"]);
    let mut state = AppState::from_snapshot(fixture());
    let ids = vec!["ck1".to_string(), "ck2".to_string()];

    let report = mutation::create_payments_for_kols(
        &mut state,
        &store,
        &ids,
        PaymentTemplate {
            amount: Some(100.0),
            payment_method: Some(PaymentMethod::Token),
            ..Default::default()
        },
        2,
    )
    .await;

    assert_eq!(report.succeeded, vec!["ck1".to_string()]);
    assert_eq!(report.failed_ids(), vec!["ck2"]);
    assert_eq!(state.payments.len(), 2);
    assert_eq!(state.kol("ck1").unwrap().paid, 500.0);
    assert_eq!(state.kol("ck2").unwrap().paid, 0.0);

    let synced: Vec<f64> = store
        .calls()
        .await
        .into_iter()
        .filter_map(|c| match c {
            Call::Update(Record::CampaignKol(k)) if k.id == "ck1" => Some(k.paid),
            _ => None,
        })
        .collect();
    assert_eq!(synced, vec![500.0]);
}

#[tokio::test]
async fn bulk_status_with_repeated_id_restores_the_original_row() {
    let store = RecordingStore::failing(&["ck2"]);
    let mut state = AppState::from_snapshot(fixture());
    let ids = vec!["ck2".to_string(), "ck2".to_string(), "ck1".to_string()];

    let report =
        mutation::bulk_update_status(&mut state, &store, &ids, Some(HhStatus::Onboarded), 2).await;

    assert_eq!(report.failed_ids(), vec!["ck2"]);
    assert_eq!(report.succeeded, vec!["ck1".to_string()]);
    assert_eq!(state.kol("ck2").unwrap().hh_status, Some(HhStatus::Curated));
    assert_eq!(state.kol("ck1").unwrap().hh_status, Some(HhStatus::Onboarded));
    assert_eq!(store.calls().await.len(), 2);
}

#[tokio::test]
async fn bulk_payment_method_with_repeated_id_restores_the_original_row() {
    let store = RecordingStore::failing(&["p1"]);
    let mut state = AppState::from_snapshot(fixture());
    let ids = vec!["p1".to_string(), "p1".to_string()];

    let report = mutation::bulk_update_payment_method(
        &mut state,
        &store,
        &ids,
        Some(PaymentMethod::Fiat),
        1,
    )
    .await;
    assert_eq!(report.failed_ids(), vec!["p1"]);
    assert_eq!(state.payment("p1").unwrap().payment_method, None);
}

#[tokio::test]
async fn create_payments_with_repeated_kol_keeps_the_landed_payment() {
    let store = RecordingStore {
        fail_insert_at: Some(1),
        ..Default::default()
    };
    let mut state = AppState::from_snapshot(fixture());
    let ids = vec!["ck2".to_string(), "ck2".to_string()];

    let report = mutation::create_payments_for_kols(
        &mut state,
        &store,
        &ids,
        PaymentTemplate {
            amount: Some(75.0),
            ..Default::default()
        },
        1,
    )
    .await;

    assert_eq!(report.succeeded, vec!["ck2".to_string()]);
    assert_eq!(report.failed_ids(), vec!["ck2"]);
    let landed: Vec<&Payment> = state
        .payments
        .iter()
        .filter(|p| p.campaign_kol_id == "ck2")
        .collect();
    assert_eq!(landed.len(), 1);
    assert_eq!(state.kol("ck2").unwrap().paid, 75.0);

    let synced: Vec<f64> = store
        .calls()
        .await
        .into_iter()
        .filter_map(|c| match c {
            Call::Update(Record::CampaignKol(k)) if k.id == "ck2" => Some(k.paid),
            _ => None,
        })
        .collect();
    assert_eq!(synced, vec![75.0]);
}

#[tokio::test]
async fn add_content_spawns_zero_payment() {
    let store = RecordingStore::default();
    let mut state = AppState::from_snapshot(fixture());
    let content = Content {
        id: "ct1".into(),
        campaign_id: "c1".into(),
        campaign_kols_id: "ck2".into(),
        platform: Some("X".into()),
        ..Default::default()
    };

    mutation::add_content(&mut state, &store, content, true)
        .await
        .unwrap();
    assert_eq!(state.contents.len(), 1);
    let spawned = state
        .payments
        .iter()
        .find(|p| p.content_id.as_deref() == Some("ct1"))
        .unwrap();
    assert_eq!(spawned.amount, Some(0.0));
    assert_eq!(spawned.campaign_kol_id, "ck2");
    assert_eq!(state.kol("ck2").unwrap().paid, 0.0);
}

#[tokio::test]
async fn add_kols_drops_rows_that_failed_to_insert() {
    let store = RecordingStore::failing(&["campaign_kols"]);
    let mut state = AppState::from_snapshot(fixture());
    let profiles = vec![KolProfile {
        id: "k-new".into(),
        name: "Dana".into(),
        ..Default::default()
    }];
    let report = mutation::add_kols(&mut state, &store, profiles, 2).await;
    assert_eq!(report.failed.len(), 1);
    assert_eq!(state.kols.len(), 3);
}

#[tokio::test]
async fn failed_attachment_row_removes_upload() {
    let store = RecordingStore::failing(&["campaign_report_files"]);
    let mut state = AppState::from_snapshot(fixture());

    let res = mutation::upload_report_file(&mut state, &store, "deck.pdf", b"%PDF".to_vec()).await;
    assert!(res.is_err());
    assert!(state.report_files.is_empty());
    let calls = store.calls().await;
    assert!(calls.contains(&Call::Upload("mem://c1/deck.pdf".into())));
    assert!(calls.contains(&Call::Remove("mem://c1/deck.pdf".into())));
}

#[tokio::test]
async fn slower_stale_load_is_discarded() {
    let mut older = fixture();
    older.campaign.id = "old".into();
    older.campaign.name = "Old".into();
    let mut newer = fixture();
    newer.campaign.id = "new".into();
    newer.campaign.name = "New".into();

    let store = RecordingStore {
        snapshots: HashMap::from([("old".to_string(), older), ("new".to_string(), newer)]),
        load_delay: HashMap::from([("old".to_string(), 50)]),
        ..Default::default()
    };
    let state = Mutex::new(AppState::default());

    {
        let old = mutation::load_campaign(&state, &store, "old");
        tokio::pin!(old);
        // start the slow load so it holds the older ticket
        assert!(futures::poll!(old.as_mut()).is_pending());

        let second = mutation::load_campaign(&state, &store, "new").await.unwrap();
        let first = old.await.unwrap();
        assert!(second);
        assert!(!first);
    }

    let state = state.into_inner();
    assert_eq!(state.campaign.name, "New");
    assert_eq!(state.users.len(), 1);
    assert_eq!(state.kol("ck1").unwrap().paid, 400.0);
}
