use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::Mutex;

use kolboard::config;
use kolboard::model::HhStatus;
use kolboard::mutation;
use kolboard::state::AppState;
use kolboard::store;

#[derive(Debug, Parser)]
#[command(about = "Move several campaign KOLs to a new pipeline status")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long)]
    campaign: String,

    /// Target status; omit together with --clear to unset
    #[arg(long, value_parser = parse_status, required_unless_present = "clear")]
    status: Option<HhStatus>,

    /// Unset the status instead of assigning one
    #[arg(long, conflicts_with = "status")]
    clear: bool,

    /// Campaign-KOL ids to update (repeatable)
    #[arg(long = "kol")]
    kols: Vec<String>,

    /// Select every KOL currently in this status
    #[arg(long, value_parser = parse_status)]
    from: Option<HhStatus>,
}

fn parse_status(s: &str) -> Result<HhStatus, String> {
    HhStatus::parse_status(s).ok_or_else(|| format!("unknown status '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    kolboard::init_tracing();
    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    let store = store::connect(&cfg).await?;

    let state = Mutex::new(AppState::default());
    if !mutation::load_campaign(&state, store.as_ref(), &args.campaign).await? {
        return Err(anyhow!("campaign load was superseded"));
    }
    let mut state = state.into_inner();

    let mut ids = args.kols.clone();
    if let Some(from) = args.from {
        ids.extend(
            state
                .kols
                .iter()
                .filter(|k| k.hh_status == Some(from))
                .map(|k| k.id.clone()),
        );
    }
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Err(anyhow!("no KOLs selected; pass --kol or --from"));
    }

    let target = if args.clear { None } else { args.status };
    let report = mutation::bulk_update_status(
        &mut state,
        store.as_ref(),
        &ids,
        target,
        cfg.app.bulk_concurrency,
    )
    .await;

    println!("{}", report.summary("Updated"));
    for f in &report.failed {
        println!("  failed {}: {}", f.id, f.error);
    }
    if !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
