use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::Mutex;

use kolboard::config;
use kolboard::mutation;
use kolboard::state::AppState;
use kolboard::store;

#[derive(Debug, Parser)]
#[command(about = "List fields that still need filling in before a campaign can be completed")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long)]
    campaign: String,
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
    let state = state.into_inner();

    let missing = state.missing_fields();
    if missing.is_empty() {
        println!("{}: nothing missing", state.campaign.name);
        return Ok(());
    }
    println!("{}: {} item(s) need attention", state.campaign.name, missing.len());
    for m in &missing {
        println!("  [{}] {}", m.tab.as_str(), m.label);
    }
    std::process::exit(1);
}
