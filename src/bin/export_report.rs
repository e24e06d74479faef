use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use kolboard::config;
use kolboard::mutation;
use kolboard::report::{build_public_report, render_html};
use kolboard::state::AppState;
use kolboard::store;

#[derive(Debug, Parser)]
#[command(about = "Render a campaign's public report to a static HTML file")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long)]
    campaign: String,

    /// Also write the report data as JSON next to the HTML
    #[arg(long)]
    json: bool,
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

    let report = build_public_report(&state, &cfg.report.title_prefix).ok_or_else(|| {
        anyhow!(
            "campaign '{}' is not shared publicly; enable sharing first",
            state.campaign.name
        )
    })?;

    let out_dir = PathBuf::from(&cfg.report.output_dir);
    tokio::fs::create_dir_all(&out_dir)
        .await
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let html_path = out_dir.join(format!("{}.html", args.campaign));
    tokio::fs::write(&html_path, render_html(&report))
        .await
        .with_context(|| format!("failed to write {}", html_path.display()))?;
    println!("Wrote {}", absolute_path(&html_path).display());

    if args.json {
        let json_path = out_dir.join(format!("{}.json", args.campaign));
        let body = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(&json_path, body)
            .await
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        println!("Wrote {}", absolute_path(&json_path).display());
    }
    Ok(())
}

fn absolute_path(p: &Path) -> PathBuf {
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(p),
        Err(_) => p.to_path_buf(),
    }
}
