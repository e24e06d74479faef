use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{info, warn};

use kolboard::aggregate::dashboard_stats;
use kolboard::config;
use kolboard::filter::{ContentFilter, HasContent, KolFilter, NumericFilter, PaymentFilter};
use kolboard::format::{format_currency, format_followers, format_percent};
use kolboard::model::{options, ContentStatus, HhStatus, PaymentMethod};
use kolboard::mutation;
use kolboard::state::{AppState, UiAction};
use kolboard::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    Kols,
    Contents,
    Payments,
    Stats,
    /// Field option lists offered by the pickers
    Options,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Print a filtered view of one campaign")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Campaign id to load; not needed for `--view options`
    #[arg(long)]
    campaign: Option<String>,

    #[arg(long, value_enum, default_value_t = View::Kols)]
    view: View,

    /// Free-text search for the selected view
    #[arg(long, default_value = "")]
    search: String,

    /// Platform (repeatable; OR within the list)
    #[arg(long)]
    platform: Vec<String>,

    /// KOL region (repeatable)
    #[arg(long)]
    region: Vec<String>,

    /// KOL creator type (repeatable)
    #[arg(long)]
    creator_type: Vec<String>,

    /// KOL pipeline status (repeatable)
    #[arg(long = "status", value_parser = parse_hh_status)]
    hh_status: Vec<HhStatus>,

    /// Content status (repeatable)
    #[arg(long = "content-status", value_parser = parse_content_status)]
    content_status: Vec<ContentStatus>,

    /// Payment method (repeatable)
    #[arg(long = "method", value_parser = parse_method)]
    method: Vec<PaymentMethod>,

    /// Only payments with (`yes`) or without (`no`) linked content
    #[arg(long, value_parser = parse_has_content)]
    has_content: Option<HasContent>,

    /// Follower expression such as `>10000`
    #[arg(long, value_parser = parse_numeric)]
    followers: Option<NumericFilter>,

    /// Allocated budget expression
    #[arg(long, value_parser = parse_numeric)]
    budget: Option<NumericFilter>,

    /// Impressions expression for the content view
    #[arg(long, value_parser = parse_numeric)]
    impressions: Option<NumericFilter>,

    /// Amount expression for the payment view
    #[arg(long, value_parser = parse_numeric)]
    amount: Option<NumericFilter>,
}

fn parse_hh_status(s: &str) -> Result<HhStatus, String> {
    HhStatus::parse_status(s).ok_or_else(|| format!("unknown status '{s}'"))
}

fn parse_content_status(s: &str) -> Result<ContentStatus, String> {
    ContentStatus::parse_status(s).ok_or_else(|| format!("unknown content status '{s}'"))
}

fn parse_method(s: &str) -> Result<PaymentMethod, String> {
    PaymentMethod::parse_method(s).ok_or_else(|| format!("unknown payment method '{s}'"))
}

fn parse_has_content(s: &str) -> Result<HasContent, String> {
    match s.to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(HasContent::Yes),
        "no" | "false" => Ok(HasContent::No),
        "any" => Ok(HasContent::Any),
        _ => Err(format!("expected yes, no or any, got '{s}'")),
    }
}

fn parse_numeric(s: &str) -> Result<NumericFilter, String> {
    NumericFilter::parse_expr(s).ok_or_else(|| format!("expected <op><value> like '>1000', got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    kolboard::init_tracing();

    let args = Args::parse();
    if args.view == View::Options {
        print_options();
        return Ok(());
    }
    warn_unknown("platform", options::PLATFORMS, &args.platform);
    warn_unknown("region", options::REGIONS, &args.region);
    warn_unknown("creator type", options::CREATOR_TYPES, &args.creator_type);

    let campaign_id = args
        .campaign
        .clone()
        .ok_or_else(|| anyhow!("--campaign is required for this view"))?;
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let store = store::connect(&cfg).await?;
    let state = Mutex::new(AppState::default());
    if !mutation::load_campaign(&state, store.as_ref(), &campaign_id).await? {
        return Err(anyhow!("campaign load was superseded"));
    }
    let mut state = state.into_inner();
    info!(campaign = %state.campaign.name, "loaded");

    apply_filters(&mut state, &args);
    match args.view {
        View::Kols => print_kols(&state),
        View::Contents => print_contents(&state),
        View::Payments => print_payments(&state),
        View::Stats => print_stats(&state),
        View::Options => {}
    }
    Ok(())
}

fn apply_filters(state: &mut AppState, args: &Args) {
    let search = args.search.clone();
    match args.view {
        View::Kols => {
            state.apply_ui(UiAction::SetKolFilter(KolFilter {
                platform: args.platform.clone(),
                region: args.region.clone(),
                creator_type: args.creator_type.clone(),
                hh_status: args.hh_status.clone(),
                followers: args.followers.clone().unwrap_or_default(),
                budget: args.budget.clone().unwrap_or_default(),
                ..Default::default()
            }));
            state.apply_ui(UiAction::SetKolSearch(search));
        }
        View::Contents => {
            state.apply_ui(UiAction::SetContentFilter(ContentFilter {
                platform: args.platform.clone(),
                status: args.content_status.clone(),
                impressions: args.impressions.clone().unwrap_or_default(),
                ..Default::default()
            }));
            state.apply_ui(UiAction::SetContentSearch(search));
        }
        View::Payments => {
            state.apply_ui(UiAction::SetPaymentFilter(PaymentFilter {
                payment_methods: args.method.clone(),
                has_content: args.has_content.unwrap_or_default(),
                amount: args.amount.clone().unwrap_or_default(),
                ..Default::default()
            }));
            state.apply_ui(UiAction::SetPaymentSearch(search));
        }
        View::Stats | View::Options => {}
    }
}

/// Filter values are free text; flag ones no picker offers.
fn warn_unknown(field: &str, known: &[&str], values: &[String]) {
    for v in values {
        if !options::is_known(known, v) {
            warn!(field, value = %v, "not a known option; the filter may match nothing");
        }
    }
}

fn print_options() {
    for (name, list) in [
        ("Regions", options::REGIONS),
        ("Platforms", options::PLATFORMS),
        ("Creator types", options::CREATOR_TYPES),
        ("Content types", options::CONTENT_TYPES),
        ("Deliverables", options::DELIVERABLES),
        ("Budget types", options::BUDGET_TYPES),
    ] {
        println!("{name}: {}", list.join(", "));
    }
}

fn print_kols(state: &AppState) {
    let rows = state.filtered_kols();
    println!(
        "{:<24} {:<12} {:<18} {:>10} {:>12} {:>12}",
        "NAME", "STATUS", "PLATFORMS", "FOLLOWERS", "BUDGET", "PAID"
    );
    for k in &rows {
        println!(
            "{:<24} {:<12} {:<18} {:>10} {:>12} {:>12}",
            k.name(),
            k.hh_status.map(|s| s.as_str()).unwrap_or("-"),
            k.master_kol.platform.join(","),
            k.master_kol.followers.map(format_followers).unwrap_or_default(),
            k.allocated_budget.map(format_currency).unwrap_or_default(),
            format_currency(k.paid)
        );
    }
    println!("{} of {} KOLs", rows.len(), state.kols.len());
}

fn print_contents(state: &AppState) {
    let rows = state.filtered_contents();
    println!(
        "{:<24} {:<10} {:<12} {:<10} {:>12} {:>8}",
        "KOL", "PLATFORM", "TYPE", "STATUS", "IMPRESSIONS", "LIKES"
    );
    for c in &rows {
        let kol = state.kol(&c.campaign_kols_id).map(|k| k.name()).unwrap_or("-");
        println!(
            "{:<24} {:<10} {:<12} {:<10} {:>12} {:>8}",
            kol,
            c.platform.as_deref().unwrap_or("-"),
            c.content_type.as_deref().unwrap_or("-"),
            c.status.map(|s| s.as_str()).unwrap_or("-"),
            c.impressions.unwrap_or(0),
            c.likes.unwrap_or(0)
        );
    }
    println!("{} of {} content items", rows.len(), state.contents.len());
}

fn print_payments(state: &AppState) {
    let rows = state.filtered_payments();
    println!(
        "{:<24} {:>12} {:<8} {:<12} {:<10}",
        "KOL", "AMOUNT", "METHOD", "DATE", "CONTENT"
    );
    for p in &rows {
        let kol = state.kol(&p.campaign_kol_id).map(|k| k.name()).unwrap_or("-");
        println!(
            "{:<24} {:>12} {:<8} {:<12} {:<10}",
            kol,
            format_currency(p.amount.unwrap_or(0.0)),
            p.payment_method.map(|m| m.as_str()).unwrap_or("-"),
            p.payment_date.map(|d| d.to_string()).unwrap_or_default(),
            if p.content_id.is_some() { "linked" } else { "-" }
        );
    }
    println!("{} of {} payments", rows.len(), state.payments.len());
}

fn print_stats(state: &AppState) {
    let stats = dashboard_stats(&state.campaign, &state.kols, &state.contents, &state.payments);
    let b = &stats.budget;
    println!("Campaign: {}", state.campaign.name);
    println!("Total budget:     {}", format_currency(b.total_budget));
    println!("Region allocated: {}", format_currency(b.region_allocated));
    println!("KOL allocated:    {}", format_currency(b.kol_allocated));
    println!("Paid:             {}", format_currency(b.paid));
    println!("Unpaid:           {}", format_currency(b.unpaid));
    println!(
        "Utilisation:      {}",
        format_percent(b.paid, b.total_budget)
    );
    println!("KOLs by status:");
    for (status, n) in &stats.kols_by_status {
        println!("  {:<12} {}", status.as_str(), n);
    }
    if stats.kols_without_status > 0 {
        println!("  {:<12} {}", "(none)", stats.kols_without_status);
    }
    println!("Content by platform:");
    for (platform, n) in &stats.contents_by_platform {
        println!("  {:<12} {}", platform, n);
    }
    println!(
        "Engagement: {} impressions, {} interactions",
        format_followers(stats.engagement.impressions),
        format_followers(stats.engagement.interactions())
    );
    for (region, amount) in &stats.region_allocations {
        println!("  {:<12} {}", region, format_currency(*amount));
    }
}
