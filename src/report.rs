//! Shareable campaign report and its static HTML rendering.
use chrono::NaiveDate;
use reqwest::Url;
use serde::Serialize;

use crate::aggregate::{dashboard_stats, Engagement};
use crate::format::format_followers;
use crate::state::AppState;

const TOP_CONTENT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportKol {
    pub name: String,
    pub platforms: Vec<String>,
    pub followers: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportContent {
    pub kol_name: String,
    pub platform: Option<String>,
    pub link: Option<String>,
    pub activation_date: Option<NaiveDate>,
    pub impressions: i64,
    pub interactions: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportLink {
    pub name: String,
    pub url: String,
}

/// Public view of a campaign. Budget and payment detail stay private.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicReport {
    pub title: String,
    pub campaign_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub message: Option<String>,
    pub kol_count: usize,
    pub content_count: usize,
    pub posted_count: usize,
    pub engagement: Engagement,
    pub kols: Vec<ReportKol>,
    pub top_content: Vec<ReportContent>,
    pub files: Vec<ReportLink>,
}

fn is_shared(state: &AppState) -> bool {
    match &state.report {
        Some(r) => r.is_public,
        None => state.campaign.share_report_publicly,
    }
}

/// Build the report, or `None` while sharing is switched off.
pub fn build_public_report(state: &AppState, title_prefix: &str) -> Option<PublicReport> {
    if !is_shared(state) {
        return None;
    }
    let campaign = &state.campaign;
    let stats = dashboard_stats(campaign, &state.kols, &state.contents, &state.payments);
    let names = crate::filter::kol_name_index(&state.kols);

    let mut top: Vec<ReportContent> = state
        .contents
        .iter()
        .map(|c| ReportContent {
            kol_name: names
                .get(c.campaign_kols_id.as_str())
                .map(|n| n.to_string())
                .unwrap_or_default(),
            platform: c.platform.clone(),
            link: c.content_link.clone(),
            activation_date: c.activation_date,
            impressions: c.impressions.unwrap_or(0),
            interactions: c.likes.unwrap_or(0)
                + c.retweets.unwrap_or(0)
                + c.comments.unwrap_or(0)
                + c.bookmarks.unwrap_or(0),
        })
        .collect();
    top.sort_by(|a, b| {
        b.impressions
            .cmp(&a.impressions)
            .then(b.interactions.cmp(&a.interactions))
    });
    top.truncate(TOP_CONTENT);

    let message = state
        .report
        .as_ref()
        .and_then(|r| r.custom_message.clone())
        .or_else(|| campaign.report_message.clone())
        .filter(|m| !m.trim().is_empty());

    Some(PublicReport {
        title: format!("{} - {}", title_prefix, campaign.name),
        campaign_name: campaign.name.clone(),
        start_date: campaign.start_date,
        end_date: campaign.end_date,
        message,
        kol_count: state.kols.len(),
        content_count: state.contents.len(),
        posted_count: stats
            .contents_by_status
            .get(&crate::model::ContentStatus::Posted)
            .copied()
            .unwrap_or(0),
        engagement: stats.engagement,
        kols: state
            .kols
            .iter()
            .map(|k| ReportKol {
                name: k.name().to_string(),
                platforms: k.master_kol.platform.clone(),
                followers: k.master_kol.followers,
            })
            .collect(),
        top_content: top,
        files: state
            .report_files
            .iter()
            .map(|f| ReportLink {
                name: f.file_name.clone(),
                url: f.file_url.clone(),
            })
            .collect(),
    })
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn html_attr(s: &str) -> String {
    html_escape(s).replace('"', "&quot;")
}

/// Links are user-entered; only web URLs become anchors.
fn safe_href(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn link_or_text(href: Option<&str>, text: &str) -> String {
    match href.and_then(safe_href) {
        Some(url) => format!("<a href=\"{}\">{}</a>", html_attr(&url), html_escape(text)),
        None => html_escape(text),
    }
}

fn date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!("{s} to {e}"),
        (Some(s), None) => format!("from {s}"),
        (None, Some(e)) => format!("until {e}"),
        (None, None) => String::new(),
    }
}

pub fn render_html(report: &PublicReport) -> String {
    let mut cards = String::new();
    for (label, value) in [
        ("KOLs", report.kol_count.to_string()),
        ("Content", report.content_count.to_string()),
        ("Posted", report.posted_count.to_string()),
        ("Impressions", format_followers(report.engagement.impressions)),
        ("Interactions", format_followers(report.engagement.interactions())),
    ] {
        cards.push_str(&format!(
            "<div class=\"card\"><div class=\"label\">{}</div><div class=\"value\">{}</div></div>",
            label,
            html_escape(&value)
        ));
    }

    let mut kols = String::new();
    for k in &report.kols {
        kols.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            html_escape(&k.name),
            html_escape(&k.platforms.join(", ")),
            k.followers.map(format_followers).unwrap_or_default()
        ));
    }

    let mut content = String::new();
    for c in &report.top_content {
        let link = link_or_text(c.link.as_deref(), &c.kol_name);
        content.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            link,
            html_escape(c.platform.as_deref().unwrap_or("")),
            format_followers(c.impressions),
            format_followers(c.interactions)
        ));
    }

    let mut files = String::new();
    for f in &report.files {
        files.push_str(&format!(
            "<li>{}</li>\n",
            link_or_text(Some(f.url.as_str()), &f.name)
        ));
    }

    let message = report
        .message
        .as_deref()
        .map(|m| format!("<p class=\"message\">{}</p>", html_escape(m)))
        .unwrap_or_default();

    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>{style}</style>
  </head>
  <body>
    <header>
      <h1>{name}</h1>
      <p class="dates">{dates}</p>
      {message}
    </header>
    <main>
      <section class="cards">{cards}</section>
      <h2>KOLs</h2>
      <table><thead><tr><th>Name</th><th>Platforms</th><th>Followers</th></tr></thead>
      <tbody>
{kols}      </tbody></table>
      <h2>Top content</h2>
      <table><thead><tr><th>KOL</th><th>Platform</th><th>Impressions</th><th>Interactions</th></tr></thead>
      <tbody>
{content}      </tbody></table>
      <h2>Files</h2>
      <ul>
{files}      </ul>
    </main>
  </body>
</html>"#,
        title = html_escape(&report.title),
        style = DEFAULT_STYLE,
        name = html_escape(&report.campaign_name),
        dates = date_range(report.start_date, report.end_date),
        message = message,
        cards = cards,
        kols = kols,
        content = content,
        files = files,
    )
}

const DEFAULT_STYLE: &str = r#"
:root { color-scheme: light dark; --fg: #222; --bg: #fff; --muted: #666; --line: #ddd; }
@media (prefers-color-scheme: dark) { :root { --fg: #eee; --bg: #111; --muted: #aaa; --line: #333; } }
body { margin: 0 auto; max-width: 960px; padding: 24px; font: 15px/1.5 system-ui, sans-serif; color: var(--fg); background: var(--bg); }
.dates, .label { color: var(--muted); }
.cards { display: grid; grid-template-columns: repeat(auto-fit, minmax(140px, 1fr)); gap: 12px; }
.card { border: 1px solid var(--line); border-radius: 8px; padding: 12px; }
.value { font-size: 1.4em; font-weight: 600; }
table { width: 100%; border-collapse: collapse; }
th, td { text-align: left; padding: 6px 8px; border-bottom: 1px solid var(--line); }
"#;
