// Text renderings of link results, batch progress and batch rosters

use chrono::{DateTime, Local, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use vcrawl_client::{BatchJob, ClientError, LinkCategory, LinkRecord, PageCrawl, ProgressStatus};

use crate::csv::{self, CsvSchema};
use crate::selection::SelectionSet;
use crate::state::{BatchCrawlState, LinkGroup, ResultState};
use crate::tree::LinkTreeNode;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Which rendition of a crawled page to print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFormat {
    Markdown,
    Html,
    ContentMarkdown,
    ContentHtml,
    Json,
}

impl std::str::FromStr for PageFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(PageFormat::Markdown),
            "html" => Ok(PageFormat::Html),
            "content-markdown" | "content-md" => Ok(PageFormat::ContentMarkdown),
            "content-html" => Ok(PageFormat::ContentHtml),
            "json" => Ok(PageFormat::Json),
            _ => Err(ClientError::Validation(format!("Unknown page format: {}", s))),
        }
    }
}

pub fn render_page(page: &PageCrawl, format: PageFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        PageFormat::Markdown => page.markdown.clone(),
        PageFormat::Html => page.html.clone(),
        PageFormat::ContentMarkdown => page.content_only_markdown.clone(),
        PageFormat::ContentHtml => page.content_only_html.clone(),
        PageFormat::Json => serde_json::to_string_pretty(page)?,
    })
}

/// Page regions and LLM extraction, printed after the main rendition.
pub fn render_page_summary(page: &PageCrawl) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push_str("\n# Structure:\n");
    out.push_str(&format!("  Header:     {}\n", one_line(&page.structure.header, 70)));
    out.push_str(&format!("  Navigation: {}\n", one_line(&page.structure.navigation, 70)));
    out.push_str(&format!("  Main:       {}\n", one_line(&page.structure.main_content, 70)));
    out.push_str(&format!("  Footer:     {}\n", one_line(&page.structure.footer, 70)));
    if !page.structure.ads.is_empty() {
        out.push_str(&format!("  Ads:        {} found\n", page.structure.ads.len()));
    }
    if !page.llm_extraction.is_empty() {
        out.push_str("\n# LLM extraction:\n");
        out.push_str(&page.llm_extraction);
        out.push('\n');
    }
    out
}

fn one_line(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{}…", cut)
    } else {
        flat
    }
}

fn checkbox(selected: usize, total: usize) -> &'static str {
    if total > 0 && selected == total {
        "[x]"
    } else if selected > 0 {
        "[-]"
    } else {
        "[ ]"
    }
}

fn badge(category: LinkCategory) -> &'static str {
    match category {
        LinkCategory::Standard => "",
        LinkCategory::FileDownload => " [file]",
        LinkCategory::BoardForum => " [board]",
    }
}

/// List view: internal and external folders with `(selected / total)`.
pub fn render_list_view(state: &ResultState) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Selected: {} of {} links\n\n",
        state.selection().len(),
        state.len()
    ));

    for (title, group) in [
        ("Internal Links", LinkGroup::Internal),
        ("External Links", LinkGroup::External),
    ] {
        let links: Vec<&LinkRecord> = state.group(group).collect();
        if links.is_empty() {
            continue;
        }

        let (selected, total) = state
            .selection()
            .group_counts(links.iter().map(|l| l.href.as_str()));
        out.push_str(&format!(
            "{} {} ({} / {})\n",
            checkbox(selected, total),
            title,
            selected,
            total
        ));

        for link in links {
            let mark = if state.selection().is_selected(&link.href) {
                "[x]"
            } else {
                "[ ]"
            };
            out.push_str(&format!(
                "  {} {}  {}{}\n",
                mark,
                link.display_text(),
                link.href,
                badge(link.category)
            ));
        }
        out.push('\n');
    }

    out
}

/// Sitemap view: one tree per root, subtree counts on nodes with children.
pub fn render_sitemap(forest: &[LinkTreeNode], selection: &SelectionSet) -> String {
    if forest.is_empty() {
        return "  (empty)\n".to_string();
    }

    let mut out = String::new();
    for (i, root) in forest.iter().enumerate() {
        render_node(root, selection, "", i == forest.len() - 1, &mut out);
    }
    out
}

fn render_node(
    node: &LinkTreeNode,
    selection: &SelectionSet,
    prefix: &str,
    is_last: bool,
    out: &mut String,
) {
    let branch = if is_last { "└── " } else { "├── " };
    let counts = if node.has_children() {
        let selected = selection.subtree_selected(node);
        let total = node.node_count();
        format!(" {} ({}/{})", checkbox(selected, total), selected, total)
    } else if selection.is_selected(node.href()) {
        " [x]".to_string()
    } else {
        " [ ]".to_string()
    };

    out.push_str(&format!(
        "{}{}{}{}  {}{}\n",
        prefix,
        branch,
        node.record.display_text(),
        counts,
        crate::crawl::extract_url_path(node.href()),
        badge(node.record.category)
    ));

    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
    for (i, child) in node.children.iter().enumerate() {
        render_node(
            child,
            selection,
            &child_prefix,
            i == node.children.len() - 1,
            out,
        );
    }
}

/// Per-link batch crawl status.
pub fn render_batch_progress(state: &BatchCrawlState) -> String {
    let (current, total) = state.progress();
    let mut out = format!("Progress: {}/{} ({}%)\n", current, total, state.percent());

    for entry in state.links() {
        let marker = match entry.status {
            ProgressStatus::Pending => "·",
            ProgressStatus::Crawling => "→",
            ProgressStatus::Done => "✓",
            ProgressStatus::Failed => "✗",
        };
        let mut line = format!("  {} {}", marker, entry.link.href);
        if let Some(ref filename) = entry.filename {
            line.push_str(&format!("  {}", filename));
        }
        if let Some(ref error) = entry.error {
            line.push_str(&format!("  ({})", error));
        }
        out.push_str(&line);
        out.push('\n');
    }

    if let Some(summary) = state.summary() {
        out.push_str(&format!(
            "\n# Summary:\n  Saved:  {}\n  Failed: {}\n  Folder: {}\n",
            summary.total_success, summary.total_failed, summary.folder_path
        ));
    }

    out
}

fn format_created(created_at: Option<DateTime<Utc>>) -> String {
    created_at
        .map(|t| {
            t.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "-".to_string())
}

/// Roster table. `selection`, when given, adds a checkbox column.
pub fn render_roster(jobs: &[BatchJob], selection: Option<&SelectionSet>) -> String {
    if jobs.is_empty() {
        return "  (no batch jobs)\n".to_string();
    }

    let id_width = jobs
        .iter()
        .map(|job| job.batch_id.len())
        .max()
        .unwrap_or(8)
        .max(8);

    let mut out = String::new();
    let check_header = if selection.is_some() { "    " } else { "" };
    out.push_str(&format!(
        "{}{:<id_width$}  {:<12} {:>9} {:>7} {:>7}  {}\n",
        check_header,
        "BATCH ID",
        "STATUS",
        "COMPLETED",
        "FAILED",
        "TOTAL",
        "CREATED",
        id_width = id_width
    ));

    for job in jobs {
        let check = match selection {
            Some(set) if set.is_selected(&job.batch_id) => "[x] ",
            Some(_) => "[ ] ",
            None => "",
        };
        out.push_str(&format!(
            "{}{:<id_width$}  {:<12} {:>9} {:>7} {:>7}  {}\n",
            check,
            job.batch_id,
            job.status.as_str(),
            job.completed,
            job.failed,
            job.total,
            format_created(job.created_at),
            id_width = id_width
        ));
    }

    out
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Writes `content` as `<prefix>_export_<epoch-ms>.csv` inside `dir`,
/// creating the directory when needed.
pub fn write_export(
    dir: &Path,
    schema: CsvSchema,
    content: &str,
    now: DateTime<Utc>,
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(csv::export_filename(
        schema.export_prefix(),
        now.timestamp_millis(),
    ));
    save_report(content, &path)?;
    Ok(path)
}
