// Tests for report generation functionality

use chrono::{TimeZone, Utc};
use std::fs;
use tempfile::TempDir;
use vcrawl_client::{
    BatchJob, BatchLink, BatchStatus, BatchSummary, ClientError, LinkCategory, LinkRecord,
    PageCrawl, ProgressEvent, ProgressStatus, StreamEvent,
};
use vcrawl_core::csv::{CsvSchema, decode};
use vcrawl_core::report::{
    PageFormat, render_batch_progress, render_list_view, render_page, render_roster,
    render_sitemap, write_export,
};
use vcrawl_core::selection::SelectionSet;
use vcrawl_core::state::{BatchCrawlState, LinkGroup, ResultState};

fn site_records() -> Vec<LinkRecord> {
    vec![
        LinkRecord::new("https://a.com/", "Home"),
        LinkRecord::new("https://a.com/docs", "Docs").with_parent("https://a.com/", 1),
        LinkRecord::new("https://a.com/docs/x", "X").with_parent("https://a.com/docs", 2),
        LinkRecord::new("https://a.com/blog", "Blog")
            .with_parent("https://a.com/", 1)
            .with_category(LinkCategory::BoardForum),
    ]
}

// ============================================================================
// Page Format Tests
// ============================================================================

#[test]
fn test_page_format_parse() {
    assert_eq!("md".parse::<PageFormat>().unwrap(), PageFormat::Markdown);
    assert_eq!("HTML".parse::<PageFormat>().unwrap(), PageFormat::Html);
    assert_eq!("content-md".parse::<PageFormat>().unwrap(), PageFormat::ContentMarkdown);
    assert_eq!("json".parse::<PageFormat>().unwrap(), PageFormat::Json);
    assert!(matches!("pdf".parse::<PageFormat>(), Err(ClientError::Validation(_))));
}

#[test]
fn test_render_page_variants() {
    let page = PageCrawl {
        markdown: "# Title".to_string(),
        content_only_html: "<p>body</p>".to_string(),
        ..Default::default()
    };

    assert_eq!(render_page(&page, PageFormat::Markdown).unwrap(), "# Title");
    assert_eq!(render_page(&page, PageFormat::ContentHtml).unwrap(), "<p>body</p>");
    let json = render_page(&page, PageFormat::Json).unwrap();
    assert!(json.contains("\"markdown\": \"# Title\""));
}

// ============================================================================
// List View Tests
// ============================================================================

#[test]
fn test_list_view_group_headers() {
    let mut records = site_records();
    records.push(LinkRecord::new("https://b.com/", "Elsewhere").with_internal(false));
    let mut state = ResultState::new();
    state.replace("https://a.com/", records);
    state.toggle("https://a.com/docs");
    state.select_group(LinkGroup::External, true);

    let out = render_list_view(&state);
    assert!(out.starts_with("Selected: 2 of 5 links"));
    assert!(out.contains("[-] Internal Links (1 / 4)"));
    assert!(out.contains("[x] External Links (1 / 1)"));
    assert!(out.contains("  [x] Docs  https://a.com/docs\n"));
    assert!(out.contains("https://a.com/blog [board]"));
}

#[test]
fn test_list_view_skips_empty_groups() {
    let mut state = ResultState::new();
    state.replace("https://a.com/", vec![LinkRecord::new("https://a.com/1", "One")]);

    let out = render_list_view(&state);
    assert!(out.contains("[ ] Internal Links (0 / 1)"));
    assert!(!out.contains("External Links"));
}

// ============================================================================
// Sitemap Tests
// ============================================================================

#[test]
fn test_sitemap_counts_and_connectors() {
    let mut state = ResultState::new();
    state.replace("https://seed.com/", site_records());
    state.select_subtree("https://a.com/docs", true).unwrap();

    let out = render_sitemap(&state.tree(), state.selection());
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines[0], "└── Home [-] (2/4)  /");
    assert_eq!(lines[1], "    ├── Docs [x] (2/2)  /docs");
    assert_eq!(lines[2], "    │   └── X [x]  /docs/x");
    assert_eq!(lines[3], "    └── Blog [ ]  /blog [board]");
}

#[test]
fn test_sitemap_empty_forest() {
    assert_eq!(render_sitemap(&[], &SelectionSet::new()), "  (empty)\n");
}

// ============================================================================
// Batch Progress Tests
// ============================================================================

#[test]
fn test_batch_progress_rendering() {
    let links = vec![
        BatchLink::new("https://a.com/1", "one"),
        BatchLink::new("https://a.com/2", "two"),
    ];
    let mut state = BatchCrawlState::new(&links);
    state.apply(StreamEvent::Progress(ProgressEvent {
        current: 1,
        total: 2,
        url: "https://a.com/1".to_string(),
        status: ProgressStatus::Done,
        filename: Some("0001_one.md".to_string()),
        error: None,
    }));
    state.apply(StreamEvent::Complete(BatchSummary {
        folder_path: "/tmp/site".to_string(),
        total_success: 1,
        total_failed: 0,
    }));

    let out = render_batch_progress(&state);
    assert!(out.starts_with("Progress: 1/2 (50%)"));
    assert!(out.contains("  ✓ https://a.com/1  0001_one.md\n"));
    assert!(out.contains("  · https://a.com/2\n"));
    assert!(out.contains("Folder: /tmp/site"));
}

// ============================================================================
// Roster Tests
// ============================================================================

#[test]
fn test_roster_columns() {
    let mut job = BatchJob::new("batch_abc123", BatchStatus::InProgress);
    job.completed = 7;
    job.total = 10;

    let out = render_roster(&[job], None);
    let lines: Vec<&str> = out.lines().collect();
    assert!(lines[0].starts_with("BATCH ID"));
    assert!(lines[1].starts_with("batch_abc123  in_progress"));
    assert!(lines[1].trim_end().ends_with('-'), "missing timestamp renders as -");
}

#[test]
fn test_roster_with_selection_column() {
    let jobs = vec![
        BatchJob::new("b1", BatchStatus::Completed),
        BatchJob::new("b2", BatchStatus::Failed),
    ];
    let mut selection = SelectionSet::new();
    selection.toggle("b1");

    let out = render_roster(&jobs, Some(&selection));
    assert!(out.contains("[x] b1"));
    assert!(out.contains("[ ] b2"));
}

#[test]
fn test_empty_roster() {
    assert_eq!(render_roster(&[], None), "  (no batch jobs)\n");
}

// ============================================================================
// Export File Tests
// ============================================================================

#[test]
fn test_write_export_names_file_by_schema_and_time() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("exports");
    let now = Utc.timestamp_millis_opt(1_700_000_000_456).unwrap();

    let mut state = ResultState::new();
    state.replace("https://seed.com/", site_records());
    state.select_group(LinkGroup::All, true);
    let content = state.export_csv(CsvSchema::Hierarchical).unwrap();

    let path = write_export(&target, CsvSchema::Hierarchical, &content, now).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "vcrawl_sitemap_export_1700000000456.csv"
    );

    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(decode(&written).unwrap().len(), 4);
}
