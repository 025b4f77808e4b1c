// Tests for the result, collection and batch crawl state containers

use vcrawl_client::{
    BatchLink, BatchSummary, ClientError, LinkCollection, LinkRecord, ProgressEvent,
    ProgressStatus, StreamEvent,
};
use vcrawl_core::csv::{CsvSchema, decode};
use vcrawl_core::state::{BatchCrawlState, CollectSession, Facet, LinkGroup, ResultState};

const SEED: &str = "https://example.com/";

fn sample_records() -> Vec<LinkRecord> {
    vec![
        LinkRecord::new("https://example.com/a", "A"),
        LinkRecord::new("https://example.com/a/1", "A1").with_parent("https://example.com/a", 1),
        LinkRecord::new("https://example.com/b", "B"),
        LinkRecord::new("https://other.com/", "Other").with_internal(false),
    ]
}

fn loaded_state() -> ResultState {
    let mut state = ResultState::new();
    state.replace(SEED, sample_records());
    state
}

// ============================================================================
// ResultState Tests
// ============================================================================

#[test]
fn test_replace_clears_selection_in_same_step() {
    let mut state = loaded_state();
    state.select_group(LinkGroup::All, true);
    assert_eq!(state.selection().len(), 4);

    let facets = state.replace(SEED, vec![LinkRecord::new("https://example.com/new", "New")]);

    assert_eq!(facets, vec![Facet::Results, Facet::Selection]);
    assert!(state.selection().is_empty());
    assert_eq!(state.len(), 1);
}

#[test]
fn test_replace_deduplicates_by_href() {
    let mut state = ResultState::new();
    state.replace(
        SEED,
        vec![
            LinkRecord::new("https://example.com/a", "first"),
            LinkRecord::new("https://example.com/a", "second"),
        ],
    );
    assert_eq!(state.len(), 1);
    assert_eq!(state.records()[0].text, "second");
}

#[test]
fn test_toggle_ignores_foreign_hrefs() {
    let mut state = loaded_state();
    assert!(state.toggle("https://elsewhere.com/").is_empty());
    assert!(state.selection().is_empty());

    assert_eq!(state.toggle("https://example.com/b"), vec![Facet::Selection]);
    assert!(state.selection().is_selected("https://example.com/b"));
}

#[test]
fn test_group_selection_by_direction() {
    let mut state = loaded_state();
    state.select_group(LinkGroup::External, true);
    assert_eq!(state.selection().len(), 1);
    assert!(state.selection().is_selected("https://other.com/"));

    state.select_group(LinkGroup::Internal, true);
    state.select_group(LinkGroup::External, false);
    assert_eq!(state.selection().len(), 3);
}

#[test]
fn test_subtree_selection_through_state() {
    let mut state = loaded_state();
    state.select_subtree("https://example.com/a", true).unwrap();
    assert_eq!(state.selection().len(), 2);

    let err = state.select_subtree("https://missing.com/", true).unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[test]
fn test_is_hierarchical() {
    let state = loaded_state();
    assert!(state.is_hierarchical());

    let mut flat = ResultState::new();
    flat.replace(SEED, vec![LinkRecord::new("https://example.com/a", "A")]);
    assert!(!flat.is_hierarchical());
}

#[test]
fn test_export_requires_selection() {
    let mut state = loaded_state();
    let err = state.export_csv(CsvSchema::Flat).unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));

    state.toggle("https://example.com/a");
    state.toggle("https://other.com/");
    let csv = state.export_csv(CsvSchema::Flat).unwrap();
    let links = decode(&csv).unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].href, "https://example.com/a");
}

#[test]
fn test_batch_links_from_selection() {
    let mut state = loaded_state();
    assert!(state.batch_links().is_err());

    state.toggle("https://example.com/b");
    assert_eq!(
        state.batch_links().unwrap(),
        vec![BatchLink::new("https://example.com/b", "B")]
    );
}

// ============================================================================
// CollectSession Tests
// ============================================================================

#[test]
fn test_collect_session_logs_then_done() {
    let mut results = loaded_state();
    results.toggle("https://example.com/a");
    let mut session = CollectSession::new("https://new.com/");

    session
        .apply(&mut results, StreamEvent::Log { message: "Starting".into() })
        .unwrap();
    assert_eq!(results.len(), 4, "logs do not touch results");

    let done = StreamEvent::Done(LinkCollection {
        internal_links: vec![LinkRecord::new("https://new.com/x", "X")],
        external_links: vec![LinkRecord::new("https://ext.com/", "E")],
    });
    let facets = session.apply(&mut results, done).unwrap();

    assert!(facets.contains(&Facet::Results));
    assert!(session.is_finished());
    assert_eq!(session.logs(), &["Starting".to_string()]);
    assert_eq!(results.seed_url(), "https://new.com/");
    assert_eq!(results.len(), 2);
    assert!(results.selection().is_empty());
    assert!(!results.records()[1].internal);
}

#[test]
fn test_collect_session_error_keeps_results_and_logs() {
    let mut results = loaded_state();
    let mut session = CollectSession::new(SEED);

    session
        .apply(&mut results, StreamEvent::Log { message: "Depth 1".into() })
        .unwrap();
    let err = session
        .apply(&mut results, StreamEvent::Error { message: "boom".into() })
        .unwrap_err();

    assert!(matches!(err, ClientError::Collaborator(m) if m == "boom"));
    assert_eq!(results.len(), 4);
    assert_eq!(session.logs().len(), 2);
}

// ============================================================================
// BatchCrawlState Tests
// ============================================================================

fn progress(current: usize, url: &str, status: ProgressStatus) -> StreamEvent {
    StreamEvent::Progress(ProgressEvent {
        current,
        total: 3,
        url: url.to_string(),
        status,
        filename: Some(format!("{:04}_page.md", current)),
        error: if status == ProgressStatus::Failed {
            Some("timeout".to_string())
        } else {
            None
        },
    })
}

fn batch_links() -> Vec<BatchLink> {
    vec![
        BatchLink::new("https://a.com/1", "one"),
        BatchLink::new("a.com/2", "two"),
        BatchLink::new("https://a.com/3", "three"),
    ]
}

#[test]
fn test_progress_updates_by_position() {
    let mut state = BatchCrawlState::new(&batch_links());

    // The service normalized the second URL; position still matches.
    state.apply(progress(2, "https://a.com/2", ProgressStatus::Crawling));
    state.apply(progress(2, "https://a.com/2", ProgressStatus::Done));

    assert_eq!(state.links()[1].status, ProgressStatus::Done);
    assert_eq!(state.links()[1].filename.as_deref(), Some("0002_page.md"));
    assert_eq!(state.progress(), (2, 3));
    assert_eq!(state.percent(), 66);
    assert_eq!(state.logs().len(), 2);
}

#[test]
fn test_abort_marks_only_unfinished_links() {
    let mut state = BatchCrawlState::new(&batch_links());
    state.apply(progress(1, "https://a.com/1", ProgressStatus::Done));
    state.apply(progress(2, "https://a.com/2", ProgressStatus::Crawling));

    state.abort("Network error occurred. Please try again.");

    let statuses: Vec<ProgressStatus> = state.links().iter().map(|l| l.status).collect();
    assert_eq!(
        statuses,
        vec![ProgressStatus::Done, ProgressStatus::Failed, ProgressStatus::Failed]
    );
    assert!(state.links()[0].error.is_none());
    assert!(state.is_finished());
}

#[test]
fn test_complete_sets_result_folder() {
    let mut state = BatchCrawlState::new(&batch_links());
    state.apply(progress(1, "https://a.com/1", ProgressStatus::Failed));
    state.apply(StreamEvent::Complete(BatchSummary {
        folder_path: "/home/u/Downloads/site".into(),
        total_success: 2,
        total_failed: 1,
    }));

    assert_eq!(state.result_folder(), Some("/home/u/Downloads/site"));
    assert_eq!(state.links()[0].error.as_deref(), Some("timeout"));
    assert!(state.is_finished());
}

#[test]
fn test_error_event_records_failure() {
    let mut state = BatchCrawlState::new(&batch_links());
    state.apply(StreamEvent::Error { message: "empty link list".into() });
    assert_eq!(state.failure(), Some("empty link list"));
    assert_eq!(state.count(ProgressStatus::Failed), 3);
}

#[test]
fn test_error_event_keeps_finished_links() {
    let mut state = BatchCrawlState::new(&batch_links());
    state.apply(progress(1, "https://a.com/1", ProgressStatus::Done));
    state.apply(progress(2, "https://a.com/2", ProgressStatus::Crawling));
    state.apply(StreamEvent::Error { message: "crawler crashed".into() });

    assert_eq!(state.links()[0].status, ProgressStatus::Done);
    assert_eq!(state.links()[1].status, ProgressStatus::Failed);
    assert_eq!(state.links()[2].error.as_deref(), Some("crawler crashed"));
    assert!(state.is_finished());
}
