//! Owned state containers and their transitions.
//!
//! Every mutating method returns the facets it changed so the hosting shell
//! can decide what to redraw or log. Nothing here performs I/O.

use tracing::debug;
use vcrawl_client::error::{ClientError, Result};
use vcrawl_client::result::dedup_by_href;
use vcrawl_client::{BatchLink, BatchSummary, LinkRecord, ProgressStatus, StreamEvent};

use crate::csv::{self, CsvSchema};
use crate::selection::SelectionSet;
use crate::tree::{self, LinkTreeNode};

/// A part of the state that a transition touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Results,
    Selection,
    Logs,
    Progress,
    Roster,
}

/// Which records a bulk selection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkGroup {
    All,
    Internal,
    External,
}

impl LinkGroup {
    fn contains(&self, record: &LinkRecord) -> bool {
        match self {
            LinkGroup::All => true,
            LinkGroup::Internal => record.internal,
            LinkGroup::External => !record.internal,
        }
    }
}

/// The active link result set and the selection scoped to it.
#[derive(Debug, Clone, Default)]
pub struct ResultState {
    seed_url: String,
    records: Vec<LinkRecord>,
    selection: SelectionSet,
}

impl ResultState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new result set. The previous selection is dropped in the
    /// same step so it can never refer to the new records.
    pub fn replace(&mut self, seed_url: impl Into<String>, records: Vec<LinkRecord>) -> Vec<Facet> {
        self.seed_url = seed_url.into();
        self.records = dedup_by_href(records);
        self.selection.clear();
        debug!(seed = %self.seed_url, count = self.records.len(), "Result set replaced");
        vec![Facet::Results, Facet::Selection]
    }

    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    pub fn records(&self) -> &[LinkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, href: &str) -> bool {
        self.records.iter().any(|record| record.href == href)
    }

    pub fn group(&self, group: LinkGroup) -> impl Iterator<Item = &LinkRecord> {
        self.records.iter().filter(move |record| group.contains(record))
    }

    /// True when any record carries a parent link.
    pub fn is_hierarchical(&self) -> bool {
        self.records.iter().any(|record| !record.parent_url.is_empty())
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn tree(&self) -> Vec<LinkTreeNode> {
        tree::build_forest(&self.records, &self.seed_url)
    }

    /// Hrefs outside the result set are ignored.
    pub fn toggle(&mut self, href: &str) -> Vec<Facet> {
        if !self.contains(href) {
            return Vec::new();
        }
        self.selection.toggle(href);
        vec![Facet::Selection]
    }

    pub fn set_group<I, S>(&mut self, hrefs: I, select: bool) -> Vec<Facet>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known: Vec<String> = hrefs
            .into_iter()
            .filter(|href| self.contains(href.as_ref()))
            .map(|href| href.as_ref().to_string())
            .collect();
        if known.is_empty() {
            return Vec::new();
        }
        self.selection.set_group(known, select);
        vec![Facet::Selection]
    }

    pub fn select_group(&mut self, group: LinkGroup, select: bool) -> Vec<Facet> {
        let hrefs: Vec<String> = self.group(group).map(|r| r.href.clone()).collect();
        self.set_group(hrefs, select)
    }

    /// Selects or clears `href` together with everything below it in the
    /// sitemap tree.
    pub fn select_subtree(&mut self, href: &str, select: bool) -> Result<Vec<Facet>> {
        let forest = self.tree();
        let node = tree::find_node(&forest, href).ok_or_else(|| {
            ClientError::Validation(format!("{} is not part of the current results", href))
        })?;
        self.selection.select_subtree(node, select);
        Ok(vec![Facet::Selection])
    }

    pub fn clear_selection(&mut self) -> Vec<Facet> {
        if self.selection.is_empty() {
            return Vec::new();
        }
        self.selection.clear();
        vec![Facet::Selection]
    }

    pub fn selected_records(&self) -> Vec<&LinkRecord> {
        self.selection.filter(&self.records)
    }

    /// CSV of the selected records.
    pub fn export_csv(&self, schema: CsvSchema) -> Result<String> {
        let selected = self.selected_records();
        if selected.is_empty() {
            return Err(ClientError::Validation("No links selected".to_string()));
        }
        Ok(csv::encode(selected, schema))
    }

    /// Selected records as batch crawl input.
    pub fn batch_links(&self) -> Result<Vec<BatchLink>> {
        let links: Vec<BatchLink> = self
            .selected_records()
            .into_iter()
            .map(BatchLink::from)
            .collect();
        if links.is_empty() {
            return Err(ClientError::Validation("No links selected".to_string()));
        }
        Ok(links)
    }
}

/// Log lines of one link collection run.
#[derive(Debug, Clone, Default)]
pub struct CollectSession {
    seed_url: String,
    logs: Vec<String>,
    finished: bool,
}

impl CollectSession {
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            logs: Vec::new(),
            finished: false,
        }
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn log(&mut self, line: impl Into<String>) -> Vec<Facet> {
        self.logs.push(line.into());
        vec![Facet::Logs]
    }

    /// Applies one streamed event. `done` replaces the result set; `error`
    /// ends the run with a collaborator error, keeping the logs gathered so far.
    pub fn apply(&mut self, results: &mut ResultState, event: StreamEvent) -> Result<Vec<Facet>> {
        match event {
            StreamEvent::Log { message } => Ok(self.log(message)),
            StreamEvent::Done(collection) => {
                self.finished = true;
                Ok(results.replace(self.seed_url.clone(), collection.into_records()))
            }
            StreamEvent::Error { message } => {
                self.finished = true;
                self.logs.push(format!("Error: {}", message));
                let message = if message.trim().is_empty() {
                    "Failed to collect links".to_string()
                } else {
                    message
                };
                Err(ClientError::Collaborator(message))
            }
            other => {
                debug!(kind = other.kind(), "Ignoring event outside link collection");
                Ok(Vec::new())
            }
        }
    }
}

/// Status of one link in a batch crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkProgress {
    pub link: BatchLink,
    pub status: ProgressStatus,
    pub filename: Option<String>,
    pub error: Option<String>,
}

/// Progress of one batch crawl run.
#[derive(Debug, Clone, Default)]
pub struct BatchCrawlState {
    links: Vec<LinkProgress>,
    current: usize,
    total: usize,
    logs: Vec<String>,
    summary: Option<BatchSummary>,
    failure: Option<String>,
}

impl BatchCrawlState {
    pub fn new(links: &[BatchLink]) -> Self {
        Self {
            links: links
                .iter()
                .map(|link| LinkProgress {
                    link: link.clone(),
                    status: ProgressStatus::Pending,
                    filename: None,
                    error: None,
                })
                .collect(),
            current: 0,
            total: links.len(),
            logs: Vec::new(),
            summary: None,
            failure: None,
        }
    }

    pub fn links(&self) -> &[LinkProgress] {
        &self.links
    }

    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// (current, total) as last reported.
    pub fn progress(&self) -> (usize, usize) {
        (self.current, self.total)
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current.min(self.total) * 100) / self.total) as u8
    }

    pub fn summary(&self) -> Option<&BatchSummary> {
        self.summary.as_ref()
    }

    pub fn result_folder(&self) -> Option<&str> {
        self.summary.as_ref().map(|s| s.folder_path.as_str())
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.summary.is_some() || self.failure.is_some()
    }

    pub fn count(&self, status: ProgressStatus) -> usize {
        self.links.iter().filter(|l| l.status == status).count()
    }

    /// Progress events carry a 1-based position; the URL is only used when
    /// the position does not fit the submitted list.
    fn position_of(&self, current: usize, url: &str) -> Option<usize> {
        let by_index = current
            .checked_sub(1)
            .filter(|&idx| idx < self.links.len());
        by_index.or_else(|| self.links.iter().position(|l| l.link.href == url))
    }

    pub fn apply(&mut self, event: StreamEvent) -> Vec<Facet> {
        match event {
            StreamEvent::Log { message } => {
                self.logs.push(message);
                vec![Facet::Logs]
            }
            StreamEvent::Progress(progress) => {
                self.current = progress.current;
                if progress.total > 0 {
                    self.total = progress.total;
                }

                let line = match progress.status {
                    ProgressStatus::Done => format!(
                        "[{}/{}] saved {}",
                        progress.current,
                        progress.total,
                        progress.filename.as_deref().unwrap_or(&progress.url)
                    ),
                    ProgressStatus::Crawling | ProgressStatus::Pending => format!(
                        "[{}/{}] crawling {}",
                        progress.current, progress.total, progress.url
                    ),
                    ProgressStatus::Failed => format!(
                        "[{}/{}] failed {}: {}",
                        progress.current,
                        progress.total,
                        progress.url,
                        progress.error.as_deref().unwrap_or_default()
                    ),
                };
                self.logs.push(line);

                match self.position_of(progress.current, &progress.url) {
                    Some(idx) => {
                        let entry = &mut self.links[idx];
                        entry.status = progress.status;
                        entry.filename = progress.filename;
                        entry.error = progress.error;
                    }
                    None => debug!(url = %progress.url, "Progress for unknown link"),
                }

                vec![Facet::Progress, Facet::Logs]
            }
            StreamEvent::Complete(summary) => {
                self.logs.push(format!(
                    "Finished: {} succeeded, {} failed",
                    summary.total_success, summary.total_failed
                ));
                self.logs.push(format!("Saved to {}", summary.folder_path));
                self.summary = Some(summary);
                vec![Facet::Progress, Facet::Logs]
            }
            StreamEvent::Error { message } => {
                self.fail_unfinished(&message);
                self.logs.push(format!("Error: {}", message));
                self.failure = Some(message);
                vec![Facet::Progress, Facet::Logs]
            }
            StreamEvent::Done(_) => {
                debug!("Ignoring link collection result in batch crawl");
                Vec::new()
            }
        }
    }

    /// The stream broke off. Links already done or failed keep their state;
    /// the rest are marked failed with `message`.
    pub fn abort(&mut self, message: &str) -> Vec<Facet> {
        self.fail_unfinished(message);
        self.logs.push(format!("Network error: {}", message));
        self.failure = Some(message.to_string());
        vec![Facet::Progress, Facet::Logs]
    }

    fn fail_unfinished(&mut self, message: &str) {
        for entry in &mut self.links {
            if !entry.status.is_finished() {
                entry.status = ProgressStatus::Failed;
                entry.error = Some(message.to_string());
            }
        }
    }
}
