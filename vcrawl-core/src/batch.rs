//! LLM batch job lifecycle: convert, submit, poll, download and recover.
//!
//! Job status is only ever taken from the collaborator. The tracker keeps
//! the last reported roster in memory and holds no registry of its own, so a
//! new session picks jobs back up through [`BatchTracker::list_recent`].

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vcrawl_client::error::{ClientError, Result};
use vcrawl_client::{BatchDownload, BatchJob, ConvertRequest, ConvertResult, CrawlClient};

use crate::selection::SelectionSet;
use crate::state::Facet;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_LIST_LIMIT: usize = 30;

const BATCH_INSTRUCTION: &str = include_str!("../assets/batch_instruction.md");

/// Default instruction for turning crawled pages into retrieval chunks.
pub fn default_batch_instruction() -> &'static str {
    BATCH_INSTRUCTION.trim()
}

/// The collaborator calls the tracker depends on.
#[async_trait]
pub trait BatchBackend: Send + Sync {
    async fn convert(&self, request: &ConvertRequest) -> Result<ConvertResult>;
    async fn submit(&self, jsonl_folder_path: &str) -> Result<Vec<BatchJob>>;
    async fn status(&self, batch_ids: &[String]) -> Result<Vec<BatchJob>>;
    async fn results(&self, batch_ids: &[String], output_folder_path: &str)
    -> Result<BatchDownload>;
    async fn list(&self, limit: usize) -> Result<Vec<BatchJob>>;
}

#[async_trait]
impl BatchBackend for CrawlClient {
    async fn convert(&self, request: &ConvertRequest) -> Result<ConvertResult> {
        self.llm_convert(request).await
    }

    async fn submit(&self, jsonl_folder_path: &str) -> Result<Vec<BatchJob>> {
        self.llm_submit(jsonl_folder_path).await
    }

    async fn status(&self, batch_ids: &[String]) -> Result<Vec<BatchJob>> {
        self.llm_status(batch_ids).await
    }

    async fn results(
        &self,
        batch_ids: &[String],
        output_folder_path: &str,
    ) -> Result<BatchDownload> {
        self.llm_results(batch_ids, output_folder_path).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<BatchJob>> {
        self.llm_list(limit).await
    }
}

/// Results folder derived from a batch input folder: a trailing `_jsonl`
/// is dropped and `_results` appended.
pub fn results_folder_for(jsonl_folder: &str) -> String {
    let base = ["_jsonl/", "_jsonl\\", "_jsonl"]
        .iter()
        .find_map(|suffix| jsonl_folder.strip_suffix(suffix))
        .unwrap_or(jsonl_folder);
    format!("{}_results", base)
}

/// Something the watch loop reports after a poll.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Updated(Vec<BatchJob>),
    PollFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Every tracked job reached a terminal state.
    AllTerminal,
    Cancelled,
    /// Nothing to watch when the loop started.
    Idle,
}

pub struct BatchTracker<B> {
    backend: B,
    roster: Vec<BatchJob>,
    jsonl_folder: Option<String>,
    poll_interval: Duration,
    recovered: Vec<BatchJob>,
    recovery_selection: SelectionSet,
}

impl<B: BatchBackend> BatchTracker<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            roster: Vec::new(),
            jsonl_folder: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            recovered: Vec::new(),
            recovery_selection: SelectionSet::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn roster(&self) -> &[BatchJob] {
        &self.roster
    }

    pub fn jsonl_folder(&self) -> Option<&str> {
        self.jsonl_folder.as_deref()
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Converts a folder of crawled markdown into batch input files and
    /// remembers the output folder for the next submit.
    pub async fn convert(&mut self, request: &ConvertRequest) -> Result<ConvertResult> {
        let result = self.backend.convert(request).await?;
        info!(
            folder = %result.output_folder,
            files = result.file_count,
            "Batch input converted"
        );
        self.jsonl_folder = Some(result.output_folder.clone());
        Ok(result)
    }

    /// Submits every input file in `jsonl_folder_path`. The new jobs replace
    /// the roster; on failure the roster is left as it was.
    pub async fn submit(&mut self, jsonl_folder_path: &str) -> Result<&[BatchJob]> {
        let folder = jsonl_folder_path.trim();
        if folder.is_empty() {
            return Err(ClientError::Submission(
                "Please enter the path to the JSONL folder.".to_string(),
            ));
        }

        let jobs = self.backend.submit(folder).await?;
        if jobs.is_empty() {
            return Err(ClientError::Submission(format!(
                "No batch jobs were created from {}",
                folder
            )));
        }

        info!(count = jobs.len(), "Tracking submitted batch jobs");
        self.roster = jobs;
        self.jsonl_folder = Some(folder.to_string());
        Ok(&self.roster)
    }

    /// Starts tracking `jobs`, replacing the roster.
    pub fn resume(&mut self, jobs: Vec<BatchJob>) -> Vec<Facet> {
        self.roster = jobs;
        vec![Facet::Roster]
    }

    /// True while at least one tracked job is not terminal.
    pub fn needs_polling(&self) -> bool {
        self.roster.iter().any(|job| !job.is_terminal())
    }

    /// Refreshes every non-terminal job. Jobs already terminal are neither
    /// queried nor changed. A failed poll leaves the roster untouched.
    pub async fn poll_status(&mut self) -> Result<Vec<Facet>> {
        let pending: Vec<String> = self
            .roster
            .iter()
            .filter(|job| !job.is_terminal())
            .map(|job| job.batch_id.clone())
            .collect();

        if pending.is_empty() {
            debug!("No pending batch jobs to poll");
            return Ok(Vec::new());
        }

        let updates = match self.backend.status(&pending).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Batch status poll failed: {}", e);
                return Err(e);
            }
        };

        let mut changed = false;
        for update in updates {
            let Some(job) = self
                .roster
                .iter_mut()
                .find(|job| job.batch_id == update.batch_id)
            else {
                debug!(batch_id = %update.batch_id, "Status for untracked batch job");
                continue;
            };

            if job.is_terminal() {
                continue;
            }

            let merged = merge_job(job, update);
            if *job != merged {
                if merged.status != job.status {
                    info!(
                        batch_id = %merged.batch_id,
                        from = %job.status,
                        to = %merged.status,
                        "Batch job status changed"
                    );
                }
                *job = merged;
                changed = true;
            }
        }

        Ok(if changed { vec![Facet::Roster] } else { Vec::new() })
    }

    fn completed_ids(jobs: &[BatchJob]) -> Vec<String> {
        jobs.iter()
            .filter(|job| job.is_completed())
            .map(|job| job.batch_id.clone())
            .collect()
    }

    /// Downloads results of the completed jobs in the roster. Without an
    /// explicit folder the results go next to the submitted input folder.
    pub async fn download_results(&self, output_folder: Option<&str>) -> Result<BatchDownload> {
        let ids = Self::completed_ids(&self.roster);
        if ids.is_empty() {
            return Err(ClientError::NotReady(
                "No completed batches to download.".to_string(),
            ));
        }

        let output = match output_folder {
            Some(folder) => folder.to_string(),
            None => self
                .jsonl_folder
                .as_deref()
                .map(results_folder_for)
                .unwrap_or_default(),
        };

        info!(count = ids.len(), output = %output, "Downloading batch results");
        self.backend.results(&ids, &output).await
    }

    /// Fetches recent jobs from earlier sessions for recovery. The recovery
    /// selection is reset.
    pub async fn list_recent(&mut self, limit: usize) -> Result<&[BatchJob]> {
        let jobs = self.backend.list(limit).await?;
        debug!(count = jobs.len(), "Fetched recent batch jobs");
        self.recovered = jobs;
        self.recovery_selection.clear();
        Ok(&self.recovered)
    }

    pub fn recovered(&self) -> &[BatchJob] {
        &self.recovered
    }

    pub fn recovery_selection(&self) -> &SelectionSet {
        &self.recovery_selection
    }

    /// Unknown ids are ignored.
    pub fn toggle_recovered(&mut self, batch_id: &str) -> Vec<Facet> {
        if !self.recovered.iter().any(|job| job.batch_id == batch_id) {
            return Vec::new();
        }
        self.recovery_selection.toggle(batch_id);
        vec![Facet::Selection]
    }

    /// Selects every completed recovered job, or clears them when they are
    /// all selected already. Jobs in other states are never touched.
    pub fn toggle_all_recovered(&mut self) -> Vec<Facet> {
        let completed = Self::completed_ids(&self.recovered);
        if completed.is_empty() {
            return Vec::new();
        }
        let select = !self.recovery_selection.is_all_selected(&completed);
        self.recovery_selection.set_group(&completed, select);
        vec![Facet::Selection]
    }

    /// Downloads results of the selected recovered jobs that are completed.
    pub async fn download_recovered(&self, output_folder: &str) -> Result<BatchDownload> {
        if self.recovery_selection.is_empty() {
            return Err(ClientError::Validation("No batches selected.".to_string()));
        }

        let ids: Vec<String> = self
            .recovered
            .iter()
            .filter(|job| job.is_completed() && self.recovery_selection.is_selected(&job.batch_id))
            .map(|job| job.batch_id.clone())
            .collect();
        if ids.is_empty() {
            return Err(ClientError::NotReady(
                "None of the selected batches has completed.".to_string(),
            ));
        }

        self.backend.results(&ids, output_folder).await
    }

    /// Moves the selected recovered jobs into the roster so they are polled.
    pub fn resume_selected(&mut self) -> Vec<Facet> {
        let jobs: Vec<BatchJob> = self
            .recovered
            .iter()
            .filter(|job| self.recovery_selection.is_selected(&job.batch_id))
            .cloned()
            .collect();
        if jobs.is_empty() {
            return Vec::new();
        }
        self.resume(jobs)
    }

    /// Polls on a fixed interval until every tracked job is terminal or
    /// `cancel` fires. The first poll happens one interval after the call.
    /// Once it returns, nothing polls again until the caller asks.
    pub async fn watch<F>(&mut self, cancel: &CancellationToken, mut on_event: F) -> WatchOutcome
    where
        F: FnMut(WatchEvent),
    {
        if !self.needs_polling() {
            return WatchOutcome::Idle;
        }

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return WatchOutcome::Cancelled,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                _ = cancel.cancelled() => return WatchOutcome::Cancelled,
                polled = self.poll_status() => polled,
            };

            match polled {
                Ok(facets) if !facets.is_empty() => on_event(WatchEvent::Updated(self.roster.clone())),
                Ok(_) => {}
                Err(e) => on_event(WatchEvent::PollFailed(e.user_message())),
            }

            if !self.needs_polling() {
                info!("All batch jobs reached a terminal state");
                return WatchOutcome::AllTerminal;
            }
        }
    }
}

/// Applies a status report to a known job. Fields the report leaves out
/// keep their previous values.
fn merge_job(previous: &BatchJob, update: BatchJob) -> BatchJob {
    BatchJob {
        batch_id: update.batch_id,
        status: update.status,
        completed: update.completed,
        failed: update.failed,
        total: update.total,
        created_at: update.created_at.or(previous.created_at),
        output_file_id: update.output_file_id.or_else(|| previous.output_file_id.clone()),
        error_file_id: update.error_file_id.or_else(|| previous.error_file_id.clone()),
        input_file_id: update.input_file_id.or_else(|| previous.input_file_id.clone()),
        filename: update.filename.or_else(|| previous.filename.clone()),
    }
}

/// Distinct ids of a roster, in order.
pub fn batch_ids(jobs: &[BatchJob]) -> Vec<String> {
    let mut seen = HashSet::new();
    jobs.iter()
        .filter(|job| seen.insert(job.batch_id.as_str()))
        .map(|job| job.batch_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_folder_strips_jsonl_suffix() {
        assert_eq!(results_folder_for("/data/site_jsonl"), "/data/site_results");
        assert_eq!(results_folder_for("/data/site_jsonl/"), "/data/site_results");
        assert_eq!(results_folder_for("C:\\data\\site_jsonl\\"), "C:\\data\\site_results");
        assert_eq!(results_folder_for("/data/site"), "/data/site_results");
    }

    #[test]
    fn test_default_instruction_is_trimmed() {
        let instruction = default_batch_instruction();
        assert!(instruction.starts_with("You are"));
        assert!(instruction.contains("[STATUS: REJECTED]"));
        assert_eq!(instruction, instruction.trim());
    }
}
