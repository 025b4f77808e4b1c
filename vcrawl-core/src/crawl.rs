use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use vcrawl_client::error::{ClientError, Result};
use vcrawl_client::{
    BatchLink, CollectLinksRequest, CrawlClient, EventStream, LinkFeed, ProgressEvent,
    ProgressStatus, StreamEvent,
};

use crate::state::{BatchCrawlState, CollectSession, ResultState};

pub const SHALLOW_CAP: usize = 500;
pub const DEEP_CAP: usize = 1400;
pub const MAX_DEPTH: u32 = 3;

/// Result-set size caps. Selection and tree views are recomputed on every
/// read, so collections are bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionLimits {
    pub shallow_cap: usize,
    pub deep_cap: usize,
    pub max_depth: u32,
}

impl Default for CollectionLimits {
    fn default() -> Self {
        Self {
            shallow_cap: SHALLOW_CAP,
            deep_cap: DEEP_CAP,
            max_depth: MAX_DEPTH,
        }
    }
}

impl CollectionLimits {
    pub fn clamp_depth(&self, depth: u32) -> u32 {
        depth.min(self.max_depth)
    }

    pub fn cap_for(&self, depth: u32) -> usize {
        if depth == 0 {
            self.shallow_cap
        } else {
            self.deep_cap
        }
    }

    /// Requested URL budget, clamped to the cap for the depth. Defaults to the cap.
    pub fn max_urls(&self, depth: u32, requested: Option<usize>) -> usize {
        let cap = self.cap_for(self.clamp_depth(depth));
        requested.map_or(cap, |n| n.clamp(1, cap))
    }
}

/// Options for a link collection run
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub url: String,
    pub depth: u32,
    pub max_urls: Option<usize>,
    pub show_progress_bars: bool,
    pub limits: CollectionLimits,
}

impl CollectOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth: 0,
            max_urls: None,
            show_progress_bars: false,
            limits: CollectionLimits::default(),
        }
    }

    /// Normalized request. Fails on an empty URL before anything is sent.
    pub fn to_request(&self) -> Result<CollectLinksRequest> {
        let url = normalize_target_url(&self.url)?;
        let depth = self.limits.clamp_depth(self.depth);
        Ok(CollectLinksRequest {
            url,
            depth,
            max_urls: self.limits.max_urls(depth, self.max_urls),
        })
    }
}

/// How a streamed run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Cancelled,
}

/// Callback for each log line of a run
pub type LogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback for each batch crawl progress report
pub type BatchProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Trims the input and adds `https://` when no http(s) scheme is given.
pub fn normalize_target_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClientError::Validation("URL cannot be empty".to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    Url::parse(&candidate).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
    Ok(candidate)
}

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

fn spinner(enabled: bool, message: &str) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn bar(enabled: bool, total: usize) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    Some(pb)
}

/// Runs a link collection and feeds its events into `session` and `results`.
///
/// The result set is only replaced by the final `done` event. On failure or
/// cancellation `results` is left as it was and the logs gathered so far
/// stay in `session`.
pub async fn execute_collect(
    client: &CrawlClient,
    options: &CollectOptions,
    results: &mut ResultState,
    session: &mut CollectSession,
    log_callback: Option<LogCallback>,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    let request = options.to_request()?;
    info!(url = %request.url, depth = request.depth, "Collecting links");

    let progress_bar = spinner(options.show_progress_bars, "Collecting links...");
    let emit = |session: &mut CollectSession, line: &str| {
        if let Some(ref pb) = progress_bar {
            pb.set_message(line.to_string());
        }
        if let Some(ref callback) = log_callback {
            callback(line);
        }
        session.log(line);
    };

    let feed = tokio::select! {
        _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
        feed = client.collect_links(&request) => feed,
    };

    let mut stream = match feed {
        Ok(LinkFeed::Complete(collection)) => {
            session.apply(results, StreamEvent::Done(collection))?;
            if let Some(pb) = &progress_bar {
                pb.finish_with_message(format!("Collected {} links", results.len()));
            }
            return Ok(RunOutcome::Completed);
        }
        Ok(LinkFeed::Streamed(stream)) => stream,
        Err(e) => {
            if let Some(pb) = &progress_bar {
                pb.abandon_with_message("Link collection failed");
            }
            return Err(e);
        }
    };

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Link collection cancelled, no longer listening");
                if let Some(pb) = &progress_bar {
                    pb.abandon_with_message("Cancelled");
                }
                return Ok(RunOutcome::Cancelled);
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(StreamEvent::Log { message })) => emit(session, &message),
            Some(Ok(event)) => {
                let outcome = session.apply(results, event);
                if session.is_finished() {
                    if let Some(pb) = &progress_bar {
                        match &outcome {
                            Ok(_) => pb.finish_with_message(format!(
                                "Collected {} links",
                                results.len()
                            )),
                            Err(_) => pb.abandon_with_message("Link collection failed"),
                        }
                    }
                    return outcome.map(|_| RunOutcome::Completed);
                }
            }
            Some(Err(e)) => {
                warn!("Link collection stream failed: {}", e);
                emit(session, &e.user_message());
                if let Some(pb) = &progress_bar {
                    pb.abandon_with_message("Link collection failed");
                }
                return Err(e);
            }
            None => {
                if let Some(pb) = &progress_bar {
                    pb.abandon_with_message("Link collection failed");
                }
                return Err(ClientError::Collaborator(
                    "Failed to collect links".to_string(),
                ));
            }
        }
    }
}

/// Crawls `links` into `output_folder_name` on the collaborator side and
/// records per-link progress in `state`.
///
/// A transport failure mid-stream marks the unfinished links failed; links
/// already reported keep their status.
pub async fn execute_batch_crawl(
    client: &CrawlClient,
    links: &[BatchLink],
    output_folder_name: &str,
    state: &mut BatchCrawlState,
    progress_callback: Option<BatchProgressCallback>,
    show_progress_bars: bool,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    let progress_bar = bar(show_progress_bars, links.len());

    let stream = tokio::select! {
        _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
        stream = client.batch_crawl(links, output_folder_name) => stream,
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            state.abort(&e.user_message());
            if let Some(pb) = progress_bar {
                pb.abandon_with_message("Batch crawl failed");
            }
            return Err(e);
        }
    };

    let outcome = drive_batch_stream(
        stream,
        state,
        progress_callback,
        progress_bar.as_ref(),
        cancel,
    )
    .await;

    if let Some(pb) = progress_bar {
        match &outcome {
            Ok(RunOutcome::Completed) => pb.finish_with_message(format!(
                "{} saved, {} failed",
                state.count(ProgressStatus::Done),
                state.count(ProgressStatus::Failed)
            )),
            Ok(RunOutcome::Cancelled) => pb.abandon_with_message("Cancelled"),
            Err(_) => pb.abandon_with_message("Batch crawl failed"),
        }
    }

    outcome
}

async fn drive_batch_stream(
    mut stream: EventStream,
    state: &mut BatchCrawlState,
    progress_callback: Option<BatchProgressCallback>,
    progress_bar: Option<&ProgressBar>,
    cancel: &CancellationToken,
) -> Result<RunOutcome> {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                state.abort("Stopped listening");
                return Ok(RunOutcome::Cancelled);
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(event)) => {
                if let StreamEvent::Progress(ref progress) = event {
                    if let Some(pb) = progress_bar {
                        if progress.status.is_finished() {
                            pb.set_position(progress.current as u64);
                        }
                        pb.set_message(progress.url.clone());
                    }
                    if let Some(ref callback) = progress_callback {
                        callback(progress);
                    }
                }

                let error = match &event {
                    StreamEvent::Error { message } => Some(message.clone()),
                    _ => None,
                };
                let complete = matches!(event, StreamEvent::Complete(_));
                state.apply(event);

                if let Some(message) = error {
                    return Err(ClientError::Collaborator(message));
                }
                if complete {
                    return Ok(RunOutcome::Completed);
                }
            }
            Some(Err(e)) => {
                warn!("Batch crawl stream failed: {}", e);
                state.abort(&e.user_message());
                return Err(e);
            }
            None => {
                let message = "Batch crawl ended before completion";
                state.abort(message);
                return Err(ClientError::Collaborator(message.to_string()));
            }
        }
    }
}
