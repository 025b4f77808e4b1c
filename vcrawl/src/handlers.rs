use anyhow::{Context, anyhow};
use chrono::Utc;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use vcrawl_client::request::{DEFAULT_ANALYZE_INSTRUCTION, DEFAULT_CRAWL_INSTRUCTION};
use vcrawl_client::{
    AnalyzeRequest, BatchDownload, BatchJob, BatchLink, BatchStatus, ClientConfig, ClientError,
    ConvertRequest, CrawlClient, CrawlRequest,
};
use vcrawl_core::batch::{
    BatchBackend, BatchTracker, WatchEvent, WatchOutcome, batch_ids, default_batch_instruction,
};
use vcrawl_core::crawl::{
    CollectOptions, LogCallback, RunOutcome, execute_batch_crawl, execute_collect,
    normalize_target_url,
};
use vcrawl_core::csv::{self, CsvSchema};
use vcrawl_core::report::{
    self, PageFormat, render_batch_progress, render_list_view, render_page,
    render_page_summary, render_roster, render_sitemap,
};
use vcrawl_core::state::{BatchCrawlState, CollectSession, LinkGroup, ResultState};

// Helper functions shared by the handlers

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw.trim()).as_ref())
}

/// Converts a client error into the message shown to the user.
pub fn user_error(e: ClientError) -> anyhow::Error {
    anyhow!(e.user_message())
}

pub fn build_client(api_url: &str, timeout_secs: u64) -> anyhow::Result<CrawlClient> {
    let config = ClientConfig::default()
        .with_base_url(api_url)
        .with_timeout(timeout_secs);
    CrawlClient::new(config).context("Failed to build HTTP client")
}

fn required<'a>(args: &'a ArgMatches, id: &str) -> anyhow::Result<&'a String> {
    args.get_one::<String>(id)
        .ok_or_else(|| anyhow!("--{} is required", id))
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn spinner(quiet: bool, message: &str) -> Option<ProgressBar> {
    if quiet {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Token cancelled on Ctrl-C. Cancelling only stops this client from
/// listening; work already started on the service keeps running.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    cancel
}

/// Applies `--select` and `--subtree` to a fresh result set.
pub fn apply_selection(
    state: &mut ResultState,
    select: &str,
    subtrees: &[String],
) -> anyhow::Result<()> {
    let group = match select {
        "all" => Some(LinkGroup::All),
        "internal" => Some(LinkGroup::Internal),
        "external" => Some(LinkGroup::External),
        _ => None,
    };
    if let Some(group) = group {
        state.select_group(group, true);
    }

    for href in subtrees {
        state.select_subtree(href, true).map_err(user_error)?;
    }
    Ok(())
}

/// Writes the selected links as CSV into `dir` and returns the file path.
pub fn export_selection(
    state: &ResultState,
    hierarchical: bool,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let schema = if hierarchical {
        CsvSchema::Hierarchical
    } else {
        CsvSchema::Flat
    };
    let content = state.export_csv(schema).map_err(user_error)?;
    report::write_export(dir, schema, &content, Utc::now())
        .with_context(|| format!("Failed to write export into {}", dir.display()))
}

/// Output folder name for a batch crawl started from a CSV file.
pub fn default_batch_folder(csv_path: &Path) -> String {
    csv_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("batch_crawl")
        .to_string()
}

/// Roster placeholders for ids typed by the user. Blank and repeated ids are dropped.
pub fn pending_jobs(ids: &[String]) -> Vec<BatchJob> {
    let jobs: Vec<BatchJob> = ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(|id| BatchJob::new(id, BatchStatus::Queued))
        .collect();
    batch_ids(&jobs)
        .into_iter()
        .map(|id| BatchJob::new(id, BatchStatus::Queued))
        .collect()
}

fn print_download(download: &BatchDownload) {
    print_success(&format!(
        "Downloaded {} result file(s) to {}",
        download.total_files, download.output_folder
    ));
    if download.rejected_count > 0 {
        println!(
            "{} {} chunk(s) were rejected by the model",
            "⚠".yellow().bold(),
            download.rejected_count
        );
    }
}

// Single page

pub async fn handle_crawl(
    client: &CrawlClient,
    args: &ArgMatches,
    quiet: bool,
) -> anyhow::Result<()> {
    let url = normalize_target_url(required(args, "url")?).map_err(user_error)?;
    let model = required(args, "model")?;
    let instruction = args
        .get_one::<String>("instruction")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CRAWL_INSTRUCTION);
    let format = args
        .get_one::<String>("format")
        .and_then(|f| f.parse::<PageFormat>().ok())
        .unwrap_or(PageFormat::Markdown);

    let request = CrawlRequest::new(url.as_str())
        .with_model(model.as_str())
        .with_instruction(instruction);

    let pb = spinner(quiet, &format!("Crawling {}", url));
    let page = client.crawl_page(&request).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let page = page.map_err(user_error)?;

    let content = render_page(&page, format).context("Failed to render page")?;
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            report::save_report(&content, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Saved to {}", path.display()));
        }
        None => {
            println!("{}", content);
            if format != PageFormat::Json {
                print!("{}", render_page_summary(&page));
            }
        }
    }
    Ok(())
}

pub async fn handle_analyze(
    client: &CrawlClient,
    args: &ArgMatches,
    quiet: bool,
) -> anyhow::Result<()> {
    let input = args
        .get_one::<PathBuf>("input")
        .ok_or_else(|| anyhow!("--input is required"))?;
    let input = expand_path(&input.to_string_lossy());
    let content = fs::read_to_string(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let model = required(args, "model")?;
    let instruction = args
        .get_one::<String>("instruction")
        .map(String::as_str)
        .unwrap_or(DEFAULT_ANALYZE_INSTRUCTION);

    let request = AnalyzeRequest::new(content, model.as_str()).with_instruction(instruction);

    let pb = spinner(quiet, "Analyzing...");
    let result = client.analyze(&request).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let result = result.map_err(user_error)?;

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            report::save_report(&result, &path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!("Saved to {}", path.display()));
        }
        None => println!("{}", result),
    }
    Ok(())
}

// Link collection

pub async fn handle_links(
    client: &CrawlClient,
    args: &ArgMatches,
    quiet: bool,
) -> anyhow::Result<()> {
    let seed = normalize_target_url(required(args, "url")?).map_err(user_error)?;
    let mut options = CollectOptions::new(seed.as_str());
    options.depth = args.get_one::<u32>("depth").copied().unwrap_or(0);
    options.max_urls = args.get_one::<usize>("max-urls").copied();
    options.show_progress_bars = !quiet;

    let mut results = ResultState::new();
    let mut session = CollectSession::new(seed.as_str());
    let log_callback: LogCallback = Arc::new(|line: &str| info!(target: "vcrawl::collect", "{}", line));
    let cancel = cancel_on_ctrl_c();

    let outcome = execute_collect(
        client,
        &options,
        &mut results,
        &mut session,
        Some(log_callback),
        &cancel,
    )
    .await;

    match outcome {
        Ok(RunOutcome::Completed) => {}
        Ok(RunOutcome::Cancelled) => {
            println!("{} Stopped listening; no results were received", "⚠".yellow());
            return Ok(());
        }
        Err(e) => {
            for line in session.logs() {
                eprintln!("  {}", line.dimmed());
            }
            return Err(user_error(e));
        }
    }

    if results.is_empty() {
        println!("No links found on {}", seed);
        return Ok(());
    }

    let select = args
        .get_one::<String>("select")
        .map(String::as_str)
        .unwrap_or("none");
    let subtrees: Vec<String> = args
        .get_many::<String>("subtree")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    apply_selection(&mut results, select, &subtrees)?;

    println!();
    print_divider();
    match args.get_one::<String>("view").map(String::as_str) {
        Some("sitemap") => print!("{}", render_sitemap(&results.tree(), results.selection())),
        _ => print!("{}", render_list_view(&results)),
    }
    print_divider();

    if args.get_flag("export") {
        let dir = expand_path(required(args, "export-dir")?);
        let path = export_selection(&results, args.get_flag("hierarchical"), &dir)?;
        print_success(&format!(
            "Exported {} link(s) to {}",
            results.selection().len(),
            path.display()
        ));
    }

    if let Some(folder) = args.get_one::<String>("batch-folder") {
        let links = results.batch_links().map_err(user_error)?;
        run_batch_crawl(client, &links, folder, quiet).await?;
    }

    Ok(())
}

// Batch crawl

pub async fn handle_batch(
    client: &CrawlClient,
    args: &ArgMatches,
    quiet: bool,
) -> anyhow::Result<()> {
    let csv_path = expand_path(required(args, "csv")?);
    let links = csv::import_file(&csv_path).map_err(user_error)?;
    let folder = args
        .get_one::<String>("folder")
        .cloned()
        .unwrap_or_else(|| default_batch_folder(&csv_path));

    println!(
        "{} Loaded {} link(s) from {}",
        "→".blue(),
        links.len(),
        csv_path.display().to_string().bright_white()
    );
    run_batch_crawl(client, &links, &folder, quiet).await
}

async fn run_batch_crawl(
    client: &CrawlClient,
    links: &[BatchLink],
    folder: &str,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut state = BatchCrawlState::new(links);
    let cancel = cancel_on_ctrl_c();

    let outcome = execute_batch_crawl(client, links, folder, &mut state, None, !quiet, &cancel).await;

    println!();
    print!("{}", render_batch_progress(&state));

    match outcome {
        Ok(RunOutcome::Completed) => {
            if let Some(folder) = state.result_folder() {
                print_success(&format!("Pages saved to {}", folder));
            }
            Ok(())
        }
        Ok(RunOutcome::Cancelled) => {
            println!(
                "{} Stopped listening; the service may still be crawling",
                "⚠".yellow()
            );
            Ok(())
        }
        Err(e) => Err(user_error(e)),
    }
}

// LLM batch jobs

async fn watch_roster<B: BatchBackend>(tracker: &mut BatchTracker<B>) -> WatchOutcome {
    let cancel = cancel_on_ctrl_c();
    println!(
        "{} Polling every {}s, Ctrl-C to stop",
        "→".blue(),
        tracker.poll_interval().as_secs()
    );

    let outcome = tracker
        .watch(&cancel, |event| match event {
            WatchEvent::Updated(jobs) => {
                println!();
                print!("{}", render_roster(&jobs, None));
            }
            WatchEvent::PollFailed(message) => {
                eprintln!("{} {}", "⚠".yellow().bold(), message);
            }
        })
        .await;

    match outcome {
        WatchOutcome::AllTerminal => print_success("All batch jobs finished"),
        WatchOutcome::Cancelled => println!("{} Stopped polling", "⚠".yellow()),
        WatchOutcome::Idle => {}
    }
    outcome
}

pub async fn handle_llm_convert(client: &CrawlClient, args: &ArgMatches) -> anyhow::Result<()> {
    let folder = expand_path(required(args, "folder")?);
    let request = ConvertRequest {
        folder_path: folder.to_string_lossy().into_owned(),
        instruction: args
            .get_one::<String>("instruction")
            .cloned()
            .unwrap_or_else(|| default_batch_instruction().to_string()),
        model: required(args, "model")?.clone(),
    };

    let mut tracker = BatchTracker::new(client.clone());
    let result = tracker.convert(&request).await.map_err(user_error)?;

    print_success(&format!(
        "Converted {} file(s) into {} batch file(s)",
        result.file_count, result.batch_files_created
    ));
    println!(
        "{} Next: vcrawl llm submit --folder {}",
        "→".blue(),
        result.output_folder.bright_white()
    );
    Ok(())
}

pub async fn handle_llm_submit(client: &CrawlClient, args: &ArgMatches) -> anyhow::Result<()> {
    let folder = expand_path(required(args, "folder")?);
    let mut tracker = BatchTracker::new(client.clone());

    let roster = tracker
        .submit(&folder.to_string_lossy())
        .await
        .map_err(user_error)?;
    print_success(&format!("Submitted {} batch job(s)", roster.len()));
    print!("{}", render_roster(roster, None));

    if args.get_flag("watch") && watch_roster(&mut tracker).await == WatchOutcome::AllTerminal {
        match tracker.download_results(None).await {
            Ok(download) => print_download(&download),
            Err(ClientError::NotReady(message)) => println!("{}", message),
            Err(e) => return Err(user_error(e)),
        }
    }
    Ok(())
}

pub async fn handle_llm_status(client: &CrawlClient, args: &ArgMatches) -> anyhow::Result<()> {
    let ids: Vec<String> = args
        .get_many::<String>("id")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let mut tracker = BatchTracker::new(client.clone());
    tracker.resume(pending_jobs(&ids));

    tracker.poll_status().await.map_err(user_error)?;
    print!("{}", render_roster(tracker.roster(), None));

    if args.get_flag("watch") {
        watch_roster(&mut tracker).await;
    }
    Ok(())
}

pub async fn handle_llm_results(client: &CrawlClient, args: &ArgMatches) -> anyhow::Result<()> {
    let ids: Vec<String> = args
        .get_many::<String>("id")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let output = expand_path(required(args, "output")?)
        .to_string_lossy()
        .into_owned();

    let mut tracker = BatchTracker::new(client.clone());
    tracker.resume(pending_jobs(&ids));
    tracker.poll_status().await.map_err(user_error)?;

    let waiting: Vec<&BatchJob> = tracker
        .roster()
        .iter()
        .filter(|job| !job.is_completed())
        .collect();
    for job in &waiting {
        println!("{} {} is {}, skipped", "⚠".yellow(), job.batch_id, job.status);
    }

    let download = tracker
        .download_results(Some(output.as_str()))
        .await
        .map_err(user_error)?;
    print_download(&download);
    Ok(())
}

pub async fn handle_llm_list(client: &CrawlClient, args: &ArgMatches) -> anyhow::Result<()> {
    let limit = args.get_one::<usize>("limit").copied().unwrap_or(30);
    let mut tracker = BatchTracker::new(client.clone());
    tracker.list_recent(limit).await.map_err(user_error)?;

    if !args.get_flag("download") {
        print!("{}", render_roster(tracker.recovered(), None));
        return Ok(());
    }

    match args.get_many::<String>("id") {
        Some(ids) => {
            for id in ids {
                tracker.toggle_recovered(id.trim());
            }
        }
        None => {
            tracker.toggle_all_recovered();
        }
    }
    print!(
        "{}",
        render_roster(tracker.recovered(), Some(tracker.recovery_selection()))
    );

    let output = expand_path(required(args, "output")?);
    let download = tracker
        .download_recovered(&output.to_string_lossy())
        .await
        .map_err(user_error)?;
    print_download(&download);
    Ok(())
}
