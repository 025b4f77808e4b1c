use clap::ArgMatches;
use colored::Colorize;
use commands::command_argument_builder;
use tracing::Level;
use vcrawl::handlers::{
    build_client, handle_analyze, handle_batch, handle_crawl, handle_links, handle_llm_convert,
    handle_llm_list, handle_llm_results, handle_llm_status, handle_llm_submit,
};
use vcrawl_client::config::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use vcrawl_core::print_banner;

mod commands;

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let api_url = matches
        .get_one::<String>("api-url")
        .map(String::as_str)
        .unwrap_or(DEFAULT_BASE_URL);
    let timeout = matches
        .get_one::<u64>("timeout")
        .copied()
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let client = build_client(api_url, timeout)?;

    match matches.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(&client, primary_command, quiet).await,
        Some(("analyze", primary_command)) => handle_analyze(&client, primary_command, quiet).await,
        Some(("links", primary_command)) => handle_links(&client, primary_command, quiet).await,
        Some(("batch", primary_command)) => handle_batch(&client, primary_command, quiet).await,
        Some(("llm", primary_command)) => match primary_command.subcommand() {
            Some(("convert", secondary_command)) => {
                handle_llm_convert(&client, secondary_command).await
            }
            Some(("submit", secondary_command)) => {
                handle_llm_submit(&client, secondary_command).await
            }
            Some(("status", secondary_command)) => {
                handle_llm_status(&client, secondary_command).await
            }
            Some(("results", secondary_command)) => {
                handle_llm_results(&client, secondary_command).await
            }
            Some(("list", secondary_command)) => handle_llm_list(&client, secondary_command).await,
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    if let Err(e) = dispatch(&chosen_command, quiet).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
