use crate::CLAP_STYLING;
use clap::{ArgAction, arg, command, value_parser};
use std::path::PathBuf;
use vcrawl_client::config::DEFAULT_BASE_URL;
use vcrawl_client::request::{DEFAULT_BATCH_MODEL, NO_MODEL};

fn id_arg() -> clap::Arg {
    arg!(--"id" <BATCH_ID>)
        .required(true)
        .help("Batch job id; repeat or pass several")
        .num_args(1..)
        .action(ArgAction::Append)
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("vcrawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("vcrawl")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and progress bars").required(false))
        .arg(arg!(-v --"verbose" ... "Raise log verbosity (-v info, -vv debug)").required(false))
        .arg(
            arg!(--"api-url" <URL>)
                .required(false)
                .help("Base URL of the crawl service")
                .env("VCRAWL_API_URL")
                .default_value(DEFAULT_BASE_URL),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .help("Timeout for non-streamed requests in seconds")
                .value_parser(value_parser!(u64))
                .default_value("120"),
        )
        .subcommand_required(false)
        .subcommand(
            command!("crawl")
                .about("Crawl a single page and print one rendition of it")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The page to crawl; https:// is added when no scheme is given"),
                )
                .arg(
                    arg!(-m --"model" <MODEL>)
                        .required(false)
                        .help("LLM model for extraction, or 'none'")
                        .default_value(NO_MODEL),
                )
                .arg(
                    arg!(--"instruction" <TEXT>)
                        .required(false)
                        .help("Extraction instruction sent with the model"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Rendition to print")
                        .value_parser(["markdown", "html", "content-markdown", "content-html", "json"])
                        .default_value("markdown"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the rendition to a file instead of printing it")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("analyze")
                .about("Run an LLM instruction over local content")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("File holding the content to analyze")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-m --"model" <MODEL>)
                        .required(true)
                        .help("LLM model to use"),
                )
                .arg(
                    arg!(--"instruction" <TEXT>)
                        .required(false)
                        .help("Analysis instruction"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save the analysis to a file")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("links")
                .about(
                    "Collect the links of a site, select some of them, then export or \
                batch crawl the selection",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("Seed URL of the collection"),
                )
                .arg(
                    arg!(-d --"depth" <DEPTH>)
                        .required(false)
                        .help("Link depth to follow, 0 collects the seed page only")
                        .value_parser(value_parser!(u32).range(0..=3))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"max-urls" <NUM>)
                        .required(false)
                        .help("URL budget, capped at 500 for depth 0 and 1400 otherwise")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    arg!(--"view" <VIEW>)
                        .required(false)
                        .help("How to print the collected links")
                        .value_parser(["list", "sitemap"])
                        .default_value("list"),
                )
                .arg(
                    arg!(--"select" <GROUP>)
                        .required(false)
                        .help("Select a whole group of links")
                        .value_parser(["all", "internal", "external", "none"])
                        .default_value("none"),
                )
                .arg(
                    arg!(--"subtree" <URL>)
                        .required(false)
                        .help("Select a link and everything below it in the sitemap")
                        .action(ArgAction::Append),
                )
                .arg(
                    arg!(--"export")
                        .required(false)
                        .help("Export the selected links as CSV")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"hierarchical")
                        .required(false)
                        .help("Export with depth, path and parent columns")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"export-dir" <DIR>)
                        .required(false)
                        .help("Directory for the exported CSV")
                        .default_value("."),
                )
                .arg(
                    arg!(--"batch-folder" <NAME>)
                        .required(false)
                        .help("Batch crawl the selected links into this output folder"),
                ),
        )
        .subcommand(
            command!("batch")
                .about("Batch crawl the links listed in a CSV export")
                .arg(
                    arg!(--"csv" <PATH>)
                        .required(true)
                        .help("CSV file in the flat or hierarchical export layout"),
                )
                .arg(
                    arg!(--"folder" <NAME>)
                        .required(false)
                        .help("Output folder name (default: the CSV file name)"),
                ),
        )
        .subcommand(
            command!("llm")
                .about("Prepare, submit and track LLM batch jobs over crawled pages")
                .subcommand_required(true)
                .subcommand(
                    command!("convert")
                        .about("Convert a crawl output folder into batch input files")
                        .arg(
                            arg!(--"folder" <DIR>)
                                .required(true)
                                .help("Folder of crawled markdown files"),
                        )
                        .arg(
                            arg!(--"instruction" <TEXT>)
                                .required(false)
                                .help("Instruction applied to every page"),
                        )
                        .arg(
                            arg!(-m --"model" <MODEL>)
                                .required(false)
                                .help("Model the batch runs on")
                                .default_value(DEFAULT_BATCH_MODEL),
                        ),
                )
                .subcommand(
                    command!("submit")
                        .about("Submit every batch input file of a folder")
                        .arg(
                            arg!(--"folder" <DIR>)
                                .required(true)
                                .help("Folder of batch input (.jsonl) files"),
                        )
                        .arg(
                            arg!(--"watch")
                                .required(false)
                                .help("Poll until every job is finished")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    command!("status")
                        .about("Show the status of batch jobs")
                        .arg(id_arg())
                        .arg(
                            arg!(--"watch")
                                .required(false)
                                .help("Poll until every job is finished")
                                .action(ArgAction::SetTrue),
                        ),
                )
                .subcommand(
                    command!("results")
                        .about("Download results of completed batch jobs")
                        .arg(id_arg())
                        .arg(
                            arg!(-o --"output" <DIR>)
                                .required(false)
                                .help("Folder to download results into")
                                .default_value("batch_results"),
                        ),
                )
                .subcommand(
                    command!("list")
                        .about("List recent batch jobs, including ones from earlier sessions")
                        .arg(
                            arg!(--"limit" <NUM>)
                                .required(false)
                                .help("How many jobs to fetch")
                                .value_parser(value_parser!(usize))
                                .default_value("30"),
                        )
                        .arg(
                            arg!(--"download")
                                .required(false)
                                .help("Download results of the listed jobs that completed")
                                .action(ArgAction::SetTrue),
                        )
                        .arg(
                            arg!(--"id" <BATCH_ID>)
                                .required(false)
                                .help("Only download these jobs")
                                .num_args(1..)
                                .action(ArgAction::Append)
                                .requires("download"),
                        )
                        .arg(
                            arg!(-o --"output" <DIR>)
                                .required(false)
                                .help("Folder to download results into")
                                .default_value("batch_results"),
                        ),
                ),
        )
}
