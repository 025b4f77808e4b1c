pub mod batch;
pub mod crawl;
pub mod csv;
pub mod report;
pub mod selection;
pub mod state;
pub mod tree;

pub use batch::{BatchBackend, BatchTracker, WatchEvent, WatchOutcome};
pub use crawl::{CollectOptions, CollectionLimits, RunOutcome};
pub use csv::CsvSchema;
pub use selection::SelectionSet;
pub use state::{BatchCrawlState, CollectSession, Facet, LinkGroup, ResultState};
pub use tree::{LinkTreeNode, build_forest};

pub fn print_banner() {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  vcrawl v{}", env!("CARGO_PKG_VERSION"));
    println!("  collect, structure and export crawl results");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
}
