pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod request;
pub mod result;
pub mod stream;

pub use client::{CrawlClient, LinkFeed};
pub use config::ClientConfig;
pub use error::{ClientError, FrameError};
pub use job::{BatchDownload, BatchJob, BatchStatus, ConvertResult};
pub use request::{AnalyzeRequest, CollectLinksRequest, ConvertRequest, CrawlRequest};
pub use result::{BatchLink, LinkCategory, LinkCollection, LinkRecord, PageCrawl, PageStructure};
pub use stream::{BatchSummary, EventStream, FrameDecoder, ProgressEvent, ProgressStatus, StreamEvent};
