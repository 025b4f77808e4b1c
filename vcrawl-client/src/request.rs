use serde::Serialize;

use crate::result::BatchLink;

/// Model name that disables LLM extraction on the collaborator side.
pub const NO_MODEL: &str = "none";
pub const DEFAULT_BATCH_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_CRAWL_INSTRUCTION: &str = "Extract the main content, key points, and purpose of this page. Structure the output clearly in markdown.";
pub const DEFAULT_ANALYZE_INSTRUCTION: &str =
    "Analyze the provided content and return a well-structured markdown report.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlRequest {
    pub url: String,
    pub llm_model: String,
    pub instruction: String,
}

impl CrawlRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            llm_model: NO_MODEL.to_string(),
            instruction: DEFAULT_CRAWL_INSTRUCTION.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalyzeRequest {
    pub content: String,
    pub llm_model: String,
    pub instruction: String,
}

impl AnalyzeRequest {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            llm_model: model.into(),
            instruction: DEFAULT_ANALYZE_INSTRUCTION.to_string(),
        }
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectLinksRequest {
    pub url: String,
    pub depth: u32,
    pub max_urls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCrawlRequest {
    pub links: Vec<BatchLink>,
    pub output_folder_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertRequest {
    pub folder_path: String,
    pub instruction: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    pub jsonl_folder_path: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusRequest<'a> {
    pub batch_ids: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResultsRequest<'a> {
    pub batch_ids: &'a [String],
    pub output_folder_path: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ListRequest {
    pub limit: usize,
}
