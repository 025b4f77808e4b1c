use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How the crawl service classified a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LinkCategory {
    #[default]
    Standard,
    FileDownload,
    BoardForum,
}

impl LinkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkCategory::Standard => "Standard",
            LinkCategory::FileDownload => "File Download",
            LinkCategory::BoardForum => "Board/Forum",
        }
    }

    /// Parses a wire or CSV label. Anything unrecognised is a standard link.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "File Download" => LinkCategory::FileDownload,
            "Board/Forum" => LinkCategory::BoardForum,
            _ => LinkCategory::Standard,
        }
    }
}

impl From<String> for LinkCategory {
    fn from(label: String) -> Self {
        LinkCategory::from_label(&label)
    }
}

impl From<LinkCategory> for String {
    fn from(category: LinkCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One collected link. `href` is the identity key within a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub href: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub category: LinkCategory,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub parent_url: String,
}

impl LinkRecord {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
            category: LinkCategory::Standard,
            internal: true,
            depth: 0,
            parent_url: String::new(),
        }
    }

    pub fn with_category(mut self, category: LinkCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }

    pub fn with_parent(mut self, parent_url: impl Into<String>, depth: u32) -> Self {
        self.parent_url = parent_url.into();
        self.depth = depth;
        self
    }

    /// Link text, or the href when the crawler captured no text.
    pub fn display_text(&self) -> &str {
        if self.text.is_empty() {
            &self.href
        } else {
            &self.text
        }
    }

    pub fn direction(&self) -> &'static str {
        if self.internal { "Internal" } else { "External" }
    }
}

/// Collapses duplicate hrefs: a later record overwrites an earlier one but
/// keeps the position where the href was first seen.
pub fn dedup_by_href(records: impl IntoIterator<Item = LinkRecord>) -> Vec<LinkRecord> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<LinkRecord> = Vec::new();

    for record in records {
        match positions.get(&record.href) {
            Some(&idx) => unique[idx] = record,
            None => {
                positions.insert(record.href.clone(), unique.len());
                unique.push(record);
            }
        }
    }

    unique
}

/// Links returned by a collection run, split the way the service reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkCollection {
    #[serde(default)]
    pub internal_links: Vec<LinkRecord>,
    #[serde(default)]
    pub external_links: Vec<LinkRecord>,
}

impl LinkCollection {
    /// Flattens into one record set, internal links first, with the
    /// direction flag set from the list each record came from.
    pub fn into_records(self) -> Vec<LinkRecord> {
        let internal = self
            .internal_links
            .into_iter()
            .map(|record| record.with_internal(true));
        let external = self
            .external_links
            .into_iter()
            .map(|record| record.with_internal(false));
        internal.chain(external).collect()
    }

    pub fn len(&self) -> usize {
        self.internal_links.len() + self.external_links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Minimal link shape accepted by the batch crawl endpoint and produced by CSV import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLink {
    pub href: String,
    #[serde(default)]
    pub text: String,
}

impl BatchLink {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }

    /// Copy sent to the batch crawl endpoint, which names each saved file
    /// after the link text. Empty text falls back to the URL.
    pub fn labelled(&self) -> Self {
        if self.text.is_empty() {
            BatchLink::new(self.href.clone(), self.href.clone())
        } else {
            self.clone()
        }
    }
}

impl From<&LinkRecord> for BatchLink {
    fn from(record: &LinkRecord) -> Self {
        BatchLink::new(record.href.clone(), record.text.clone())
    }
}

/// Heuristic page regions reported by the single-page crawl.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageStructure {
    #[serde(default = "not_found")]
    pub header: String,
    #[serde(default = "not_found")]
    pub navigation: String,
    #[serde(default = "not_found")]
    pub main_content: String,
    #[serde(default = "not_found")]
    pub footer: String,
    #[serde(default)]
    pub ads: Vec<String>,
}

fn not_found() -> String {
    "Not found".to_string()
}

impl Default for PageStructure {
    fn default() -> Self {
        Self {
            header: not_found(),
            navigation: not_found(),
            main_content: not_found(),
            footer: not_found(),
            ads: Vec::new(),
        }
    }
}

/// Successful single-page crawl. Failures are mapped to `ClientError::Collaborator`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageCrawl {
    #[serde(default)]
    pub markdown: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub content_only_markdown: String,
    #[serde(default)]
    pub content_only_html: String,
    #[serde(default)]
    pub llm_extraction: String,
    #[serde(default)]
    pub structure: PageStructure,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
