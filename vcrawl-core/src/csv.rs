//! Link export and import in the two CSV layouts.
//!
//! The flat layout comes from the list view, the hierarchical one from the
//! sitemap view. Both are fully quoted, start with a UTF-8 byte-order mark
//! and are accepted back as batch crawl input.

use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;
use vcrawl_client::error::{ClientError, Result};
use vcrawl_client::{BatchLink, LinkRecord};

pub const BOM: char = '\u{feff}';

const FLAT_HEADER: [&str; 4] = ["Category", "Link Text", "URL", "Internal/External"];
const HIERARCHICAL_HEADER: [&str; 7] = [
    "Depth",
    "Path",
    "Parent URL",
    "URL",
    "Link Text",
    "Category",
    "Internal/External",
];
const INDENT: &str = "  ";

static FIELD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|,)("(?:[^"]|"")*"|[^,]*)"#).expect("field pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvSchema {
    Flat,
    Hierarchical,
}

impl CsvSchema {
    /// Hierarchical when the header names both a depth and a parent URL column.
    pub fn detect(header: &str) -> Self {
        let header = header.to_lowercase();
        if header.contains("depth") && header.contains("parent url") {
            CsvSchema::Hierarchical
        } else {
            CsvSchema::Flat
        }
    }

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            CsvSchema::Flat => &FLAT_HEADER,
            CsvSchema::Hierarchical => &HIERARCHICAL_HEADER,
        }
    }

    /// Column indexes of (URL, Link Text).
    fn link_columns(&self) -> (usize, usize) {
        match self {
            CsvSchema::Flat => (2, 1),
            CsvSchema::Hierarchical => (3, 4),
        }
    }

    pub fn export_prefix(&self) -> &'static str {
        match self {
            CsvSchema::Flat => "vcrawl_links",
            CsvSchema::Hierarchical => "vcrawl_sitemap",
        }
    }
}

/// Quotes a field, doubling embedded quotes. Line breaks become spaces so a
/// record always stays on one line.
fn quote(field: &str) -> String {
    let flat: String = field
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    format!("\"{}\"", flat.replace('"', "\"\""))
}

/// Indented path+query of a link for the sitemap layout.
pub fn path_label(record: &LinkRecord) -> String {
    let location = match Url::parse(&record.href) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => record.href.clone(),
    };
    format!("{}{}", INDENT.repeat(record.depth as usize), location)
}

fn row(record: &LinkRecord, schema: CsvSchema) -> String {
    let fields: Vec<String> = match schema {
        CsvSchema::Flat => vec![
            record.category.as_str().to_string(),
            record.text.clone(),
            record.href.clone(),
            record.direction().to_string(),
        ],
        CsvSchema::Hierarchical => vec![
            record.depth.to_string(),
            path_label(record),
            record.parent_url.clone(),
            record.href.clone(),
            record.text.clone(),
            record.category.as_str().to_string(),
            record.direction().to_string(),
        ],
    };

    fields
        .iter()
        .map(|field| quote(field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Encodes `records` in `schema`. Internal links come before external ones;
/// the hierarchical layout is additionally ordered by depth, keeping
/// encounter order within a depth.
pub fn encode<'a>(records: impl IntoIterator<Item = &'a LinkRecord>, schema: CsvSchema) -> String {
    let (mut ordered, external): (Vec<&LinkRecord>, Vec<&LinkRecord>) =
        records.into_iter().partition(|record| record.internal);
    ordered.extend(external);

    if schema == CsvSchema::Hierarchical {
        ordered.sort_by_key(|record| record.depth);
    }

    let mut out = String::new();
    out.push(BOM);
    out.push_str(
        &schema
            .header()
            .iter()
            .map(|name| quote(name))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for record in ordered {
        out.push_str(&row(record, schema));
        out.push('\n');
    }

    out
}

/// Splits one line into unquoted, trimmed fields. Commas inside quotes are kept.
pub fn split_fields(line: &str) -> Vec<String> {
    FIELD_PATTERN
        .captures_iter(line)
        .map(|caps| {
            let raw = caps.get(1).map_or("", |m| m.as_str());
            let unwrapped = raw
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(raw);
            unwrapped.replace("\"\"", "\"").trim().to_string()
        })
        .collect()
}

/// Decodes either layout into batch crawl input. Rows whose URL does not
/// start with `http` are skipped; a missing link text decodes as empty.
pub fn decode(text: &str) -> Result<Vec<BatchLink>> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ClientError::Validation(
            "CSV file has no link rows".to_string(),
        ));
    }

    let schema = CsvSchema::detect(lines[0]);
    let (url_col, text_col) = schema.link_columns();
    debug!(?schema, rows = lines.len() - 1, "Decoding CSV");

    let mut links = Vec::new();
    for line in &lines[1..] {
        let fields = split_fields(line);
        let href = fields.get(url_col).map(String::as_str).unwrap_or_default();
        if !href.starts_with("http") {
            continue;
        }

        let text = fields.get(text_col).map(String::as_str).unwrap_or_default();
        links.push(BatchLink::new(href, text));
    }

    if links.is_empty() {
        return Err(ClientError::Validation(
            "CSV file contains no valid http(s) URLs".to_string(),
        ));
    }

    Ok(links)
}

pub fn import_file(path: &Path) -> Result<Vec<BatchLink>> {
    let text = fs::read_to_string(path)?;
    decode(&text)
}

/// `<prefix>_export_<epoch-ms>.csv`
pub fn export_filename(prefix: &str, epoch_millis: i64) -> String {
    format!("{}_export_{}.csv", prefix, epoch_millis)
}
