//! Merging per-page extraction output into one stitched table.
//!
//! The first header row found becomes the only header. Header rows repeated
//! on later pages are skipped and rows without visible content are dropped.

pub mod markdown;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::StitchResponse;
use crate::error::{BoqError, BoqResult};

pub const NO_TABLES_MESSAGE: &str = "No tables found to stitch";

const HEADER_KEYWORDS: [&str; 11] = [
    "si.no",
    "item",
    "description",
    "qty",
    "unit",
    "rate",
    "amount",
    "price",
    "total",
    "image",
    "ref",
];

const PAGE_KEYS: [&str; 4] = ["layoutParsingResults", "layout_parsing_results", "pages", "results"];
const TABLE_LABELS: [&str; 3] = ["table", "table_block", "table_cell"];

struct Patterns {
    table: Regex,
    row: Regex,
    tag: Regex,
}

impl Patterns {
    fn new() -> BoqResult<Self> {
        Ok(Self {
            table: Regex::new(r"(?is)<table[^>]*>(.*?)</table>")?,
            row: Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>")?,
            tag: Regex::new(r"<[^>]+>")?,
        })
    }

    fn visible_text(&self, row_html: &str) -> String {
        self.tag
            .replace_all(row_html, "")
            .replace("&nbsp;", "\u{a0}")
            .replace("&#160;", "\u{a0}")
    }
}

/// Whether a row's visible text is empty once whitespace, NBSP and
/// zero-width characters are removed.
pub fn is_blank_text(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_whitespace() || matches!(c, '\u{a0}' | '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}'))
}

pub struct Stitcher {
    patterns: Patterns,
    header: Option<String>,
    rows: Vec<String>,
    pages: usize,
}

impl Stitcher {
    pub fn new() -> BoqResult<Self> {
        Ok(Self {
            patterns: Patterns::new()?,
            header: None,
            rows: Vec::new(),
            pages: 0,
        })
    }

    /// A row is a header when it has `th` cells or names a BOQ column.
    pub fn is_header_row(&self, row_html: &str) -> bool {
        if row_html.to_lowercase().contains("<th") {
            return true;
        }
        let text = self.patterns.visible_text(row_html).trim().to_lowercase();
        HEADER_KEYWORDS.iter().any(|k| text.contains(k))
    }

    /// Add the rows of one table; `rows` are `<tr>` inner markup.
    fn push_rows(&mut self, rows: Vec<String>) {
        let mut rows = rows.into_iter().peekable();
        let Some(first) = rows.peek() else {
            return;
        };
        if self.is_header_row(first) {
            let first = rows.next().unwrap_or_default();
            if self.header.is_none() {
                debug!(page = self.pages, "Using first header row found");
                self.header = Some(first);
            } else {
                debug!(page = self.pages, "Skipping repeated header row");
            }
        }
        self.rows.extend(rows);
    }

    /// Add every HTML table in a block of markup. Bare `<tr>` rows with no
    /// enclosing table count as one table.
    pub fn push_html(&mut self, html: &str) -> usize {
        let mut tables: Vec<Vec<String>> = self
            .patterns
            .table
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|body| self.extract_rows(body.as_str()))
            .collect();
        if tables.is_empty() {
            tables.push(self.extract_rows(html));
        }
        let count = tables.iter().filter(|t| !t.is_empty()).count();
        for rows in tables {
            self.push_rows(rows);
        }
        count
    }

    fn extract_rows(&self, html: &str) -> Vec<String> {
        self.patterns
            .row
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .collect()
    }

    /// Add every pipe table in markdown text.
    pub fn push_markdown(&mut self, text: &str) -> usize {
        let tables = markdown::parse_pipe_tables(text);
        let count = tables.len();
        for table in tables {
            self.push_rows(table.html_rows());
        }
        count
    }

    /// A free-form page: HTML tables first, pipe tables if there are none.
    pub fn push_page(&mut self, content: &str) {
        self.pages += 1;
        if self.push_html(content) == 0 {
            self.push_markdown(content);
        }
    }

    /// A page object from the layout-parsing API. Table blocks are used when
    /// present; the page markdown is the fallback.
    pub fn push_layout_page(&mut self, page: &Value) {
        self.pages += 1;
        let Some(page) = page.as_object() else {
            warn!(page = self.pages, "Skipping page that is not an object");
            return;
        };

        let blocks = page
            .get("prunedResult")
            .and_then(|p| p.get("parsing_res_list"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut found = 0;
        for block in &blocks {
            if let Some(content) = table_block_content(block) {
                found += if content.matches('|').count() > 2 && !content.contains('<') {
                    self.push_markdown(content)
                } else {
                    self.push_html(content)
                };
            }
        }

        if found == 0 {
            let text = page
                .get("markdown")
                .and_then(|m| m.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !text.is_empty() && self.push_html(text) == 0 {
                self.push_markdown(text);
            }
        }
        debug!(page = self.pages, blocks = blocks.len(), rows = self.rows.len(), "Processed page");
    }

    /// Drop blank rows and build the stitched fragment.
    pub fn finish(self) -> BoqResult<StitchResponse> {
        if self.rows.is_empty() {
            return Err(BoqError::UpstreamBadRequest {
                message: NO_TABLES_MESSAGE.to_string(),
                details: Some(format!(
                    "Processed {} pages but found no table blocks with content",
                    self.pages
                )),
                hint: Some(
                    "The document may not contain tables, or tables were not detected during extraction."
                        .to_string(),
                ),
                available_keys: Vec::new(),
            });
        }

        let total = self.rows.len();
        let rows: Vec<&String> = self
            .rows
            .iter()
            .filter(|row| !is_blank_text(&self.patterns.visible_text(row)))
            .collect();
        if rows.len() < total {
            debug!(removed = total - rows.len(), "Filtered empty rows");
        }

        let mut html = String::from("<table border=\"1\">");
        if let Some(header) = &self.header {
            html.push_str(&format!("<thead><tr>{}</tr></thead>", header));
        }
        html.push_str("<tbody>");
        for row in &rows {
            html.push_str(&format!("<tr>{}</tr>", row));
        }
        html.push_str("</tbody></table>");

        let message = format!("Successfully stitched {} rows from {} pages", rows.len(), self.pages);
        info!(rows = rows.len(), pages = self.pages, "Stitched tables");
        Ok(StitchResponse {
            success: true,
            stitched_html: html,
            row_count: rows.len(),
            page_count: self.pages,
            message: Some(message),
        })
    }
}

fn str_field<'a>(block: &'a Value, key: &str) -> &'a str {
    block.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn table_block_content(block: &Value) -> Option<&str> {
    let content = str_field(block, "block_content");
    if content.is_empty() {
        return None;
    }
    let label = str_field(block, "block_label").to_lowercase();
    let kind = str_field(block, "block_type").to_lowercase();
    let lower = content.to_lowercase();
    let is_table = TABLE_LABELS.contains(&label.as_str())
        || kind == "table"
        || kind == "table_block"
        || lower.contains("<table")
        || lower.contains("<tr")
        || lower.contains("<td")
        || content.matches('|').count() > 2;
    is_table.then_some(content)
}

/// Find the page list in an extraction result, unwrapping `result`.
fn layout_pages(extraction: &Value) -> BoqResult<&Vec<Value>> {
    let result = match extraction.get("result") {
        Some(inner) if inner.is_object() || inner.is_array() => inner,
        _ => extraction,
    };
    if let Some(pages) = result.as_array() {
        if !pages.is_empty() {
            return Ok(pages);
        }
    }
    if let Some(pages) = PAGE_KEYS
        .iter()
        .filter_map(|k| result.get(*k).and_then(Value::as_array))
        .find(|pages| !pages.is_empty())
    {
        return Ok(pages);
    }

    let available_keys = result
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    Err(BoqError::UpstreamBadRequest {
        message: NO_TABLES_MESSAGE.to_string(),
        details: Some("No layout parsing results found in extraction result".to_string()),
        hint: Some(
            "The extraction may not have found any tables. Check the extraction was successful and try again."
                .to_string(),
        ),
        available_keys,
    })
}

/// Stitch a layout-parsing extraction result.
pub fn stitch_layout(extraction: &Value) -> BoqResult<StitchResponse> {
    let pages = layout_pages(extraction)?;
    info!(pages = pages.len(), "Stitching layout pages");
    let mut stitcher = Stitcher::new()?;
    for page in pages {
        stitcher.push_layout_page(page);
    }
    stitcher.finish()
}

/// Stitch free-form pages (HTML or markdown), one string per page.
pub fn stitch_pages<S: AsRef<str>>(pages: &[S]) -> BoqResult<StitchResponse> {
    if pages.is_empty() {
        return Err(BoqError::UpstreamBadRequest {
            message: NO_TABLES_MESSAGE.to_string(),
            details: Some("No pages given".to_string()),
            hint: None,
            available_keys: Vec::new(),
        });
    }
    let mut stitcher = Stitcher::new()?;
    for page in pages {
        stitcher.push_page(page.as_ref());
    }
    stitcher.finish()
}
