//! Reading the live table back into tabular data and presenting costed results.

use html_escape::encode_text;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::backend::BackendClient;
use crate::config::Theme;
use crate::error::{BoqError, BoqResult};
use crate::table::render::render_nodes;
use crate::table::{FileId, Table};

const ORIGINAL_SUFFIX: &str = "_original";

/// Costing model inputs. Ranges are validated by the form, not here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostingFactors {
    pub net_margin: f64,
    pub freight: f64,
    pub customs: f64,
    pub installation: f64,
    pub exchange_rate: f64,
    pub additional: f64,
}

impl CostingFactors {
    /// Factors that leave prices unchanged (zero-costing).
    pub fn neutral() -> Self {
        Self {
            net_margin: 0.0,
            freight: 0.0,
            customs: 0.0,
            installation: 0.0,
            exchange_rate: 1.0,
            additional: 0.0,
        }
    }
}

impl Default for CostingFactors {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Header labels plus one label→value map per data row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<IndexMap<String, String>>,
}

/// Read the live table, skipping the Actions column. Cells holding an image
/// contribute their inner markup, others their trimmed text.
pub fn extract(table: &Table) -> TableData {
    let headers = table.data_labels();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .zip(row.data_cells())
                .map(|(label, cell)| {
                    let value = if cell.has_image() {
                        render_nodes(&cell.content)
                    } else {
                        cell.text().trim().to_string()
                    };
                    (label.clone(), value)
                })
                .collect()
        })
        .collect();
    debug!(file_id = %table.file_id, columns = headers.len(), "Extracted table data");
    TableData { headers, rows }
}

#[derive(Debug, Clone, Serialize)]
pub struct CostingRequest<'a> {
    pub file_id: &'a FileId,
    pub factors: &'a CostingFactors,
    pub table_data: &'a TableData,
}

/// One table as returned by the costing backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostedTable {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub rows: Vec<IndexMap<String, Value>>,
}

impl CostedTable {
    pub fn cell_text(&self, row: usize, header: &str) -> String {
        self.rows
            .get(row)
            .and_then(|r| r.get(header))
            .map(value_text)
            .unwrap_or_default()
    }
}

impl From<&TableData> for CostedTable {
    fn from(data: &TableData) -> Self {
        Self {
            headers: data.headers.clone(),
            rows: data
                .rows
                .iter()
                .map(|r| r.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect())
                .collect(),
        }
    }
}

/// The costing result is either a list of tables or `{tables: [...]}`.
pub fn costed_tables(result: Value) -> BoqResult<Vec<CostedTable>> {
    match result {
        Value::Array(_) => Ok(serde_json::from_value(result)?),
        Value::Object(mut map) => match map.remove("tables") {
            Some(tables) => Ok(serde_json::from_value(tables)?),
            None => Ok(vec![serde_json::from_value(Value::Object(map))?]),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(BoqError::upstream(200, format!("unexpected costing result: {}", other))),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Columns hidden from the costed preview. Any label containing "action" is
/// treated as the row-controls column, so "Action Required" is hidden too.
pub fn is_action_label(label: &str) -> bool {
    label.to_lowercase().contains("action")
}

fn is_amount_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    (lower.contains("total") || lower.contains("amount")) && !lower.ends_with(ORIGINAL_SUFFIX)
}

/// Keep digits, sign and decimal point, then read the longest leading
/// number ("12.5.3" reads as 12.5, "10-20" as 10). Anything unparsable or
/// not positive counts as nothing.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    numeric_prefix(&cleaned)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn numeric_prefix(cleaned: &str) -> &str {
    let mut end = 0;
    let mut seen_point = false;
    for (i, c) in cleaned.char_indices() {
        match c {
            '-' if i == 0 => {}
            '.' if !seen_point => seen_point = true,
            c if c.is_ascii_digit() => {}
            _ => break,
        }
        end = i + c.len_utf8();
    }
    &cleaned[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSummary {
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax: f64,
    pub grand_total: f64,
}

impl CostSummary {
    pub fn subtotal_display(&self) -> String {
        format!("{:.2}", self.subtotal)
    }

    pub fn tax_display(&self) -> String {
        format!("{:.2}", self.tax)
    }

    pub fn grand_total_display(&self) -> String {
        format!("{:.2}", self.grand_total)
    }
}

/// Sum every total/amount column across all tables.
pub fn summarize(tables: &[CostedTable], tax_rate: f64) -> CostSummary {
    let mut subtotal = 0.0;
    for table in tables {
        let amount_cols: Vec<&String> = table.headers.iter().filter(|h| is_amount_label(h)).collect();
        for row in &table.rows {
            for header in &amount_cols {
                if let Some(amount) = row.get(header.as_str()).map(value_text).and_then(|t| parse_amount(&t)) {
                    subtotal += amount;
                }
            }
        }
    }
    let tax = subtotal * tax_rate;
    CostSummary {
        subtotal,
        tax_rate,
        tax,
        grand_total: subtotal + tax,
    }
}

/// Read-only HTML for costed tables, action columns left out.
pub fn render_costed_tables(tables: &[CostedTable], theme: &Theme) -> String {
    let mut html = String::new();
    for table in tables {
        let visible: Vec<&String> = table.headers.iter().filter(|h| !is_action_label(h)).collect();
        html.push_str("<table class=\"costed-table\" border=\"1\" style=\"width: 100%; border-collapse: collapse; background: white;\"><thead><tr>");
        for header in &visible {
            html.push_str(&format!(
                "<th style=\"background: {}; color: {}; padding: 12px; border: 1px solid {}; text-align: center;\">{}</th>",
                theme.header_background,
                theme.header_foreground,
                theme.border_color,
                encode_text(header)
            ));
        }
        html.push_str("</tr></thead><tbody>");
        for row in &table.rows {
            html.push_str("<tr>");
            for header in &visible {
                let value = row.get(header.as_str()).map(value_text).unwrap_or_default();
                let cell = if value.contains('<') { value } else { encode_text(&value).into_owned() };
                html.push_str(&format!(
                    "<td style=\"padding: 8px; border: 1px solid {};\">{}</td>",
                    theme.border_color, cell
                ));
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");
    }
    html
}

pub fn render_summary(summary: &CostSummary) -> String {
    format!(
        "<div class=\"costing-summary\"><div><span>Subtotal</span><strong>{}</strong></div>\
         <div><span>Tax ({:.0}%)</span><strong>{}</strong></div>\
         <div><span>Grand Total</span><strong>{}</strong></div></div>",
        summary.subtotal_display(),
        summary.tax_rate * 100.0,
        summary.tax_display(),
        summary.grand_total_display()
    )
}

/// Costed tables, their read-only markup and the display summary.
#[derive(Debug, Clone, Serialize)]
pub struct CostingOutcome {
    pub tables: Vec<CostedTable>,
    pub html: String,
    pub summary: CostSummary,
}

/// Send the extracted table to the costing backend and present the result.
pub async fn submit(
    client: &BackendClient,
    file_id: &FileId,
    factors: &CostingFactors,
    table_data: &TableData,
    theme: &Theme,
    tax_rate: f64,
) -> BoqResult<CostingOutcome> {
    let request = CostingRequest {
        file_id,
        factors,
        table_data,
    };
    let tables = client.apply_costing(&request).await?;
    let summary = summarize(&tables, tax_rate);
    let mut html = render_costed_tables(&tables, theme);
    html.push_str(&render_summary(&summary));
    info!(
        %file_id,
        tables = tables.len(),
        subtotal = %summary.subtotal_display(),
        "Costing applied"
    );
    Ok(CostingOutcome { tables, html, summary })
}
