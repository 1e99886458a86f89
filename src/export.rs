use chrono::Utc;
use html_escape::encode_text;
use std::path::Path;
use tracing::info;

use crate::error::{BoqResult, ErrorContext};
use crate::table::node::{remove_class, strip_controls};
use crate::table::render::render_tables;
use crate::table::{Cell, Table};

const EXPORT_STYLESHEET: &str = "body { font-family: Arial, sans-serif; margin: 24px; color: #222; }\n\
table { border-collapse: collapse; width: 100%; }\n\
th, td { border: 1px solid #ddd; padding: 8px; vertical-align: top; }\n\
th { background: #1a365d; color: #d4af37; }\n\
img { max-width: 100px; max-height: 100px; }\n\
.generated { color: #666; font-size: 12px; margin-bottom: 16px; }";

/// Copy of a live table with every editing affordance removed.
pub fn clean_table(table: &Table) -> Table {
    let mut clean = table.clone();
    for row in std::iter::once(&mut clean.header).chain(clean.rows.iter_mut()) {
        row.cells.retain(|c| !c.is_action());
        for cell in row.cells.iter_mut() {
            clean_cell(cell);
        }
    }
    clean
}

fn clean_cell(cell: &mut Cell) {
    strip_controls(&mut cell.content);
    cell.editable = false;
    cell.attrs.remove("contenteditable");
    remove_class(&mut cell.attrs, "editable-cell");
    cell.style.remove("cursor");
    cell.style.remove("outline");
    cell.images_mut(|img| {
        img.draggable = false;
        img.attrs.remove("draggable");
        img.style.remove("cursor");
        img.style.remove("opacity");
    });
}

/// Standalone HTML document for "download edited table".
pub fn export_document(tables: &[Table], title: &str) -> String {
    let clean: Vec<Table> = tables.iter().map(clean_table).collect();
    let generated = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{css}\n</style>\n</head>\n<body>\n<h1>{title}</h1>\n<div class=\"generated\">Generated {generated}</div>\n{tables}\n</body>\n</html>\n",
        title = encode_text(title),
        css = EXPORT_STYLESHEET,
        generated = generated,
        tables = render_tables(&clean),
    )
}

pub async fn write_document(tables: &[Table], title: &str, output_path: &Path) -> BoqResult<()> {
    info!("Exporting edited table to {:?}", output_path);
    let html = export_document(tables, title);
    tokio::fs::write(output_path, html.as_bytes())
        .await
        .with_path(output_path)?;
    info!(bytes = html.len(), "Export completed");
    Ok(())
}
