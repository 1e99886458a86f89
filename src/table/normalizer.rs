//! Repairs stitched tables into the live editable form.

use tracing::{debug, info, warn};

use super::drag_drop::style_all_images;
use super::editability;
use super::model::{Cell, CellKind, FileId, Row, Table, TableInstanceId, ACTIONS_LABEL, ACTION_CELL_MARKER};
use super::node::{add_class, strip_controls, Attributes, Node, Style};
use super::parser::{parse_tables, RawTable, SectionKind};
use super::row_actions::{ensure_action_cell, new_action_cell, renumber};
use crate::config::Theme;
use crate::error::{BoqError, BoqResult};
use crate::logging::PerformanceTimer;

/// Counters reported after a normalization pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NormalizeReport {
    pub tables: usize,
    pub data_rows: usize,
    pub empty_rows_removed: usize,
    pub controls_stripped: usize,
    pub cells_padded: usize,
}

pub struct Normalizer<'a> {
    theme: &'a Theme,
}

impl<'a> Normalizer<'a> {
    pub fn new(theme: &'a Theme) -> Self {
        Self { theme }
    }

    /// Normalize every table in a stitched fragment. A fragment with no table
    /// or with a table that has no rows is rejected as a whole.
    pub fn normalize_fragment(&self, html: &str, file_id: &FileId) -> BoqResult<(Vec<Table>, NormalizeReport)> {
        let timer = PerformanceTimer::start(format!("normalize {}", file_id));
        let raw_tables = parse_tables(html)?;
        if raw_tables.is_empty() {
            warn!(%file_id, "Stitched fragment contains no table");
            return Err(BoqError::NoTable);
        }
        timer.checkpoint("parsed");

        let mut report = NormalizeReport::default();
        let mut tables = Vec::with_capacity(raw_tables.len());
        for (index, raw) in raw_tables.into_iter().enumerate() {
            tables.push(self.normalize_table(raw, index, file_id, &mut report)?);
        }
        report.tables = tables.len();
        report.data_rows = tables.iter().map(|t| t.rows.len()).sum();

        info!(
            %file_id,
            tables = report.tables,
            rows = report.data_rows,
            empty_removed = report.empty_rows_removed,
            "Normalized stitched tables"
        );
        Ok((tables, report))
    }

    pub fn normalize_table(
        &self,
        raw: RawTable,
        index: usize,
        file_id: &FileId,
        report: &mut NormalizeReport,
    ) -> BoqResult<Table> {
        let RawTable { mut attrs, mut style, sections } = raw;
        self.apply_table_style(&mut attrs, &mut style);

        let header_pos = find_header(&sections).ok_or(BoqError::StructuralDegeneracy { index })?;

        let mut header: Option<Row> = None;
        let mut data_rows: Vec<Row> = Vec::new();
        for (s, section) in sections.into_iter().enumerate() {
            for (r, row) in section.rows.into_iter().enumerate() {
                if (s, r) == header_pos {
                    header = Some(row);
                } else {
                    data_rows.push(row);
                }
            }
        }
        let mut header = header.ok_or(BoqError::StructuralDegeneracy { index })?;
        let actions_column = self.promote_header(&mut header);
        for row in data_rows.iter_mut() {
            adopt_action_cell(row, actions_column);
        }

        let before = data_rows.len();
        data_rows.retain(|row| !row.is_empty());
        report.empty_rows_removed += before - data_rows.len();
        if before != data_rows.len() {
            debug!(removed = before - data_rows.len(), "Dropped empty rows");
        }

        if data_rows.is_empty() {
            debug!("Header without data rows, adding a blank row");
            data_rows.push(Row::new(Vec::new()));
        }

        let max_width = data_rows
            .iter()
            .map(|r| r.data_cells().count())
            .max()
            .unwrap_or(0);
        widen_header(&mut header, max_width, self.theme);
        let width = header.data_cells().count();

        for row in data_rows.iter_mut() {
            for cell in row.cells.iter_mut().filter(|c| !c.is_action()) {
                if cell.kind == CellKind::Header {
                    cell.kind = CellKind::Data;
                }
                report.controls_stripped += strip_controls(&mut cell.content);
            }
            let missing = width.saturating_sub(row.data_cells().count());
            for _ in 0..missing {
                let at = row.cells.iter().position(Cell::is_action).unwrap_or(row.cells.len());
                row.cells.insert(at, Cell::new(CellKind::Data));
            }
            report.cells_padded += missing;
            ensure_action_cell(row);
            self.apply_cell_style(row);
        }

        let mut table = Table {
            instance: TableInstanceId::next(),
            file_id: file_id.clone(),
            attrs,
            style,
            header,
            rows: data_rows,
        };
        renumber(&mut table, self.theme);
        for row in table.rows.iter_mut() {
            editability::wire_row(row, self.theme);
        }
        style_all_images(&mut table);
        Ok(table)
    }

    /// Re-apply the post-processing contract to tables restored from a
    /// pristine snapshot: no header detection, no empty-row filtering.
    pub fn rewire(&self, raw: RawTable, index: usize, file_id: &FileId) -> BoqResult<Table> {
        let mut rows = raw.sections.into_iter().flat_map(|s| s.rows);
        let mut header = rows.next().ok_or(BoqError::StructuralDegeneracy { index })?;
        for cell in header.cells.iter_mut() {
            editability::lock(cell);
        }
        let mut data_rows: Vec<Row> = rows.collect();
        for row in data_rows.iter_mut() {
            ensure_action_cell(row);
        }

        let mut table = Table {
            instance: TableInstanceId::next(),
            file_id: file_id.clone(),
            attrs: raw.attrs,
            style: raw.style,
            header,
            rows: data_rows,
        };
        renumber(&mut table, self.theme);
        for row in table.rows.iter_mut() {
            editability::wire_row(row, self.theme);
        }
        style_all_images(&mut table);
        Ok(table)
    }

    fn apply_table_style(&self, attrs: &mut Attributes, style: &mut Style) {
        attrs.insert("border".into(), "1".into());
        attrs.insert("cellpadding".into(), "8".into());
        add_table_class(attrs);
        style
            .set("border-collapse", "collapse")
            .set("width", "100%");
    }

    fn apply_cell_style(&self, row: &mut Row) {
        for cell in row.cells.iter_mut() {
            cell.style
                .set("border", format!("1px solid {}", self.theme.border_color))
                .set("padding", "8px");
        }
    }

    /// Classify the header row and move its action cell last. Returns the
    /// column and row width an existing action header had in the input.
    fn promote_header(&self, header: &mut Row) -> Option<ActionsColumn> {
        strip_row_controls(header);
        let original_width = header.cells.len();
        let has_actions = header.cells.iter().any(|c| {
            c.attrs.get("data-cell-role").map(String::as_str) == Some(ACTION_CELL_MARKER)
                || c.text().trim().eq_ignore_ascii_case(ACTIONS_LABEL)
        });
        for cell in header.cells.iter_mut() {
            let is_actions = cell.text().trim().eq_ignore_ascii_case(ACTIONS_LABEL)
                || cell.kind == CellKind::Action;
            cell.kind = if is_actions { CellKind::Action } else { CellKind::Header };
            if is_actions {
                cell.attrs.insert("data-cell-role".into(), ACTION_CELL_MARKER.into());
            }
            self.style_header_cell(cell);
        }
        let existing = header
            .cells
            .iter()
            .position(Cell::is_action)
            .map(|position| ActionsColumn {
                position,
                width: original_width,
            });
        if !has_actions {
            let mut actions = Cell::with_text(CellKind::Action, ACTIONS_LABEL);
            actions.attrs.insert("data-cell-role".into(), ACTION_CELL_MARKER.into());
            self.style_header_cell(&mut actions);
            header.cells.push(actions);
        }
        let mut seen = false;
        header.cells.retain(|c| !(c.is_action() && std::mem::replace(&mut seen, true)));
        if let Some(pos) = header.cells.iter().position(Cell::is_action) {
            let actions = header.cells.remove(pos);
            header.cells.push(actions);
        }
        existing
    }

    fn style_header_cell(&self, cell: &mut Cell) {
        cell.style = Style::default();
        cell.style
            .set("background-color", self.theme.header_background.as_str())
            .set("color", self.theme.header_foreground.as_str())
            .set("font-weight", "bold")
            .set("text-align", "center")
            .set("border", format!("1px solid {}", self.theme.border_color))
            .set("padding", "8px");
        editability::lock(cell);
    }
}

/// Where the input header carried its action column.
#[derive(Debug, Clone, Copy)]
struct ActionsColumn {
    position: usize,
    width: usize,
}

fn is_control_only(cell: &Cell) -> bool {
    cell.is_empty() && cell.content.iter().any(Node::has_control)
}

/// Turn the leftover action cell of an earlier pass into the real one, so it
/// is not mistaken for a data column. A full-width row's blank cell under the
/// action header counts, as does any cell holding nothing but controls.
fn adopt_action_cell(row: &mut Row, actions_column: Option<ActionsColumn>) {
    if row.cells.iter().any(Cell::is_action) {
        return;
    }
    let under_header = actions_column
        .filter(|column| row.cells.len() >= column.width)
        .map(|column| column.position)
        .filter(|&pos| row.cells.get(pos).map(Cell::is_empty).unwrap_or(false));
    let found = under_header.or_else(|| row.cells.iter().rposition(is_control_only));
    if let Some(pos) = found {
        row.cells[pos] = new_action_cell();
    }
}

fn add_table_class(attrs: &mut Attributes) {
    add_class(attrs, "boq-table");
}

fn strip_row_controls(row: &mut Row) {
    for cell in row.cells.iter_mut() {
        strip_controls(&mut cell.content);
    }
}

/// Header row position as (section, row): first row of the header section,
/// else first row of a body section, else the table's first row.
fn find_header(sections: &[super::parser::RawSection]) -> Option<(usize, usize)> {
    let first_of = |kind: SectionKind| {
        sections
            .iter()
            .position(|s| s.kind == kind && !s.rows.is_empty())
            .map(|s| (s, 0))
    };
    first_of(SectionKind::Head)
        .or_else(|| first_of(SectionKind::Body))
        .or_else(|| sections.iter().position(|s| !s.rows.is_empty()).map(|s| (s, 0)))
}

/// Add generated labels so the header is at least `width` data columns wide.
fn widen_header(header: &mut Row, width: usize, theme: &Theme) {
    let current = header.data_cells().count();
    if current >= width {
        return;
    }
    let at = header.cells.iter().position(Cell::is_action).unwrap_or(header.cells.len());
    for n in current..width {
        let mut cell = Cell::with_text(CellKind::Header, format!("Column {}", n + 1));
        cell.style
            .set("background-color", theme.header_background.as_str())
            .set("color", theme.header_foreground.as_str())
            .set("font-weight", "bold")
            .set("text-align", "center")
            .set("border", format!("1px solid {}", theme.border_color))
            .set("padding", "8px");
        editability::lock(&mut cell);
        header.cells.insert(at + (n - current), cell);
    }
    warn!(added = width - current, "Rows wider than header, generated column labels");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(html: &str) -> Vec<Table> {
        let theme = Theme::default();
        Normalizer::new(&theme)
            .normalize_fragment(html, &FileId::from("f1"))
            .unwrap()
            .0
    }

    #[test]
    fn test_header_promoted_from_first_body_row() {
        let tables = normalize("<table><tr><td>Item</td><td>Qty</td></tr><tr><td>Chair</td><td>2</td></tr></table>");
        let table = &tables[0];
        assert_eq!(table.header_labels(), vec!["Item", "Qty", "Actions"]);
        assert!(table.header.cells.iter().all(|c| !c.editable));
        assert_eq!(table.header.cells[0].kind, CellKind::Header);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let tables = normalize("<table><tr><th>A</th><th>B</th><th>C</th></tr><tr><td>1</td></tr></table>");
        assert_eq!(tables[0].rows[0].cells.len(), 4);
        assert!(tables[0].rows[0].cells[3].is_action());
    }

    #[test]
    fn test_wide_rows_widen_header() {
        let tables = normalize("<table><tr><th>A</th></tr><tr><td>1</td><td>2</td></tr></table>");
        assert_eq!(tables[0].header_labels(), vec!["A", "Column 2", "Actions"]);
    }

    #[test]
    fn test_existing_actions_header_is_reused() {
        let tables = normalize(
            "<table><thead><tr><th>Item</th><th>Actions</th><th>Qty</th></tr></thead><tbody><tr><td>Chair</td><td>2</td></tr></tbody></table>",
        );
        assert_eq!(tables[0].header_labels(), vec!["Item", "Qty", "Actions"]);
    }

    #[test]
    fn test_leftover_action_cell_follows_its_header() {
        let tables = normalize(
            "<table><thead><tr><th>Item</th><th>Actions</th><th>Qty</th></tr></thead>\
             <tbody><tr><td>Chair</td><td><button>+</button></td><td>2</td></tr></tbody></table>",
        );
        let table = &tables[0];
        assert_eq!(table.header_labels(), vec!["Item", "Qty", "Actions"]);
        assert_eq!(table.rows[0].texts(), vec!["Chair", "2"]);
        assert_eq!(table.rows[0].cells.len(), 3);
        assert!(table.rows[0].cells[2].is_action());
    }

    #[test]
    fn test_unmarked_trailing_action_cell_is_adopted() {
        let tables = normalize(
            "<table><thead><tr><th>Item</th><th>Qty</th><th>Actions</th></tr></thead>\
             <tbody><tr><td>Chair</td><td>2</td><td><button>+</button><button>-</button></td></tr></tbody></table>",
        );
        let table = &tables[0];
        assert_eq!(table.header_labels(), vec!["Item", "Qty", "Actions"]);
        assert_eq!(table.rows[0].texts(), vec!["Chair", "2"]);
        assert!(table.rows[0].cells[2].is_action());
    }

    #[test]
    fn test_control_only_cell_without_action_header() {
        let tables = normalize(
            "<table><tr><th>Item</th><th>Qty</th></tr>\
             <tr><td>Chair</td><td>2</td><td><button data-row-action=\"add\">+</button></td></tr></table>",
        );
        assert_eq!(tables[0].header_labels(), vec!["Item", "Qty", "Actions"]);
        assert_eq!(tables[0].rows[0].cells.len(), 3);
    }

    #[test]
    fn test_restyling_does_not_compound() {
        let theme = Theme::default();
        let tables = normalize("<table><tr><th>A</th></tr><tr><td>1</td></tr></table>");
        let html = crate::table::render::render_table(&tables[0]);
        let again = Normalizer::new(&theme)
            .normalize_fragment(&html, &FileId::from("f1"))
            .unwrap()
            .0;
        assert_eq!(crate::table::render::render_table(&again[0]), html);
    }

    #[test]
    fn test_header_only_table_gets_blank_row() {
        let tables = normalize("<table><thead><tr><th>Item</th></tr></thead></table>");
        assert_eq!(tables[0].rows.len(), 1);
        assert_eq!(tables[0].rows[0].cells.len(), 2);
    }

    #[test]
    fn test_table_without_rows_is_rejected() {
        let theme = Theme::default();
        let result = Normalizer::new(&theme).normalize_fragment("<table></table>", &FileId::from("f1"));
        assert!(matches!(result, Err(BoqError::StructuralDegeneracy { index: 0 })));
    }
}
