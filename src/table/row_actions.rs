//! Row add/delete through one delegated listener per live table.

use tracing::{debug, info};

use super::editability;
use super::events::{CellAddr, EventOutcome, TableEvent, Target};
use super::model::{Cell, CellKind, Parity, Row, Table, TableInstanceId, ACTION_CELL_MARKER};
use super::node::{add_class, remove_class, strip_controls, Control, ControlRole, Node};
use crate::config::Theme;
use crate::error::{BoqError, BoqResult};
use crate::prompt::Prompt;

pub const LAST_ROW_MESSAGE: &str =
    "Cannot delete the last row. The table must keep at least one data row.";
pub const DELETE_CONFIRMATION: &str = "Delete this row?";

/// The action cell: exactly one add and one delete control.
pub fn new_action_cell() -> Cell {
    let mut cell = Cell::new(CellKind::Action);
    cell.attrs.insert("data-cell-role".into(), ACTION_CELL_MARKER.into());
    add_class(&mut cell.attrs, "actions-cell");
    cell.style
        .set("text-align", "center")
        .set("white-space", "nowrap")
        .set("user-select", "none");
    cell.content = vec![
        Node::Control(Control::new(ControlRole::Add)),
        Node::Control(Control::new(ControlRole::Delete)),
    ];
    editability::lock(&mut cell);
    cell
}

/// Keep one action cell per row, last. Returns true if one was added.
pub fn ensure_action_cell(row: &mut Row) -> bool {
    let mut seen = false;
    row.cells.retain(|c| {
        if c.is_action() {
            let keep = !seen;
            seen = true;
            keep
        } else {
            true
        }
    });
    match row.cells.iter().position(Cell::is_action) {
        Some(pos) => {
            let cell = row.cells.remove(pos);
            row.cells.push(cell);
            false
        }
        None => {
            row.cells.push(new_action_cell());
            true
        }
    }
}

/// Re-derive ordinals and parity colours for every data row.
pub fn renumber(table: &mut Table, theme: &Theme) {
    let file_id = table.file_id.clone();
    for (i, row) in table.rows.iter_mut().enumerate() {
        let index = i + 1;
        let parity = Parity::of(index);
        row.index = index;
        row.parity = parity;
        row.file_id = Some(file_id.clone());
        row.attrs.insert("data-row-index".into(), index.to_string());
        row.attrs.insert("data-file-id".into(), file_id.to_string());
        let (old, new) = match parity {
            Parity::Even => ("row-odd", "row-even"),
            Parity::Odd => ("row-even", "row-odd"),
        };
        remove_class(&mut row.attrs, old);
        add_class(&mut row.attrs, new);
        let background = editability::parity_background(theme, parity).to_string();
        row.style.set("background-color", background.as_str());
        for cell in row.cells.iter_mut().filter(|c| c.kind == CellKind::Data) {
            cell.style.set("background-color", background.as_str());
        }
    }
}

/// Insert an empty row right after `row`. Returns the new row's position.
pub fn add_below(table: &mut Table, row: usize, theme: &Theme) -> BoqResult<usize> {
    let source = table.rows.get(row).ok_or(BoqError::RowNotFound { table: 0, row })?;
    let width = source.data_cells().count();

    let cells = (0..width).map(|_| Cell::new(CellKind::Data)).collect();
    let mut new_row = Row::new(cells);
    ensure_action_cell(&mut new_row);
    table.rows.insert(row + 1, new_row);

    renumber(table, theme);
    editability::wire_row(&mut table.rows[row + 1], theme);
    info!(file_id = %table.file_id, at = row + 1, "Row added");
    Ok(row + 1)
}

/// Delete `row` after confirmation, unless it is the only data row.
pub fn delete(
    table: &mut Table,
    row: usize,
    theme: &Theme,
    prompt: &mut dyn Prompt,
) -> BoqResult<EventOutcome> {
    if row >= table.rows.len() {
        return Err(BoqError::RowNotFound { table: 0, row });
    }
    if table.total_rows() <= 2 {
        prompt.alert(LAST_ROW_MESSAGE);
        return Ok(EventOutcome::Rejected {
            message: LAST_ROW_MESSAGE.to_string(),
        });
    }
    if !prompt.confirm(DELETE_CONFIRMATION) {
        debug!(row, "Row deletion cancelled");
        return Ok(EventOutcome::Cancelled);
    }
    table.rows.remove(row);
    renumber(table, theme);
    info!(file_id = %table.file_id, row, "Row deleted");
    Ok(EventOutcome::RowDeleted { table: 0, row })
}

/// Strip controls that ended up outside action cells and duplicate controls
/// inside them. Converges after one pass. Returns the number of nodes removed.
pub fn cleanup_controls(table: &mut Table) -> usize {
    let mut removed = 0;
    for cell in table.header.cells.iter_mut().filter(|c| !c.is_action()) {
        removed += strip_controls(&mut cell.content);
    }
    for row in table.rows.iter_mut() {
        let action_cells = row.cells.iter().filter(|c| c.is_action()).count();
        removed += action_cells.saturating_sub(1);
        ensure_action_cell(row);
        for cell in row.cells.iter_mut() {
            if cell.is_action() {
                removed += dedupe_action_controls(cell);
            } else {
                removed += strip_controls(&mut cell.content);
            }
        }
    }
    if removed > 0 {
        debug!(removed, "Removed stray row controls");
    }
    removed
}

fn dedupe_action_controls(cell: &mut Cell) -> usize {
    let before = cell.content.len();
    let (mut add, mut delete) = (false, false);
    cell.content.retain(|n| match n {
        Node::Control(c) if c.role == ControlRole::Add => !std::mem::replace(&mut add, true),
        Node::Control(c) if c.role == ControlRole::Delete => !std::mem::replace(&mut delete, true),
        _ => false,
    });
    if !add {
        cell.content.insert(0, Node::Control(Control::new(ControlRole::Add)));
    }
    if !delete {
        cell.content.push(Node::Control(Control::new(ControlRole::Delete)));
    }
    before.saturating_sub(cell.content.len())
}

fn nth_control(cell: &Cell, nth: usize) -> Option<ControlRole> {
    fn walk(nodes: &[Node], out: &mut Vec<ControlRole>) {
        for node in nodes {
            match node {
                Node::Control(c) => out.push(c.role),
                Node::Element(e) => walk(&e.children, out),
                _ => {}
            }
        }
    }
    let mut roles = Vec::new();
    walk(&cell.content, &mut roles);
    roles.get(nth).copied()
}

/// The delegated click/mousedown handler bound to one table instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowActionListener {
    pub instance: TableInstanceId,
}

impl RowActionListener {
    pub fn new(instance: TableInstanceId) -> Self {
        Self { instance }
    }

    pub fn handles(event: &TableEvent) -> bool {
        matches!(event, TableEvent::Click { .. } | TableEvent::MouseDown { .. })
    }

    pub fn handle(
        &self,
        table: &mut Table,
        table_pos: usize,
        event: &TableEvent,
        theme: &Theme,
        prompt: &mut dyn Prompt,
    ) -> BoqResult<EventOutcome> {
        if table.instance != self.instance {
            return Ok(EventOutcome::Ignored);
        }
        match event {
            TableEvent::Click {
                target: Target::Control { cell, nth },
            } => {
                let role = table
                    .rows
                    .get(cell.row)
                    .and_then(|r| r.cells.get(cell.col))
                    .and_then(|c| nth_control(c, *nth))
                    .ok_or(BoqError::CellNotFound {
                        table: table_pos,
                        row: cell.row,
                        col: cell.col,
                    })?;
                match role {
                    ControlRole::Add => {
                        let at = add_below(table, cell.row, theme)?;
                        Ok(EventOutcome::RowAdded { table: table_pos, row: at })
                    }
                    ControlRole::Delete => match delete(table, cell.row, theme, prompt)? {
                        EventOutcome::RowDeleted { row, .. } => {
                            Ok(EventOutcome::RowDeleted { table: table_pos, row })
                        }
                        other => Ok(other),
                    },
                    ControlRole::None => Ok(EventOutcome::Ignored),
                }
            }
            TableEvent::MouseDown {
                target: Target::Cell(CellAddr { row, col, .. }),
            } => {
                let on_action_cell = table
                    .rows
                    .get(*row)
                    .and_then(|r| r.cells.get(*col))
                    .map(Cell::is_action)
                    .unwrap_or(false);
                if on_action_cell {
                    Ok(EventOutcome::Suppressed)
                } else {
                    Ok(EventOutcome::Ignored)
                }
            }
            _ => Ok(EventOutcome::Ignored),
        }
    }
}
