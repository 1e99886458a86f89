//! Direct in-place editing of data cells.
//!
//! Stateless: every function here is an attribute/style pass over cells. The
//! normalizer applies it once, row actions apply it to new rows, and reset
//! applies it to restored rows.

use super::model::{Cell, CellKind, Parity, Row};
use super::node::add_class;
use crate::config::Theme;

pub fn parity_background(theme: &Theme, parity: Parity) -> &str {
    match parity {
        Parity::Even => &theme.even_row_background,
        Parity::Odd => &theme.odd_row_background,
    }
}

/// Mark a data cell editable and give it its row background.
pub fn make_editable(cell: &mut Cell, theme: &Theme, parity: Parity) {
    if cell.kind != CellKind::Data {
        lock(cell);
        return;
    }
    cell.editable = true;
    cell.attrs.insert("contenteditable".into(), "true".into());
    add_class(&mut cell.attrs, "editable-cell");
    cell.style
        .set("cursor", "text")
        .set("background-color", parity_background(theme, parity));
    cell.style.remove("outline");
}

/// Header and action cells never take edits.
pub fn lock(cell: &mut Cell) {
    cell.editable = false;
    cell.attrs.insert("contenteditable".into(), "false".into());
}

/// Wire every cell of a data row.
pub fn wire_row(row: &mut Row, theme: &Theme) {
    let parity = row.parity;
    for cell in row.cells.iter_mut() {
        make_editable(cell, theme, parity);
    }
}

pub fn focus(cell: &mut Cell, theme: &Theme) -> bool {
    if !cell.editable {
        return false;
    }
    cell.style
        .set("outline", format!("2px solid {}", theme.focus_outline))
        .set("background-color", theme.focus_background.as_str());
    true
}

pub fn blur(cell: &mut Cell, theme: &Theme, parity: Parity) -> bool {
    if !cell.editable {
        return false;
    }
    cell.style.remove("outline");
    cell.style.set("background-color", parity_background(theme, parity));
    true
}

/// Apply typed text to a cell. Returns false for cells that are not editable.
pub fn input(cell: &mut Cell, text: &str) -> bool {
    if !cell.editable {
        return false;
    }
    cell.set_text(text);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_then_blur_restores_parity_background() {
        let theme = Theme::default();
        let mut cell = Cell::with_text(CellKind::Data, "Chair");
        make_editable(&mut cell, &theme, Parity::Even);
        let before = cell.clone();

        assert!(focus(&mut cell, &theme));
        assert_eq!(cell.style.get("background-color"), Some(theme.focus_background.as_str()));
        assert!(blur(&mut cell, &theme, Parity::Even));
        assert_eq!(cell, before);
    }

    #[test]
    fn test_header_cells_stay_locked() {
        let theme = Theme::default();
        let mut cell = Cell::with_text(CellKind::Header, "Qty");
        make_editable(&mut cell, &theme, Parity::Odd);
        assert!(!cell.editable);
        assert!(!input(&mut cell, "changed"));
        assert_eq!(cell.text(), "Qty");
    }
}
