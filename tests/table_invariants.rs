//! Generated-input checks for the live table: header width, control cleanup
//! and image conservation under arbitrary drag sequences.

use boq_table_editor::config::Theme;
use boq_table_editor::costing::extract;
use boq_table_editor::prompt::ScriptedPrompt;
use boq_table_editor::session::{Workspace, STITCHED_CONTAINER};
use boq_table_editor::table::render::{render_table, render_tables};
use boq_table_editor::table::row_actions::cleanup_controls;
use boq_table_editor::table::{
    CellAddr, Control, ControlRole, FileId, ImageId, Node, Normalizer, Table, TableEvent,
};
use proptest::prelude::*;
use proptest::sample::Index;

const MARKED_ACTION: &str = "<td data-cell-role=\"actions\"><button data-row-action=\"add\">+</button>\
    <button data-row-action=\"delete\">x</button></td>";
const UNMARKED_ACTION: &str = "<td><button>+</button><button>x</button></td>";
const EMPTY_ACTION: &str = "<td></td>";

#[derive(Debug, Clone)]
enum CellSpec {
    Text(String),
    Blank,
    Image(u8),
    Stray(String),
}

impl CellSpec {
    fn html(&self) -> String {
        match self {
            CellSpec::Text(t) => format!("<td>{}</td>", t),
            CellSpec::Blank => "<td> </td>".to_string(),
            CellSpec::Image(n) => format!("<td><img src=\"/img/{}.png\"></td>", n),
            CellSpec::Stray(t) => format!("<td>{}<button data-row-action=\"add\">+</button></td>", t),
        }
    }

    fn text(&self) -> &str {
        match self {
            CellSpec::Text(t) | CellSpec::Stray(t) => t,
            CellSpec::Blank | CellSpec::Image(_) => "",
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, CellSpec::Blank)
    }
}

fn cell_spec() -> impl Strategy<Value = CellSpec> {
    prop_oneof![
        4 => "[a-z0-9]{1,6}".prop_map(CellSpec::Text),
        1 => Just(CellSpec::Blank),
        1 => (0u8..20).prop_map(CellSpec::Image),
        1 => "[a-z0-9]{1,6}".prop_map(CellSpec::Stray),
    ]
}

fn labels() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[B-Z][a-z]{2,6}", 1..5)
}

fn action_markup() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(MARKED_ACTION), Just(UNMARKED_ACTION), Just(EMPTY_ACTION)]
}

fn header_html(labels: &[String], actions_at: Option<usize>) -> String {
    let mut cells: Vec<String> = labels.iter().map(|l| format!("<th>{}</th>", l)).collect();
    if let Some(at) = actions_at {
        cells.insert(at, "<th>Actions</th>".to_string());
    }
    format!("<thead><tr>{}</tr></thead>", cells.concat())
}

fn normalize(html: &str) -> Vec<Table> {
    let theme = Theme::default();
    Normalizer::new(&theme)
        .normalize_fragment(html, &FileId::from("boq-1"))
        .expect("fragment should normalize")
        .0
}

fn assert_action_column_last(table: &Table) -> Result<(), TestCaseError> {
    let width = table.header.cells.len();
    prop_assert_eq!(table.header.cells.iter().filter(|c| c.is_action()).count(), 1);
    prop_assert!(table.header.cells[width - 1].is_action());
    prop_assert!(!table.rows.is_empty());
    for row in &table.rows {
        prop_assert_eq!(row.cells.len(), width);
        prop_assert_eq!(row.cells.iter().filter(|c| c.is_action()).count(), 1);
        prop_assert!(row.cells[width - 1].is_action());
    }
    Ok(())
}

proptest! {
    #[test]
    fn full_width_rows_keep_their_columns(
        (labels, rows) in labels().prop_flat_map(|labels| {
            let width = labels.len();
            (Just(labels), prop::collection::vec(prop::collection::vec(cell_spec(), width), 0..6))
        }),
        actions_at in any::<Index>(),
        markup in action_markup(),
    ) {
        let at = actions_at.index(labels.len() + 1);
        let body: String = rows
            .iter()
            .map(|row| {
                let mut cells: Vec<String> = row.iter().map(CellSpec::html).collect();
                cells.insert(at, markup.to_string());
                format!("<tr>{}</tr>", cells.concat())
            })
            .collect();
        let html = format!("<table>{}<tbody>{}</tbody></table>", header_html(&labels, Some(at)), body);

        let tables = normalize(&html);
        let table = &tables[0];
        assert_action_column_last(table)?;

        let mut expected_labels = labels.clone();
        expected_labels.push("Actions".to_string());
        prop_assert_eq!(table.header_labels(), expected_labels);

        let mut expected: Vec<Vec<String>> = rows
            .iter()
            .filter(|row| row.iter().any(|c| !c.is_blank()))
            .map(|row| row.iter().map(|c| c.text().to_string()).collect())
            .collect();
        if expected.is_empty() {
            expected.push(vec![String::new(); labels.len()]);
        }
        let actual: Vec<Vec<String>> = table.rows.iter().map(|r| r.texts()).collect();
        prop_assert_eq!(actual, expected);
        prop_assert_eq!(extract(table).headers, labels);
    }

    #[test]
    fn every_row_matches_header_width(
        labels in labels(),
        actions_at in any::<Index>(),
        with_actions in any::<bool>(),
        rows in prop::collection::vec(
            prop::collection::vec(
                prop_oneof![
                    5 => cell_spec().prop_map(|c| c.html()),
                    1 => action_markup().prop_map(str::to_string),
                ],
                0..7,
            ),
            0..6,
        ),
    ) {
        let at = with_actions.then(|| actions_at.index(labels.len() + 1));
        let body: String = rows.iter().map(|cells| format!("<tr>{}</tr>", cells.concat())).collect();
        let html = format!("<table>{}<tbody>{}</tbody></table>", header_html(&labels, at), body);

        let tables = normalize(&html);
        assert_action_column_last(&tables[0])?;
        prop_assert!(tables[0].header.cells.len() > labels.len());
        let markup = render_tables(&tables);
        prop_assert_eq!(markup.matches("<thead>").count(), 1);
    }

    #[test]
    fn cleanup_converges_after_injected_controls(
        rows in prop::collection::vec(("[a-z]{1,6}", "[0-9]{1,3}"), 1..5),
        injections in prop::collection::vec((any::<Index>(), any::<Index>(), 0u8..3), 0..12),
    ) {
        let body: String = rows
            .iter()
            .map(|(item, qty)| format!("<tr><td>{}</td><td>{}</td></tr>", item, qty))
            .collect();
        let html = format!("<table><tr><th>Item</th><th>Qty</th></tr>{}</table>", body);
        let mut table = normalize(&html).remove(0);

        for (row, cell, role) in &injections {
            let row = row.index(table.rows.len());
            let cell = cell.index(table.rows[row].cells.len());
            let role = match role {
                0 => ControlRole::Add,
                1 => ControlRole::Delete,
                _ => ControlRole::None,
            };
            table.rows[row].cells[cell].content.push(Node::Control(Control::new(role)));
        }

        cleanup_controls(&mut table);
        let first = render_table(&table);
        prop_assert_eq!(cleanup_controls(&mut table), 0);
        prop_assert_eq!(render_table(&table), first.clone());
        prop_assert_eq!(first.matches("<button").count(), 2 * table.rows.len());
        for (row, (item, qty)) in table.rows.iter().zip(&rows) {
            prop_assert_eq!(row.texts(), vec![item.clone(), qty.clone()]);
        }
    }
}

#[derive(Debug, Clone)]
enum DragStep {
    Start(usize),
    Over(usize, usize),
    Leave(usize, usize),
    Drop(usize, usize),
    End,
}

fn drag_step() -> impl Strategy<Value = DragStep> {
    // Row 4 and column 4 are outside the table.
    prop_oneof![
        2 => (0usize..4).prop_map(DragStep::Start),
        2 => (0usize..5, 0usize..5).prop_map(|(r, c)| DragStep::Over(r, c)),
        1 => (0usize..5, 0usize..5).prop_map(|(r, c)| DragStep::Leave(r, c)),
        2 => (0usize..5, 0usize..5).prop_map(|(r, c)| DragStep::Drop(r, c)),
        1 => Just(DragStep::End),
    ]
}

fn holders(table: &Table, id: ImageId) -> usize {
    table
        .rows
        .iter()
        .flat_map(|r| r.cells.iter())
        .filter(|c| c.image_ids().contains(&id))
        .count()
}

proptest! {
    #[test]
    fn drag_sequences_never_lose_or_copy_images(steps in prop::collection::vec(drag_step(), 0..16)) {
        let mut ws = Workspace::new(Theme::default());
        ws.mount_stitched(
            STITCHED_CONTAINER,
            &FileId::from("boq-1"),
            "<table><tr><th>Item</th><th>Image</th><th>Note</th></tr>\
             <tr><td>Chair</td><td><img src=\"/a.png\"><img src=\"/b.png\"></td><td></td></tr>\
             <tr><td>Desk</td><td><img src=\"/c.png\"></td><td>oak</td></tr>\
             <tr><td>Lamp</td><td></td><td></td></tr>\
             <tr><td>Rug</td><td></td><td><img src=\"/d.png\"></td></tr></table>",
        )
        .expect("fragment should normalize");

        let ids: Vec<ImageId> = {
            let table = &ws.tables(STITCHED_CONTAINER).unwrap()[0];
            table.rows.iter().flat_map(|r| r.cells.iter()).flat_map(|c| c.image_ids()).collect()
        };
        prop_assert_eq!(ids.len(), 4);

        let mut prompt = ScriptedPrompt::default();
        let events = steps
            .iter()
            .map(|step| match *step {
                DragStep::Start(i) => TableEvent::DragStart { image: ids[i] },
                DragStep::Over(r, c) => TableEvent::DragOver { cell: CellAddr::new(r, c) },
                DragStep::Leave(r, c) => TableEvent::DragLeave { cell: CellAddr::new(r, c) },
                DragStep::Drop(r, c) => TableEvent::Drop { cell: CellAddr::new(r, c) },
                DragStep::End => TableEvent::DragEnd,
            })
            .chain(std::iter::once(TableEvent::DragEnd));

        for event in events {
            // Out-of-range cells are allowed to fail; the table must still hold every image once.
            let _ = ws.dispatch(STITCHED_CONTAINER, &event, &mut prompt);
            let table = &ws.tables(STITCHED_CONTAINER).unwrap()[0];
            prop_assert_eq!(table.image_count(), 4);
            for id in &ids {
                prop_assert_eq!(holders(table, *id), 1);
            }
        }

        let table = &ws.tables(STITCHED_CONTAINER).unwrap()[0];
        prop_assert!(table
            .rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .flat_map(|c| c.images())
            .all(|img| img.style.get("opacity").is_none()));
        prop_assert!(table.rows.iter().flat_map(|r| r.cells.iter()).all(|c| !c.is_action() || c.images().is_empty()));
    }
}
