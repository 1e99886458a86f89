use html_escape::{encode_double_quoted_attribute, encode_text};

use super::model::{Cell, CellKind, Row, Table};
use super::node::{Attributes, Control, Image, Node, Style};

const VOID_TAGS: [&str; 10] = ["area", "br", "col", "embed", "hr", "img", "input", "source", "track", "wbr"];

fn push_attrs(out: &mut String, attrs: &Attributes, style: Option<&Style>) {
    for (name, value) in attrs {
        out.push_str(&format!(" {}=\"{}\"", name, encode_double_quoted_attribute(value)));
    }
    if let Some(style) = style.filter(|s| !s.is_empty()) {
        out.push_str(&format!(" style=\"{}\"", encode_double_quoted_attribute(&style.to_css())));
    }
}

/// Serialize cell content (the cell's inner markup).
pub fn render_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        render_node(&mut out, node);
    }
    out
}

fn render_node(out: &mut String, node: &Node) {
    match node {
        Node::Text(text) => out.push_str(&encode_text(text)),
        Node::Image(img) => render_image(out, img),
        Node::Control(control) => render_control(out, control),
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            push_attrs(out, &el.attrs, None);
            out.push('>');
            if VOID_TAGS.contains(&el.tag.as_str()) {
                return;
            }
            for child in &el.children {
                render_node(out, child);
            }
            out.push_str(&format!("</{}>", el.tag));
        }
    }
}

fn render_image(out: &mut String, img: &Image) {
    let mut attrs = img.attrs.clone();
    attrs.insert("src".into(), img.src.clone());
    if let Some(alt) = &img.alt {
        attrs.insert("alt".into(), alt.clone());
    }
    if img.draggable {
        attrs.insert("draggable".into(), "true".into());
    }
    out.push_str("<img");
    push_attrs(out, &attrs, Some(&img.style));
    out.push('>');
}

fn render_control(out: &mut String, control: &Control) {
    out.push_str("<button");
    push_attrs(out, &control.attrs, Some(&control.style));
    out.push('>');
    out.push_str(&encode_text(&control.label));
    out.push_str("</button>");
}

fn render_cell(out: &mut String, cell: &Cell, in_header: bool) {
    let tag = match cell.kind {
        CellKind::Header => "th",
        CellKind::Action if in_header => "th",
        CellKind::Data | CellKind::Action => "td",
    };
    out.push('<');
    out.push_str(tag);
    push_attrs(out, &cell.attrs, Some(&cell.style));
    out.push('>');
    out.push_str(&render_nodes(&cell.content));
    out.push_str(&format!("</{}>", tag));
}

fn render_row(out: &mut String, row: &Row, in_header: bool) {
    out.push_str("<tr");
    push_attrs(out, &row.attrs, Some(&row.style));
    out.push('>');
    for cell in &row.cells {
        render_cell(out, cell, in_header);
    }
    out.push_str("</tr>");
}

/// Serialize a live table, header in `<thead>`, data rows in `<tbody>`.
pub fn render_table(table: &Table) -> String {
    let mut out = String::new();
    out.push_str("<table");
    push_attrs(&mut out, &table.attrs, Some(&table.style));
    out.push_str("><thead>");
    render_row(&mut out, &table.header, true);
    out.push_str("</thead><tbody>");
    for row in &table.rows {
        render_row(&mut out, row, false);
    }
    out.push_str("</tbody></table>");
    out
}

pub fn render_tables(tables: &[Table]) -> String {
    tables.iter().map(render_table).collect::<Vec<_>>().join("\n")
}
