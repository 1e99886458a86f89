use scraper::{ElementRef, Html, Selector};

use super::model::{Cell, CellKind, Row, ACTION_CELL_MARKER};
use super::node::{Attributes, Control, ControlRole, Element, Image, Node, Style};
use crate::error::{BoqError, BoqResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Head,
    Body,
    Foot,
    /// `<tr>` directly under `<table>`.
    Loose,
}

#[derive(Debug, Clone)]
pub struct RawSection {
    pub kind: SectionKind,
    pub rows: Vec<Row>,
}

/// A `<table>` as found in markup, before any repair.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub attrs: Attributes,
    pub style: Style,
    pub sections: Vec<RawSection>,
}

/// Parse every top-level `<table>` in an HTML fragment, in document order.
pub fn parse_tables(html: &str) -> BoqResult<Vec<RawTable>> {
    let fragment = Html::parse_fragment(html);
    let selector = Selector::parse("table")
        .map_err(|e| BoqError::configuration(format!("CSS selector error: {:?}", e)))?;

    let tables = fragment
        .select(&selector)
        .filter(|table| !has_table_ancestor(*table))
        .map(parse_table)
        .collect();

    Ok(tables)
}

fn has_table_ancestor(element: ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "table")
}

fn parse_table(table: ElementRef) -> RawTable {
    let (attrs, style) = split_attrs(table);
    let mut sections: Vec<RawSection> = Vec::new();

    for child in table.children().filter_map(ElementRef::wrap) {
        let kind = match child.value().name() {
            "thead" => SectionKind::Head,
            "tbody" => SectionKind::Body,
            "tfoot" => SectionKind::Foot,
            "tr" => {
                let row = parse_row(child);
                match sections.last_mut() {
                    Some(section) if section.kind == SectionKind::Loose => section.rows.push(row),
                    _ => sections.push(RawSection {
                        kind: SectionKind::Loose,
                        rows: vec![row],
                    }),
                }
                continue;
            }
            _ => continue,
        };

        let rows = child
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "tr")
            .map(parse_row)
            .collect();
        sections.push(RawSection { kind, rows });
    }

    RawTable { attrs, style, sections }
}

fn parse_row(tr: ElementRef) -> Row {
    let cells = tr
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .map(parse_cell)
        .collect();

    let (attrs, style) = split_attrs(tr);
    let mut row = Row::new(cells);
    row.attrs = attrs;
    row.style = style;
    row
}

fn parse_cell(el: ElementRef) -> Cell {
    let (attrs, style) = split_attrs(el);
    let kind = if attrs.get("data-cell-role").map(String::as_str) == Some(ACTION_CELL_MARKER) {
        CellKind::Action
    } else if el.value().name() == "th" {
        CellKind::Header
    } else {
        CellKind::Data
    };
    let editable = attrs.get("contenteditable").map(String::as_str) == Some("true");

    Cell {
        kind,
        attrs,
        style,
        editable,
        content: parse_children(el),
    }
}

fn parse_children(el: ElementRef) -> Vec<Node> {
    let mut nodes = Vec::new();
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                let text: &str = text;
                if let Some(Node::Text(prev)) = nodes.last_mut() {
                    prev.push_str(text);
                } else {
                    nodes.push(Node::Text(text.to_string()));
                }
            }
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    nodes.push(parse_element(child_el));
                }
            }
            _ => {}
        }
    }
    nodes
}

fn parse_element(el: ElementRef) -> Node {
    match el.value().name() {
        "img" => {
            let (mut attrs, style) = split_attrs(el);
            let src = attrs.remove("src").unwrap_or_default();
            let alt = attrs.remove("alt");
            let draggable = attrs.remove("draggable").as_deref() == Some("true");
            let mut image = Image::new(src);
            image.alt = alt;
            image.attrs = attrs;
            image.style = style;
            image.draggable = draggable;
            Node::Image(image)
        }
        "button" => {
            let (attrs, style) = split_attrs(el);
            let role = ControlRole::from_marker(attrs.get("data-row-action").map(String::as_str));
            Node::Control(Control {
                role,
                label: el.text().collect::<String>(),
                attrs,
                style,
            })
        }
        tag => Node::Element(Element {
            tag: tag.to_string(),
            attrs: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children: parse_children(el),
        }),
    }
}

/// Attributes minus `style`, plus the parsed style.
fn split_attrs(el: ElementRef) -> (Attributes, Style) {
    let mut attrs: Attributes = el
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let style = attrs
        .remove("style")
        .map(|css| Style::parse(&css))
        .unwrap_or_default();
    (attrs, style)
}
