use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Non-style attributes; ordered so rendering is deterministic.
pub type Attributes = BTreeMap<String, String>;

/// Add a class token without disturbing the ones already present.
pub fn add_class(attrs: &mut Attributes, class: &str) {
    let entry = attrs.entry("class".to_string()).or_default();
    if !entry.split_whitespace().any(|c| c == class) {
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(class);
    }
}

pub fn remove_class(attrs: &mut Attributes, class: &str) {
    if let Some(entry) = attrs.get_mut("class") {
        let kept: Vec<&str> = entry.split_whitespace().filter(|c| *c != class).collect();
        *entry = kept.join(" ");
        if entry.is_empty() {
            attrs.remove("class");
        }
    }
}

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an embedded image while it lives in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(pub u64);

impl ImageId {
    pub fn next() -> Self {
        ImageId(NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Inline CSS as an ordered property list. Setting a property replaces the
/// previous value, so restyling never compounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Style {
    props: Vec<(String, String)>,
}

impl Style {
    pub fn parse(css: &str) -> Self {
        let mut style = Style::default();
        for decl in css.split(';') {
            if let Some((name, value)) = decl.split_once(':') {
                let name = name.trim();
                let value = value.trim();
                if !name.is_empty() && !value.is_empty() {
                    style.set(name, value);
                }
            }
        }
        style
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.props.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.props.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, name: &str) {
        self.props.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    pub fn to_css(&self) -> String {
        self.props
            .iter()
            .map(|(n, v)| format!("{}: {}", n, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// What a row control does when clicked. Set when the control is created or
/// read from its `data-row-action` marker, never inferred from handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlRole {
    Add,
    Delete,
    None,
}

impl ControlRole {
    pub fn from_marker(marker: Option<&str>) -> Self {
        match marker.map(|m| m.trim().to_ascii_lowercase()).as_deref() {
            Some("add") => ControlRole::Add,
            Some("delete") => ControlRole::Delete,
            _ => ControlRole::None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            ControlRole::Add => "add",
            ControlRole::Delete => "delete",
            ControlRole::None => "none",
        }
    }
}

/// A `<button>` inside a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub role: ControlRole,
    pub label: String,
    pub attrs: Attributes,
    pub style: Style,
}

impl Control {
    pub fn new(role: ControlRole) -> Self {
        let (label, title, color) = match role {
            ControlRole::Add => ("+", "Add row below", "#28a745"),
            ControlRole::Delete => ("×", "Delete row", "#dc3545"),
            ControlRole::None => ("", "", "#6c757d"),
        };
        let mut attrs = Attributes::new();
        attrs.insert("class".into(), "row-action-btn".into());
        attrs.insert("data-row-action".into(), role.marker().into());
        attrs.insert("title".into(), title.into());
        attrs.insert("type".into(), "button".into());
        let mut style = Style::default();
        style
            .set("background-color", color)
            .set("color", "#ffffff")
            .set("border", "none")
            .set("border-radius", "3px")
            .set("padding", "2px 8px")
            .set("margin", "0 2px")
            .set("cursor", "pointer");
        Self {
            role,
            label: label.to_string(),
            attrs,
            style,
        }
    }
}

/// An embedded `<img>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub id: ImageId,
    pub src: String,
    pub alt: Option<String>,
    pub attrs: Attributes,
    pub style: Style,
    pub draggable: bool,
}

impl Image {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            id: ImageId::next(),
            src: src.into(),
            alt: None,
            attrs: Attributes::new(),
            style: Style::default(),
            draggable: false,
        }
    }
}

/// Generic element kept verbatim (`<b>`, `<div>`, `<br>` ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Attributes,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Image(Image),
    Control(Control),
    Element(Element),
}

const BLANK_CHARS: [char; 4] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}'];

/// True when the text has nothing but whitespace or zero-width characters.
pub fn is_blank(text: &str) -> bool {
    text.chars().all(|c| c.is_whitespace() || BLANK_CHARS.contains(&c))
}

impl Node {
    /// Visible text, excluding control labels.
    pub fn push_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) => e.children.iter().for_each(|c| c.push_text(out)),
            Node::Image(_) | Node::Control(_) => {}
        }
    }

    pub fn has_image(&self) -> bool {
        match self {
            Node::Image(_) => true,
            Node::Element(e) => e.children.iter().any(Node::has_image),
            _ => false,
        }
    }

    pub fn has_control(&self) -> bool {
        match self {
            Node::Control(_) => true,
            Node::Element(e) => e.children.iter().any(Node::has_control),
            _ => false,
        }
    }

    pub fn visit_images_mut(&mut self, f: &mut dyn FnMut(&mut Image)) {
        match self {
            Node::Image(img) => f(img),
            Node::Element(e) => e.children.iter_mut().for_each(|c| c.visit_images_mut(f)),
            _ => {}
        }
    }

    pub fn visit_images(&self, f: &mut dyn FnMut(&Image)) {
        match self {
            Node::Image(img) => f(img),
            Node::Element(e) => e.children.iter().for_each(|c| c.visit_images(f)),
            _ => {}
        }
    }

    /// Wrapper whose only meaningful content is controls (or nested
    /// control-only wrappers).
    fn is_control_wrapper(&self) -> bool {
        match self {
            Node::Element(e) => {
                let mut saw_control = false;
                for child in &e.children {
                    match child {
                        Node::Text(t) if is_blank(t) => {}
                        Node::Control(_) => saw_control = true,
                        Node::Element(_) if child.is_control_wrapper() => saw_control = true,
                        _ => return false,
                    }
                }
                saw_control
            }
            _ => false,
        }
    }

    fn is_empty_wrapper(&self) -> bool {
        match self {
            Node::Element(e) if matches!(e.tag.as_str(), "div" | "span") => {
                e.children.iter().all(|c| matches!(c, Node::Text(t) if is_blank(t)))
            }
            _ => false,
        }
    }
}

/// Remove controls, control-only wrappers and the empty wrappers left
/// behind. Returns how many nodes were dropped.
pub fn strip_controls(nodes: &mut Vec<Node>) -> usize {
    let mut removed = 0;
    nodes.retain(|n| {
        let drop = matches!(n, Node::Control(_)) || n.is_control_wrapper();
        if drop {
            removed += 1;
        }
        !drop
    });
    for node in nodes.iter_mut() {
        if let Node::Element(e) = node {
            removed += strip_controls(&mut e.children);
        }
    }
    nodes.retain(|n| {
        let drop = n.is_empty_wrapper();
        if drop {
            removed += 1;
        }
        !drop
    });
    removed
}

/// Take the image with `id` out of `nodes`, searching nested elements.
pub fn take_image(nodes: &mut Vec<Node>, id: ImageId) -> Option<Image> {
    if let Some(pos) = nodes.iter().position(|n| matches!(n, Node::Image(img) if img.id == id)) {
        if let Node::Image(img) = nodes.remove(pos) {
            return Some(img);
        }
    }
    nodes.iter_mut().find_map(|n| match n {
        Node::Element(e) => take_image(&mut e.children, id),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_set_is_idempotent() {
        let mut style = Style::parse("border: 1px solid red; padding: 4px");
        style.set("padding", "8px").set("padding", "8px");
        assert_eq!(style.to_css(), "border: 1px solid red; padding: 8px");
    }

    #[test]
    fn test_strip_controls_removes_wrappers() {
        let wrapper = Node::Element(Element {
            tag: "div".into(),
            attrs: Attributes::new(),
            children: vec![
                Node::Control(Control::new(ControlRole::Add)),
                Node::Text(" ".into()),
                Node::Control(Control::new(ControlRole::Delete)),
            ],
        });
        let mut nodes = vec![Node::Text("Chair".into()), wrapper];
        assert_eq!(strip_controls(&mut nodes), 1);
        assert_eq!(nodes, vec![Node::Text("Chair".into())]);
        assert_eq!(strip_controls(&mut nodes), 0);
    }

    #[test]
    fn test_blank_detects_zero_width() {
        assert!(is_blank(" \u{a0}\u{200b}\n"));
        assert!(!is_blank(" x "));
    }
}
