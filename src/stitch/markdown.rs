//! Pipe-delimited markdown tables found in page text.

use html_escape::encode_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineType {
    TableRow,
    TableSeparator,
    Text,
    Empty,
}

/// One pipe table: the first row is its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeTable {
    pub rows: Vec<Vec<String>>,
}

impl PipeTable {
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Every row as `<tr>` inner markup, header cells as `th`.
    pub fn html_rows(&self) -> Vec<String> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let tag = if i == 0 { "th" } else { "td" };
                row.iter()
                    .map(|cell| format!("<{tag}>{}</{tag}>", encode_text(cell)))
                    .collect::<String>()
            })
            .collect()
    }
}

pub fn classify_line(line: &str) -> LineType {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineType::Empty;
    }
    if trimmed.matches('|').count() < 2 {
        return LineType::Text;
    }
    if is_separator_line(trimmed) {
        LineType::TableSeparator
    } else {
        LineType::TableRow
    }
}

/// `|---|:--:|` and friends.
fn is_separator_line(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ')) && line.contains('-')
}

fn parse_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim().to_string()).collect()
}

/// Pipe tables with at least a header and one more row. Separator lines are
/// skipped; any other line ends the current table.
pub fn parse_pipe_tables(text: &str) -> Vec<PipeTable> {
    let mut tables = Vec::new();
    let mut current: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        match classify_line(line) {
            LineType::TableRow => current.push(parse_cells(line)),
            LineType::TableSeparator => {}
            LineType::Text | LineType::Empty => flush(&mut current, &mut tables),
        }
    }
    flush(&mut current, &mut tables);
    tables
}

fn flush(current: &mut Vec<Vec<String>>, tables: &mut Vec<PipeTable>) {
    let rows = std::mem::take(current);
    if rows.len() > 1 {
        tables.push(PipeTable { rows });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lines() {
        assert_eq!(classify_line("| Item | Qty |"), LineType::TableRow);
        assert_eq!(classify_line("|---|:--:|"), LineType::TableSeparator);
        assert_eq!(classify_line("a | b"), LineType::Text);
        assert_eq!(classify_line("   "), LineType::Empty);
    }

    #[test]
    fn test_parse_pipe_tables() {
        let text = "Intro\n| Item | Qty |\n|------|-----|\n| Chair | 2 |\n| A<B | 1 |\n\nOutro\n| lonely | row |";
        let tables = parse_pipe_tables(text);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].header().unwrap(), ["Item", "Qty"]);
        let rows = tables[0].html_rows();
        assert_eq!(rows[0], "<th>Item</th><th>Qty</th>");
        assert_eq!(rows[2], "<td>A&lt;B</td><td>1</td>");
    }
}
