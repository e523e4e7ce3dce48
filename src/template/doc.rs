//! Minimal structural document tree consumed by the merger.
//!
//! This stands in for whatever concrete document object model a
//! formatter would use. It carries exactly the capabilities the merge
//! needs: walk text leaves, deep-clone a row, splice a row in before an
//! anchor, remove a row. Cloning is plain `Clone` — the tree is owned by
//! value, so a clone is structurally independent by construction.

use serde_json::Value;

use crate::alias;

/// Whether a text traversal enters tables nested inside cells.
///
/// Passed as a value so the caller's policy (fill a row's own text, or
/// scan everything) is data, not a specialised traversal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    All,
    SkipNestedTables,
}

/// A document body: the root sequence of structural nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    pub nodes: Vec<Node>,
}

impl Body {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Plain-text rendering, one line per paragraph or table row.
    pub fn render_text(&self) -> String {
        let mut lines = Vec::new();
        render_nodes(&self.nodes, &mut lines);
        lines.join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Table(Table),
    Paragraph(Paragraph),
}

/// A repeating structural region: rows of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Inserts `row` immediately before the row at `anchor`.
    pub fn insert_row_before(&mut self, anchor: usize, row: Row) {
        self.rows.insert(anchor, row);
    }

    pub fn remove_row(&mut self, index: usize) -> Row {
        self.rows.remove(index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Row with one text cell per entry.
    pub fn of_texts(texts: &[&str]) -> Self {
        Self {
            cells: texts.iter().map(|t| Cell::text(t)).collect(),
        }
    }

    /// Visits every text-bearing run in the row, honoring the descend
    /// policy for tables nested inside cells.
    pub fn for_each_run_mut<F>(&mut self, descend: Descend, f: &mut F)
    where
        F: FnMut(&mut Run),
    {
        for cell in &mut self.cells {
            visit_nodes_mut(&mut cell.content, descend, f);
        }
    }

    /// Immutable counterpart of [`Row::for_each_run_mut`] over text runs.
    pub fn for_each_text<F>(&self, descend: Descend, f: &mut F)
    where
        F: FnMut(&str),
    {
        for cell in &self.cells {
            visit_nodes(&cell.content, descend, f);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub content: Vec<Node>,
}

impl Cell {
    pub fn new(content: Vec<Node>) -> Self {
        Self { content }
    }

    pub fn text(text: &str) -> Self {
        Self {
            content: vec![Node::Paragraph(Paragraph::text(text))],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn text(text: &str) -> Self {
        Self {
            runs: vec![Run::Text {
                text: text.to_string(),
                preserve_space: false,
            }],
        }
    }

    /// Concatenated text of the paragraph's runs.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match run {
                Run::Text { text, .. } => out.push_str(text),
                Run::Value(v) => out.push_str(&alias::value_text(v)),
            }
        }
        out
    }
}

/// A leaf of the tree: literal text, or a typed substituted value.
#[derive(Debug, Clone, PartialEq)]
pub enum Run {
    Text {
        text: String,
        /// Set after substitution so serialization keeps inserted
        /// whitespace intact.
        preserve_space: bool,
    },
    /// Result of typed (single-alias) substitution.
    Value(Value),
}

fn visit_nodes_mut<F>(nodes: &mut [Node], descend: Descend, f: &mut F)
where
    F: FnMut(&mut Run),
{
    for node in nodes {
        match node {
            Node::Paragraph(p) => {
                for run in &mut p.runs {
                    f(run);
                }
            }
            Node::Table(table) => {
                if descend == Descend::All {
                    for row in &mut table.rows {
                        row.for_each_run_mut(descend, f);
                    }
                }
            }
        }
    }
}

fn visit_nodes<F>(nodes: &[Node], descend: Descend, f: &mut F)
where
    F: FnMut(&str),
{
    for node in nodes {
        match node {
            Node::Paragraph(p) => {
                for run in &p.runs {
                    if let Run::Text { text, .. } = run {
                        f(text);
                    }
                }
            }
            Node::Table(table) => {
                if descend == Descend::All {
                    for row in &table.rows {
                        row.for_each_text(descend, f);
                    }
                }
            }
        }
    }
}

fn render_nodes(nodes: &[Node], lines: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Paragraph(p) => lines.push(p.text_content()),
            Node::Table(table) => {
                for row in &table.rows {
                    let cells: Vec<String> = row.cells.iter().map(render_cell).collect();
                    lines.push(cells.join(" | "));
                }
            }
        }
    }
}

fn render_cell(cell: &Cell) -> String {
    let mut lines = Vec::new();
    render_nodes(&cell.content, &mut lines);
    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested_table_row() -> Row {
        Row::new(vec![Cell::new(vec![
            Node::Paragraph(Paragraph::text("outer")),
            Node::Table(Table::new(vec![Row::of_texts(&["inner"])])),
        ])])
    }

    #[test]
    fn test_descend_all_reaches_nested_text() {
        let row = nested_table_row();
        let mut seen = Vec::new();
        row.for_each_text(Descend::All, &mut |t| seen.push(t.to_string()));
        assert_eq!(seen, vec!["outer", "inner"]);
    }

    #[test]
    fn test_skip_nested_tables_stays_in_row() {
        let row = nested_table_row();
        let mut seen = Vec::new();
        row.for_each_text(Descend::SkipNestedTables, &mut |t| seen.push(t.to_string()));
        assert_eq!(seen, vec!["outer"]);
    }

    #[test]
    fn test_cloned_row_is_independent() {
        let mut row = Row::of_texts(&["a"]);
        let clone = row.clone();
        row.for_each_run_mut(Descend::All, &mut |run| {
            if let Run::Text { text, .. } = run {
                *text = "changed".to_string();
            }
        });
        let mut seen = Vec::new();
        clone.for_each_text(Descend::All, &mut |t| seen.push(t.to_string()));
        assert_eq!(seen, vec!["a"]);
    }

    #[test]
    fn test_render_text() {
        let body = Body::new(vec![
            Node::Paragraph(Paragraph::text("title")),
            Node::Table(Table::new(vec![Row::of_texts(&["a", "b"])])),
        ]);
        assert_eq!(body.render_text(), "title\na | b");
    }
}
