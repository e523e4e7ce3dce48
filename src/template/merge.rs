//! Template merge: binds a populated band tree onto template structure.
//!
//! Tables whose alias row references a band are repeating regions: the
//! row is cloned once per band instance, in extraction order, each clone
//! substituted from its own instance. A region whose band name ends in
//! `Control` and whose alias row is the first row is a control region:
//! it gates visibility and renders zero or one time, never multiplied.

use log::warn;
use thiserror::Error;

use crate::alias;
use crate::structure::band;
use crate::structure::{BandId, BandTree};
use crate::template::doc::{Body, Descend, Node, Row, Run, Table};

/// Band-name suffix marking a control region.
pub const CONTROL_BAND_SUFFIX: &str = "Control";

/// Result type for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Merge-class failures.
///
/// Substitution problems inside template text are non-fatal by policy
/// (empty value plus a warning); what remains fatal is the output-name
/// contract of the orchestrator, which requires the referenced band and
/// parameter to exist. Malformed structure is unrepresentable in the
/// typed document tree, so no structural variant is needed here.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no band [{band}] found; it is required for output file name generation")]
    OutputNameBandMissing { band: String },

    #[error(
        "no data in band [{band}] parameter [{parameter}]; it is required for output file name generation"
    )]
    OutputNameParameterMissing { band: String, parameter: String },
}

/// State of one repeating region while it is being resolved.
struct RegionBinding {
    /// Index of the row carrying the aliases (the repeat unit).
    alias_row: usize,
    /// Resolved once from the first band-qualified alias; immutable.
    band_name: String,
}

impl RegionBinding {
    /// No header row precedes the repeat unit.
    fn headerless(&self) -> bool {
        self.alias_row == 0
    }

    fn is_control(&self) -> bool {
        self.band_name.ends_with(CONTROL_BAND_SUFFIX) && self.headerless()
    }
}

/// Merges one band tree into template bodies.
pub struct TemplateMerger<'a> {
    tree: &'a BandTree,
}

impl<'a> TemplateMerger<'a> {
    pub fn new(tree: &'a BandTree) -> Self {
        Self { tree }
    }

    /// Produces the merged body; the template itself is left untouched.
    pub fn merge(&self, template: &Body) -> Body {
        let mut body = template.clone();
        self.merge_nodes(&mut body.nodes, self.tree.root());
        body
    }

    /// Document-order walk: paragraphs substitute against the current
    /// scope band, tables resolve their own binding.
    fn merge_nodes(&self, nodes: &mut [Node], scope: BandId) {
        for node in nodes {
            match node {
                Node::Paragraph(p) => {
                    for run in &mut p.runs {
                        self.fill_run(run, scope);
                    }
                }
                Node::Table(table) => self.merge_table(table, scope),
            }
        }
    }

    fn merge_table(&self, table: &mut Table, scope: BandId) {
        let Some(binding) = scan_region(table) else {
            // No band binding: static content. Substitute in place and
            // recurse into nested tables with the same scope.
            for row in &mut table.rows {
                row.for_each_run_mut(Descend::SkipNestedTables, &mut |run| {
                    self.fill_run(run, scope)
                });
            }
            self.merge_nested(table, scope);
            return;
        };

        // The scope band itself matches first, so a region bound to the
        // current scope (ROOT included) renders once from its own data.
        let mut instances = if self.tree.name(scope) == binding.band_name {
            vec![scope]
        } else {
            self.tree.children_by_name(scope, &binding.band_name)
        };
        if instances.is_empty() {
            instances = self.tree.find_bands_recursively(scope, &binding.band_name);
        }
        // Control regions gate visibility: at most one rendering.
        if binding.is_control() && instances.len() > 1 {
            instances.truncate(1);
        }

        if instances.is_empty() {
            warn!(
                "band [{}] has no instances; removing its region row",
                binding.band_name
            );
            table.remove_row(binding.alias_row);
            return;
        }

        let template_row = table.rows[binding.alias_row].clone();
        let mut insert_at = binding.alias_row;
        for instance in instances {
            let mut clone = template_row.clone();
            // The clone's own pass never enters nested tables; those are
            // merged right after, scoped to this instance, so a nested
            // region in row i binds to instance i's children.
            clone.for_each_run_mut(Descend::SkipNestedTables, &mut |run| {
                self.fill_run(run, instance)
            });
            self.merge_nested_row(&mut clone, instance);
            table.insert_row_before(insert_at, clone);
            insert_at += 1;
        }
        // All instances rendered; the original template row goes away.
        // Header rows, if any, stay where they were.
        table.remove_row(insert_at);
    }

    fn merge_nested(&self, table: &mut Table, scope: BandId) {
        for row in &mut table.rows {
            self.merge_nested_row(row, scope);
        }
    }

    fn merge_nested_row(&self, row: &mut Row, scope: BandId) {
        for cell in &mut row.cells {
            for node in &mut cell.content {
                if let Node::Table(nested) = node {
                    self.merge_table(nested, scope);
                }
            }
        }
    }

    /// Substitutes one text run against `band`, per the alias policy:
    /// typed replacement for a single alias in the band's own scope,
    /// whole-string table-scoped substitution when any alias in the run
    /// is ambiguous, per-alias string interpolation otherwise.
    fn fill_run(&self, run: &mut Run, band: BandId) {
        let Run::Text {
            text,
            preserve_space,
        } = run
        else {
            return;
        };
        if alias::find_all(text).is_empty() {
            return;
        }

        // Single alias in this band's own scope: typed substitution, so
        // non-text values survive as values.
        if let Some(raw) = alias::unwrap_alias(text) {
            let pair = alias::split_band_and_parameter(raw);
            if !pair.is_table_scoped() {
                let target = pair.band_path.rsplit('.').next().unwrap_or("");
                if target == self.tree.name(band) {
                    if let Some(value) = self.tree.parameter(band, &pair.parameter) {
                        *run = Run::Value(value.clone());
                        return;
                    }
                }
            }
        }

        let raws = alias::find_all(text);
        let table_scoped = raws
            .iter()
            .any(|raw| alias::split_band_and_parameter(raw).is_table_scoped());

        let new_text = if table_scoped {
            // Whole-string substitution from the band's raw row data.
            // A run mixing both alias kinds takes this path for the whole
            // string; that is the documented policy, flagged once here.
            if raws
                .iter()
                .any(|raw| !alias::split_band_and_parameter(raw).is_table_scoped())
            {
                warn!(
                    "text [{}] mixes band-qualified and table-scoped aliases; \
                     substituting the whole text from band [{}]",
                    text,
                    self.tree.name(band)
                );
            }
            alias::substitute_placeholders(text, |raw| {
                let value = self.tree.data(band).get(raw).cloned();
                if value.is_none() {
                    warn!(
                        "parameter [{}] not found in band [{}]",
                        raw,
                        self.tree.name(band)
                    );
                }
                value
            })
        } else {
            alias::substitute_placeholders(text, |raw| {
                let pair = alias::split_band_and_parameter(raw);
                match self
                    .tree
                    .resolve_parameter(band, &pair.band_path, &pair.parameter)
                {
                    Some(value) => {
                        // Field formats key on the owning band's name.
                        let owner = pair.band_path.rsplit('.').next().unwrap_or("");
                        Some(match self.tree.field_format(owner, &pair.parameter) {
                            Some(hint) => {
                                serde_json::Value::String(band::format_with_hint(value, hint))
                            }
                            None => value.clone(),
                        })
                    }
                    None => {
                        warn!("alias [{}] cannot be resolved from band [{}]", raw, self.tree.name(band));
                        None
                    }
                }
            })
        };

        *text = new_text;
        // Keep inserted whitespace through re-serialization.
        *preserve_space = true;
    }
}

/// Finds the region binding of a table: the first row containing a
/// band-qualified alias decides both the repeat unit and the band name.
/// Tables without a qualified alias are static content.
fn scan_region(table: &Table) -> Option<RegionBinding> {
    for (index, row) in table.rows.iter().enumerate() {
        let mut band_name: Option<String> = None;
        row.for_each_text(Descend::SkipNestedTables, &mut |text| {
            if band_name.is_some() {
                return;
            }
            for raw in alias::find_all(text) {
                let pair = alias::split_band_and_parameter(raw);
                if !pair.is_table_scoped() {
                    let target = pair.band_path.rsplit('.').next().unwrap_or("");
                    band_name = Some(target.to_string());
                    break;
                }
            }
        });
        if let Some(band_name) = band_name {
            return Some(RegionBinding {
                alias_row: index,
                band_name,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::ParamMap;
    use crate::template::doc::{Cell, Paragraph};
    use serde_json::json;

    fn items_tree(names: &[&str]) -> BandTree {
        let mut tree = BandTree::new(ParamMap::new());
        let root = tree.root();
        for name in names {
            let mut row = ParamMap::new();
            row.insert("name".to_string(), json!(*name));
            tree.add_child(root, "Items", row);
        }
        tree
    }

    #[test]
    fn test_scan_region_reads_band_from_qualified_alias() {
        let table = Table::new(vec![
            Row::of_texts(&["Name"]),
            Row::of_texts(&["${Items.name}"]),
        ]);
        let binding = scan_region(&table).unwrap();
        assert_eq!(binding.band_name, "Items");
        assert_eq!(binding.alias_row, 1);
        assert!(!binding.headerless());
    }

    #[test]
    fn test_scan_region_static_table() {
        let table = Table::new(vec![Row::of_texts(&["plain", "${loose}"])]);
        assert!(scan_region(&table).is_none());
    }

    #[test]
    fn test_control_region_requires_headerless() {
        let headerless = RegionBinding {
            alias_row: 0,
            band_name: "ShowTotalControl".to_string(),
        };
        assert!(headerless.is_control());

        let with_header = RegionBinding {
            alias_row: 1,
            band_name: "ShowTotalControl".to_string(),
        };
        assert!(!with_header.is_control());
    }

    #[test]
    fn test_repeating_rows_in_band_order() {
        let tree = items_tree(&["a", "b", "c"]);
        let template = Body::new(vec![Node::Table(Table::new(vec![Row::of_texts(&[
            "Item: ${Items.name}",
        ])]))]);

        let merged = TemplateMerger::new(&tree).merge(&template);
        assert_eq!(merged.render_text(), "Item: a\nItem: b\nItem: c");
    }

    #[test]
    fn test_header_row_is_preserved() {
        let tree = items_tree(&["a", "b"]);
        let template = Body::new(vec![Node::Table(Table::new(vec![
            Row::of_texts(&["Name"]),
            Row::of_texts(&["${Items.name}"]),
        ]))]);

        let merged = TemplateMerger::new(&tree).merge(&template);
        assert_eq!(merged.render_text(), "Name\na\nb");
    }

    #[test]
    fn test_region_bound_to_scope_band_renders_from_own_data() {
        let mut root_data = ParamMap::new();
        root_data.insert("year".to_string(), json!(2024));
        let tree = BandTree::new(root_data);
        let template = Body::new(vec![Node::Table(Table::new(vec![Row::of_texts(&[
            "Year: ${ROOT.year}",
        ])]))]);

        let merged = TemplateMerger::new(&tree).merge(&template);
        assert_eq!(merged.render_text(), "Year: 2024");
    }

    #[test]
    fn test_zero_instances_removes_row() {
        let tree = BandTree::new(ParamMap::new());
        let template = Body::new(vec![Node::Table(Table::new(vec![
            Row::of_texts(&["Header"]),
            Row::of_texts(&["${Items.name}"]),
        ]))]);

        let merged = TemplateMerger::new(&tree).merge(&template);
        assert_eq!(merged.render_text(), "Header");
    }

    #[test]
    fn test_single_alias_gets_typed_value() {
        let mut tree = BandTree::new(ParamMap::new());
        let mut row = ParamMap::new();
        row.insert("count".to_string(), json!(42));
        tree.add_child(tree.root(), "Items", row);

        let template = Body::new(vec![Node::Table(Table::new(vec![Row::new(vec![
            Cell::new(vec![Node::Paragraph(Paragraph::text("${Items.count}"))]),
        ])]))]);

        let merged = TemplateMerger::new(&tree).merge(&template);
        let Node::Table(table) = &merged.nodes[0] else {
            panic!("expected table");
        };
        let Node::Paragraph(p) = &table.rows[0].cells[0].content[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(p.runs[0], Run::Value(json!(42)));
    }
}
