//! Template merge cardinality: repeating, control, and nested regions.

use foliant::structure::{BandTree, ParamMap};
use foliant::template::{Body, Cell, Node, Paragraph, Row, Run, Table, TemplateMerger};
use serde_json::{json, Value};

fn row(pairs: &[(&str, Value)]) -> ParamMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn table_of(rows: Vec<Row>) -> Node {
    Node::Table(Table::new(rows))
}

#[test]
fn test_repeating_region_produces_one_row_per_instance() {
    let mut tree = BandTree::new(ParamMap::new());
    for name in ["a", "b", "c"] {
        tree.add_child(tree.root(), "Items", row(&[("name", json!(name))]));
    }
    let template = Body::new(vec![table_of(vec![Row::of_texts(&["Item: ${Items.name}"])])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), "Item: a\nItem: b\nItem: c");
}

#[test]
fn test_each_clone_substitutes_its_own_instance() {
    let mut tree = BandTree::new(ParamMap::new());
    tree.add_child(
        tree.root(),
        "Lines",
        row(&[("sku", json!("A-1")), ("qty", json!(2))]),
    );
    tree.add_child(
        tree.root(),
        "Lines",
        row(&[("sku", json!("B-7")), ("qty", json!(5))]),
    );
    let template = Body::new(vec![table_of(vec![
        Row::of_texts(&["SKU", "Qty"]),
        Row::of_texts(&["${Lines.sku}", "${Lines.qty}"]),
    ])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), "SKU | Qty\nA-1 | 2\nB-7 | 5");
}

#[test]
fn test_control_region_zero_instances_renders_nothing() {
    let tree = BandTree::new(ParamMap::new());
    let template = Body::new(vec![
        Node::Paragraph(Paragraph::text("before")),
        table_of(vec![Row::of_texts(&["Total: ${ShowTotalControl.total}"])]),
        Node::Paragraph(Paragraph::text("after")),
    ]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    // The control row is gone; nothing renders between the paragraphs.
    assert_eq!(merged.render_text(), "before\nafter");
}

#[test]
fn test_control_region_never_multiplies() {
    let mut tree = BandTree::new(ParamMap::new());
    // Even with a misbehaving source producing two instances, the
    // control row renders once.
    tree.add_child(tree.root(), "ShowTotalControl", row(&[("total", json!(10))]));
    tree.add_child(tree.root(), "ShowTotalControl", row(&[("total", json!(99))]));
    let template = Body::new(vec![table_of(vec![Row::of_texts(&[
        "Total: ${ShowTotalControl.total}",
    ])])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), "Total: 10");
}

#[test]
fn test_header_bearing_region_with_control_name_repeats() {
    let mut tree = BandTree::new(ParamMap::new());
    tree.add_child(tree.root(), "AuditControl", row(&[("who", json!("x"))]));
    tree.add_child(tree.root(), "AuditControl", row(&[("who", json!("y"))]));
    // A header row above the alias row: not a control region despite
    // the suffix, so both instances render.
    let template = Body::new(vec![table_of(vec![
        Row::of_texts(&["Who"]),
        Row::of_texts(&["${AuditControl.who}"]),
    ])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), "Who\nx\ny");
}

#[test]
fn test_nested_region_binds_to_each_parent_instance() {
    let mut tree = BandTree::new(ParamMap::new());
    let c1 = tree.add_child(tree.root(), "Customers", row(&[("name", json!("ada"))]));
    tree.add_child(c1, "Orders", row(&[("id", json!(11))]));
    tree.add_child(c1, "Orders", row(&[("id", json!(12))]));
    let c2 = tree.add_child(tree.root(), "Customers", row(&[("name", json!("bob"))]));
    tree.add_child(c2, "Orders", row(&[("id", json!(21))]));

    let inner = Table::new(vec![Row::of_texts(&["order ${Orders.id}"])]);
    let template = Body::new(vec![table_of(vec![Row::new(vec![Cell::new(vec![
        Node::Paragraph(Paragraph::text("${Customers.name}")),
        Node::Table(inner),
    ])])])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(
        merged.render_text(),
        "ada order 11 order 12\nbob order 21"
    );
}

#[test]
fn test_ancestor_reference_from_child_row() {
    let mut tree = BandTree::new(ParamMap::new());
    let s = tree.add_child(tree.root(), "Section", row(&[("title", json!("Fruit"))]));
    tree.add_child(s, "Items", row(&[("name", json!("apple"))]));

    // First alias binds the region; the second reaches the ancestor.
    let template = Body::new(vec![table_of(vec![Row::of_texts(&[
        "${Items.name} (${Section.title})",
    ])])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), "apple (Fruit)");
}

#[test]
fn test_paragraph_outside_tables_uses_root_scope() {
    let mut root_data = ParamMap::new();
    root_data.insert("year".to_string(), json!(2024));
    let tree = BandTree::new(root_data);
    let template = Body::new(vec![Node::Paragraph(Paragraph::text(
        "Annual report ${ROOT.year}",
    ))]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), "Annual report 2024");
}

#[test]
fn test_unresolved_alias_substitutes_empty() {
    let mut tree = BandTree::new(ParamMap::new());
    tree.add_child(tree.root(), "Items", row(&[("name", json!("a"))]));
    let template = Body::new(vec![table_of(vec![Row::of_texts(&[
        "${Items.name}/${Items.nope}",
    ])])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), "a/");
}

#[test]
fn test_mixed_node_takes_table_scoped_path_for_whole_string() {
    let mut tree = BandTree::new(ParamMap::new());
    tree.add_child(
        tree.root(),
        "Items",
        row(&[("name", json!("a")), ("qty", json!(4))]),
    );
    // `${qty}` is ambiguous, so the whole string is substituted from
    // the band's raw row data; the qualified alias misses there.
    let template = Body::new(vec![table_of(vec![Row::of_texts(&[
        "${Items.name} x ${qty}",
    ])])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(merged.render_text(), " x 4");
}

#[test]
fn test_typed_substitution_keeps_value() {
    let mut tree = BandTree::new(ParamMap::new());
    tree.add_child(
        tree.root(),
        "Badges",
        row(&[("image", json!({"kind": "png", "bytes": "..."}))]),
    );
    let template = Body::new(vec![table_of(vec![Row::of_texts(&["${Badges.image}"])])]);

    let merged = TemplateMerger::new(&tree).merge(&template);
    let Node::Table(table) = &merged.nodes[0] else {
        panic!("expected table");
    };
    let Node::Paragraph(p) = &table.rows[0].cells[0].content[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(
        p.runs[0],
        Run::Value(json!({"kind": "png", "bytes": "..."}))
    );
}

#[test]
fn test_template_is_left_untouched() {
    let mut tree = BandTree::new(ParamMap::new());
    tree.add_child(tree.root(), "Items", row(&[("name", json!("a"))]));
    let template = Body::new(vec![table_of(vec![Row::of_texts(&["${Items.name}"])])]);
    let before = template.clone();

    let _ = TemplateMerger::new(&tree).merge(&template);
    assert_eq!(template, before);
}
