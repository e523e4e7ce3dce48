//! Runtime band data: the tree populated by extraction and read by merge.
//!
//! Bands live in an arena indexed by [`BandId`]. Ownership flows strictly
//! root to leaf through the child lists; the parent link is a plain index
//! used only for upward lookups, so the structure is a tree by
//! construction and needs no interior mutability.

use std::collections::HashMap;

use serde_json::Value;

use crate::alias;

/// Reserved name of the single root band. Its parameter map is the
/// report's effective input parameter map.
pub const ROOT_BAND_NAME: &str = "ROOT";

/// Ordered parameter map; key order follows the source row's column order.
pub type ParamMap = serde_json::Map<String, Value>;

/// Handle to a band inside a [`BandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BandId(usize);

#[derive(Debug, Clone)]
struct BandNode {
    name: String,
    parent: Option<BandId>,
    children: Vec<BandId>,
    data: ParamMap,
}

/// The band tree for a single report run.
#[derive(Debug, Clone)]
pub struct BandTree {
    nodes: Vec<BandNode>,
    /// Display hints keyed `"Band.param"`, set once on the root and
    /// consulted for every band below it.
    field_formats: HashMap<String, String>,
}

impl BandTree {
    /// Creates a tree holding only the root band with the given data.
    pub fn new(root_data: ParamMap) -> Self {
        Self {
            nodes: vec![BandNode {
                name: ROOT_BAND_NAME.to_string(),
                parent: None,
                children: Vec::new(),
                data: root_data,
            }],
            field_formats: HashMap::new(),
        }
    }

    pub fn root(&self) -> BandId {
        BandId(0)
    }

    fn node(&self, id: BandId) -> &BandNode {
        &self.nodes[id.0]
    }

    /// Appends a new child band; sibling order is insertion order.
    pub fn add_child(&mut self, parent: BandId, name: impl Into<String>, data: ParamMap) -> BandId {
        let id = BandId(self.nodes.len());
        self.nodes.push(BandNode {
            name: name.into(),
            parent: Some(parent),
            children: Vec::new(),
            data,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn name(&self, id: BandId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: BandId) -> Option<BandId> {
        self.node(id).parent
    }

    pub fn children(&self, id: BandId) -> &[BandId] {
        &self.node(id).children
    }

    /// Children of `id` with the given definition name, in source order.
    pub fn children_by_name(&self, id: BandId, name: &str) -> Vec<BandId> {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(|c| self.node(*c).name == name)
            .collect()
    }

    pub fn data(&self, id: BandId) -> &ParamMap {
        &self.node(id).data
    }

    /// A band's own parameter; no upward inheritance.
    pub fn parameter(&self, id: BandId, name: &str) -> Option<&Value> {
        self.node(id).data.get(name)
    }

    /// Number of parent links between `id` and the root.
    pub fn depth(&self, id: BandId) -> usize {
        let mut depth = 0;
        let mut cur = self.node(id).parent;
        while let Some(p) = cur {
            depth += 1;
            cur = self.node(p).parent;
        }
        depth
    }

    /// Resolves a possibly band-qualified parameter reference from `id`.
    ///
    /// An empty band path (or a path ending in the band's own name) reads
    /// the band's own map. Otherwise the last path component names an
    /// ancestor: the walk goes upward through parent links until a band
    /// with that name is found. `None` means unresolved; bare names never
    /// fall back to ancestor scopes.
    pub fn resolve_parameter(&self, id: BandId, band_path: &str, name: &str) -> Option<&Value> {
        if band_path.is_empty() {
            return self.parameter(id, name);
        }
        let target = band_path.rsplit('.').next().unwrap_or(band_path);
        let mut cur = Some(id);
        while let Some(b) = cur {
            if self.node(b).name == target {
                return self.parameter(b, name);
            }
            cur = self.node(b).parent;
        }
        None
    }

    /// First band named `name` at or below `from`, pre-order.
    pub fn find_band_recursively(&self, from: BandId, name: &str) -> Option<BandId> {
        if self.node(from).name == name {
            return Some(from);
        }
        for child in &self.node(from).children {
            if let Some(found) = self.find_band_recursively(*child, name) {
                return Some(found);
            }
        }
        None
    }

    /// Every band named `name` strictly below `from`, pre-order.
    pub fn find_bands_recursively(&self, from: BandId, name: &str) -> Vec<BandId> {
        let mut out = Vec::new();
        self.collect_bands(from, name, &mut out);
        out
    }

    fn collect_bands(&self, from: BandId, name: &str, out: &mut Vec<BandId>) {
        for child in &self.node(from).children {
            if self.node(*child).name == name {
                out.push(*child);
            }
            self.collect_bands(*child, name, out);
        }
    }

    /// Builds the loader parameter scope for a band: the report parameters
    /// unprefixed, plus every band from `id` up to the root contributing
    /// its own parameters under a `bandName.` prefix.
    pub fn merged_scope(&self, id: BandId, report_params: &ParamMap) -> ParamMap {
        let mut scope = report_params.clone();
        let mut cur = Some(id);
        while let Some(b) = cur {
            let node = self.node(b);
            for (key, value) in &node.data {
                scope
                    .entry(format!("{}.{}", node.name, key))
                    .or_insert_with(|| value.clone());
            }
            cur = node.parent;
        }
        scope
    }

    pub fn set_field_formats(&mut self, formats: HashMap<String, String>) {
        self.field_formats = formats;
    }

    /// The display hint for `"band.param"`, if one was declared.
    pub fn field_format(&self, band_name: &str, param: &str) -> Option<&str> {
        self.field_formats
            .get(&format!("{}.{}", band_name, param))
            .map(String::as_str)
    }

    /// Renders a band parameter to display text, applying its field
    /// format hint when one exists.
    pub fn display_value(&self, id: BandId, param: &str, value: &Value) -> String {
        match self.field_format(self.name(id), param) {
            Some(hint) => format_with_hint(value, hint),
            None => alias::value_text(value),
        }
    }
}

/// Applies a decimal-places hint (`"0.00"` style) to numeric values.
/// Unknown hints and non-numeric values fall back to plain text.
pub fn format_with_hint(value: &Value, hint: &str) -> String {
    if let Some(precision) = decimal_places(hint) {
        if let Some(f) = value.as_f64() {
            return format!("{:.*}", precision, f);
        }
    }
    alias::value_text(value)
}

fn decimal_places(hint: &str) -> Option<usize> {
    let rest = hint.strip_prefix('0')?;
    if rest.is_empty() {
        return Some(0);
    }
    let frac = rest.strip_prefix('.')?;
    frac.chars().all(|c| c == '0').then(|| frac.len())
}
