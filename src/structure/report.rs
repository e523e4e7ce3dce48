//! Static report definitions, fixed at configuration time.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::structure::band::{BandTree, ParamMap};
use crate::template::doc::Body;

/// The closed set of data-loader kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoaderKind {
    /// SQL executed against a registered SQLite source.
    Sql,
    /// JSONPath-style selection over a JSON document held in a parameter.
    Json,
    /// Lua chunk returning rows.
    Script,
}

impl LoaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderKind::Sql => "sql",
            LoaderKind::Json => "json",
            LoaderKind::Script => "script",
        }
    }
}

/// A band's data query: which loader runs which script against which source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuery {
    pub name: String,
    /// Data-source id, resolved through the source registry (SQL kind only).
    pub source_id: Option<String>,
    pub loader_kind: LoaderKind,
    /// Script text; `${param}` placeholders are resolved from the band scope.
    pub script: String,
}

impl ReportQuery {
    pub fn new(
        name: impl Into<String>,
        loader_kind: LoaderKind,
        script: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_id: None,
            loader_kind,
            script: script.into(),
        }
    }

    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

/// Static description of a band: name, optional query, ordered children.
///
/// Definitions form a tree fixed at report-definition time; sibling names
/// are unique. A definition without a query yields exactly one empty band
/// instance, which is how purely structural bands (grouping, control
/// scaffolding fed from parents) are expressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDefinition {
    pub name: String,
    pub query: Option<ReportQuery>,
    pub children: Vec<BandDefinition>,
}

impl BandDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: None,
            children: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: ReportQuery) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_child(mut self, child: BandDefinition) -> Self {
        self.children.push(child);
        self
    }
}

/// A declared report input parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportParameter {
    pub alias: String,
    pub required: bool,
    /// Applied when the caller supplies no value for this alias.
    pub default_value: Option<Value>,
}

impl ReportParameter {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            required: false,
            default_value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Output formats the orchestrator knows how to name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Docx,
    Html,
    Pdf,
    Csv,
    Txt,
    /// Pass-through kind: the custom collaborator owns naming and bytes.
    Custom,
}

impl OutputFormat {
    /// File-extension id for this format.
    pub fn id(&self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Html => "html",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Csv => "csv",
            OutputFormat::Txt => "txt",
            OutputFormat::Custom => "custom",
        }
    }
}

/// Alternative to the structural merge: renders the whole report itself.
pub trait CustomReport: Send + Sync {
    fn create_report(
        &self,
        report: &Report,
        root_band: &BandTree,
        params: &ParamMap,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Template content: either a structural body to merge, or a custom
/// collaborator that produces the bytes wholesale.
#[derive(Clone)]
pub enum TemplateBody {
    Structural(Body),
    Custom(Arc<dyn CustomReport>),
}

impl std::fmt::Debug for TemplateBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateBody::Structural(body) => f.debug_tuple("Structural").field(body).finish(),
            TemplateBody::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A report template: document identity plus mergeable content.
#[derive(Debug, Clone)]
pub struct ReportTemplate {
    /// Base document name; supplies the fallback output name.
    pub document_name: String,
    /// Optional naming pattern, e.g. `"${ROOT.year}_report"`.
    pub output_name_pattern: Option<String>,
    pub output_format: OutputFormat,
    pub body: TemplateBody,
}

impl ReportTemplate {
    pub fn structural(
        document_name: impl Into<String>,
        output_format: OutputFormat,
        body: Body,
    ) -> Self {
        Self {
            document_name: document_name.into(),
            output_name_pattern: None,
            output_format,
            body: TemplateBody::Structural(body),
        }
    }

    pub fn custom(document_name: impl Into<String>, custom: Arc<dyn CustomReport>) -> Self {
        Self {
            document_name: document_name.into(),
            output_name_pattern: None,
            output_format: OutputFormat::Custom,
            body: TemplateBody::Custom(custom),
        }
    }

    pub fn with_output_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.output_name_pattern = Some(pattern.into());
        self
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.body, TemplateBody::Custom(_))
    }
}

/// A complete report definition: band tree, declared parameters, formats.
#[derive(Debug, Clone)]
pub struct Report {
    pub name: String,
    /// Top-level band definitions (children of the implicit root).
    pub bands: Vec<BandDefinition>,
    pub parameters: Vec<ReportParameter>,
    /// Display hints keyed `"Band.param"`, inherited down the band tree.
    pub field_formats: HashMap<String, String>,
}

impl Report {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bands: Vec::new(),
            parameters: Vec::new(),
            field_formats: HashMap::new(),
        }
    }

    pub fn with_band(mut self, band: BandDefinition) -> Self {
        self.bands.push(band);
        self
    }

    pub fn with_parameter(mut self, parameter: ReportParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_field_format(
        mut self,
        key: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        self.field_formats.insert(key.into(), format.into());
        self
    }
}
