//! Report orchestration: one run, end to end.
//!
//! Sequencing: validate inputs, resolve effective parameters (defaults,
//! required check, null backfill), extract the band tree, merge the
//! template (or delegate to a custom collaborator), resolve the output
//! file name. Any failure is surfaced with the report's name attached.

use log::info;
use serde_json::Value;

use crate::alias;
use crate::error::{ReportError, ReportResult};
use crate::extract::DataExtractor;
use crate::loader::LoaderRegistry;
use crate::structure::{
    BandTree, OutputFormat, ParamMap, Report, ReportTemplate, TemplateBody, ROOT_BAND_NAME,
};
use crate::template::{MergeError, TemplateMerger};

/// Inputs of a single report run.
pub struct RunParams {
    pub report: Report,
    pub template: ReportTemplate,
    /// Overrides the template's output format when set.
    pub output_format: Option<OutputFormat>,
    pub params: ParamMap,
    /// Skip bands whose loader kind is unregistered instead of failing.
    pub accept_unknown_band: bool,
}

impl RunParams {
    pub fn new(report: Report, template: ReportTemplate) -> Self {
        Self {
            report,
            template,
            output_format: None,
            params: ParamMap::new(),
            accept_unknown_band: false,
        }
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn accept_unknown_band(mut self, accept: bool) -> Self {
        self.accept_unknown_band = accept;
        self
    }
}

/// The finished document of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutput {
    pub document_name: String,
    pub output_format: OutputFormat,
    pub content: Vec<u8>,
}

/// Runs reports against a fixed loader registry.
///
/// A runner holds no per-run state; each run allocates its own band tree
/// and merge output, so independent runs may share one runner.
pub struct ReportRunner {
    loaders: LoaderRegistry,
}

impl ReportRunner {
    pub fn new(loaders: LoaderRegistry) -> Self {
        Self { loaders }
    }

    pub fn run(&self, run: RunParams) -> ReportResult<ReportOutput> {
        let report_name = run.report.name.clone();
        self.run_inner(run).map_err(|e| e.in_report(&report_name))
    }

    fn run_inner(&self, run: RunParams) -> ReportResult<ReportOutput> {
        check_inputs(&run)?;

        let effective = handle_parameters(&run.report, &run.params)?;
        info!(
            "started report [{}] with parameters {}",
            run.report.name,
            Value::Object(effective.clone())
        );

        let tree = DataExtractor::new(&self.loaders)
            .accept_unknown_band(run.accept_unknown_band)
            .extract(&run.report, &effective)?;

        let output_format = run.output_format.unwrap_or(run.template.output_format);
        let content = match &run.template.body {
            TemplateBody::Structural(body) => TemplateMerger::new(&tree)
                .merge(body)
                .render_text()
                .into_bytes(),
            TemplateBody::Custom(custom) => custom
                .create_report(&run.report, &tree, &effective)
                .map_err(|e| ReportError::Custom(e.to_string()))?,
        };

        let document_name = resolve_output_file_name(&run.template, output_format, &tree)?;
        info!("finished report [{}]", run.report.name);

        Ok(ReportOutput {
            document_name,
            output_format,
            content,
        })
    }
}

fn check_inputs(run: &RunParams) -> ReportResult<()> {
    if run.report.name.trim().is_empty() {
        return Err(ReportError::Configuration(
            "report name must not be empty".to_string(),
        ));
    }
    if run.template.document_name.trim().is_empty() {
        return Err(ReportError::Configuration(
            "template document name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Resolves the effective parameter map: declared defaults applied,
/// required parameters enforced, and every declared alias present in the
/// map (explicitly null when unresolved) so downstream lookups never
/// confuse "absent" with "present but null".
fn handle_parameters(report: &Report, supplied: &ParamMap) -> ReportResult<ParamMap> {
    let mut handled = supplied.clone();
    for parameter in &report.parameters {
        let unresolved = handled
            .get(&parameter.alias)
            .map_or(true, Value::is_null);
        if unresolved {
            if let Some(default) = &parameter.default_value {
                handled.insert(parameter.alias.clone(), default.clone());
            } else if parameter.required {
                return Err(ReportError::Validation(format!(
                    "Required report parameter \"{}\" not found",
                    parameter.alias
                )));
            }
        }
        handled.entry(parameter.alias.clone()).or_insert(Value::Null);
    }
    Ok(handled)
}

/// Derives the output file name from the template and band data.
///
/// A naming pattern containing a `${Band.param}` token looks the band up
/// (root, or recursively by name) and substitutes its parameter; a
/// pattern without a token is taken wholesale. The extension is forced
/// to the output format's id unless the format is the pass-through
/// custom kind.
fn resolve_output_file_name(
    template: &ReportTemplate,
    output_format: OutputFormat,
    tree: &BandTree,
) -> ReportResult<String> {
    let mut output_name = template.document_name.clone();

    if let Some(pattern) = template
        .output_name_pattern
        .as_deref()
        .filter(|p| !p.trim().is_empty())
    {
        let raws = alias::find_all(pattern);
        if let Some(raw) = raws.first() {
            let pair = alias::decompose(raw)?;
            let band = if pair.band_path == ROOT_BAND_NAME {
                Some(tree.root())
            } else {
                tree.find_band_recursively(tree.root(), &pair.band_path)
            };
            let band = band.ok_or_else(|| MergeError::OutputNameBandMissing {
                band: pair.band_path.clone(),
            })?;
            let value = tree
                .parameter(band, &pair.parameter)
                .filter(|v| !v.is_null())
                .ok_or_else(|| MergeError::OutputNameParameterMissing {
                    band: pair.band_path.clone(),
                    parameter: pair.parameter.clone(),
                })?;
            let token = format!("${{{}}}", raw);
            output_name = pattern.replacen(&token, &alias::value_text(value), 1);
        } else {
            output_name = pattern.to_string();
        }
    }

    if output_format != OutputFormat::Custom {
        let stem = match output_name.rsplit_once('.') {
            Some((stem, _)) => stem.to_string(),
            None => output_name,
        };
        output_name = format!("{}.{}", stem, output_format.id());
    }
    Ok(output_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::ReportParameter;
    use serde_json::json;

    #[test]
    fn test_defaults_apply_when_caller_is_silent() {
        let report = Report::new("r")
            .with_parameter(ReportParameter::new("year").with_default(json!(2024)));
        let handled = handle_parameters(&report, &ParamMap::new()).unwrap();
        assert_eq!(handled.get("year"), Some(&json!(2024)));
    }

    #[test]
    fn test_required_parameter_missing_is_validation() {
        let report = Report::new("r").with_parameter(ReportParameter::new("year").required());
        let err = handle_parameters(&report, &ParamMap::new()).unwrap_err();
        assert!(matches!(err, ReportError::Validation(_)));
    }

    #[test]
    fn test_declared_parameters_are_backfilled_with_null() {
        let report = Report::new("r").with_parameter(ReportParameter::new("note"));
        let handled = handle_parameters(&report, &ParamMap::new()).unwrap();
        assert_eq!(handled.get("note"), Some(&Value::Null));
    }

    #[test]
    fn test_output_name_extension_forcing() {
        let tree = BandTree::new(ParamMap::new());
        let template = ReportTemplate::structural(
            "report.docx",
            OutputFormat::Docx,
            crate::template::Body::default(),
        );
        let name = resolve_output_file_name(&template, OutputFormat::Pdf, &tree).unwrap();
        assert_eq!(name, "report.pdf");
    }

    #[test]
    fn test_output_name_pattern_without_token() {
        let tree = BandTree::new(ParamMap::new());
        let template = ReportTemplate::structural(
            "doc.docx",
            OutputFormat::Pdf,
            crate::template::Body::default(),
        )
        .with_output_name_pattern("yearly_summary");
        let name = resolve_output_file_name(&template, OutputFormat::Pdf, &tree).unwrap();
        assert_eq!(name, "yearly_summary.pdf");
    }

    #[test]
    fn test_output_name_pattern_missing_parameter_is_merge_error() {
        let tree = BandTree::new(ParamMap::new());
        let template = ReportTemplate::structural(
            "doc.docx",
            OutputFormat::Pdf,
            crate::template::Body::default(),
        )
        .with_output_name_pattern("${ROOT.year}_report");
        let err = resolve_output_file_name(&template, OutputFormat::Pdf, &tree).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Merge(MergeError::OutputNameParameterMissing { .. })
        ));
    }
}
