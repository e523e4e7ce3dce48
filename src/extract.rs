//! Data extraction: walks band definitions depth-first and builds the
//! band tree, one child band per returned row, in source row order.

use log::{debug, warn};
use thiserror::Error;

use crate::loader::{LoadContext, LoadError, LoaderRegistry};
use crate::structure::{BandDefinition, BandId, BandTree, ParamMap, Report};

/// Result type for extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors raised while populating the band tree.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A band's query names a kind no loader is registered for.
    #[error("no data loader registered for kind [{kind}] required by band [{band}]")]
    NoLoader { kind: String, band: String },

    /// A loader failed; the offending script is carried for diagnostics.
    #[error("data extraction failed. Script [{script}]: {source}")]
    Load {
        script: String,
        #[source]
        source: LoadError,
    },
}

/// Builds a [`BandTree`] from a report's band definitions.
pub struct DataExtractor<'a> {
    loaders: &'a LoaderRegistry,
    accept_unknown_band: bool,
}

impl<'a> DataExtractor<'a> {
    pub fn new(loaders: &'a LoaderRegistry) -> Self {
        Self {
            loaders,
            accept_unknown_band: false,
        }
    }

    /// When set, definitions whose loader kind is unregistered are
    /// skipped (zero instances) instead of failing the run.
    pub fn accept_unknown_band(mut self, accept: bool) -> Self {
        self.accept_unknown_band = accept;
        self
    }

    /// Populates a fresh tree: root band data is the effective parameter
    /// map, then every definition is loaded depth-first, pre-order.
    pub fn extract(&self, report: &Report, params: &ParamMap) -> ExtractResult<BandTree> {
        let mut tree = BandTree::new(params.clone());
        tree.set_field_formats(report.field_formats.clone());

        let root = tree.root();
        for definition in &report.bands {
            self.extract_band(definition, root, &mut tree, params)?;
        }
        Ok(tree)
    }

    fn extract_band(
        &self,
        definition: &BandDefinition,
        parent: BandId,
        tree: &mut BandTree,
        params: &ParamMap,
    ) -> ExtractResult<()> {
        let rows = match &definition.query {
            // A query-less definition is purely structural: exactly one
            // empty instance so the band exists in the tree.
            None => vec![ParamMap::new()],
            Some(query) => match self.loaders.get(query.loader_kind) {
                Some(loader) => {
                    let ctx = LoadContext {
                        tree,
                        parent,
                        report_params: params,
                    };
                    loader.load(query, ctx).map_err(|e| ExtractError::Load {
                        script: query.script.clone(),
                        source: e,
                    })?
                }
                None if self.accept_unknown_band => {
                    warn!(
                        "skipping band [{}]: no loader for kind [{}]",
                        definition.name,
                        query.loader_kind.as_str()
                    );
                    return Ok(());
                }
                None => {
                    return Err(ExtractError::NoLoader {
                        kind: query.loader_kind.as_str().to_string(),
                        band: definition.name.clone(),
                    })
                }
            },
        };

        debug!("band [{}]: {} instance(s)", definition.name, rows.len());
        for row in rows {
            let band = tree.add_child(parent, &definition.name, row);
            for child in &definition.children {
                self.extract_band(child, band, tree, params)?;
            }
        }
        Ok(())
    }
}
