//! Static report structure and the runtime band data model.

pub mod band;
pub mod report;

pub use band::{BandId, BandTree, ParamMap, ROOT_BAND_NAME};
pub use report::{
    BandDefinition, LoaderKind, OutputFormat, Report, ReportParameter, ReportQuery,
    ReportTemplate, TemplateBody,
};
