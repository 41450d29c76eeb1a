//! # Validation reports
//!
//! Translation produces one [`ValidationReport`] per proxy. Errors that name a
//! single route can be neutralized by the sanitizer; the splitter recognizes
//! them by [`ROUTE_ERROR_MARKER`] and moves them to the warnings.

pub mod report;
pub mod splitter;

pub use report::{
    ensure_no_errors, ReportError, ResourceReports, RouteError, ValidationReport,
    ROUTE_ERROR_MARKER,
};
pub use splitter::{extract_route_identifier, split_route_errors};
