//! Per-resource validation reports produced by translation.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::ProxyId;
use crate::errors::{Result, SwitchyardError};

/// Marker preceding the route name in a route-level error message.
pub const ROUTE_ERROR_MARKER: &str = "Route Error: ";

/// A translation error attributable to a single route.
///
/// Renders as `"<reason>. Route Error: <route name>"`, which is the text the
/// sanitizer recognizes when classifying reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteError {
    pub reason: String,
    pub route_name: String,
}

impl RouteError {
    pub fn new(reason: impl Into<String>, route_name: impl Into<String>) -> Self {
        Self { reason: reason.into(), route_name: route_name.into() }
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}{}", self.reason, ROUTE_ERROR_MARKER, self.route_name)
    }
}

impl std::error::Error for RouteError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    Route(RouteError),
    Other(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Route(err) => err.fmt(f),
            ReportError::Other(message) => f.write_str(message),
        }
    }
}

impl From<RouteError> for ReportError {
    fn from(err: RouteError) -> Self {
        ReportError::Route(err)
    }
}

impl From<String> for ReportError {
    fn from(message: String) -> Self {
        ReportError::Other(message)
    }
}

impl From<&str> for ReportError {
    fn from(message: &str) -> Self {
        ReportError::Other(message.to_string())
    }
}

/// Errors and warnings collected for one top-level resource during a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ReportError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: impl Into<ReportError>) {
        self.errors.push(error.into());
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Turn every warning into an error.
    pub fn promote_warnings(&mut self) {
        for warning in self.warnings.drain(..) {
            self.errors.push(ReportError::Other(warning));
        }
    }
}

/// Reports for one translation cycle, keyed by proxy.
pub type ResourceReports = BTreeMap<ProxyId, ValidationReport>;

/// Fail with a `Validation` error listing every remaining error, if any.
pub fn ensure_no_errors(reports: &ResourceReports) -> Result<()> {
    let failures: Vec<String> = reports
        .iter()
        .filter(|(_, report)| report.has_errors())
        .flat_map(|(proxy, report)| report.errors.iter().map(move |err| format!("{}: {}", proxy, err)))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(SwitchyardError::validation(failures.join("; ")))
    }
}
