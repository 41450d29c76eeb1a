//! Extraction of route identifiers from free-text report errors.

use std::collections::BTreeSet;

use super::report::{ReportError, RouteError, ValidationReport};

/// Route identifier embedded after `marker` in `message`.
///
/// Returns `None` unless the marker occurs exactly once and is followed by a
/// non-empty identifier.
pub fn extract_route_identifier<'a>(message: &'a str, marker: &str) -> Option<&'a str> {
    if marker.is_empty() || message.matches(marker).count() != 1 {
        return None;
    }
    let (_, identifier) = message.split_once(marker)?;
    let identifier = identifier.trim();
    (!identifier.is_empty()).then_some(identifier)
}

/// Move every error naming a route into the warnings.
///
/// Typed [`RouteError`]s carry their route name verbatim. Free-text errors
/// are parsed with [`extract_route_identifier`]. Returns the route names
/// found; other errors stay in place.
pub fn split_route_errors(report: &mut ValidationReport, marker: &str) -> BTreeSet<String> {
    let mut routes = BTreeSet::new();
    let mut remaining = Vec::with_capacity(report.errors.len());

    for error in report.errors.drain(..) {
        let route = match &error {
            ReportError::Route(RouteError { route_name, .. }) => Some(route_name.clone()),
            ReportError::Other(message) => {
                extract_route_identifier(message, marker).map(str::to_string)
            }
        };
        match route {
            Some(route) => {
                routes.insert(route);
                report.warnings.push(error.to_string());
            }
            None => remaining.push(error),
        }
    }

    report.errors = remaining;
    routes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ROUTE_ERROR_MARKER;

    #[test]
    fn extracts_identifier_after_single_marker() {
        assert_eq!(
            extract_route_identifier("upstream missing. Route Error: rc1-vh-0", ROUTE_ERROR_MARKER),
            Some("rc1-vh-0")
        );
    }

    #[test]
    fn rejects_missing_repeated_or_empty_marker() {
        assert_eq!(extract_route_identifier("listener port in use", ROUTE_ERROR_MARKER), None);
        assert_eq!(
            extract_route_identifier("Route Error: a and Route Error: b", ROUTE_ERROR_MARKER),
            None
        );
        assert_eq!(extract_route_identifier("dangling. Route Error:  ", ROUTE_ERROR_MARKER), None);
        assert_eq!(extract_route_identifier("anything", ""), None);
    }

    #[test]
    fn split_moves_only_marked_errors() {
        let mut report = ValidationReport::new();
        report.add_error(RouteError::new("destination missing", "route-a"));
        report.add_error("virtual host domain clash");
        report.add_error("legacy text. Route Error: route-b");
        report.add_warning("existing warning");

        let routes = split_route_errors(&mut report, ROUTE_ERROR_MARKER);

        assert_eq!(routes.into_iter().collect::<Vec<_>>(), vec!["route-a", "route-b"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].to_string(), "virtual host domain clash");
        assert_eq!(report.warnings.len(), 3);
        assert_eq!(report.warnings[0], "existing warning");
    }

    #[test]
    fn typed_route_errors_keep_their_route_name() {
        let mut report = ValidationReport::new();
        report.add_error(RouteError::new("upstream rejected. Route Error: inherited", "r1"));
        report.add_error(RouteError::new("bad rewrite", " padded "));

        let routes = split_route_errors(&mut report, ROUTE_ERROR_MARKER);

        assert_eq!(routes.into_iter().collect::<Vec<_>>(), vec![" padded ", "r1"]);
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 2);
    }
}
