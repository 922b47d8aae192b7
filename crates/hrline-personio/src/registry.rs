//! Personio resource registry

use hrline_core::{PaginationStrategy, PipelineError, ResourceSpec};

use crate::config::PersonioConfig;

/// Records per page requested from list endpoints
pub const PAGE_LIMIT: u64 = 200;

const TOTAL_ELEMENTS: &str = "metadata.total_elements";
const TOTAL_PAGES: &str = "metadata.total_pages";

fn offset_paged(name: &str, path: &str) -> ResourceSpec {
    ResourceSpec::new(name, path, PaginationStrategy::offset(PAGE_LIMIT, TOTAL_ELEMENTS))
}

/// All Personio resources, in extraction order
pub fn resources(config: &PersonioConfig) -> Vec<ResourceSpec> {
    vec![
        offset_paged("employees", "company/employees"),
        ResourceSpec::new(
            "time_off_types",
            "company/time-off-types",
            PaginationStrategy::SinglePage,
        ),
        offset_paged("attendances", "company/attendances")
            .with_param("start_date", config.start_date.format("%Y-%m-%d").to_string())
            .with_param("end_date", config.end_date().format("%Y-%m-%d").to_string()),
        offset_paged("projects", "company/attendances/projects"),
        // Absence periods page by page number, carried in the `offset` parameter
        ResourceSpec::new(
            "absence_periods",
            "company/absence-periods",
            PaginationStrategy::page_number(1, "offset", TOTAL_PAGES),
        )
        .with_param("limit", PAGE_LIMIT.to_string())
        .with_param("offset", "1"),
    ]
}

/// Keep only the named resources, in registry order. Empty `only` keeps all.
pub fn select(
    resources: Vec<ResourceSpec>,
    only: &[String],
) -> Result<Vec<ResourceSpec>, PipelineError> {
    if only.is_empty() {
        return Ok(resources);
    }
    let unknown: Vec<&str> = only
        .iter()
        .map(String::as_str)
        .filter(|name| !resources.iter().any(|r| r.name == *name))
        .collect();
    if !unknown.is_empty() {
        let known: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
        return Err(PipelineError::Configuration(format!(
            "unknown resource(s): {} (available: {})",
            unknown.join(", "),
            known.join(", ")
        )));
    }
    Ok(resources
        .into_iter()
        .filter(|r| only.contains(&r.name))
        .collect())
}
