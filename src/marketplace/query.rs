//! Renders [`SearchCriteria`] into the marketplace query language.

use crate::offer::SearchCriteria;

/// Builds the constraint expression passed to `vastai search offers`.
///
/// CPU and RAM bounds are strict, so the core bound is lowered by one to keep
/// `min_cpu_cores` itself eligible. The price bounds are inclusive.
pub(crate) fn render_query(criteria: &SearchCriteria) -> String {
    let mut clauses = vec![
        format!(
            "cpu_cores_effective > {}",
            criteria.min_cpu_cores.saturating_sub(1)
        ),
        format!("cpu_ram > {}", criteria.min_ram_gb),
        format!("dph >= {}", criteria.min_hourly_price),
    ];

    if let Some(max) = criteria.max_hourly_price {
        clauses.push(format!("dph <= {max}"));
    }
    if let Some(download) = criteria.min_download_mbps {
        clauses.push(format!("inet_down > {download}"));
    }
    if let Some(cuda) = criteria.required_cuda_version {
        clauses.push(format!("cuda_vers = {cuda}"));
    }

    clauses.join(" ")
}
