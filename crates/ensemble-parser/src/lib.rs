//! Parser for the ensemble forecast page.
//!
//! The page embeds its chart data as a JavaScript object literal assigned to
//! a variable inside a `text/javascript` block. Parsing goes:
//! - locate the script block ([`page::extract_script`])
//! - cut out the literal ([`page::extract_data_literal`])
//! - coerce it into JSON ([`repair::repair_object_literal`])
//! - deserialize the series and reshape them ([`series::build_sample`])

pub mod page;
pub mod repair;
pub mod series;

pub use page::{extract_data_literal, extract_script, DATA_VARIABLE};
pub use repair::repair_object_literal;
pub use series::{build_sample, RawPoint, RawSeries};

use chrono::{DateTime, Utc};
use ensemble_common::{EnsembleResult, EnsembleSample};

/// Parse the page into its raw series, in page order.
pub fn parse_page(html: &str) -> EnsembleResult<Vec<RawSeries>> {
    let script = extract_script(html)?;
    let literal = extract_data_literal(script, DATA_VARIABLE)?;
    let json = repair_object_literal(literal);
    let series: Vec<RawSeries> = serde_json::from_str(&json)?;
    tracing::debug!(series = series.len(), bytes = json.len(), "Parsed ensemble payload");
    Ok(series)
}

/// Parse the page straight into a sample with hour offsets from `reference`.
pub fn parse_ensemble_page(html: &str, reference: DateTime<Utc>) -> EnsembleResult<EnsembleSample> {
    let series = parse_page(html)?;
    build_sample(&series, reference)
}
