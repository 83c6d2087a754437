//! Forecast page fixtures.
//!
//! The upstream endpoint answers with an HTML fragment whose chart data is a
//! JavaScript object literal: single-quoted keys, trailing commas after
//! `'enabled': false`, and a terminating `;`. These builders reproduce that
//! shape around arbitrary series.

use chrono::{DateTime, TimeZone, Utc};
use ensemble_common::EnsembleSample;

/// Fixed reference time used by the fixtures.
pub fn fixture_reference() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0)
        .single()
        .expect("valid fixture date")
}

/// Render a page embedding `sample`, with the time axis anchored at
/// `reference`. `NaN` values are written as `null`.
pub fn ensemble_page(sample: &EnsembleSample, reference: DateTime<Utc>) -> String {
    let base = reference.timestamp_millis();
    let series: Vec<String> = sample
        .members
        .iter()
        .enumerate()
        .map(|(m, name)| {
            let points: Vec<String> = sample
                .times
                .iter()
                .zip(sample.member_row(m))
                .map(|(hour, value)| {
                    let ts = base + hour * 3_600_000;
                    if value.is_nan() {
                        format!("[{}, null]", ts)
                    } else {
                        format!("[{}, {}]", ts, value)
                    }
                })
                .collect();
            series_literal(name, &points.join(", "))
        })
        .collect();

    wrap_script(&format!("[\n{}\n]", series.join(",\n")))
}

/// A page whose payload is an empty series list.
pub fn empty_ensemble_page() -> String {
    wrap_script("[]")
}

/// A page with markup but no chart script.
pub fn page_without_script() -> String {
    "<div class=\"ensemble\"><p>Keine Daten verfügbar</p></div>".to_string()
}

fn series_literal(name: &str, points: &str) -> String {
    format!(
        "    {{\n        'name': '{}',\n        'type': 'line',\n        'marker': {{\n                                'enabled': false,\n        }},\n        'data': [{}],\n    }}",
        name, points
    )
}

fn wrap_script(payload: &str) -> String {
    format!(
        r#"<div id="ensemble-chart"></div>
<script type="application/ld+json">{{"@type": "WebPage"}}</script>
<script type="text/javascript">
    var hcensemblelong_options = {{ 'chart': {{ 'type': 'line' }} }};
    var hcensemblelong_data = {};
</script>
"#,
        payload
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::create_indexed_sample;

    #[test]
    fn test_page_contains_declaration() {
        let page = ensemble_page(&create_indexed_sample(2, 2), fixture_reference());
        assert!(page.contains("var hcensemblelong_data = ["));
        assert!(page.contains("'name': 'P1'"));
        assert!(page.trim_end().ends_with("</script>"));
    }
}
