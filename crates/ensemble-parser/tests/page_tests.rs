//! End-to-end parsing of forecast pages shaped like the upstream markup.

use ensemble_common::EnsembleError;
use ensemble_parser::{parse_ensemble_page, parse_page};
use test_utils::{
    create_indexed_sample, create_temperature_sample, empty_ensemble_page, ensemble_page,
    fixture_reference, page_without_script,
};

// ============================================================================
// Successful parses
// ============================================================================

#[test]
fn test_parse_page_recovers_sample() {
    let expected = create_indexed_sample(4, 6);
    let page = ensemble_page(&expected, fixture_reference());

    let sample = parse_ensemble_page(&page, fixture_reference()).unwrap();
    assert_eq!(sample, expected);
}

#[test]
fn test_parse_page_keeps_member_order() {
    let page = ensemble_page(&create_temperature_sample(5, 3), fixture_reference());
    let series = parse_page(&page).unwrap();
    let names: Vec<_> = series.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Main", "P1", "P2", "P3", "P4"]);
}

#[test]
fn test_parse_page_with_shifted_reference() {
    // The page was built for midnight; parsing a day later shifts offsets by -24.
    let expected = create_indexed_sample(2, 3);
    let page = ensemble_page(&expected, fixture_reference());
    let next_day = fixture_reference() + chrono::Duration::hours(24);

    let sample = parse_ensemble_page(&page, next_day).unwrap();
    assert_eq!(sample.times, vec![-24, -23, -22]);
    assert_eq!(sample.values, expected.values);
}

#[test]
fn test_null_values_become_nan() {
    let mut expected = create_indexed_sample(2, 3);
    expected.values[4] = f64::NAN;
    let page = ensemble_page(&expected, fixture_reference());

    let sample = parse_ensemble_page(&page, fixture_reference()).unwrap();
    assert!(sample.get(1, 1).is_nan());
    assert_eq!(sample.get(1, 2), expected.get(1, 2));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_empty_payload_is_precondition_failure() {
    let err = parse_ensemble_page(&empty_ensemble_page(), fixture_reference()).unwrap_err();
    assert!(err.is_precondition(), "unexpected error: {err}");
}

#[test]
fn test_missing_script() {
    let err = parse_ensemble_page(&page_without_script(), fixture_reference()).unwrap_err();
    assert!(matches!(err, EnsembleError::ScriptNotFound));
    assert!(!err.is_precondition());
}

#[test]
fn test_garbage_payload_is_parse_error() {
    let page = "<script type=\"text/javascript\">var hcensemblelong_data = [{'name': }];</script>";
    let err = parse_page(page).unwrap_err();
    assert!(matches!(err, EnsembleError::ParseError(_)));
}
