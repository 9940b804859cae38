//! Record assertions.

use crate::record::StructuredRecord;

/// Assert that two record sequences are equal in order and content.
///
/// # Panics
/// Panics with the first differing index if the sequences differ.
pub fn assert_records_equal(actual: &[StructuredRecord], expected: &[StructuredRecord]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected: {}\n  Actual: {}\n  Actual records: {actual:#?}",
        expected.len(),
        actual.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(a, e, "Record mismatch at index {i}");
    }
}

/// Assert that two record sequences hold the same records in any order.
///
/// Records are compared by their JSON rendering, so use this only where
/// values round-trip exactly.
///
/// # Panics
/// Panics listing the records missing from `actual` and the extra ones.
pub fn assert_records_unordered_equal(actual: &[StructuredRecord], expected: &[StructuredRecord]) {
    let render = |records: &[StructuredRecord]| {
        let mut rows: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(r).unwrap_or_else(|e| format!("<{e}>")))
            .collect();
        rows.sort();
        rows
    };
    let (a, e) = (render(actual), render(expected));
    if a != e {
        let missing: Vec<_> = e.iter().filter(|r| !a.contains(r)).collect();
        let extra: Vec<_> = a.iter().filter(|r| !e.contains(r)).collect();
        panic!("Record content mismatch:\n  Missing: {missing:#?}\n  Extra: {extra:#?}");
    }
}
