//! Assertions over published order reports.

use crate::core::LinkBundle;
use crate::messages::{OrderId, OrderReport};

use super::CollectingPublisher;

/// Asserts that exactly one order report was published for `order_id` and
/// returns it.
///
/// # Panics
///
/// Panics if there is no report or more than one.
pub fn assert_single_order_report(publisher: &CollectingPublisher, order_id: &str) -> OrderReport {
    let order_id = OrderId::new(order_id);
    let mut reports: Vec<OrderReport> = publisher
        .order_reports()
        .into_iter()
        .filter(|r| r.order_id == order_id)
        .collect();
    assert_eq!(
        reports.len(),
        1,
        "expected exactly one order report for '{order_id}', got {reports:?}"
    );
    reports.remove(0)
}

/// Asserts that the order succeeded and returns its artifacts.
///
/// # Panics
///
/// Panics unless exactly one successful report exists for `order_id`.
pub fn assert_order_succeeded(publisher: &CollectingPublisher, order_id: &str) -> LinkBundle {
    let report = assert_single_order_report(publisher, order_id);
    assert!(report.successful, "order '{order_id}' failed: {:?}", report.error);
    report.artifacts.unwrap_or_default()
}

/// Asserts that the order failed and returns its error text.
///
/// # Panics
///
/// Panics unless exactly one failed report exists for `order_id`.
pub fn assert_order_failed(publisher: &CollectingPublisher, order_id: &str) -> String {
    let report = assert_single_order_report(publisher, order_id);
    assert!(!report.successful, "order '{order_id}' unexpectedly succeeded");
    report.error.unwrap_or_default()
}
