use std::time::Duration;

use super::*;

#[test]
fn test_register_custom_metrics_is_idempotent() {
    register_custom_metrics();
    register_custom_metrics();
}

#[test]
fn test_observed_operations_are_exported() {
    register_custom_metrics();
    observe_operation("put", Duration::from_micros(120), 64);
    observe_error("put");

    let body = gather_metrics();
    assert!(body.contains("workload_operation_latency_us"));
    assert!(body.contains("workload_operations_total{kind=\"put\"}"));
    assert!(body.contains("workload_errors_total{kind=\"put\"}"));
}
