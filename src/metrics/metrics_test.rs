use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("nicplugin".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    RPC_REQUESTS.with_label_values(&["allocate"]).inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"nicplugin_rpc_requests_total"),
        "Missing nicplugin_rpc_requests_total"
    );
    assert!(
        metric_names.contains(&"nicplugin_devices_in_use"),
        "Missing nicplugin_devices_in_use"
    );
}

#[test]
fn test_counter_increment() {
    let before = RPC_REQUESTS.with_label_values(&["metrics_test_probe"]).get();

    RPC_REQUESTS.with_label_values(&["metrics_test_probe"]).inc();
    RPC_REQUESTS.with_label_values(&["metrics_test_probe"]).inc();

    let value = RPC_REQUESTS.with_label_values(&["metrics_test_probe"]).get();
    assert_eq!(value - before, 2, "Counter should increment correctly");
}

#[test]
fn test_encode_metrics_renders_text_format() {
    let registry = create_test_registry();
    SERVER_RESTARTS.inc();

    let body = encode_metrics(&registry);
    assert!(body.contains("# TYPE nicplugin_server_restarts_total counter"));
}

#[test]
fn test_double_registration_is_tolerated() {
    let registry = create_test_registry();
    register_custom_metrics(&registry);

    assert!(!registry.gather().is_empty());
}
