use serial_test::serial;
use temp_env::with_vars;

use super::*;
use crate::Error;

fn cleanup_all_workload_env_vars() {
    for (key, _) in std::env::vars() {
        if key.starts_with("WORKLOAD__") || key == "CONFIG_PATH" {
            std::env::remove_var(&key);
        }
    }
}

fn valid_config() -> WorkloadConfig {
    let mut config = WorkloadConfig::default();
    config.workload.patterns = vec!["/client/%node-%02d[4];[a-z]{8}".to_string()];
    config
}

#[test]
#[serial]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = WorkloadConfig::default();

    assert!(config.workload.patterns.is_empty());
    assert_eq!(config.client.endpoints, vec!["http://127.0.0.1:2379".to_string()]);
    assert_eq!(config.client.request_timeout_ms, 10_000);
    assert_eq!(config.run.test_end_key, "/prefix/testEnd");
    assert_eq!(config.churn.level_pct, 10);
    assert!(config.get.full_read);
    assert!(config.watch.strict_levels);
    assert!(!config.has_steady_state());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    cleanup_all_workload_env_vars();
    with_vars(
        vec![
            ("WORKLOAD__CHURN__VALUE_RATE", Some("3600")),
            ("WORKLOAD__CLIENT__CLIENTS", Some("8")),
            ("WORKLOAD__CLIENT__ENDPOINTS", Some("http://a:2379,http://b:2379")),
        ],
        || {
            let config = WorkloadConfig::new().unwrap();

            assert_eq!(config.churn.value_rate, Some(3600));
            assert_eq!(config.client.clients, 8);
            assert_eq!(config.client.endpoints.len(), 2);
            assert!(config.has_steady_state());
        },
    );
}

#[test]
#[serial]
fn level_churn_should_default_its_percentage() {
    cleanup_all_workload_env_vars();
    with_vars(
        vec![("WORKLOAD__CHURN__LEVEL_RATE", Some("3600"))],
        || {
            let mut config = WorkloadConfig::new().unwrap();
            assert_eq!(config.churn.level_rate, Some(3600));
            assert_eq!(config.churn.level_pct, 10);

            config.workload.patterns = vec!["/client/%node-%02d[4];[a-z]{8}".to_string()];
            let config = config.validate().unwrap();
            assert_eq!(config.churn.level_pct, 10);
        },
    );
}

#[test]
#[serial]
fn with_override_config_should_merge_file_settings() {
    cleanup_all_workload_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("armada.toml");

    std::fs::write(
        &config_path,
        r#"
        [workload]
        patterns = ["/:region/:clusterid;[a-f0-9]{8}"]
        total = 5

        [workload.builder_rules.region]
        values = ["us-south", "us-east", "eu-frank", "au-south"]
        count = 3
        max = 4

        [workload.builder_rules.clusterid]
        pattern = "[0-9]{2}[a-f0-9]{6}"
        count = 2

        [watch]
        counts_per_level = "1,n"
        "#,
    )
    .unwrap();

    let empty_vars: Vec<(&str, Option<&str>)> = vec![];
    with_vars(empty_vars, || {
        let base_config = WorkloadConfig::new().expect("success");
        let config = base_config
            .with_override_config(config_path.to_str().unwrap())
            .unwrap()
            .validate()
            .unwrap();

        assert_eq!(config.workload.patterns.len(), 1);
        assert_eq!(config.workload.total, 5);
        let region = &config.workload.builder_rules["region"];
        assert_eq!(region.count, 3);
        assert_eq!(region.max, 4);
        assert_eq!(
            config.workload.builder_rules["clusterid"].pattern.as_deref(),
            Some("[0-9]{2}[a-f0-9]{6}")
        );
        assert_eq!(config.watch.counts_per_level.as_deref(), Some("1,n"));
    });
}

#[test]
#[serial]
fn environment_variables_should_have_highest_priority() {
    cleanup_all_workload_env_vars();
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("test_config.toml");
    std::fs::write(
        &config_path,
        r#"
        [workload]
        patterns = ["/a/%k%d[3];[0-9]{4}"]
        put_rate = 100
        "#,
    )
    .unwrap();

    with_vars(
        vec![
            ("CONFIG_PATH", Some(config_path.to_str().unwrap())),
            ("WORKLOAD__WORKLOAD__PUT_RATE", Some("7200")),
        ],
        || {
            let config = WorkloadConfig::new().unwrap();

            assert_eq!(config.workload.put_rate, 7200);
            assert_eq!(config.workload.patterns, vec!["/a/%k%d[3];[0-9]{4}".to_string()]);
        },
    );
}

#[test]
#[serial]
fn missing_config_file_should_fail() {
    cleanup_all_workload_env_vars();
    with_vars(vec![("CONFIG_PATH", Some("/nonexistent/workload.toml"))], || {
        assert!(WorkloadConfig::new().is_err());
    });
}

#[test]
fn validation_should_fail_without_patterns() {
    let config = WorkloadConfig::default();

    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn validation_should_accept_minimal_config() {
    assert!(valid_config().validate().is_ok());
}

#[test]
fn validation_should_detect_bad_value_spec() {
    let mut config = valid_config();
    config.workload.value_spec = Some("10,abc".to_string());

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_detect_builder_rule_without_source() {
    let mut config = valid_config();
    config.workload.builder_rules.insert(
        "empty".to_string(),
        BuilderRuleConfig {
            values: vec![],
            pattern: None,
            count: 1,
            max: 0,
        },
    );

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_detect_invalid_level_pct() {
    let mut config = valid_config();
    config.churn.level_rate = Some(60);
    config.churn.level_pct = 0;
    assert!(config.clone().validate().is_err());

    config.churn.level_pct = 101;
    assert!(config.validate().is_err());
}

#[test]
fn validation_should_detect_invalid_client_pool() {
    let mut config = valid_config();
    config.client.clients = 2;
    config.client.conns = 3;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_detect_privileged_prometheus_port() {
    let mut config = valid_config();
    config.monitoring.prometheus_enabled = true;
    config.monitoring.prometheus_port = 80;

    assert!(config.validate().is_err());
}

#[test]
fn initial_total_should_be_forced_to_full_pass_with_steady_state() {
    let mut config = valid_config();
    config.workload.total = 50;
    assert_eq!(config.initial_total(), 50);

    config.get.rate = Some(0);
    assert_eq!(config.initial_total(), 0);
}

#[test]
#[serial]
fn sample_armada_config_should_load_and_compile() {
    cleanup_all_workload_env_vars();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/armada.toml");
    let config = WorkloadConfig::default()
        .with_override_config(path)
        .unwrap()
        .validate()
        .unwrap();

    assert!(config.has_steady_state());
    assert_eq!(config.client.clients, 8);

    let engine = crate::engine::PatternEngine::new(config).unwrap();
    // 4 regions, actual/desired, 10 clusters, 3 workers
    assert_eq!(engine.key_space(), 240);
    assert_eq!(engine.keyspace().max_depth(), 7);
    assert_eq!(engine.key_list(0).lines().count(), 4);
}
