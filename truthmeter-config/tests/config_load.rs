use pretty_assertions::assert_eq;
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;
use truthmeter_common::ProviderKind;
use truthmeter_config::{ExtractionMode, HistoryBackend, TruthMeterConfigLoader};

/// Helper to write a YAML file in a temp dir and return its path.
fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

#[test]
#[serial]
fn file_values_and_credentials_load() {
    let tmp = TempDir::new().unwrap();
    let file_yaml = r#"
server:
  bind: "0.0.0.0:3001"
analysis:
  token_budget: 250
  extraction: greedy
providers:
  primary:
    kind: anthropic
    api_key: "${TM_TEST_CLAUDE}"
    max_retries: 2
  alternate:
    kind: gemini
    model: gemini-1.5-flash
history:
  backend: sqlite
  path: "/tmp/truthmeter-history.db"
pricing:
  input_per_1k: 0.001
"#;
    let p = write_yaml(&tmp, "truthmeter.yaml", file_yaml);

    temp_env::with_vars(
        [
            ("TM_TEST_CLAUDE", Some("sk-ant-from-placeholder")),
            ("GEMINI_API_KEY", Some("AIza-from-env")),
        ],
        || {
            let config = TruthMeterConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");

            assert_eq!(config.server.bind, "0.0.0.0:3001");
            assert_eq!(config.analysis.token_budget, 250);
            assert_eq!(config.analysis.extraction, ExtractionMode::Greedy);

            let primary = &config.providers.primary;
            assert_eq!(primary.kind, ProviderKind::Anthropic);
            assert_eq!(primary.max_retries, 2);
            assert_eq!(
                primary.credential().unwrap().expose(),
                "sk-ant-from-placeholder"
            );

            let alternate = &config.providers.alternate;
            assert_eq!(alternate.model(), "gemini-1.5-flash");
            assert_eq!(alternate.credential().unwrap().expose(), "AIza-from-env");

            assert_eq!(config.history.backend, HistoryBackend::Sqlite);
            assert_eq!(
                config.history.resolved_path(),
                PathBuf::from("/tmp/truthmeter-history.db")
            );
            assert_eq!(config.history.capacity, 100);
            assert_eq!(config.pricing.input_per_1k, 0.001);
            assert_eq!(config.pricing.output_per_1k, 0.015);
        },
    );
}

#[test]
#[serial]
fn env_overrides_win_over_file() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "truthmeter.yaml", "server:\n  bind: \"127.0.0.1:1\"\n");

    temp_env::with_vars(
        [
            ("TRUTHMETER__SERVER__BIND", Some("127.0.0.1:4242")),
            ("TRUTHMETER__HISTORY__CAPACITY", Some("10")),
        ],
        || {
            let config = TruthMeterConfigLoader::new()
                .with_file(&p)
                .load()
                .expect("load config");
            assert_eq!(config.server.bind, "127.0.0.1:4242");
            assert_eq!(config.history.capacity, 10);
        },
    );
}

#[test]
#[serial]
fn missing_optional_file_yields_defaults() {
    let tmp = TempDir::new().unwrap();
    temp_env::with_vars_unset(["CLAUDE_API_KEY", "GEMINI_API_KEY"], || {
        let config = TruthMeterConfigLoader::new()
            .with_optional_file(tmp.path().join("absent.yaml"))
            .load()
            .expect("defaults load");

        assert_eq!(config.server.bind, "127.0.0.1:3001");
        assert_eq!(config.providers.primary.kind, ProviderKind::Anthropic);
        assert_eq!(config.providers.alternate.kind, ProviderKind::Gemini);
        assert!(config.providers.primary.credential().is_none());
        assert!(config.providers.alternate.credential().is_none());
        assert_eq!(config.history.key, "ai-truth-meter-history");
    });
}

#[test]
#[serial]
fn missing_required_file_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let result = TruthMeterConfigLoader::new()
        .with_file(tmp.path().join("absent.yaml"))
        .load();
    assert!(result.is_err());
}
