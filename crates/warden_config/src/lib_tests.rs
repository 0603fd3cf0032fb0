use assert_matches::assert_matches;
use camino_tempfile::tempdir;
use indoc::indoc;
use pretty_assertions::assert_eq;
use test_log::test;

use super::*;
use crate::{
    model::{DEFAULT_BASE_URL, DEFAULT_MODEL},
    tools::DEFAULT_WEATHER_URL,
    turn::SensitiveFailure,
};

#[test]
fn test_default_urls() {
    let config = Config::default();

    assert_eq!(config.model.base_url.as_str(), format!("{DEFAULT_BASE_URL}/"));
    assert_eq!(config.weather.base_url.as_str(), format!("{DEFAULT_WEATHER_URL}/"));
}

#[test]
fn test_defaults() {
    let config = Config::default();

    assert_eq!(config.model.name, DEFAULT_MODEL);
    assert_eq!(config.model.api_key_env, "DEEPSEEK_API_KEY");
    assert_eq!(config.turn.max_tool_rounds, 8);
    assert_eq!(config.turn.sensitive_failure, SensitiveFailure::Report);
    assert_eq!(config.sql.default_limit, 5);
    assert_eq!(config.retrieval.k, 2);
    assert_eq!(config.retrieval.corpus, None);
    assert_eq!(
        config.database.path_or_default(Utf8Path::new("/data")),
        camino::Utf8PathBuf::from("/data/warden.db")
    );
}

#[test]
fn test_load_from_directory() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("warden.toml"), indoc! {r#"
        [model]
        name = "deepseek-reasoner"

        [turn]
        max_tool_rounds = 3
        sensitive_failure = "abort"

        [database]
        path = "chinook.db"
    "#})
    .unwrap();

    let config = Config::load(None, tmp.path()).unwrap();
    assert_eq!(config.model.name, "deepseek-reasoner");
    assert_eq!(config.model.timeout_secs, ModelConfig::default().timeout_secs);
    assert_eq!(config.turn.max_tool_rounds, 3);
    assert_eq!(config.turn.sensitive_failure, SensitiveFailure::Abort);
    assert_eq!(config.database.path.as_deref(), Some(Utf8Path::new("chinook.db")));
}

#[test]
fn test_load_without_file_uses_defaults() {
    let tmp = tempdir().unwrap();
    assert_eq!(Config::load(None, tmp.path()).unwrap(), Config::default());
}

#[test]
fn test_load_explicit_json_file() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("custom.json");
    std::fs::write(&path, r#"{"sql": {"default_limit": 20}, "retrieval": {"k": 4}}"#).unwrap();

    let config = Config::load(Some(&path), Utf8Path::new("/nonexistent")).unwrap();
    assert_eq!(config.sql.default_limit, 20);
    assert_eq!(config.retrieval.k, 4);

    assert_matches!(
        Config::load(Some(&tmp.path().join("missing.toml")), tmp.path()),
        Err(Error::Loader(ConfigLoaderError::Io(_)))
    );
}

#[test]
fn test_load_rejects_unknown_fields() {
    let tmp = tempdir().unwrap();
    std::fs::write(tmp.path().join("warden.toml"), "[turn]\nmax_rounds = 3\n").unwrap();

    assert_matches!(
        Config::load(None, tmp.path()),
        Err(Error::Parse { path, .. }) if path == tmp.path().join("warden.toml")
    );
}

#[test]
fn test_apply_env() {
    let mut config = Config::default();
    config
        .apply_env(|name| match name {
            "WARDEN_MODEL" => Some("local-model".to_owned()),
            "WARDEN_BASE_URL" => Some("http://localhost:8080".to_owned()),
            "WARDEN_STORAGE" => Some(String::new()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.model.name, "local-model");
    assert_eq!(config.model.base_url.as_str(), "http://localhost:8080/");
    assert_eq!(config.storage, StorageConfig::default());

    assert_matches!(
        config.apply_env(|name| (name == "WARDEN_BASE_URL").then(|| "not a url".to_owned())),
        Err(Error::InvalidValue { key, .. }) if key == "model.base_url"
    );
}

#[test]
fn test_apply_assignments() {
    let mut config = Config::default();
    config
        .apply_assignments([
            "turn.max_tool_rounds=2",
            "retrieval.corpus=docs.json",
            "storage.root=/tmp/warden",
        ])
        .unwrap();

    assert_eq!(config.turn.max_tool_rounds, 2);
    assert_eq!(config.retrieval.corpus.as_deref(), Some(Utf8Path::new("docs.json")));
    assert_eq!(config.storage.root, Utf8Path::new("/tmp/warden"));
}

#[test]
fn test_assignment_errors() {
    let mut config = Config::default();

    assert_eq!(
        config.apply_assignments(["turn.sensitive_failure=ignore"]),
        Err(Error::InvalidConfigValue {
            key: "turn.sensitive_failure".into(),
            value: "ignore".into(),
            need: vec!["report".into(), "abort".into()],
        })
    );

    for key in ["turn.rounds", "nope.name", "model"] {
        assert_eq!(
            config.apply_assignments([format!("{key}=1").as_str()]),
            Err(Error::UnknownConfigKey {
                key: key.into(),
                available_keys: Config::available_keys(),
            }),
            "{key}"
        );
    }

    assert_matches!(
        config.apply_assignments(["sql.default_limit=many"]),
        Err(Error::InvalidValue { key, .. }) if key == "sql.default_limit"
    );
}

#[test]
fn test_available_keys() {
    let keys = Config::available_keys();

    assert!(keys.contains(&"model.base_url".to_owned()));
    assert!(keys.contains(&"turn.sensitive_failure".to_owned()));
    assert!(keys.contains(&"retrieval.k".to_owned()));
    assert_eq!(keys.len(), 13);
}
