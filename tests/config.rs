use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use roc2rawsplits::config::{Config, ConfigLoader};
use roc2rawsplits::domain::ApiPreset;
use roc2rawsplits::error::RocError;

#[test]
fn write_then_load_with_overrides() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("roc2rawsplits.json")).unwrap();
    let config = Config {
        api_preset: Some(ApiPreset::Oresults),
        race: Some(4711),
        output: Some(Utf8PathBuf::from("C:/race/raw.txt")),
        last_id: Some(120),
        interval_secs: Some(5),
        ..Config::default()
    };
    ConfigLoader::write(&path, &config).unwrap();

    let overrides = Config {
        race: Some(4712),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve(Some(path.as_str()), overrides).unwrap();
    assert_eq!(resolved.api_url, "https://api.oresults.eu/roc");
    assert_eq!(resolved.race, 4712);
    assert_eq!(resolved.last_id, 120);
    assert_eq!(resolved.interval, Duration::from_secs(5));

    let settings = resolved.controller_settings();
    assert!(settings.use_cursor);
    assert_eq!(settings.initial_cursor, 120);
}

#[test]
fn explicit_api_url_beats_preset() {
    let config = Config {
        api_url: Some("https://example.org/roc".to_string()),
        api_preset: Some(ApiPreset::Oresults),
        race: Some(1),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(config).unwrap();
    assert_eq!(resolved.api_url, "https://example.org/roc");
}

#[test]
fn missing_explicit_file_is_a_read_error() {
    let err = ConfigLoader::resolve(Some("/nonexistent/roc2rawsplits.json"), Config::default())
        .unwrap_err();
    assert_matches!(err, RocError::ConfigRead(_));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("bad.json")).unwrap();
    std::fs::write(path.as_std_path(), "{ race: }").unwrap();
    let err = ConfigLoader::read(&path).unwrap_err();
    assert_matches!(err, RocError::ConfigParse(_));
}

#[test]
fn zero_interval_is_rejected() {
    let config = Config {
        api_preset: Some(ApiPreset::Olresultat),
        race: Some(1),
        interval_secs: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(config),
        Err(RocError::InvalidConfig(_))
    );
}

#[test]
fn write_replaces_file_without_leftovers() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("nested/roc2rawsplits.json")).unwrap();
    let mut config = Config {
        api_preset: Some(ApiPreset::Oresults),
        race: Some(3),
        ..Config::default()
    };
    ConfigLoader::write(&path, &config).unwrap();
    config.last_id = Some(9);
    ConfigLoader::write(&path, &config).unwrap();

    assert_eq!(ConfigLoader::read(&path).unwrap(), config);
    let entries = std::fs::read_dir(temp.path().join("nested")).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn saved_cursor_goes_back_to_source_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("race.json")).unwrap();
    let stored = Config {
        api_url: Some("https://example.org/roc".to_string()),
        race: Some(12),
        output: Some(Utf8PathBuf::from("splits.txt")),
        last_id: Some(5),
        ..Config::default()
    };
    ConfigLoader::write(&path, &stored).unwrap();

    let overrides = Config {
        race: Some(13),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve(Some(path.as_str()), overrides.clone()).unwrap();
    assert_eq!(resolved.source.as_ref(), Some(&path));

    let written = ConfigLoader::save_last_id(&resolved, overrides, 777).unwrap();
    assert_eq!(written, Some(path.clone()));

    let saved = ConfigLoader::read(&path).unwrap();
    assert_eq!(
        saved,
        Config {
            last_id: Some(777),
            ..stored
        }
    );
}

#[test]
fn cursor_is_not_saved_without_last_id_mode() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("race.json")).unwrap();
    let stored = Config {
        api_preset: Some(ApiPreset::Olresultat),
        race: Some(1),
        use_last_id: Some(false),
        last_id: Some(40),
        ..Config::default()
    };
    ConfigLoader::write(&path, &stored).unwrap();

    let resolved = ConfigLoader::resolve(Some(path.as_str()), Config::default()).unwrap();
    let written = ConfigLoader::save_last_id(&resolved, Config::default(), 900).unwrap();
    assert_eq!(written, None);
    assert_eq!(ConfigLoader::read(&path).unwrap(), stored);
}
