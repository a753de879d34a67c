use std::fs;

use assert_matches::assert_matches;
use chrono::NaiveDate;

use enviro_acquire::config::{ConfigLoader, DEFAULT_CONFIG_FILE};
use enviro_acquire::error::AcquireError;

#[test]
fn parse_overrides_selected_fields() {
    let settings = ConfigLoader::parse(
        r#"{
            "endpoints": { "gbif_base": "http://localhost:8080/v1" },
            "download_dir": "/tmp/enviro",
            "timeout_secs": 30,
            "today": "2024-06-01"
        }"#,
    )
    .unwrap();
    assert_eq!(settings.endpoints.gbif_base, "http://localhost:8080/v1");
    assert_eq!(
        settings.endpoints.cru_base,
        "https://crudata.uea.ac.uk/cru/data/hrg"
    );
    assert_eq!(settings.timeout_secs, 30);
    assert_eq!(settings.gbif_page_size, 300);
    assert_eq!(settings.today(), NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
}

#[test]
fn zero_page_size_is_rejected() {
    let err = ConfigLoader::parse(r#"{"gbif_page_size": 0}"#).unwrap_err();
    assert_matches!(err, AcquireError::ConfigParse(_));
}

#[test]
fn malformed_json_is_config_parse_error() {
    let err = ConfigLoader::parse("{ not json").unwrap_err();
    assert_matches!(err, AcquireError::ConfigParse(_));
}

#[test]
fn explicit_missing_file_is_config_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_CONFIG_FILE);
    let err = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap_err();
    assert_matches!(err, AcquireError::ConfigRead(found) if found == path);
}

#[test]
fn explicit_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.json");
    fs::write(&path, r#"{"gbif_page_size": 50}"#).unwrap();
    let settings = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(settings.gbif_page_size, 50);
}
