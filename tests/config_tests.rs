// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use vps_relocalizer::Config;
use vps_relocalizer::errors::ConfigError;
use vps_relocalizer::pipelines::localization::{MapSelector, MapType};

#[test]
fn test_config_default() {
    // Test that default config points at the hosted service
    let config = Config::default();

    assert!(config.auth_url.starts_with("https://"));
    assert!(config.query_url.starts_with("https://"));
    assert_eq!(config.map_type, MapType::Map);
    assert_eq!(config.request_timeout_secs, 30);
}

#[test]
fn test_empty_map_code_fails_before_network() {
    let config = Config::default();
    assert_eq!(config.map_selector(), Err(ConfigError::MissingMapCode));
}

#[test]
fn test_config_round_trip_through_file() {
    let dir = std::env::temp_dir().join(format!("vps-relocalizer-test-{}", std::process::id()));
    let path = dir.join("config.json");

    let config = Config {
        client_id: "client".into(),
        map_set_code: "SET_1".into(),
        map_type: MapType::MapSet,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.map_selector(), Ok(MapSelector::MapSet("SET_1".into())));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = std::env::temp_dir().join(format!("vps-relocalizer-partial-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("config.json");
    std::fs::write(&path, r#"{ "map_code": "MAP_X" }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.map_code, "MAP_X");
    assert_eq!(loaded.query_url, Config::default().query_url);

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));

    std::fs::remove_dir_all(&dir).ok();
}
