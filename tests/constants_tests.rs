// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use vps_relocalizer::constants::{JpegQuality, form_fields, query_resolution};

#[test]
fn test_jpeg_quality_presets() {
    // Test that all presets exist (Low, Medium, High, Maximum)
    assert_eq!(JpegQuality::ALL.len(), 4);
    assert_eq!(JpegQuality::default(), JpegQuality::High);
}

#[test]
fn test_jpeg_quality_ordering() {
    // Test that presets are ordered from lowest to highest quality
    let mut prev = 0u8;
    for preset in JpegQuality::ALL {
        assert!(
            preset.value() > prev,
            "Presets should be ordered from lowest to highest"
        );
        assert!(preset.value() <= 100);
        prev = preset.value();
    }
}

#[test]
fn test_jpeg_quality_display_names() {
    for preset in JpegQuality::ALL {
        let name = preset.display_name();
        assert!(
            !name.is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_query_resolution() {
    assert_eq!(
        (query_resolution::LANDSCAPE_WIDTH, query_resolution::LANDSCAPE_HEIGHT),
        (960, 720)
    );
    assert_eq!(
        (query_resolution::PORTRAIT_WIDTH, query_resolution::PORTRAIT_HEIGHT),
        (720, 960)
    );
}

#[test]
fn test_map_field_names_are_distinct() {
    assert_ne!(form_fields::MAP_CODE, form_fields::MAP_SET_CODE);
    assert_eq!(form_fields::QUERY_IMAGE, "queryImage");
}
