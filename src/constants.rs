// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default token endpoint (client credentials exchange)
pub const DEFAULT_AUTH_URL: &str = "https://api.multiset.ai/v1/m2m/token";

/// Default localization query endpoint (multipart form)
pub const DEFAULT_QUERY_URL: &str = "https://api.multiset.ai/v1/vps/map/query-form";

/// Default HTTP request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Query image resolution sent to the service
pub mod query_resolution {
    /// Landscape target width
    pub const LANDSCAPE_WIDTH: u32 = 960;
    /// Landscape target height
    pub const LANDSCAPE_HEIGHT: u32 = 720;
    /// Portrait target width (landscape dimensions swapped)
    pub const PORTRAIT_WIDTH: u32 = LANDSCAPE_HEIGHT;
    /// Portrait target height
    pub const PORTRAIT_HEIGHT: u32 = LANDSCAPE_WIDTH;
}

/// Capture positions closer than this to the tracking origin are rejected
pub const MIN_CAPTURE_POSITION_MAGNITUDE: f32 = 1e-6;

/// Matrices with an absolute determinant below this are treated as singular
pub const SINGULAR_DETERMINANT_EPSILON: f32 = 1e-6;

/// Multipart form field names
pub mod form_fields {
    pub const IS_RIGHT_HANDED: &str = "isRightHanded";
    pub const PX: &str = "px";
    pub const PY: &str = "py";
    pub const FX: &str = "fx";
    pub const FY: &str = "fy";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const MAP_CODE: &str = "mapCode";
    pub const MAP_SET_CODE: &str = "mapSetCode";
    pub const QUERY_IMAGE: &str = "queryImage";
}

/// Filename attached to the query image part
pub const QUERY_IMAGE_FILENAME: &str = "frame.jpg";

/// MIME type of the query image part
pub const QUERY_IMAGE_MIME: &str = "image/jpeg";

/// JPEG quality presets for the query image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JpegQuality {
    /// Smallest upload
    Low,
    /// Balanced
    Medium,
    /// Default
    #[default]
    High,
    /// Near-lossless
    Maximum,
}

impl JpegQuality {
    /// All presets, lowest to highest
    pub const ALL: [JpegQuality; 4] = [
        JpegQuality::Low,
        JpegQuality::Medium,
        JpegQuality::High,
        JpegQuality::Maximum,
    ];

    /// JPEG quality value (0-100)
    pub fn value(&self) -> u8 {
        match self {
            JpegQuality::Low => 60,
            JpegQuality::Medium => 80,
            JpegQuality::High => 92,
            JpegQuality::Maximum => 98,
        }
    }

    /// Display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            JpegQuality::Low => "Low",
            JpegQuality::Medium => "Medium",
            JpegQuality::High => "High",
            JpegQuality::Maximum => "Maximum",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portrait_resolution_is_swapped() {
        assert_eq!(query_resolution::PORTRAIT_WIDTH, 720);
        assert_eq!(query_resolution::PORTRAIT_HEIGHT, 960);
    }

    #[test]
    fn test_jpeg_quality_values() {
        assert_eq!(JpegQuality::Low.value(), 60);
        assert_eq!(JpegQuality::Medium.value(), 80);
        assert_eq!(JpegQuality::High.value(), 92);
        assert_eq!(JpegQuality::Maximum.value(), 98);
    }
}
