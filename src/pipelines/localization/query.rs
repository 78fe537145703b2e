// SPDX-License-Identifier: GPL-3.0-only

//! Localization request payload
//!
//! Turns a [`ResizedQuery`] and a map selection into the multipart form the
//! service expects. Encoding is pure; nothing here touches the network.

use super::intrinsics::ResizedQuery;
use crate::constants::{QUERY_IMAGE_FILENAME, QUERY_IMAGE_MIME, form_fields};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which kind of map a request localizes against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapType {
    /// A single scanned map
    #[default]
    Map,
    /// A set of maps searched together
    MapSet,
}

/// Map or map set to localize against; never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapSelector {
    Map(String),
    MapSet(String),
}

impl MapSelector {
    /// Select from a pair of optional codes, where empty means unset
    ///
    /// Exactly one code must be set.
    pub fn from_codes(map_code: &str, map_set_code: &str) -> Result<Self, ConfigError> {
        match (map_code.trim().is_empty(), map_set_code.trim().is_empty()) {
            (false, true) => Ok(MapSelector::Map(map_code.trim().to_string())),
            (true, false) => Ok(MapSelector::MapSet(map_set_code.trim().to_string())),
            (true, true) => Err(ConfigError::MissingMapCode),
            (false, false) => Err(ConfigError::AmbiguousMapSelection),
        }
    }

    pub fn map_type(&self) -> MapType {
        match self {
            MapSelector::Map(_) => MapType::Map,
            MapSelector::MapSet(_) => MapType::MapSet,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            MapSelector::Map(code) | MapSelector::MapSet(code) => code,
        }
    }

    /// Form field carrying the code
    pub fn field_name(&self) -> &'static str {
        match self {
            MapSelector::Map(_) => form_fields::MAP_CODE,
            MapSelector::MapSet(_) => form_fields::MAP_SET_CODE,
        }
    }

    /// Fail when the selected code is empty or cannot go into a form field
    ///
    /// Control characters and `"` would break the multipart framing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let code = self.code();
        if code.trim().is_empty() {
            return match self {
                MapSelector::Map(_) => Err(ConfigError::MissingMapCode),
                MapSelector::MapSet(_) => Err(ConfigError::MissingMapSetCode),
            };
        }
        if code.chars().any(|c| c.is_control() || c == '"') {
            return Err(ConfigError::InvalidMapCode(code.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for MapSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapSelector::Map(code) => write!(f, "map {}", code),
            MapSelector::MapSet(code) => write!(f, "map set {}", code),
        }
    }
}

/// Binary part of the form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePart {
    pub field_name: String,
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Transport-ready localization request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPayload {
    /// Text fields in the order they are written
    pub fields: Vec<(String, String)>,
    pub image: ImagePart,
}

impl RequestPayload {
    /// Value of a text field
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Fresh multipart boundary
    pub fn new_boundary() -> String {
        format!("Boundary-{}", uuid::Uuid::new_v4())
    }

    /// `Content-Type` header value for a boundary
    pub fn content_type(boundary: &str) -> String {
        format!("multipart/form-data; boundary={}", boundary)
    }

    /// Render the `multipart/form-data` body
    pub fn to_multipart(&self, boundary: &str) -> Vec<u8> {
        const CRLF: &str = "\r\n";
        let mut body = Vec::with_capacity(self.image.data.len() + 1024);

        for (key, value) in &self.fields {
            body.extend_from_slice(format!("--{}{}", boundary, CRLF).as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"{}{}",
                    key, CRLF, CRLF
                )
                .as_bytes(),
            );
            body.extend_from_slice(format!("{}{}", value, CRLF).as_bytes());
        }

        body.extend_from_slice(format!("--{}{}", boundary, CRLF).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"{}",
                self.image.field_name, self.image.filename, CRLF
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!("Content-Type: {}{}{}", self.image.mime_type, CRLF, CRLF).as_bytes(),
        );
        body.extend_from_slice(&self.image.data);
        body.extend_from_slice(CRLF.as_bytes());

        body.extend_from_slice(format!("--{}--{}", boundary, CRLF).as_bytes());
        body
    }
}

/// Builds [`RequestPayload`]s
pub struct QueryEncoder;

impl QueryEncoder {
    /// Package a query for the selected map
    ///
    /// Validates the map code first so a missing code is reported as a
    /// configuration problem rather than a failed request.
    pub fn encode(
        query: ResizedQuery,
        selector: &MapSelector,
        right_handed: bool,
    ) -> Result<RequestPayload, ConfigError> {
        selector.validate()?;

        let intrinsics = query.intrinsics;
        let fields = vec![
            (form_fields::IS_RIGHT_HANDED, right_handed.to_string()),
            (form_fields::PX, intrinsics.cx.to_string()),
            (form_fields::PY, intrinsics.cy.to_string()),
            (form_fields::FX, intrinsics.fx.to_string()),
            (form_fields::FY, intrinsics.fy.to_string()),
            (form_fields::WIDTH, query.width.to_string()),
            (form_fields::HEIGHT, query.height.to_string()),
            (selector.field_name(), selector.code().trim().to_string()),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        Ok(RequestPayload {
            fields,
            image: ImagePart {
                field_name: form_fields::QUERY_IMAGE.to_string(),
                filename: QUERY_IMAGE_FILENAME.to_string(),
                mime_type: QUERY_IMAGE_MIME.to_string(),
                data: query.image_data,
            },
        })
    }
}
