// SPDX-License-Identifier: GPL-3.0-only

//! Localization service client
//!
//! A single request per call. `poseFound == false` is a successful call
//! with a negative outcome, not an error.

use super::query::RequestPayload;
use crate::backends::auth::BearerToken;
use crate::backends::transport::{Credentials, HttpRequest, Transport};
use crate::errors::LocalizationError;
use crate::geometry::{Pose, quaternion_xyzw};
use nalgebra::{Quaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Decoded service answer
///
/// `position` and `rotation` are in the map's coordinate frame and are only
/// meaningful when `pose_found` is true.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizationResult {
    pub pose_found: bool,
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub confidence: f32,
    pub map_ids: Vec<String>,
}

impl LocalizationResult {
    /// Negative outcome
    pub fn not_found() -> Self {
        Self {
            pose_found: false,
            position: Vector3::zeros(),
            rotation: Quaternion::identity(),
            confidence: 0.0,
            map_ids: Vec::new(),
        }
    }

    /// Camera pose in map space, if one was found
    pub fn map_pose(&self) -> Option<Pose> {
        self.pose_found
            .then(|| Pose::new(self.position, self.rotation))
    }

    /// Decode a response body
    pub fn from_json(body: &[u8]) -> Result<Self, LocalizationError> {
        let response: LocalizationResponse =
            serde_json::from_slice(body).map_err(|e| LocalizationError::Decode(e.to_string()))?;
        response.try_into()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WirePosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WireRotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

/// Response schema of the query endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationResponse {
    pub pose_found: bool,
    #[serde(default)]
    pub position: Option<WirePosition>,
    #[serde(default)]
    pub rotation: Option<WireRotation>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub map_ids: Vec<String>,
}

impl TryFrom<LocalizationResponse> for LocalizationResult {
    type Error = LocalizationError;

    fn try_from(response: LocalizationResponse) -> Result<Self, Self::Error> {
        if !response.pose_found {
            return Ok(Self {
                confidence: response.confidence.unwrap_or(0.0),
                map_ids: response.map_ids,
                ..Self::not_found()
            });
        }

        let (Some(position), Some(rotation)) = (response.position, response.rotation) else {
            return Err(LocalizationError::Decode(
                "poseFound is true but position or rotation is missing".to_string(),
            ));
        };

        Ok(Self {
            pose_found: true,
            position: Vector3::new(position.x, position.y, position.z),
            rotation: quaternion_xyzw(rotation.x, rotation.y, rotation.z, rotation.w),
            confidence: response.confidence.unwrap_or(0.0),
            map_ids: response.map_ids,
        })
    }
}

/// Token to attach, or `Unauthorized` when it is missing or expired
pub fn check_credential(
    credential: Option<&BearerToken>,
) -> Result<&BearerToken, LocalizationError> {
    match credential {
        Some(token) if token.is_usable() => Ok(token),
        Some(_) => {
            warn!("Authentication token is expired or empty");
            Err(LocalizationError::Unauthorized)
        }
        None => {
            warn!("Authentication token is missing. Please authenticate first.");
            Err(LocalizationError::Unauthorized)
        }
    }
}

/// Sends localization queries to the service
pub struct LocalizationClient<T: Transport> {
    transport: Arc<T>,
    query_url: String,
}

impl<T: Transport> LocalizationClient<T> {
    pub fn new(transport: Arc<T>, query_url: impl Into<String>) -> Self {
        Self {
            transport,
            query_url: query_url.into(),
        }
    }

    pub fn query_url(&self) -> &str {
        &self.query_url
    }

    /// Send one localization request
    pub async fn localize(
        &self,
        payload: &RequestPayload,
        credential: Option<&BearerToken>,
    ) -> Result<LocalizationResult, LocalizationError> {
        let token = check_credential(credential)?;

        let boundary = RequestPayload::new_boundary();
        let request = HttpRequest {
            url: self.query_url.clone(),
            content_type: Some(RequestPayload::content_type(&boundary)),
            credentials: Credentials::Bearer(token.as_str().to_string()),
            body: payload.to_multipart(&boundary),
        };

        info!(
            url = %self.query_url,
            size = request.body.len(),
            "Sending localization request"
        );

        let response = self.transport.post(request).await.map_err(|e| {
            error!(error = %e, "Localization request failed");
            LocalizationError::Transport(e)
        })?;

        info!(status = response.status, "Localization response received");

        match response.status {
            200..=299 => {}
            401 => return Err(LocalizationError::Unauthorized),
            status => return Err(LocalizationError::BadStatus(status)),
        }

        let result = LocalizationResult::from_json(&response.body).inspect_err(|e| {
            error!(error = %e, "Failed to decode localization response");
        })?;

        debug!(
            pose_found = result.pose_found,
            confidence = result.confidence,
            map_ids = ?result.map_ids,
            "Localization result"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::transport::HttpResponse;
    use crate::frame::CameraIntrinsics;
    use crate::pipelines::localization::intrinsics::ResizedQuery;
    use crate::pipelines::localization::query::{MapSelector, QueryEncoder};
    use std::future::Future;
    use std::sync::Mutex;

    struct RecordingTransport {
        response: Result<HttpResponse, String>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingTransport {
        fn replying(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(HttpResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Transport for RecordingTransport {
        fn post(
            &self,
            request: HttpRequest,
        ) -> impl Future<Output = Result<HttpResponse, String>> + Send {
            self.requests.lock().unwrap().push(request);
            let response = self.response.clone();
            async move { response }
        }
    }

    fn payload() -> RequestPayload {
        let query = ResizedQuery {
            image_data: vec![1, 2, 3],
            width: 960,
            height: 720,
            intrinsics: CameraIntrinsics::new(700.0, 700.0, 480.0, 360.0),
        };
        QueryEncoder::encode(query, &MapSelector::Map("MAP".into()), true).unwrap()
    }

    const FOUND: &str = r#"{
        "poseFound": true,
        "position": {"x": 1.0, "y": 2.0, "z": 3.0},
        "rotation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0},
        "confidence": 0.9,
        "mapIds": ["m1"]
    }"#;

    #[tokio::test]
    async fn test_missing_token_is_unauthorized_without_request() {
        let transport = RecordingTransport::replying(200, FOUND);
        let client = LocalizationClient::new(transport.clone(), "https://vps.test/query");

        assert_eq!(
            client.localize(&payload(), None).await,
            Err(LocalizationError::Unauthorized)
        );
        assert_eq!(transport.sent(), 0);
    }

    #[tokio::test]
    async fn test_localize_decodes_result() {
        let transport = RecordingTransport::replying(200, FOUND);
        let client = LocalizationClient::new(transport.clone(), "https://vps.test/query");
        let token = BearerToken::new("tok");

        let result = client.localize(&payload(), Some(&token)).await.unwrap();
        assert!(result.pose_found);
        assert_eq!(result.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(result.rotation, Quaternion::identity());
        assert_eq!(result.map_ids, vec!["m1".to_string()]);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].credentials, Credentials::Bearer("tok".into()));
        let content_type = requests[0].content_type.as_deref().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary=Boundary-"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let token = BearerToken::new("tok");

        let client = LocalizationClient::new(RecordingTransport::replying(401, ""), "u");
        assert_eq!(
            client.localize(&payload(), Some(&token)).await,
            Err(LocalizationError::Unauthorized)
        );

        let client = LocalizationClient::new(RecordingTransport::replying(500, ""), "u");
        assert_eq!(
            client.localize(&payload(), Some(&token)).await,
            Err(LocalizationError::BadStatus(500))
        );

        let client = LocalizationClient::new(RecordingTransport::replying(200, "{}"), "u");
        assert!(matches!(
            client.localize(&payload(), Some(&token)).await,
            Err(LocalizationError::Decode(_))
        ));
    }

    #[test]
    fn test_pose_not_found_is_not_an_error() {
        let result = LocalizationResult::from_json(br#"{"poseFound": false}"#).unwrap();
        assert!(!result.pose_found);
        assert!(result.map_pose().is_none());
    }

    #[test]
    fn test_found_without_pose_fields_is_decode_error() {
        let err = LocalizationResult::from_json(br#"{"poseFound": true, "confidence": 0.4}"#)
            .unwrap_err();
        assert!(matches!(err, LocalizationError::Decode(_)));
    }
}
