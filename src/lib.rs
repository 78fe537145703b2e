// SPDX-License-Identifier: GPL-3.0-only

//! VPS Relocalizer - aligns a local AR tracking session to a remote map
//!
//! A captured frame is resized and sent to a visual positioning service,
//! and the returned map-space camera pose is turned into a corrective
//! transform for the session origin.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`frame`]: Captured frame, intrinsics, tracking state and capture pose
//! - [`geometry`]: Column-major right-handed pose algebra
//! - [`pipelines`]: Frame-to-transform relocalization pipeline
//! - [`backends`]: HTTP transport and token exchange
//! - [`session`]: Observable session state and anchor control
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load()?;
//! let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
//! let relocalizer = Relocalizer::from_config(&config, transport)?;
//! let outcome = relocalizer.relocalize(frame, Some(&token)).await?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame;
pub mod geometry;
pub mod pipelines;
pub mod session;

// Re-export commonly used types
pub use backends::{BearerToken, HttpTransport, TokenProvider, Transport};
pub use config::Config;
pub use constants::JpegQuality;
pub use errors::{PipelineError, PipelineResult};
pub use frame::{CameraFrame, CameraIntrinsics, CapturePose, DeviceOrientation, TrackingState};
pub use geometry::Pose;
pub use pipelines::localization::{
    CorrectiveTransform, MapSelector, RelocalizationHandle, RelocalizationOutcome, Relocalizer,
};
pub use session::{AnchorController, OriginController, RelocalizationStatus, SessionState};
