// SPDX-License-Identifier: GPL-3.0-only

//! Observable session state and origin control
//!
//! The pipeline publishes its progress through a [`SessionStateHandle`]
//! owned by the caller. Whoever renders status text or a loading indicator
//! subscribes to it instead of reading shared globals.
//!
//! Applying a corrective transform to the live scene is done through the
//! [`OriginController`] trait. [`AnchorController`] is the in-process
//! implementation that keeps the anchor pose in memory.

use crate::frame::TrackingState;
use crate::geometry::Pose;
use crate::pipelines::localization::CorrectiveTransform;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Progress of the current relocalization attempt
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RelocalizationStatus {
    #[default]
    Idle,
    /// Query in flight
    Localizing,
    /// Service found a pose and the transform was resolved
    Localized { confidence: f32, map_ids: Vec<String> },
    /// Service answered but could not place the image
    PoseNotFound,
    /// Attempt failed; carries the user-facing message
    Failed(String),
}

impl RelocalizationStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, RelocalizationStatus::Localizing)
    }
}

/// Snapshot published to subscribers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    pub tracking: TrackingState,
    pub status: RelocalizationStatus,
}

impl SessionState {
    /// Human-readable tracking label
    pub fn tracking_label(&self) -> String {
        self.tracking.to_string()
    }
}

/// Publisher side of the session state channel
#[derive(Debug, Clone)]
pub struct SessionStateHandle {
    sender: watch::Sender<SessionState>,
}

impl SessionStateHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SessionState::default());
        Self { sender }
    }

    /// New receiver that sees the current state immediately
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> SessionState {
        self.sender.borrow().clone()
    }

    pub fn set_tracking(&self, tracking: TrackingState) {
        self.sender.send_if_modified(|state| {
            if state.tracking == tracking {
                return false;
            }
            debug!(tracking = %tracking, "Tracking state changed");
            state.tracking = tracking;
            true
        });
    }

    pub fn set_status(&self, status: RelocalizationStatus) {
        self.sender.send_modify(|state| state.status = status);
    }
}

impl Default for SessionStateHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies corrective transforms to the live tracking origin or anchor
pub trait OriginController {
    /// Apply a resolved transform. Returns whether it was accepted.
    fn apply(&mut self, transform: &CorrectiveTransform) -> bool;

    /// Return to the identity pose
    fn reset(&mut self);
}

/// Holds the visual anchor pose in tracking space
#[derive(Debug, Clone, Default)]
pub struct AnchorController {
    pose: Pose,
    updates: u64,
}

impl AnchorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Number of accepted updates since creation or the last reset
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Move the anchor, ignoring non-finite input
    pub fn set_pose(&mut self, pose: Pose) -> bool {
        if !pose.is_finite() {
            warn!(
                position = ?pose.position,
                rotation = ?pose.rotation.coords,
                "Ignoring anchor update with invalid values"
            );
            return false;
        }

        self.pose = pose;
        self.updates += 1;
        true
    }
}

impl OriginController for AnchorController {
    fn apply(&mut self, transform: &CorrectiveTransform) -> bool {
        let accepted = self.set_pose(transform.pose());
        if accepted {
            info!(position = ?self.pose.position, "Anchor updated");
        }
        accepted
    }

    fn reset(&mut self) {
        info!("Resetting anchor to origin");
        self.pose = Pose::identity();
        self.updates = 0;
    }
}
