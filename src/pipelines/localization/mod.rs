// SPDX-License-Identifier: GPL-3.0-only

//! Relocalization pipeline
//!
//! ```text
//! CameraFrame ─┬─▶ CapturePose (snapshot, kept for the resolver)
//!              │
//!              └─▶ IntrinsicsAdjuster ─▶ QueryEncoder ─▶ LocalizationClient
//!                  (blocking thread)                      (network round trip)
//!                                                               │
//!                          PoseResolver(result, snapshot) ◀─────┘
//!                                   │
//!                                   ▼
//!                          CorrectiveTransform
//! ```
//!
//! # Stages
//!
//! 1. **Validate**: map selection and bearer token are checked before any work
//! 2. **Snapshot**: the capture pose is taken from the frame itself
//! 3. **Adjust**: resize, orient and JPEG-encode on a blocking thread
//! 4. **Encode**: build the multipart payload
//! 5. **Localize**: one request, no retries
//! 6. **Resolve**: corrective transform from the result and the snapshot
//!
//! A cancelled attempt never reaches stage 6.

pub mod client;
pub mod intrinsics;
pub mod pose;
pub mod query;

pub use client::{LocalizationClient, LocalizationResult, check_credential};
pub use intrinsics::{IntrinsicsAdjuster, ResizedQuery};
pub use pose::{CorrectiveTransform, PoseResolver};
pub use query::{MapSelector, MapType, QueryEncoder, RequestPayload};

use crate::backends::auth::BearerToken;
use crate::backends::transport::Transport;
use crate::config::Config;
use crate::errors::{ConfigError, EncodingError, PipelineError, PipelineResult};
use crate::frame::{CameraFrame, CapturePose};
use crate::session::{RelocalizationStatus, SessionState, SessionStateHandle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

/// Outcome of an attempt that reached the service
#[derive(Debug, Clone, PartialEq)]
pub enum RelocalizationOutcome {
    /// Pose found and resolved
    Localized {
        transform: CorrectiveTransform,
        result: LocalizationResult,
    },
    /// Service answered without a pose
    PoseNotFound(LocalizationResult),
}

/// Runs relocalization attempts against one map selection
pub struct Relocalizer<T: Transport> {
    adjuster: IntrinsicsAdjuster,
    client: LocalizationClient<T>,
    selector: MapSelector,
    right_handed: bool,
    state: SessionStateHandle,
}

impl<T: Transport> Relocalizer<T> {
    pub fn new(transport: Arc<T>, query_url: impl Into<String>, selector: MapSelector) -> Self {
        Self {
            adjuster: IntrinsicsAdjuster::new(),
            client: LocalizationClient::new(transport, query_url),
            selector,
            right_handed: true,
            state: SessionStateHandle::new(),
        }
    }

    /// Build from configuration, failing early on a bad map selection
    pub fn from_config(config: &Config, transport: Arc<T>) -> Result<Self, ConfigError> {
        let selector = config.map_selector()?;
        Ok(Self::new(transport, config.query_url.clone(), selector)
            .with_adjuster(IntrinsicsAdjuster::with_quality(config.jpeg_quality)))
    }

    pub fn with_adjuster(mut self, adjuster: IntrinsicsAdjuster) -> Self {
        self.adjuster = adjuster;
        self
    }

    pub fn with_state(mut self, state: SessionStateHandle) -> Self {
        self.state = state;
        self
    }

    pub fn selector(&self) -> &MapSelector {
        &self.selector
    }

    pub fn state(&self) -> &SessionStateHandle {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run one attempt to completion
    pub async fn relocalize(
        &self,
        frame: CameraFrame,
        token: Option<&BearerToken>,
    ) -> PipelineResult<RelocalizationOutcome> {
        self.run(frame, token, &AtomicBool::new(false)).await
    }

    async fn run(
        &self,
        frame: CameraFrame,
        token: Option<&BearerToken>,
        cancelled: &AtomicBool,
    ) -> PipelineResult<RelocalizationOutcome> {
        self.state.set_tracking(frame.tracking_state);
        self.state.set_status(RelocalizationStatus::Localizing);

        let outcome = self.attempt(frame, token, cancelled).await;

        let status = match &outcome {
            Ok(RelocalizationOutcome::Localized { result, .. }) => {
                RelocalizationStatus::Localized {
                    confidence: result.confidence,
                    map_ids: result.map_ids.clone(),
                }
            }
            Ok(RelocalizationOutcome::PoseNotFound(_)) => RelocalizationStatus::PoseNotFound,
            Err(PipelineError::Cancelled) => RelocalizationStatus::Idle,
            Err(e) => {
                error!(error = %e, "Relocalization failed");
                RelocalizationStatus::Failed(e.to_string())
            }
        };
        self.state.set_status(status);

        outcome
    }

    async fn attempt(
        &self,
        frame: CameraFrame,
        token: Option<&BearerToken>,
        cancelled: &AtomicBool,
    ) -> PipelineResult<RelocalizationOutcome> {
        self.selector.validate()?;
        check_credential(token)?;

        // Must come from this frame; tracking moves on during the request
        let capture = CapturePose::from_frame(&frame)?;
        debug!(position = ?capture.position, "Capture pose recorded");

        let adjuster = self.adjuster.clone();
        let query = tokio::task::spawn_blocking(move || adjuster.adjust(&frame))
            .await
            .map_err(|e| EncodingError::TaskFailed(e.to_string()))??;

        if cancelled.load(Ordering::Acquire) {
            info!("Cancelled before sending query");
            return Err(PipelineError::Cancelled);
        }

        let payload = QueryEncoder::encode(query, &self.selector, self.right_handed)?;
        let result = self.client.localize(&payload, token).await?;

        if cancelled.load(Ordering::Acquire) {
            info!("Cancelled while localizing - discarding result");
            return Err(PipelineError::Cancelled);
        }

        if !result.pose_found {
            info!(map = %self.selector, "Pose not found");
            return Ok(RelocalizationOutcome::PoseNotFound(result));
        }

        let transform = PoseResolver::resolve(&result, &capture)?;
        info!(
            confidence = result.confidence,
            map_ids = ?result.map_ids,
            "Relocalization successful"
        );

        Ok(RelocalizationOutcome::Localized { transform, result })
    }
}

impl<T: Transport + 'static> Relocalizer<T> {
    /// Run an attempt in the background
    ///
    /// The token is moved into the task. Drop the handle to detach, or call
    /// [`RelocalizationHandle::cancel`] to abandon the attempt.
    pub fn spawn(
        self: Arc<Self>,
        frame: CameraFrame,
        token: Option<BearerToken>,
    ) -> RelocalizationHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        let task = tokio::spawn(async move {
            // Only the task writes the status, including when it is aborted
            let mut idle_on_drop = IdleOnDrop {
                state: self.state.clone(),
                armed: true,
            };
            let outcome = self.run(frame, token.as_ref(), &flag).await;
            idle_on_drop.armed = false;
            outcome
        });

        RelocalizationHandle {
            canceller: Canceller {
                cancelled,
                abort: task.abort_handle(),
            },
            task,
        }
    }
}

/// Publishes `Idle` if the attempt is dropped before it completes
struct IdleOnDrop {
    state: SessionStateHandle,
    armed: bool,
}

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        if self.armed {
            debug!("Relocalization task dropped before completion");
            self.state.set_status(RelocalizationStatus::Idle);
        }
    }
}

/// Cancels a background attempt without owning its result
#[derive(Debug, Clone)]
pub struct Canceller {
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl Canceller {
    /// Abandon the attempt; its result is discarded
    ///
    /// Does nothing once the attempt has completed, so a finished result is
    /// never turned into `Cancelled`.
    pub fn cancel(&self) {
        if self.abort.is_finished() || self.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Cancelling relocalization");
        self.abort.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// In-flight background attempt
pub struct RelocalizationHandle {
    canceller: Canceller,
    task: JoinHandle<PipelineResult<RelocalizationOutcome>>,
}

impl RelocalizationHandle {
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Cancellation handle usable while [`join`](Self::join) is pending
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.canceller.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the attempt
    ///
    /// Returns whatever the attempt produced if it completed, even when
    /// `cancel` raced with its last step. An aborted attempt yields
    /// `Cancelled`. Either way the published status matches the return value.
    pub async fn join(self) -> PipelineResult<RelocalizationOutcome> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(PipelineError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Relocalization task panicked");
                Err(EncodingError::TaskFailed(e.to_string()).into())
            }
        }
    }
}
