// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! CPU-heavy stages run on blocking threads and the network round trip is
//! awaited, so callers on an async runtime are never stalled.
//!
//! # Modules
//!
//! - [`localization`]: Frame to corrective transform via the positioning service

pub mod localization;
