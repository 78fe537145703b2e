// SPDX-License-Identifier: GPL-3.0-only

//! Backends for the remote positioning service
//!
//! The pipeline only talks to the outside world through these seams:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │     Localization pipeline     │
//! └──────────────┬───────────────┘
//!                │
//!   ┌────────────┴────────────┐
//!   │                         │
//! ┌─┴──────────────┐  ┌───────┴────────┐
//! │ TokenProvider  │  │ Transport trait │  ← HttpTransport (reqwest) or test doubles
//! └────────────────┘  └────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`auth`]: Client-credential exchange for bearer tokens
//! - [`transport`]: HTTP POST abstraction used by both the token and query endpoints

pub mod auth;
pub mod transport;

pub use auth::{BearerToken, TokenProvider};
pub use transport::{Credentials, HttpRequest, HttpResponse, HttpTransport, Transport};
