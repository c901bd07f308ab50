//! Core library for brainctl.
//!
//! This crate talks to the bare-metal provisioning backend on behalf of a
//! single operator. The interesting part is the session lifecycle:
//!
//! - [`auth::TokenStore`]: the current session and its persisted record
//! - [`auth::SessionAuthority`]: login, renewal, logout
//! - [`api::RequestPipeline`]: bearer attachment and 401 recovery
//! - [`auth::VisibilityMonitor`]: foreground tracking and the renewal timer
//!
//! Everything under [`resources`] is a thin typed wrapper over
//! [`api::RequestPipeline::request`].

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod hooks;
pub mod resources;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::BrainClient;
pub use config::Config;
