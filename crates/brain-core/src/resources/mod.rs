//! Resource gateways for the provisioning backend.
//!
//! Covers disk images, MV200 hosts, bare-metal servers, system disks and
//! network interfaces. All calls go through the `RequestPipeline`.

pub mod client;
pub mod models;

pub use client::ResourceClient;
pub use models::*;
