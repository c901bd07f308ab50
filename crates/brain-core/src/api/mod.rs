//! HTTP access to the provisioning backend.
//!
//! Every resource call goes through the `RequestPipeline`, which attaches
//! the bearer token and recovers from expired tokens. The wire itself sits
//! behind the `Transport` trait; `ReqwestTransport` is the real one.

pub mod error;
pub mod pipeline;
pub mod transport;

pub use error::ApiError;
pub use pipeline::{PipelineRequest, RequestPipeline};
pub use transport::{ApiRequest, ApiResponse, Method, ReqwestTransport, Transport};
