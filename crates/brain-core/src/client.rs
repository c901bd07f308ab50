//! One-stop wiring of the session core for applications.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{ReqwestTransport, RequestPipeline, Transport};
use crate::auth::{
    HttpIdentityProvider, IdentityProvider, SessionAuthority, SessionStorage, TokenStore, VisibilityMonitor,
};
use crate::config::Config;
use crate::hooks::{Navigator, Notifier};
use crate::resources::ResourceClient;

/// Session authority, request pipeline, visibility monitor and resource
/// gateways sharing one session.
pub struct BrainClient {
    authority: Arc<SessionAuthority>,
    pipeline: Arc<RequestPipeline>,
    visibility: Arc<VisibilityMonitor>,
    resources: ResourceClient,
}

impl BrainClient {
    /// Build a client talking to the configured backend and restore any
    /// persisted session.
    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let http = ReqwestTransport::build_client(config.request_timeout()).context("Failed to build HTTP client")?;
        let identity = Arc::new(HttpIdentityProvider::new(http.clone(), &config.base_url));
        let transport = Arc::new(ReqwestTransport::new(http, &config.base_url));
        let storage = config.session_storage()?;

        Ok(Self::assemble(storage, identity, transport, notifier, navigator))
    }

    /// Wire the parts together from explicit collaborators.
    pub fn assemble(
        storage: Box<dyn SessionStorage>,
        identity: Arc<dyn IdentityProvider>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let authority = Arc::new(
            SessionAuthority::new(TokenStore::new(storage), identity)
                .with_notifier(notifier)
                .with_navigator(navigator),
        );
        if authority.restore() {
            info!("Using persisted session");
        }

        let pipeline = Arc::new(RequestPipeline::new(transport, Arc::clone(&authority)));
        let visibility = Arc::new(VisibilityMonitor::new(Arc::clone(&authority)));
        let resources = ResourceClient::new(Arc::clone(&pipeline));

        Self {
            authority,
            pipeline,
            visibility,
            resources,
        }
    }

    pub fn authority(&self) -> &Arc<SessionAuthority> {
        &self.authority
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    pub fn visibility(&self) -> &Arc<VisibilityMonitor> {
        &self.visibility
    }

    pub fn resources(&self) -> &ResourceClient {
        &self.resources
    }

    /// Start the periodic proactive renewal check.
    pub fn start_renewal_timer(&self, config: &Config) -> JoinHandle<()> {
        self.visibility.spawn_renewal_timer(config.renewal_check_interval())
    }
}
